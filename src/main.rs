// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 动作分发服务器
//!
//! 在 Tokio 运行时之上运行 [`ActionKernel`]：
//! - 启动时读取服务器配置与各模块的定义文件，冻结后构建内核并初始化插件
//! - 每个连接在独立任务中解析请求，流水线本身在阻塞线程池中执行
//! - 会话以 Cookie 关联，存放在容量受限的 LRU 会话存储中
//! - 后台管理控制台（stop / status / help）与 Ctrl-C 都会触发停机，停机时销毁内核

use std::{
    net::{Ipv4Addr, SocketAddrV4},
    process,
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    runtime::Builder,
    sync::Notify,
};

use actionweb::{
    action::{Action, ActionForm, ActionRegistry},
    cache::ConfigProvider,
    exception::ActionException,
    kernel::{ActionKernel, KernelBuilder},
    loader::load_default_resources,
    messages::MessageResources,
    model::{ActionMapping, ForwardConfig},
    param::SESSION_COOKIE,
    request::Request,
    response::Response,
    session::SessionStore,
    ServerConfig,
};

const BUFFER_SIZE: usize = 8192;

fn main() {
    // 1. 初始化日志系统
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
        process::exit(1);
    }

    // 2. 载入服务器配置
    let config = match ServerConfig::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            error!("无法载入服务器配置：{}", e);
            process::exit(1);
        }
    };
    info!("www root: {}", config.www_root());

    // 3. 载入模块定义并构建内核
    let kernel = match build_kernel(&config) {
        Ok(kernel) => Arc::new(kernel),
        Err(e) => {
            error!("无法构建内核：{}", e);
            process::exit(1);
        }
    };
    info!("内核已就绪：{:?}", kernel);

    // 4. 按配置的工作线程数构建运行时
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads())
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法创建Tokio运行时：{}", e);
            process::exit(1);
        }
    };

    runtime.block_on(serve(&config, Arc::clone(&kernel)));
    // 控制台任务可能仍阻塞在标准输入上
    runtime.shutdown_timeout(Duration::from_secs(1));
    kernel.destroy();
    info!("服务器已停止");
}

/// 读取全部模块并注册内置的演示处理器
fn build_kernel(config: &ServerConfig) -> Result<ActionKernel, String> {
    let provider = ConfigProvider::new(config.cache_size());
    let mut builder = KernelBuilder::from_config(config).registry(demo_registry());
    for source in config.modules() {
        let module = provider
            .load(source.prefix(), source.config())
            .map_err(|e| e.to_string())?;
        let resources = load_default_resources(&module)
            .map_err(|e| e.to_string())?
            .map(|r| Arc::new(r) as Arc<dyn MessageResources>);
        builder = builder.module(module, resources);
    }
    builder.build().map_err(|e| e.to_string())
}

/// 问候动作：表单中的 `name` 为空时抛出模块异常，由异常配置转发回输入页
struct GreetAction;

impl Action for GreetAction {
    fn execute(
        &self,
        mapping: &ActionMapping,
        form: Option<&mut dyn ActionForm>,
        _request: &mut Request,
        response: &mut Response,
    ) -> Result<Option<ForwardConfig>, ActionException> {
        let name = form
            .and_then(|f| f.property("name"))
            .filter(|n| !n.trim().is_empty());
        match name {
            Some(name) => {
                response.set_body(format!("<h1>Hello, {}!</h1>", escape(&name)).as_bytes());
                Ok(mapping.find_forward("done"))
            }
            None => Err(ActionException::module(
                "app.MissingName",
                "error.name.required",
                vec![],
            )
            .with_property("name")),
        }
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn demo_registry() -> ActionRegistry {
    let mut registry = ActionRegistry::new();
    registry.register_action("app.Greet", || Arc::new(GreetAction) as Arc<dyn Action>);
    registry
}

async fn serve(config: &ServerConfig, kernel: Arc<ActionKernel>) {
    let port = config.port();
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, port);
    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", port, e);
            return;
        }
    };
    info!("服务端在{}上监听Socket连接", socket);

    let sessions = Arc::new(SessionStore::from_capacity(config.session_capacity()));
    let active_connection = Arc::new(AtomicU32::new(0));
    let shutdown = Arc::new(Notify::new());

    tokio::spawn(console(
        Arc::clone(&shutdown),
        Arc::clone(&active_connection),
        Arc::clone(&sessions),
    ));

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!("接受连接失败：{}", e);
                    continue;
                }
            },
            _ = shutdown.notified() => {
                info!("主循环接收到停机指令，正在退出...");
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("收到Ctrl-C，正在退出...");
                break;
            }
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let kernel = Arc::clone(&kernel);
        let sessions = Arc::clone(&sessions);
        let active_connection = Arc::clone(&active_connection);
        tokio::spawn(async move {
            active_connection.fetch_add(1, Ordering::SeqCst);
            handle_connection(&mut stream, id, kernel, sessions).await;
            active_connection.fetch_sub(1, Ordering::SeqCst);
        });
        id += 1;
    }
}

/// 后台管理控制台
async fn console(shutdown: Arc<Notify>, active_connection: Arc<AtomicU32>, sessions: Arc<SessionStore>) {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut input = String::new();
    loop {
        input.clear();
        match reader.read_line(&mut input).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        match input.trim() {
            "stop" => {
                println!("停机指令已激活，服务器将停止接受新连接...");
                shutdown.notify_one();
                break;
            }
            "status" => {
                println!("== actionweb 状态 ==");
                println!("当前活跃连接数: {}", active_connection.load(Ordering::SeqCst));
                println!("当前会话数: {}", sessions.len());
                println!("====================");
            }
            "help" => {
                println!("== actionweb Help ==");
                println!("stop   - 发出停机信号");
                println!("status - 查看当前服务器运行状态");
                println!("help   - 显示此帮助信息");
                println!("====================");
            }
            cmd => println!("无效的命令：{}", cmd),
        }
    }
}

async fn handle_connection(
    stream: &mut TcpStream,
    id: u128,
    kernel: Arc<ActionKernel>,
    sessions: Arc<SessionStore>,
) {
    let mut buffer = vec![0; BUFFER_SIZE];
    let n = match stream.read(&mut buffer).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
    };
    let start_time = Instant::now();

    let mut request = match Request::try_from(&buffer[..n], id) {
        Ok(request) => request,
        Err(e) => {
            warn!("[ID{}]解析HTTP请求失败: {}", id, e);
            let mut response = Response::new();
            response.send_error(400, None);
            let _ = stream.write_all(&response.as_bytes()).await;
            return;
        }
    };
    if let Some(session) = request.requested_session_id().and_then(|sid| sessions.find(sid)) {
        request.set_session(session);
    }

    // 流水线中的文件读取与用户代码都是同步的，放到阻塞线程池里执行
    let result = tokio::task::spawn_blocking(move || {
        let mut response = Response::new();
        kernel.process(&mut request, &mut response);
        (request, response)
    })
    .await;
    let (request, mut response) = match result {
        Ok(pair) => pair,
        Err(e) => {
            error!("[ID{}]请求处理任务异常终止：{}", id, e);
            let mut response = Response::new();
            response.send_error(500, None);
            let _ = stream.write_all(&response.as_bytes()).await;
            return;
        }
    };

    if request.is_new_session() {
        if let Some(session) = request.existing_session() {
            sessions.insert(Arc::clone(session));
            response.add_header(
                "Set-Cookie",
                &format!("{}={}; Path=/; HttpOnly", SESSION_COOKIE, session.id()),
            );
        }
    }

    info!(
        "[ID{}] {}, {}, {}, {}, {}, {}ms",
        id,
        request.method(),
        request.path(),
        response.status_code(),
        response.information(),
        request.user_agent(),
        start_time.elapsed().as_millis()
    );

    if let Err(e) = stream.write_all(&response.as_bytes()).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
}
