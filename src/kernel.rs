// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 分发内核
//!
//! [`ActionKernel`] 是框架的入口：
//!
//! 1. 去掉应用根路径，按扩展名区分动作路径与静态资源路径。
//! 2. 动作路径交给 [`ModuleResolver`] 选择模块，再交给该模块的 [`RequestProcessor`]。
//! 3. 作为 [`Dispatcher`] 执行内部转发与包含，子请求重新走一遍上述流程。
//! 4. 流水线的终止性错误在这里被渲染为本地化的通用错误页，不包含任何内部细节。
//!
//! 每个模块的处理器在第一次使用时创建并缓存；插件在构建内核时初始化，在 [`ActionKernel::destroy`] 中销毁。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use log::{debug, error, info, warn};

use crate::{
    action::{ActionRegistry, PlugIn},
    config::ServerConfig,
    exception::Exception,
    messages::MessageResources,
    model::ModuleConfig,
    param::*,
    processor::{Dispatcher, Preprocess, RequestProcessor},
    request::{Attribute, Request},
    resolver::ModuleResolver,
    response::Response,
    util::{get_mime, lock, read_lock, write_lock},
};

/// [`ActionKernel`] 的构建器
pub struct KernelBuilder {
    resolver: ModuleResolver,
    registry: ActionRegistry,
    preprocessors: Vec<Arc<dyn Preprocess>>,
    www_root: PathBuf,
    context_path: String,
    action_extension: String,
    max_forward_depth: usize,
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self {
            resolver: ModuleResolver::new(),
            registry: ActionRegistry::new(),
            preprocessors: vec![],
            www_root: PathBuf::from("www"),
            context_path: String::new(),
            action_extension: "do".to_string(),
            max_forward_depth: DEFAULT_MAX_FORWARD_DEPTH,
        }
    }
}

impl KernelBuilder {
    /// 从服务器配置中取出静态根目录、应用根路径、动作扩展名与最大转发深度
    pub fn from_config(config: &ServerConfig) -> Self {
        Self::default()
            .www_root(config.www_root())
            .context_path(config.context_path())
            .action_extension(config.action_extension())
            .max_forward_depth(config.max_forward_depth())
    }

    pub fn module(
        mut self,
        module: Arc<ModuleConfig>,
        resources: Option<Arc<dyn MessageResources>>,
    ) -> Self {
        self.resolver.add_module(module, resources);
        self
    }

    pub fn registry(mut self, registry: ActionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn preprocessor(mut self, preprocessor: Arc<dyn Preprocess>) -> Self {
        self.preprocessors.push(preprocessor);
        self
    }

    pub fn www_root(mut self, www_root: &str) -> Self {
        self.www_root = PathBuf::from(www_root);
        self
    }

    pub fn context_path(mut self, context_path: &str) -> Self {
        self.context_path = context_path.trim_end_matches('/').to_string();
        self
    }

    /// 动作路径的扩展名；为空时所有路径都交给动作处理
    pub fn action_extension(mut self, extension: &str) -> Self {
        self.action_extension = extension.trim_start_matches('.').to_string();
        self
    }

    /// 最大转发跳数，超过 [`MAX_FORWARD_DEPTH_LIMIT`] 的值按上限处理
    pub fn max_forward_depth(mut self, depth: usize) -> Self {
        if depth > MAX_FORWARD_DEPTH_LIMIT {
            warn!("最大转发深度{}超过上限{}", depth, MAX_FORWARD_DEPTH_LIMIT);
        }
        self.max_forward_depth = depth.min(MAX_FORWARD_DEPTH_LIMIT);
        self
    }

    /// 初始化全部插件并构建内核。任何插件初始化失败时，已初始化的插件按相反顺序销毁。
    pub fn build(self) -> Result<ActionKernel, Exception> {
        let mut plug_ins: Vec<(String, Box<dyn PlugIn>)> = vec![];
        let prefixes: Vec<String> = self.resolver.prefixes().iter().map(|p| p.to_string()).collect();
        for prefix in &prefixes {
            let module = match self.resolver.module(prefix) {
                Some(module) => Arc::clone(module),
                None => continue,
            };
            for config in module.plug_in_configs() {
                let result = self
                    .registry
                    .create_plug_in(config)
                    .and_then(|mut plug_in| match plug_in.init(&module) {
                        Ok(()) => Ok(plug_in),
                        Err(e) => Err(Exception::InternalError(format!(
                            "plug-in {} failed to initialize: {}",
                            config.plug_in_type(),
                            e
                        ))),
                    });
                match result {
                    Ok(plug_in) => {
                        info!("模块'{}'的插件{}初始化完成", prefix, config.plug_in_type());
                        plug_ins.push((config.plug_in_type().to_string(), plug_in));
                    }
                    Err(e) => {
                        error!("模块'{}'的插件初始化失败：{}", prefix, e);
                        destroy_plug_ins(&mut plug_ins);
                        return Err(e);
                    }
                }
            }
        }

        info!(
            "内核构建完成：模块{:?}，动作扩展名'{}'，最大转发深度{}",
            prefixes, self.action_extension, self.max_forward_depth
        );
        Ok(ActionKernel {
            resolver: self.resolver,
            registry: Arc::new(self.registry),
            preprocessors: self.preprocessors,
            processors: RwLock::new(HashMap::new()),
            plug_ins: Mutex::new(plug_ins),
            www_root: self.www_root,
            context_path: self.context_path,
            action_extension: self.action_extension,
            max_forward_depth: self.max_forward_depth,
        })
    }
}

fn destroy_plug_ins(plug_ins: &mut Vec<(String, Box<dyn PlugIn>)>) {
    while let Some((plug_in_type, mut plug_in)) = plug_ins.pop() {
        debug!("销毁插件{}", plug_in_type);
        plug_in.destroy();
    }
}

pub struct ActionKernel {
    resolver: ModuleResolver,
    registry: Arc<ActionRegistry>,
    preprocessors: Vec<Arc<dyn Preprocess>>,
    /// 按模块前缀缓存的处理器
    processors: RwLock<HashMap<String, Arc<RequestProcessor>>>,
    plug_ins: Mutex<Vec<(String, Box<dyn PlugIn>)>>,
    www_root: PathBuf,
    context_path: String,
    action_extension: String,
    max_forward_depth: usize,
}

impl fmt::Debug for ActionKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionKernel")
            .field("modules", &self.resolver.prefixes())
            .field("www_root", &self.www_root)
            .field("context_path", &self.context_path)
            .field("action_extension", &self.action_extension)
            .field("max_forward_depth", &self.max_forward_depth)
            .finish()
    }
}

impl ActionKernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::default()
    }

    pub fn resolver(&self) -> &ModuleResolver {
        &self.resolver
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// 已创建的处理器数量
    pub fn active_processors(&self) -> usize {
        read_lock(&self.processors).len()
    }

    /// 处理一个顶层请求。流水线的终止性错误会被记录并渲染为通用错误页。
    pub fn process(&self, request: &mut Request, response: &mut Response) {
        request.set_context_path(&self.context_path);
        let path = match self.strip_context_path(request.path()) {
            Some(path) => path,
            None => {
                let e = Exception::BadRequest(format!(
                    "path {} is outside context {}",
                    request.path(),
                    self.context_path
                ));
                self.render_error(&e, request, response);
                return;
            }
        };
        if let Err(e) = self.execute(&path, request, response) {
            self.render_error(&e, request, response);
        }
    }

    /// 销毁全部插件并释放处理器缓存
    pub fn destroy(&self) {
        destroy_plug_ins(&mut lock(&self.plug_ins));
        for processor in write_lock(&self.processors).drain().map(|(_, p)| p) {
            processor.destroy();
        }
        info!("内核已销毁");
    }

    fn strip_context_path(&self, path: &str) -> Option<String> {
        if self.context_path.is_empty() {
            return Some(path.to_string());
        }
        match path.strip_prefix(&self.context_path) {
            Some("") => Some("/".to_string()),
            Some(rest) if rest.starts_with('/') => Some(rest.to_string()),
            _ => None,
        }
    }

    /// 动作路径去掉扩展名后的分发路径；不是动作路径时返回 `None`
    fn action_path<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.action_extension.is_empty() {
            return Some(path);
        }
        path.strip_suffix(self.action_extension.as_str())
            .and_then(|p| p.strip_suffix('.'))
            .filter(|p| !p.is_empty() && !p.ends_with('/'))
    }

    fn execute(&self, path: &str, request: &mut Request, response: &mut Response) -> Result<(), Exception> {
        match self.action_path(path) {
            Some(action_path) => {
                request.set_path_info(action_path);
                self.run_pipeline(request, response)
            }
            None => self.serve_static(path, request, response),
        }
    }

    fn run_pipeline(&self, request: &mut Request, response: &mut Response) -> Result<(), Exception> {
        let module = match self.resolver.select_module(request) {
            Some(module) => module,
            None => {
                error!("[ID{}]路径{}没有可用的模块", request.id(), request.path_info());
                return Err(Exception::BadRequest(format!(
                    "no module for path {}",
                    request.path_info()
                )));
            }
        };
        let processor = self.processor(&module);
        processor.process(request, response, self)
    }

    /// 模块的处理器，首次使用时创建；写锁下再次检查，保证每个模块只创建一个
    fn processor(&self, module: &Arc<ModuleConfig>) -> Arc<RequestProcessor> {
        if let Some(processor) = read_lock(&self.processors).get(module.prefix()) {
            return Arc::clone(processor);
        }
        let mut processors = write_lock(&self.processors);
        if let Some(processor) = processors.get(module.prefix()) {
            return Arc::clone(processor);
        }
        info!("创建模块'{}'的请求处理器", module.prefix());
        let processor = Arc::new(
            RequestProcessor::new(Arc::clone(module), Arc::clone(&self.registry))
                .with_preprocessors(self.preprocessors.clone()),
        );
        processors.insert(module.prefix().to_string(), Arc::clone(&processor));
        processor
    }

    fn serve_static(&self, path: &str, request: &Request, response: &mut Response) -> Result<(), Exception> {
        let relative = path.trim_start_matches('/');
        if relative.split('/').any(|segment| segment == "..") {
            warn!("[ID{}]拒绝越界的静态资源路径{}", request.id(), path);
            return Err(Exception::BadRequest(format!("illegal resource path {}", path)));
        }
        let relative = if relative.is_empty() { "index.html" } else { relative };
        let file = self.www_root.join(relative);
        match fs::read(&file) {
            Ok(content) => {
                debug!("[ID{}]返回静态资源{}", request.id(), file.display());
                response
                    .set_code(200)
                    .set_content_type(get_mime(Path::new(relative)))
                    .set_body(&content);
            }
            Err(e) => {
                warn!("[ID{}]静态资源{}不可用：{}", request.id(), file.display(), e);
                response.send_error(404, None);
            }
        }
        Ok(())
    }

    fn sub_request(&self, path: &str, request: &Request) -> Result<Request, Exception> {
        if request.forward_depth() >= self.max_forward_depth {
            error!(
                "[ID{}]转发到{}时超过最大转发深度{}",
                request.id(),
                path,
                self.max_forward_depth
            );
            return Err(Exception::InternalError(format!(
                "forward depth {} exceeded at {}",
                self.max_forward_depth, path
            )));
        }
        Ok(request.sub_request(path))
    }

    /// 生成通用错误页。消息文本取自请求所在模块的消息资源，缺失时使用默认模块的。
    fn render_error(&self, exception: &Exception, request: &Request, response: &mut Response) {
        let code = exception.status_code();
        if code >= 500 {
            error!("[ID{}]请求{}处理失败：{}", request.id(), request.path(), exception);
        } else {
            warn!("[ID{}]请求{}被拒绝：{}", request.id(), request.path(), exception);
        }

        let locale = request
            .existing_session()
            .and_then(|session| session.attribute(LOCALE_KEY))
            .and_then(|attribute| attribute.as_text().map(str::to_string))
            .or_else(|| request.locale().map(str::to_string));
        let resources = request
            .attribute(MESSAGES_KEY)
            .and_then(Attribute::as_resources)
            .or_else(|| self.resolver.resources(""));
        let key = exception.message_key();
        let note = resources
            .filter(|r| r.is_present(locale.as_deref(), key))
            .and_then(|r| r.message(locale.as_deref(), key, &[]));

        *response = Response::new();
        response.send_error(code, note.as_deref());
    }
}

impl Dispatcher for ActionKernel {
    fn forward(&self, path: &str, request: &mut Request, response: &mut Response) -> Result<(), Exception> {
        let mut sub = self.sub_request(path, request)?;
        debug!("[ID{}]内部转发到{}（深度{}）", request.id(), path, sub.forward_depth());
        let target = sub.path().to_string();
        let mut sub_response = Response::new();
        let result = self.execute(&target, &mut sub, &mut sub_response);
        request.adopt_session(&sub);
        result?;
        response.absorb(sub_response);
        Ok(())
    }

    fn include(&self, path: &str, request: &mut Request, response: &mut Response) -> Result<(), Exception> {
        let mut sub = self.sub_request(path, request)?;
        debug!("[ID{}]内部包含{}（深度{}）", request.id(), path, sub.forward_depth());
        let target = sub.path().to_string();
        let mut sub_response = Response::new();
        let result = self.execute(&target, &mut sub, &mut sub_response);
        request.adopt_session(&sub);
        result?;
        response.append(&sub_response);
        Ok(())
    }
}
