// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求视图模块
//!
//! 该模块提供流水线消费的请求视图 [`Request`]，涵盖：
//! 1. 请求行（方法、路径、版本）与查询字符串参数。
//! 2. 请求作用域属性（[`Attribute`]），在一次请求及其内部转发之间传递框架对象。
//! 3. 会话访问（按需创建或只读访问已有会话）。
//! 4. 区域设置与用户角色（由外部认证后端填入）。
//! 5. 从原始字节解析 HTTP/1.1 请求，供二进制入口使用。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use log::error;
use url::form_urlencoded;

use crate::{
    action::SharedForm,
    exception::{ActionException, Exception},
    messages::{ActionMessages, MessageResources},
    model::{ActionConfig, ModuleConfig},
    param::*,
    session::Session,
};

/// 请求与会话作用域中保存的值。
#[derive(Clone)]
pub enum Attribute {
    Text(String),
    Flag(bool),
    Module(Arc<ModuleConfig>),
    Mapping(Arc<ActionConfig>),
    Resources(Arc<dyn MessageResources>),
    Form(SharedForm),
    Messages(ActionMessages),
    Exception(ActionException),
}

impl Attribute {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Attribute::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Attribute::Flag(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_module(&self) -> Option<&Arc<ModuleConfig>> {
        match self {
            Attribute::Module(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&Arc<ActionConfig>> {
        match self {
            Attribute::Mapping(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_resources(&self) -> Option<&Arc<dyn MessageResources>> {
        match self {
            Attribute::Resources(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&SharedForm> {
        match self {
            Attribute::Form(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_messages(&self) -> Option<&ActionMessages> {
        match self {
            Attribute::Messages(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_exception(&self) -> Option<&ActionException> {
        match self {
            Attribute::Exception(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attribute::Text(t) => write!(f, "Text({:?})", t),
            Attribute::Flag(b) => write!(f, "Flag({})", b),
            Attribute::Module(m) => write!(f, "Module({:?})", m.prefix()),
            Attribute::Mapping(m) => write!(f, "Mapping({:?})", m.path()),
            Attribute::Resources(_) => write!(f, "Resources"),
            Attribute::Form(_) => write!(f, "Form"),
            Attribute::Messages(m) => write!(f, "Messages({})", m.len()),
            Attribute::Exception(e) => write!(f, "Exception({})", e),
        }
    }
}

/// 流水线看到的一次请求。
#[derive(Debug, Clone)]
pub struct Request {
    /// 请求 ID，用于在多线程环境下追踪日志
    id: u128,
    method: HttpRequestMethod,
    version: HttpVersion,
    /// 不含查询字符串的请求路径
    path: String,
    /// 相对于框架挂载点的路径，未设置时与 `path` 相同
    path_info: Option<String>,
    query: Option<String>,
    /// 应用根路径，重定向时作为前缀
    context_path: String,
    headers: Vec<(String, String)>,
    parameters: BTreeMap<String, Vec<String>>,
    locale: Option<String>,
    user: Option<String>,
    roles: Vec<String>,
    attributes: HashMap<String, Attribute>,
    session: Option<Arc<Session>>,
    requested_session_id: Option<String>,
    new_session: bool,
    /// 内部转发的嵌套深度，顶层请求为 0
    forward_depth: usize,
}

impl Request {
    /// 构造一个请求；`target` 可以带查询字符串
    pub fn new(method: HttpRequestMethod, target: &str) -> Self {
        let (path, query) = split_target(target);
        let mut request = Self {
            id: 0,
            method,
            version: HttpVersion::V1_1,
            path: path.to_string(),
            path_info: None,
            query: query.map(str::to_string),
            context_path: String::new(),
            headers: vec![],
            parameters: BTreeMap::new(),
            locale: None,
            user: None,
            roles: vec![],
            attributes: HashMap::new(),
            session: None,
            requested_session_id: None,
            new_session: false,
            forward_depth: 0,
        };
        if let Some(q) = query {
            request.add_encoded_parameters(q.as_bytes());
        }
        request
    }

    /// 从原始字节缓冲区尝试构建 `Request` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 验证编码：确保请求头是合法的 UTF-8 字符串。
    /// 2. 解析请求行：提取方法、路径和协议版本。
    /// 3. 迭代解析标头：识别 `Accept-Language`、`Cookie` 与 `Content-Type`。
    /// 4. 解析参数：查询字符串与 `application/x-www-form-urlencoded` 请求体。
    pub fn try_from(buffer: &[u8], id: u128) -> Result<Self, Exception> {
        let request_string = match std::str::from_utf8(buffer) {
            Ok(string) => string.trim_end_matches('\0'),
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求", id);
                return Err(Exception::BadRequest("request is not UTF-8".to_string()));
            }
        };

        let (head, body) = match request_string.split_once("\r\n\r\n") {
            Some((head, body)) => (head, body),
            None => (request_string, ""),
        };
        let request_lines: Vec<&str> = head.split(CRLF).collect();

        // 解析请求行 (e.g., "POST /save?id=1 HTTP/1.1")
        let first_line_parts: Vec<&str> = request_lines[0].split(' ').collect();
        if first_line_parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_lines[0]);
            return Err(Exception::BadRequest("malformed request line".to_string()));
        }

        let method_str = first_line_parts[0].to_uppercase();
        let method = match method_str.as_str() {
            "GET" => HttpRequestMethod::Get,
            "HEAD" => HttpRequestMethod::Head,
            "OPTIONS" => HttpRequestMethod::Options,
            "POST" => HttpRequestMethod::Post,
            "PUT" => HttpRequestMethod::Put,
            "DELETE" => HttpRequestMethod::Delete,
            _ => {
                error!("[ID{}]不支持的HTTP请求方法：{}", id, &method_str);
                return Err(Exception::BadRequest(format!("unsupported method {}", method_str)));
            }
        };

        let version_str = first_line_parts[2].to_uppercase();
        if version_str != "HTTP/1.1" {
            error!("[ID{}]不支持的HTTP协议版本：{}", id, &version_str);
            return Err(Exception::BadRequest(format!("unsupported version {}", version_str)));
        }

        let mut request = Self::new(method, first_line_parts[1]);
        request.id = id;

        for line in request_lines.iter().skip(1) {
            let (name, value) = match line.split_once(':') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => continue,
            };
            match name.to_lowercase().as_str() {
                // 只取优先级最高的语言标签，例如 "zh-CN,zh;q=0.9" → "zh-CN"
                "accept-language" => {
                    request.locale = value
                        .split(',')
                        .next()
                        .and_then(|tag| tag.split(';').next())
                        .map(|tag| tag.trim().to_string())
                        .filter(|tag| !tag.is_empty() && tag != "*");
                }
                "cookie" => {
                    for cookie in value.split(';') {
                        if let Some((k, v)) = cookie.trim().split_once('=') {
                            if k == SESSION_COOKIE {
                                request.requested_session_id = Some(v.to_string());
                            }
                        }
                    }
                }
                _ => {}
            }
            request.headers.push((name.to_string(), value.to_string()));
        }

        let is_form = request
            .header("content-type")
            .map_or(false, |t| t.starts_with("application/x-www-form-urlencoded"));
        if is_form && !body.is_empty() {
            request.add_encoded_parameters(body.as_bytes());
        }

        Ok(request)
    }

    /// 构造内部转发使用的子请求。
    ///
    /// 会话共享；框架内部属性不会跨越转发边界；目标上的查询参数优先于原有参数。
    pub fn sub_request(&self, target: &str) -> Request {
        let (path, query) = split_target(target);
        let mut parameters = self.parameters.clone();
        if let Some(q) = query {
            let mut forwarded: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for (name, value) in form_urlencoded::parse(q.as_bytes()) {
                forwarded
                    .entry(name.into_owned())
                    .or_default()
                    .push(value.into_owned());
            }
            for (name, mut values) in forwarded {
                let existing = parameters.remove(&name).unwrap_or_default();
                values.extend(existing);
                parameters.insert(name, values);
            }
        }
        let attributes = self
            .attributes
            .iter()
            .filter(|(key, _)| !INTERNAL_ATTRIBUTES.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Request {
            id: self.id,
            method: self.method,
            version: self.version,
            path: path.to_string(),
            path_info: None,
            query: query.map(str::to_string),
            context_path: self.context_path.clone(),
            headers: self.headers.clone(),
            parameters,
            locale: self.locale.clone(),
            user: self.user.clone(),
            roles: self.roles.clone(),
            attributes,
            session: self.session.clone(),
            requested_session_id: self.requested_session_id.clone(),
            new_session: false,
            forward_depth: self.forward_depth + 1,
        }
    }

    fn add_encoded_parameters(&mut self, encoded: &[u8]) {
        for (name, value) in form_urlencoded::parse(encoded) {
            self.add_parameter(&name, &value);
        }
    }
}

// --- 参数、属性与会话 ---

impl Request {
    pub fn with_id(mut self, id: u128) -> Self {
        self.id = id;
        self
    }

    pub fn set_path_info(&mut self, path_info: &str) {
        self.path_info = Some(path_info.to_string());
    }

    pub fn set_context_path(&mut self, context_path: &str) {
        self.context_path = context_path.trim_end_matches('/').to_string();
    }

    pub fn set_locale(&mut self, locale: Option<&str>) {
        self.locale = locale.map(str::to_string);
    }

    pub fn add_parameter(&mut self, name: &str, value: &str) {
        self.parameters
            .entry(name.to_string())
            .or_default()
            .push(value.to_string());
    }

    /// 由外部认证后端设置当前用户及其角色
    pub fn set_user(&mut self, user: &str, roles: &[&str]) {
        self.user = Some(user.to_string());
        self.roles = roles.iter().map(|r| r.to_string()).collect();
    }

    pub fn is_user_in_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn attribute(&self, key: &str) -> Option<&Attribute> {
        self.attributes.get(key)
    }

    pub fn set_attribute(&mut self, key: &str, value: Attribute) {
        self.attributes.insert(key.to_string(), value);
    }

    pub fn remove_attribute(&mut self, key: &str) -> Option<Attribute> {
        self.attributes.remove(key)
    }

    pub fn attribute_names(&self) -> Vec<&str> {
        self.attributes.keys().map(String::as_str).collect()
    }

    /// 获取会话，不存在时创建
    pub fn session(&mut self) -> Arc<Session> {
        if let Some(session) = &self.session {
            return Arc::clone(session);
        }
        let session = Arc::new(Session::new());
        self.session = Some(Arc::clone(&session));
        self.new_session = true;
        session
    }

    /// 获取已有会话，不会创建
    pub fn existing_session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// 由会话存储在请求进入流水线之前关联已有会话
    pub fn set_session(&mut self, session: Arc<Session>) {
        self.session = Some(session);
    }

    /// 会话是否在本次请求中新建，新建的会话需要写回 Cookie
    pub fn is_new_session(&self) -> bool {
        self.new_session
    }

    /// 子请求中新建的会话归还给发起转发的请求
    pub fn adopt_session(&mut self, sub: &Request) {
        if self.session.is_none() && sub.session.is_some() {
            self.session = sub.session.clone();
            self.new_session = sub.new_session;
        }
    }
}

// --- Getter 访问器实现 ---

impl Request {
    pub fn id(&self) -> u128 {
        self.id
    }

    pub fn method(&self) -> HttpRequestMethod {
        self.method
    }

    pub fn version(&self) -> &HttpVersion {
        &self.version
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn path_info(&self) -> &str {
        self.path_info.as_deref().unwrap_or(&self.path)
    }

    pub fn query_string(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// 大小写不敏感地查找第一个同名请求头
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn user_agent(&self) -> &str {
        self.header("user-agent").unwrap_or("")
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    pub fn parameter_values(&self, name: &str) -> Option<&[String]> {
        self.parameters.get(name).map(Vec::as_slice)
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.keys().map(String::as_str).collect()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn requested_session_id(&self) -> Option<&str> {
        self.requested_session_id.as_deref()
    }

    pub fn forward_depth(&self) -> usize {
        self.forward_depth
    }
}

fn split_target(target: &str) -> (&str, Option<&str>) {
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}
