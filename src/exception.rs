// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求处理流水线在生命周期中可能产生的两类错误：
//!
//! - [`Exception`]：流水线自身的终止性错误（路径无法解析、权限不足、校验失败但没有回退目标、
//!   处理器构造失败，以及没有任何异常配置能够接管的业务异常）。
//! - [`ActionException`]：业务处理器 `execute()` 抛出的业务异常，可由异常配置映射为转发。
//! - [`ConfigError`]：启动阶段读取、解析与校验配置文件时的错误。
//!
//! ## 设计意图
//! - **错误分类**：每个 `Exception` 变体都对应一个固定的 HTTP 状态码，便于顶层入口生成通用错误页。
//! - **异常继承链**：`ActionException` 携带从具体到一般的类型名链，查找异常配置时按链逐级匹配。
//! - **不泄露细节**：`Display` 输出只用于日志，顶层入口不会把它写入响应体。

use std::error::Error;
use std::fmt;

use crate::messages::ActionMessage;

/// 请求处理流水线的终止性错误。
#[derive(Debug, Clone)]
pub enum Exception {
    /// 无法从请求中解析出路径，或者路径没有对应的映射。对应 `400 Bad Request`。
    BadRequest(String),
    /// 映射声明了角色要求，而当前用户不具备其中任何一个角色。对应 `403 Forbidden`。
    AccessDenied(String),
    /// 表单校验失败，但映射没有配置 `input` 回退目标。属于配置错误，对应 `500`。
    NoInputTarget(String),
    /// 处理器、表单或插件构造失败，以及内部转发超过最大跳数。对应 `500`。
    InternalError(String),
    /// 业务处理器抛出的异常没有匹配的异常配置，原样向上抛出。对应 `500`。
    Unhandled(ActionException),
}

use Exception::*;

impl Exception {
    /// 顶层入口渲染错误页时使用的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            BadRequest(_) => 400,
            AccessDenied(_) => 403,
            NoInputTarget(_) | InternalError(_) | Unhandled(_) => 500,
        }
    }

    /// 错误页文案在消息资源中的键
    pub fn message_key(&self) -> &'static str {
        match self {
            BadRequest(_) => "error.badRequest",
            AccessDenied(_) => "error.accessDenied",
            NoInputTarget(_) | InternalError(_) | Unhandled(_) => "error.internal",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadRequest(detail) => write!(f, "Bad request: {}", detail),
            AccessDenied(path) => write!(f, "User is not authorized to access action {}", path),
            NoInputTarget(path) => write!(f, "No input attribute for mapping path {}", path),
            InternalError(detail) => write!(f, "Internal error: {}", detail),
            Unhandled(e) => write!(f, "Unhandled action exception: {}", e),
        }
    }
}

impl Error for Exception {}

/// 业务处理器抛出的异常。
///
/// `kinds` 中第一个元素是具体类型名，其后是通过 [`ActionException::extends`] 声明的父类型名。
/// 携带结构化消息（`module_message`）的异常对应"模块异常"，异常处理器会直接复用其中的消息。
#[derive(Debug, Clone, PartialEq)]
pub struct ActionException {
    kinds: Vec<String>,
    message: String,
    module_message: Option<ActionMessage>,
    property: Option<String>,
}

impl ActionException {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kinds: vec![kind.into()],
            message: message.into(),
            module_message: None,
            property: None,
        }
    }

    /// 构造携带结构化消息的模块异常
    pub fn module(kind: impl Into<String>, key: &str, values: Vec<String>) -> Self {
        Self {
            kinds: vec![kind.into()],
            message: key.to_string(),
            module_message: Some(ActionMessage::with_values(key, values)),
            property: None,
        }
    }

    /// 将任意标准错误包装为指定类型名的业务异常
    pub fn from_error<E: Error>(kind: impl Into<String>, error: &E) -> Self {
        Self::new(kind, error.to_string())
    }

    /// 追加一个父类型名，查找异常配置时具体类型优先
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.kinds.push(parent.into());
        self
    }

    /// 指定错误报告中使用的属性名（仅对模块异常有效）
    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    pub fn kind(&self) -> &str {
        &self.kinds[0]
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn module_message(&self) -> Option<&ActionMessage> {
        self.module_message.as_ref()
    }

    pub fn property(&self) -> Option<&str> {
        self.property.as_deref()
    }
}

impl fmt::Display for ActionException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message)
    }
}

impl Error for ActionException {}

/// 配置加载阶段的错误：服务器配置、模块定义与消息表。
#[derive(Debug)]
pub enum ConfigError {
    Io(String, std::io::Error),
    Parse(String, toml::de::Error),
    Validation(Vec<String>),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "IO error on {}: {}", path, e),
            ConfigError::Parse(path, e) => write!(f, "Parse error in {}: {}", path, e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Io(_, e) => Some(e),
            ConfigError::Parse(_, e) => Some(e),
            ConfigError::Validation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(BadRequest("x".into()).status_code(), 400);
        assert_eq!(AccessDenied("/admin".into()).status_code(), 403);
        assert_eq!(NoInputTarget("/save".into()).status_code(), 500);
        assert_eq!(InternalError("boom".into()).status_code(), 500);
        assert_eq!(
            Unhandled(ActionException::new("app.Failure", "boom")).status_code(),
            500
        );
    }

    #[test]
    fn test_kind_chain() {
        let e = ActionException::new("app.NotFound", "missing").extends("app.AppError");
        assert_eq!(e.kind(), "app.NotFound");
        assert_eq!(e.kinds(), &["app.NotFound".to_string(), "app.AppError".to_string()]);
        assert_eq!(e.to_string(), "app.NotFound: missing");
    }

    #[test]
    fn test_module_exception_carries_message() {
        let e = ActionException::module("app.Quota", "error.quota", vec!["10".into()])
            .with_property("upload");
        let message = e.module_message().unwrap();
        assert_eq!(message.key(), "error.quota");
        assert_eq!(message.values(), &["10".to_string()]);
        assert_eq!(e.property(), Some("upload"));
    }

    #[test]
    fn test_config_error_display() {
        let e = ConfigError::Validation(vec!["a".into(), "b".into()]);
        assert_eq!(e.to_string(), "Validation failed: a, b");
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e = ConfigError::Io("config/x.toml".into(), io);
        assert!(e.to_string().contains("config/x.toml"));
        assert!(e.source().is_some());
    }

    #[test]
    fn test_from_error() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let e = ActionException::from_error("io.Error", &io);
        assert_eq!(e.message(), "disk full");
    }
}
