// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 框架参数与常量模块
//!
//! 该模块定义了 `actionweb` 在请求分发过程中依赖的常量和基础枚举，包括：
//! - 请求/会话属性键（模块配置、映射、错误报告、最近异常等）。
//! - 常见的 HTTP 状态码及其原因短语（Reason Phrase）。
//! - 静态资源使用的 MIME 类型映射表。
//! - HTTP 方法、版本与属性作用域的强类型枚举。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

/// 服务器名称标识，用于 HTTP 响应头的 `Server` 字段
pub const SERVER_NAME: &str = "actionweb";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 会话 Cookie 的名称
pub const SESSION_COOKIE: &str = "ACTIONWEB_SESSION";

/// 当前请求所选模块的 `ModuleConfig`
pub const MODULE_KEY: &str = "actionweb.action.MODULE";

/// 当前请求解析得到的 `ActionConfig`
pub const MAPPING_KEY: &str = "actionweb.action.MAPPING";

/// 当前模块的默认消息资源
pub const MESSAGES_KEY: &str = "actionweb.action.MESSAGE";

/// 校验失败或异常处理产生的错误报告
pub const ERROR_KEY: &str = "actionweb.action.ERROR";

/// 最近一次被异常处理器接管的业务异常，仅供诊断展示
pub const EXCEPTION_KEY: &str = "actionweb.action.EXCEPTION";

/// 请求被取消时设置的标记属性
pub const CANCEL_KEY: &str = "actionweb.action.CANCEL";

/// 会话中保存用户区域设置的键
pub const LOCALE_KEY: &str = "actionweb.action.LOCALE";

/// 表单中"取消"按钮对应的请求参数名
pub const CANCEL_PARAMETER: &str = "action.cancel";

/// 图片形式的取消按钮会以 `.x` / `.y` 坐标的形式提交
pub const CANCEL_PARAMETER_X: &str = "action.cancel.x";

/// 默认异常处理器在注册表中的标识
pub const DEFAULT_EXCEPTION_HANDLER: &str = "default";

/// 内部转发的默认最大跳数
pub const DEFAULT_MAX_FORWARD_DEPTH: usize = 16;

/// 内部转发跳数的上限。每一跳都会在当前线程上递归执行一次流水线
pub const MAX_FORWARD_DEPTH_LIMIT: usize = 64;

lazy_static! {
    /// 框架内部使用的请求属性。
    ///
    /// 内部转发（forward/include）构造子请求时，这些属性不会被带过转发边界，
    /// 子请求会基于自己的路径重新选择模块与映射。
    pub static ref INTERNAL_ATTRIBUTES: Vec<&'static str> = {
        vec![MODULE_KEY, MAPPING_KEY, MESSAGES_KEY, CANCEL_KEY]
    };
}

lazy_static! {
    /// HTTP 状态码与其对应的标准原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        // 1xx: 信息响应 (Informational)
        map.insert(100, "Continue");
        map.insert(101, "Switching Protocols");

        // 2xx: 成功响应 (Successful)
        map.insert(200, "OK");
        map.insert(201, "Created");
        map.insert(202, "Accepted");
        map.insert(204, "No Content");

        // 3xx: 重定向 (Redirection)
        map.insert(301, "Moved Permanently");
        map.insert(302, "Found");
        map.insert(303, "See Other");
        map.insert(304, "Not Modified");
        map.insert(307, "Temporary Redirect");
        map.insert(308, "Permanent Redirect");

        // 4xx: 客户端错误 (Client Error)
        map.insert(400, "Bad Request");
        map.insert(401, "Unauthorized");
        map.insert(403, "Forbidden");
        map.insert(404, "Not Found");
        map.insert(405, "Method Not Allowed");
        map.insert(406, "Not Acceptable");
        map.insert(408, "Request Timeout");
        map.insert(409, "Conflict");
        map.insert(410, "Gone");
        map.insert(413, "Content Too Large");
        map.insert(414, "URI Too Long");
        map.insert(415, "Unsupported Media Type");
        map.insert(422, "Unprocessable Content");

        // 5xx: 服务端错误 (Server Error)
        map.insert(500, "Internal Server Error");
        map.insert(501, "Not Implemented");
        map.insert(502, "Bad Gateway");
        map.insert(503, "Service Unavailable");
        map.insert(504, "Gateway Timeout");
        map.insert(505, "HTTP Version Not Supported");
        map
    };
}

lazy_static! {
    /// 文件后缀名到 MIME 类型（Media Type）的映射表。
    ///
    /// 仅用于内部转发到静态资源时设置 `Content-Type`。
    pub static ref MIME_TYPES: HashMap<&'static str, &'static str> = {
        let mut map = HashMap::new();
        map.insert("css", "text/css;charset=utf-8");
        map.insert("csv", "text/csv");
        map.insert("gif", "image/gif");
        map.insert("htm", "text/html;charset=utf-8");
        map.insert("html", "text/html;charset=utf-8");
        map.insert("ico", "image/x-icon");
        map.insert("jpg", "image/jpeg");
        map.insert("jpeg", "image/jpeg");
        map.insert("js", "text/javascript;charset=utf-8");
        map.insert("json", "application/json");
        map.insert("pdf", "application/pdf");
        map.insert("png", "image/png");
        map.insert("svg", "image/svg+xml");
        map.insert("txt", "text/plain;charset=utf-8");
        map.insert("webp", "image/webp");
        map.insert("xhtml", "application/xhtml+xml");
        map.insert("xml", "text/xml");
        // 兜底类型（通常用于无法识别后缀的二进制流）
        map.insert("_", "application/octet-stream");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpVersion {
    /// HTTP/1.1 版本
    V1_1,
}

/// 标准 HTTP 请求方法
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HttpRequestMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Delete,
}

/// 表单与错误报告的存放作用域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 仅在当前请求（及其内部转发）中可见
    Request,
    /// 保存在用户会话中，跨请求可见
    Session,
}

impl Scope {
    /// 从配置文件中的字符串解析作用域。
    ///
    /// 只有大小写不敏感的 `"request"` 会被识别为请求作用域，其余取值一律视为会话作用域。
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("request") {
            Scope::Request
        } else {
            Scope::Session
        }
    }
}

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 HTTP 报文中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_1 => write!(f, "1.1"),
        }
    }
}

impl fmt::Display for HttpRequestMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpRequestMethod::Get => write!(f, "GET"),
            HttpRequestMethod::Head => write!(f, "HEAD"),
            HttpRequestMethod::Options => write!(f, "OPTIONS"),
            HttpRequestMethod::Post => write!(f, "POST"),
            HttpRequestMethod::Put => write!(f, "PUT"),
            HttpRequestMethod::Delete => write!(f, "DELETE"),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Scope::Request => write!(f, "request"),
            Scope::Session => write!(f, "session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_parse() {
        assert_eq!(Scope::parse("request"), Scope::Request);
        assert_eq!(Scope::parse(" REQUEST "), Scope::Request);
        assert_eq!(Scope::parse("session"), Scope::Session);
        assert_eq!(Scope::parse("anything"), Scope::Session);
    }

    #[test]
    fn test_internal_attributes_exclude_error_report() {
        assert!(INTERNAL_ATTRIBUTES.contains(&MAPPING_KEY));
        assert!(!INTERNAL_ATTRIBUTES.contains(&ERROR_KEY));
        assert!(!INTERNAL_ATTRIBUTES.contains(&EXCEPTION_KEY));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(STATUS_CODES.get(&403), Some(&"Forbidden"));
        assert_eq!(STATUS_CODES.get(&302), Some(&"Found"));
    }
}
