// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 响应视图模块
//!
//! 流水线各阶段与动作通过 [`Response`] 写入状态码、响应头与正文；
//! 内部转发的子响应在返回后被合并回外层响应。
//! 最终由二进制入口调用 [`Response::as_bytes`] 序列化为 HTTP/1.1 报文。

use bytes::BytesMut;
use chrono::prelude::*;
use log::error;

use crate::{
    param::*,
    util::{format_http_date, HtmlBuilder},
};

#[derive(Debug, Clone)]
pub struct Response {
    version: HttpVersion,
    status_code: u16,
    information: String,
    content_type: Option<String>,
    headers: Vec<(String, String)>,
    date: DateTime<Utc>,
    server_name: String,
    content: BytesMut,
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    pub fn new() -> Self {
        Self {
            version: HttpVersion::V1_1,
            status_code: 200,
            information: "OK".to_string(),
            content_type: None,
            headers: vec![],
            date: Utc::now(),
            server_name: SERVER_NAME.to_string(),
            content: BytesMut::new(),
        }
    }

    pub fn set_code(&mut self, code: u16) -> &mut Self {
        self.status_code = code;
        self.information = match STATUS_CODES.get(&code) {
            Some(&reason) => reason.to_string(),
            None => {
                error!("非法的状态码：{}。这条错误说明代码编写出现了错误。", code);
                "Unknown".to_string()
            }
        };
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Self {
        self.content_type = Some(content_type.to_string());
        self
    }

    /// 设置响应头，同名（大小写不敏感）的旧值会被替换
    pub fn set_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn write(&mut self, content: &[u8]) -> &mut Self {
        self.content.extend_from_slice(content);
        self
    }

    pub fn set_body(&mut self, content: &[u8]) -> &mut Self {
        self.content.clear();
        self.content.extend_from_slice(content);
        self
    }

    /// 发出 302 重定向，清空已写入的正文
    pub fn redirect(&mut self, location: &str) -> &mut Self {
        self.set_code(302);
        self.set_header("Location", location);
        self.content.clear();
        self
    }

    /// 以通用错误页结束响应；`note` 为空时使用状态码的原因短语
    pub fn send_error(&mut self, code: u16, note: Option<&str>) -> &mut Self {
        let code = if STATUS_CODES.contains_key(&code) {
            code
        } else {
            500
        };
        self.set_code(code);
        self.set_content_type("text/html;charset=utf-8");
        let page = HtmlBuilder::from_status_code(code, note).build();
        self.set_body(page.as_bytes())
    }

    /// 以转发目标产生的子响应替换当前响应的状态、响应头与正文
    pub fn absorb(&mut self, sub: Response) {
        self.status_code = sub.status_code;
        self.information = sub.information;
        if sub.content_type.is_some() {
            self.content_type = sub.content_type;
        }
        for (name, value) in sub.headers {
            self.set_header(&name, &value);
        }
        self.content = sub.content;
    }

    /// 包含（include）只追加正文，状态与响应头保持不变
    pub fn append(&mut self, sub: &Response) {
        self.content.extend_from_slice(&sub.content);
    }

    pub fn as_bytes(&self) -> Vec<u8> {
        let version: &str = match self.version {
            HttpVersion::V1_1 => "HTTP/1.1",
        };
        let mut header = [
            version,
            " ",
            &self.status_code.to_string(),
            " ",
            &self.information,
            CRLF,
            match &self.content_type {
                Some(t) => ["Content-Type: ", t, CRLF].concat(),
                None => "".to_string(),
            }
            .as_str(),
            "Content-Length: ",
            &self.content.len().to_string(),
            CRLF,
            "Date: ",
            &format_http_date(&self.date),
            CRLF,
            "Server: ",
            &self.server_name,
            CRLF,
        ]
        .concat();
        for (name, value) in &self.headers {
            header.push_str(&[name.as_str(), ": ", value.as_str(), CRLF].concat());
        }
        header.push_str(CRLF);
        [header.as_bytes(), &self.content].concat()
    }
}

impl Response {
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn information(&self) -> &str {
        &self.information
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.content
    }
}
