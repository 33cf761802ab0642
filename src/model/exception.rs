// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use crate::param::{Scope, DEFAULT_EXCEPTION_HANDLER};

/// 业务异常类型到错误报告与转发目标的映射。
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionConfig {
    exception_type: String,
    key: Option<String>,
    path: Option<String>,
    scope: Scope,
    handler: String,
}

impl ExceptionConfig {
    pub fn new(exception_type: &str, key: &str) -> Self {
        Self {
            exception_type: exception_type.to_string(),
            key: Some(key.to_string()),
            path: None,
            scope: Scope::Request,
            handler: DEFAULT_EXCEPTION_HANDLER.to_string(),
        }
    }

    pub fn set_exception_type(&mut self, exception_type: &str) {
        self.exception_type = exception_type.to_string();
    }

    pub fn set_key(&mut self, key: &str) {
        self.key = Some(key.to_string());
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = Some(path.to_string());
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn set_handler(&mut self, handler: &str) {
        self.handler = handler.to_string();
    }

    pub fn exception_type(&self) -> &str {
        &self.exception_type
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }
}
