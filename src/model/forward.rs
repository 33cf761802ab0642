// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

/// 转发目标：内部转发/包含，或者外部重定向。
///
/// `context_relative` 为真时路径相对于应用根目录解析，否则相对于当前模块前缀。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardConfig {
    name: Option<String>,
    path: String,
    redirect: bool,
    context_relative: bool,
}

impl ForwardConfig {
    pub fn new(name: &str, path: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            path: path.to_string(),
            redirect: false,
            context_relative: false,
        }
    }

    /// 没有名字的一次性转发，例如异常配置中的 `path` 或字面量 `input`
    pub fn unnamed(path: &str) -> Self {
        Self {
            name: None,
            path: path.to_string(),
            redirect: false,
            context_relative: false,
        }
    }

    pub fn with_redirect(mut self, redirect: bool) -> Self {
        self.redirect = redirect;
        self
    }

    pub fn with_context_relative(mut self, context_relative: bool) -> Self {
        self.context_relative = context_relative;
        self
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn set_path(&mut self, path: &str) {
        self.path = path.to_string();
    }

    pub fn set_redirect(&mut self, redirect: bool) {
        self.redirect = redirect;
    }

    pub fn set_context_relative(&mut self, context_relative: bool) {
        self.context_relative = context_relative;
    }
}

impl ForwardConfig {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn redirect(&self) -> bool {
        self.redirect
    }

    pub fn context_relative(&self) -> bool {
        self.context_relative
    }
}
