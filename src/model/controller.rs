// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

/// 模块级的控制器行为开关。
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    /// 默认响应内容类型，转发目标可以覆盖
    content_type: Option<String>,
    /// 为真时 `input` 被当作转发名查找，否则当作模块内的字面路径
    input_forward: bool,
    /// 是否把请求协商出的区域设置保存到会话
    locale: bool,
    /// 请求没有携带 `Accept-Language` 时使用的区域设置
    default_locale: Option<String>,
    /// 是否输出禁止缓存的响应头
    nocache: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            content_type: Some("text/html".to_string()),
            input_forward: false,
            locale: true,
            default_locale: None,
            nocache: false,
        }
    }
}

impl ControllerConfig {
    pub fn set_content_type(&mut self, content_type: Option<&str>) {
        self.content_type = content_type.map(str::to_string);
    }

    pub fn set_input_forward(&mut self, input_forward: bool) {
        self.input_forward = input_forward;
    }

    pub fn set_locale(&mut self, locale: bool) {
        self.locale = locale;
    }

    pub fn set_default_locale(&mut self, default_locale: Option<&str>) {
        self.default_locale = default_locale.map(str::to_string);
    }

    pub fn set_nocache(&mut self, nocache: bool) {
        self.nocache = nocache;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn input_forward(&self) -> bool {
        self.input_forward
    }

    pub fn locale(&self) -> bool {
        self.locale
    }

    pub fn default_locale(&self) -> Option<&str> {
        self.default_locale.as_deref()
    }

    pub fn nocache(&self) -> bool {
        self.nocache
    }
}
