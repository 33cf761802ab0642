// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::sync::Arc;

use crate::{
    model::{ExceptionConfig, ForwardConfig},
    param::Scope,
    util::parse_roles,
};

/// 一个可路由的动作路径的配置。
///
/// 在加入 [`ModuleConfigBuilder`](crate::model::ModuleConfigBuilder) 之前可以任意修改；
/// 冻结后以 `Arc<ActionConfig>` 的形式共享，只能读取。
#[derive(Debug, Clone, PartialEq)]
pub struct ActionConfig {
    path: String,
    action_type: Option<String>,
    name: Option<String>,
    scope: Scope,
    attribute: Option<String>,
    validate: bool,
    input: Option<String>,
    forward: Option<String>,
    include: Option<String>,
    roles: Option<String>,
    role_names: Vec<String>,
    unknown: bool,
    parameter: Option<String>,
    prefix: Option<String>,
    suffix: Option<String>,
    forwards: Vec<ForwardConfig>,
    exceptions: Vec<Arc<ExceptionConfig>>,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            action_type: None,
            name: None,
            scope: Scope::Session,
            attribute: None,
            validate: true,
            input: None,
            forward: None,
            include: None,
            roles: None,
            role_names: vec![],
            unknown: false,
            parameter: None,
            prefix: None,
            suffix: None,
            forwards: vec![],
            exceptions: vec![],
        }
    }
}

impl ActionConfig {
    pub fn new(path: &str) -> Self {
        let mut config = Self::default();
        config.set_path(path);
        config
    }

    /// 设置路径，缺少前导 `/` 时自动补上
    pub fn set_path(&mut self, path: &str) {
        self.path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
    }

    pub fn set_action_type(&mut self, action_type: &str) {
        self.action_type = Some(action_type.to_string());
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = Some(name.to_string());
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    pub fn set_attribute(&mut self, attribute: &str) {
        self.attribute = Some(attribute.to_string());
    }

    pub fn set_validate(&mut self, validate: bool) {
        self.validate = validate;
    }

    pub fn set_input(&mut self, input: &str) {
        self.input = Some(input.to_string());
    }

    pub fn set_forward(&mut self, forward: &str) {
        self.forward = Some(forward.to_string());
    }

    pub fn set_include(&mut self, include: &str) {
        self.include = Some(include.to_string());
    }

    /// 设置逗号分隔的角色列表，同步解析出 `role_names`
    pub fn set_roles(&mut self, roles: &str) {
        self.role_names = parse_roles(roles);
        self.roles = Some(roles.to_string());
    }

    pub fn set_unknown(&mut self, unknown: bool) {
        self.unknown = unknown;
    }

    pub fn set_parameter(&mut self, parameter: &str) {
        self.parameter = Some(parameter.to_string());
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = Some(prefix.to_string());
    }

    pub fn set_suffix(&mut self, suffix: &str) {
        self.suffix = Some(suffix.to_string());
    }

    /// 加入局部转发，同名转发会被替换。没有名字的转发无法被查找，直接忽略。
    pub fn add_forward_config(&mut self, forward: ForwardConfig) {
        let name = match forward.name() {
            Some(name) => name.to_string(),
            None => return,
        };
        self.forwards.retain(|f| f.name() != Some(name.as_str()));
        self.forwards.push(forward);
    }

    pub fn remove_forward_config(&mut self, name: &str) {
        self.forwards.retain(|f| f.name() != Some(name));
    }

    /// 加入局部异常配置，同一异常类型只保留最后一次加入的配置
    pub fn add_exception_config(&mut self, exception: ExceptionConfig) {
        self.exceptions
            .retain(|e| e.exception_type() != exception.exception_type());
        self.exceptions.push(Arc::new(exception));
    }

    pub fn remove_exception_config(&mut self, exception_type: &str) {
        self.exceptions
            .retain(|e| e.exception_type() != exception_type);
    }

    /// 对通配符匹配出的克隆体逐字段做占位符替换。
    ///
    /// 参与替换的字段：name、type、roles、parameter、attribute、forward、include、input
    /// 以及每个局部转发的 path。异常配置保持共享，不做替换。
    pub(crate) fn substitute_with<F: Fn(&str) -> String>(&mut self, substitute: F) {
        let apply = |value: &mut Option<String>| {
            if let Some(v) = value.as_mut() {
                *v = substitute(v);
            }
        };
        apply(&mut self.name);
        apply(&mut self.action_type);
        apply(&mut self.parameter);
        apply(&mut self.attribute);
        apply(&mut self.forward);
        apply(&mut self.include);
        apply(&mut self.input);
        if let Some(roles) = self.roles.take() {
            self.set_roles(&substitute(&roles));
        }
        for forward in self.forwards.iter_mut() {
            let path = substitute(forward.path());
            forward.set_path(&path);
        }
    }
}

impl ActionConfig {
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn action_type(&self) -> Option<&str> {
        self.action_type.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// 表单的存放键，未显式设置时使用表单名
    pub fn attribute(&self) -> Option<&str> {
        self.attribute.as_deref().or(self.name.as_deref())
    }

    pub fn validate(&self) -> bool {
        self.validate
    }

    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    pub fn forward(&self) -> Option<&str> {
        self.forward.as_deref()
    }

    pub fn include(&self) -> Option<&str> {
        self.include.as_deref()
    }

    pub fn roles(&self) -> Option<&str> {
        self.roles.as_deref()
    }

    pub fn role_names(&self) -> &[String] {
        &self.role_names
    }

    pub fn unknown(&self) -> bool {
        self.unknown
    }

    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn find_forward_config(&self, name: &str) -> Option<&ForwardConfig> {
        self.forwards.iter().find(|f| f.name() == Some(name))
    }

    pub fn find_forward_configs(&self) -> &[ForwardConfig] {
        &self.forwards
    }

    pub fn find_exception_config(&self, exception_type: &str) -> Option<&Arc<ExceptionConfig>> {
        self.exceptions
            .iter()
            .find(|e| e.exception_type() == exception_type)
    }

    pub fn find_exception_configs(&self) -> &[Arc<ExceptionConfig>] {
        &self.exceptions
    }

    /// 路径中是否含有未转义的 `*`
    pub fn is_wildcard(&self) -> bool {
        let mut escaped = false;
        for c in self.path.chars() {
            match c {
                '\\' if !escaped => escaped = true,
                '*' if !escaped => return true,
                _ => escaped = false,
            }
        }
        false
    }
}
