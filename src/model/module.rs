// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use log::debug;

use crate::{
    matcher::ActionMatcher,
    model::{ActionConfig, ControllerConfig, ExceptionConfig, FormBeanConfig, ForwardConfig},
};

/// 一个消息资源包的声明
#[derive(Debug, Clone, PartialEq)]
pub struct MessageResourcesConfig {
    key: String,
    parameter: String,
    return_null: bool,
}

impl MessageResourcesConfig {
    pub fn new(key: &str, parameter: &str, return_null: bool) -> Self {
        Self {
            key: key.to_string(),
            parameter: parameter.to_string(),
            return_null,
        }
    }

    /// 资源包在模块内的键，空字符串表示默认资源包
    pub fn key(&self) -> &str {
        &self.key
    }

    /// 资源包来源（消息表文件路径）
    pub fn parameter(&self) -> &str {
        &self.parameter
    }

    pub fn return_null(&self) -> bool {
        self.return_null
    }
}

/// 数据源的声明。连接工厂不属于本框架，这里只保存配置供插件与处理器读取。
#[derive(Debug, Clone, PartialEq)]
pub struct DataSourceConfig {
    key: String,
    source_type: String,
    properties: BTreeMap<String, String>,
}

impl DataSourceConfig {
    pub fn new(key: &str, source_type: &str, properties: BTreeMap<String, String>) -> Self {
        Self {
            key: key.to_string(),
            source_type: source_type.to_string(),
            properties,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn source_type(&self) -> &str {
        &self.source_type
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// 插件的声明，`plug_in_type` 对应注册表中的插件工厂
#[derive(Debug, Clone, PartialEq)]
pub struct PlugInConfig {
    plug_in_type: String,
    properties: BTreeMap<String, String>,
}

impl PlugInConfig {
    pub fn new(plug_in_type: &str, properties: BTreeMap<String, String>) -> Self {
        Self {
            plug_in_type: plug_in_type.to_string(),
            properties,
        }
    }

    pub fn plug_in_type(&self) -> &str {
        &self.plug_in_type
    }

    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }
}

/// 模块配置的可变构建阶段。
///
/// 配置加载阶段在这里逐项加入动作、表单、全局转发与全局异常，
/// 最后调用 [`ModuleConfigBuilder::freeze`] 得到只读的 [`ModuleConfig`]。
#[derive(Debug, Clone, Default)]
pub struct ModuleConfigBuilder {
    prefix: String,
    controller: ControllerConfig,
    actions: Vec<Arc<ActionConfig>>,
    form_beans: Vec<Arc<FormBeanConfig>>,
    forwards: Vec<ForwardConfig>,
    exceptions: Vec<Arc<ExceptionConfig>>,
    message_resources: Vec<MessageResourcesConfig>,
    data_sources: Vec<DataSourceConfig>,
    plug_ins: Vec<PlugInConfig>,
}

impl ModuleConfigBuilder {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            ..Default::default()
        }
    }

    pub fn set_prefix(&mut self, prefix: &str) {
        self.prefix = normalize_prefix(prefix);
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn set_controller_config(&mut self, controller: ControllerConfig) {
        self.controller = controller;
    }

    pub fn controller_config(&self) -> &ControllerConfig {
        &self.controller
    }

    /// 加入动作配置，相同路径的旧配置被替换但保留原来的位置
    pub fn add_action_config(&mut self, action: ActionConfig) {
        let action = Arc::new(action);
        match self.actions.iter().position(|a| a.path() == action.path()) {
            Some(index) => self.actions[index] = action,
            None => self.actions.push(action),
        }
    }

    pub fn remove_action_config(&mut self, path: &str) {
        self.actions.retain(|a| a.path() != path);
    }

    pub fn find_action_config(&self, path: &str) -> Option<&ActionConfig> {
        self.actions.iter().find(|a| a.path() == path).map(|a| a.as_ref())
    }

    pub fn add_form_bean_config(&mut self, form_bean: FormBeanConfig) {
        self.form_beans.retain(|f| f.name() != form_bean.name());
        self.form_beans.push(Arc::new(form_bean));
    }

    pub fn find_form_bean_config(&self, name: &str) -> Option<&FormBeanConfig> {
        self.form_beans.iter().find(|f| f.name() == name).map(|f| f.as_ref())
    }

    /// 加入全局转发；没有名字的转发无法被查找，直接忽略
    pub fn add_forward_config(&mut self, forward: ForwardConfig) {
        let name = match forward.name() {
            Some(name) => name.to_string(),
            None => return,
        };
        self.forwards.retain(|f| f.name() != Some(name.as_str()));
        self.forwards.push(forward);
    }

    pub fn find_forward_config(&self, name: &str) -> Option<&ForwardConfig> {
        self.forwards.iter().find(|f| f.name() == Some(name))
    }

    pub fn add_exception_config(&mut self, exception: ExceptionConfig) {
        self.exceptions
            .retain(|e| e.exception_type() != exception.exception_type());
        self.exceptions.push(Arc::new(exception));
    }

    pub fn find_exception_config(&self, exception_type: &str) -> Option<&ExceptionConfig> {
        self.exceptions
            .iter()
            .find(|e| e.exception_type() == exception_type)
            .map(|e| e.as_ref())
    }

    pub fn add_message_resources_config(&mut self, resources: MessageResourcesConfig) {
        self.message_resources.retain(|r| r.key() != resources.key());
        self.message_resources.push(resources);
    }

    pub fn find_message_resources_config(&self, key: &str) -> Option<&MessageResourcesConfig> {
        self.message_resources.iter().find(|r| r.key() == key)
    }

    pub fn add_data_source_config(&mut self, data_source: DataSourceConfig) {
        self.data_sources.retain(|d| d.key() != data_source.key());
        self.data_sources.push(data_source);
    }

    pub fn find_data_source_config(&self, key: &str) -> Option<&DataSourceConfig> {
        self.data_sources.iter().find(|d| d.key() == key)
    }

    pub fn add_plug_in_config(&mut self, plug_in: PlugInConfig) {
        self.plug_ins.push(plug_in);
    }

    pub fn plug_in_configs(&self) -> &[PlugInConfig] {
        &self.plug_ins
    }

    /// 冻结整个模块配置。
    ///
    /// 动作、表单与异常配置转移为共享只读的 `Arc`，同时根据最终的动作集合编译通配符匹配器。
    pub fn freeze(self) -> ModuleConfig {
        let matcher = ActionMatcher::new(&self.actions);
        debug!(
            "模块'{}'已冻结：{}个动作，其中{}个通配符动作",
            self.prefix,
            self.actions.len(),
            matcher.len()
        );
        let action_index = self
            .actions
            .iter()
            .enumerate()
            .map(|(index, a)| (a.path().to_string(), index))
            .collect();
        ModuleConfig {
            prefix: self.prefix,
            controller: self.controller,
            actions: self.actions,
            action_index,
            form_beans: self.form_beans,
            forwards: self.forwards,
            exceptions: self.exceptions,
            message_resources: self.message_resources,
            data_sources: self.data_sources,
            plug_ins: self.plug_ins,
            matcher,
        }
    }
}

/// 冻结后的模块配置：一个模块的静态路由图。
///
/// 该类型没有任何修改方法，可以通过 `Arc` 在并发请求之间无锁共享。
/// 冻结之后再修改配置在编译期就会被拒绝：
///
/// ```compile_fail
/// use actionweb::model::{ActionConfig, ModuleConfigBuilder};
///
/// let config = ModuleConfigBuilder::new("").freeze();
/// config.add_action_config(ActionConfig::new("/late"));
/// ```
#[derive(Debug)]
pub struct ModuleConfig {
    prefix: String,
    controller: ControllerConfig,
    actions: Vec<Arc<ActionConfig>>,
    action_index: HashMap<String, usize>,
    form_beans: Vec<Arc<FormBeanConfig>>,
    forwards: Vec<ForwardConfig>,
    exceptions: Vec<Arc<ExceptionConfig>>,
    message_resources: Vec<MessageResourcesConfig>,
    data_sources: Vec<DataSourceConfig>,
    plug_ins: Vec<PlugInConfig>,
    matcher: ActionMatcher,
}

impl ModuleConfig {
    /// 不含斜杠的模块前缀，默认模块为空字符串
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// 模块在 URL 中的路径前缀：`/admin`，默认模块为空字符串
    pub fn module_path(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("/{}", self.prefix)
        }
    }

    pub fn controller_config(&self) -> &ControllerConfig {
        &self.controller
    }

    pub fn find_action_config(&self, path: &str) -> Option<&Arc<ActionConfig>> {
        self.action_index.get(path).map(|&index| &self.actions[index])
    }

    pub fn find_action_configs(&self) -> &[Arc<ActionConfig>] {
        &self.actions
    }

    /// 按声明顺序第一个标记为 `unknown` 的动作
    pub fn find_unknown_action_config(&self) -> Option<&Arc<ActionConfig>> {
        self.actions.iter().find(|a| a.unknown())
    }

    pub fn matcher(&self) -> &ActionMatcher {
        &self.matcher
    }

    pub fn find_form_bean_config(&self, name: &str) -> Option<&Arc<FormBeanConfig>> {
        self.form_beans.iter().find(|f| f.name() == name)
    }

    pub fn find_form_bean_configs(&self) -> &[Arc<FormBeanConfig>] {
        &self.form_beans
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

    pub fn find_message_resources_config(&self, key: &str) -> Option<&MessageResourcesConfig> {
        self.message_resources.iter().find(|r| r.key() == key)
    }

    pub fn find_message_resources_configs(&self) -> &[MessageResourcesConfig] {
        &self.message_resources
    }

    pub fn find_data_source_config(&self, key: &str) -> Option<&DataSourceConfig> {
        self.data_sources.iter().find(|d| d.key() == key)
    }

    pub fn find_data_source_configs(&self) -> &[DataSourceConfig] {
        &self.data_sources
    }

    pub fn plug_in_configs(&self) -> &[PlugInConfig] {
        &self.plug_ins
    }

    /// 回到构建阶段。已冻结的嵌套配置以 `Arc` 形式原样共享，再次冻结不会改变它们。
    pub fn to_builder(&self) -> ModuleConfigBuilder {
        ModuleConfigBuilder {
            prefix: self.prefix.clone(),
            controller: self.controller.clone(),
            actions: self.actions.clone(),
            form_beans: self.form_beans.clone(),
            forwards: self.forwards.clone(),
            exceptions: self.exceptions.clone(),
            message_resources: self.message_resources.clone(),
            data_sources: self.data_sources.clone(),
            plug_ins: self.plug_ins.clone(),
        }
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix.trim_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::Scope;

    fn builder() -> ModuleConfigBuilder {
        let mut builder = ModuleConfigBuilder::new("/admin/");
        let mut save = ActionConfig::new("/save");
        save.set_name("userForm");
        builder.add_action_config(save);
        builder.add_action_config(ActionConfig::new("/user/*/edit"));
        builder.add_form_bean_config(FormBeanConfig::new("userForm", "dyna"));
        builder.add_forward_config(ForwardConfig::new("home", "/index.html"));
        builder.add_exception_config(ExceptionConfig::new("app.Failure", "error.failure"));
        builder
    }

    #[test]
    fn test_mutations_before_freeze_are_visible() {
        let mut builder = builder();
        assert_eq!(builder.prefix(), "admin");
        assert!(builder.find_action_config("/save").is_some());
        assert!(builder.find_form_bean_config("userForm").is_some());
        assert_eq!(builder.find_forward_config("home").unwrap().path(), "/index.html");
        assert!(builder.find_exception_config("app.Failure").is_some());

        let mut controller = ControllerConfig::default();
        controller.set_nocache(true);
        builder.set_controller_config(controller);
        assert!(builder.controller_config().nocache());

        builder.add_message_resources_config(MessageResourcesConfig::new("", "m.toml", false));
        assert!(builder.find_message_resources_config("").is_some());
        builder.add_data_source_config(DataSourceConfig::new("db", "pool", BTreeMap::new()));
        assert_eq!(builder.find_data_source_config("db").unwrap().source_type(), "pool");
        builder.add_plug_in_config(PlugInConfig::new("audit", BTreeMap::new()));
        assert_eq!(builder.plug_in_configs().len(), 1);

        builder.remove_action_config("/save");
        assert!(builder.find_action_config("/save").is_none());
    }

    #[test]
    fn test_freeze_exposes_configuration() {
        let config = builder().freeze();
        assert_eq!(config.prefix(), "admin");
        assert_eq!(config.module_path(), "/admin");
        assert_eq!(config.find_action_config("/save").unwrap().scope(), Scope::Session);
        assert_eq!(config.find_action_configs().len(), 2);
        assert_eq!(config.matcher().len(), 1);
        assert!(config.find_unknown_action_config().is_none());
        assert!(config.find_form_bean_config("userForm").is_some());
        assert!(config.find_forward_config("missing").is_none());
    }

    #[test]
    fn test_replacing_action_keeps_position() {
        let mut builder = builder();
        let mut replacement = ActionConfig::new("/save");
        replacement.set_validate(false);
        builder.add_action_config(replacement);
        let config = builder.freeze();
        assert_eq!(config.find_action_configs()[0].path(), "/save");
        assert!(!config.find_action_config("/save").unwrap().validate());
    }

    #[test]
    fn test_first_unknown_wins() {
        let mut builder = ModuleConfigBuilder::new("");
        let mut first = ActionConfig::new("/first");
        first.set_unknown(true);
        let mut second = ActionConfig::new("/second");
        second.set_unknown(true);
        builder.add_action_config(first);
        builder.add_action_config(second);
        let config = builder.freeze();
        assert_eq!(config.find_unknown_action_config().unwrap().path(), "/first");
        assert_eq!(config.module_path(), "");
    }

    #[test]
    fn test_freezing_twice_is_idempotent() {
        let config = builder().freeze();
        let again = config.to_builder().freeze();

        assert_eq!(config.prefix(), again.prefix());
        assert_eq!(config.find_action_configs().len(), again.find_action_configs().len());
        for (a, b) in config
            .find_action_configs()
            .iter()
            .zip(again.find_action_configs())
        {
            assert!(Arc::ptr_eq(a, b));
        }
        assert!(Arc::ptr_eq(
            config.find_exception_config("app.Failure").unwrap(),
            again.find_exception_config("app.Failure").unwrap()
        ));
        assert_eq!(again.matcher().len(), 1);
    }
}
