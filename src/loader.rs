// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模块定义加载
//!
//! 模块定义以 TOML 文件描述，一个模块可以由多个文件组成，后读入的文件可以替换先前的同名条目：
//!
//! ```toml
//! [controller]
//! nocache = "true"
//! input_forward = "no"
//!
//! [[form_beans]]
//! name = "userForm"
//! type = "dyna"
//! dynamic = true
//! properties = [{ name = "name" }, { name = "tags", type = "string[]" }]
//!
//! [[global_forwards]]
//! name = "home"
//! path = "/index.html"
//!
//! [[actions]]
//! path = "/user/save"
//! type = "app.SaveUser"
//! name = "userForm"
//! input = "/user/form.html"
//! forwards = [{ name = "success", path = "/user/done.html", redirect = "yes" }]
//! ```
//!
//! 布尔字段既可以写成 TOML 布尔值，也可以写成字符串；字符串形式中只有大小写不敏感的
//! `"false"` 与 `"no"` 为假。

use std::collections::BTreeMap;
use std::fs;

use log::{debug, info, warn};
use serde_derive::Deserialize;

use crate::{
    exception::ConfigError,
    messages::PropertyMessageResources,
    model::{
        ActionConfig, ControllerConfig, DataSourceConfig, ExceptionConfig, FormBeanConfig,
        FormPropertyConfig, ForwardConfig, MessageResourcesConfig, ModuleConfig,
        ModuleConfigBuilder, PlugInConfig,
    },
    param::{Scope, MESSAGES_KEY},
    util::parse_bool,
};

/// 配置文件中的布尔值
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    pub fn value(&self) -> bool {
        match self {
            Flag::Bool(b) => *b,
            Flag::Text(t) => parse_bool(t),
        }
    }
}

fn flag(value: &Option<Flag>, default: bool) -> bool {
    value.as_ref().map_or(default, Flag::value)
}

#[derive(Deserialize, Debug, Default)]
struct ModuleDefinition {
    controller: Option<ControllerDefinition>,
    #[serde(default)]
    message_resources: Vec<MessageResourcesDefinition>,
    #[serde(default)]
    data_sources: Vec<DataSourceDefinition>,
    #[serde(default)]
    form_beans: Vec<FormBeanDefinition>,
    #[serde(default)]
    global_forwards: Vec<ForwardDefinition>,
    #[serde(default)]
    global_exceptions: Vec<ExceptionDefinition>,
    #[serde(default)]
    actions: Vec<ActionDefinition>,
    #[serde(default)]
    plug_ins: Vec<PlugInDefinition>,
}

#[derive(Deserialize, Debug)]
struct ControllerDefinition {
    content_type: Option<String>,
    input_forward: Option<Flag>,
    locale: Option<Flag>,
    default_locale: Option<String>,
    nocache: Option<Flag>,
}

#[derive(Deserialize, Debug)]
struct MessageResourcesDefinition {
    key: Option<String>,
    parameter: String,
    null: Option<Flag>,
}

#[derive(Deserialize, Debug)]
struct DataSourceDefinition {
    key: String,
    #[serde(rename = "type")]
    source_type: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

#[derive(Deserialize, Debug)]
struct FormBeanDefinition {
    name: String,
    #[serde(rename = "type")]
    form_type: String,
    dynamic: Option<Flag>,
    #[serde(default)]
    properties: Vec<FormPropertyDefinition>,
}

#[derive(Deserialize, Debug)]
struct FormPropertyDefinition {
    name: String,
    #[serde(rename = "type")]
    property_type: Option<String>,
    initial: Option<String>,
    size: Option<usize>,
}

#[derive(Deserialize, Debug)]
struct ForwardDefinition {
    name: Option<String>,
    path: String,
    redirect: Option<Flag>,
    context_relative: Option<Flag>,
}

#[derive(Deserialize, Debug)]
struct ExceptionDefinition {
    #[serde(rename = "type")]
    exception_type: String,
    key: String,
    path: Option<String>,
    scope: Option<String>,
    handler: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ActionDefinition {
    path: String,
    #[serde(rename = "type")]
    action_type: Option<String>,
    name: Option<String>,
    scope: Option<String>,
    attribute: Option<String>,
    validate: Option<Flag>,
    input: Option<String>,
    forward: Option<String>,
    include: Option<String>,
    roles: Option<String>,
    unknown: Option<Flag>,
    parameter: Option<String>,
    prefix: Option<String>,
    suffix: Option<String>,
    #[serde(default)]
    forwards: Vec<ForwardDefinition>,
    #[serde(default)]
    exceptions: Vec<ExceptionDefinition>,
}

#[derive(Deserialize, Debug)]
struct PlugInDefinition {
    #[serde(rename = "type")]
    plug_in_type: String,
    #[serde(default)]
    properties: BTreeMap<String, String>,
}

/// 读取一个模块的全部定义文件并冻结。
pub fn load_module(prefix: &str, sources: &[String]) -> Result<ModuleConfig, ConfigError> {
    let mut builder = ModuleConfigBuilder::new(prefix);
    for source in sources {
        let content =
            fs::read_to_string(source).map_err(|e| ConfigError::Io(source.to_string(), e))?;
        apply_definition(&mut builder, &content).map_err(|e| with_source(e, source))?;
        debug!("模块'{}'读入定义文件{}", prefix, source);
    }
    let module = builder.freeze();
    info!(
        "模块'{}'加载完成：{}个动作，{}个表单",
        module.prefix(),
        module.find_action_configs().len(),
        module.find_form_bean_configs().len()
    );
    Ok(module)
}

/// 把一份定义文本合并进构建器，供多文件模块与测试使用
pub fn apply_definition(builder: &mut ModuleConfigBuilder, content: &str) -> Result<(), ConfigError> {
    let definition: ModuleDefinition =
        toml::from_str(content).map_err(|e| ConfigError::Parse(String::new(), e))?;
    validate(&definition)?;

    if let Some(controller) = definition.controller {
        builder.set_controller_config(controller_config(controller));
    }
    for resources in definition.message_resources {
        let key = resources.key.unwrap_or_else(|| MESSAGES_KEY.to_string());
        builder.add_message_resources_config(MessageResourcesConfig::new(
            &key,
            &resources.parameter,
            flag(&resources.null, true),
        ));
    }
    for data_source in definition.data_sources {
        builder.add_data_source_config(DataSourceConfig::new(
            &data_source.key,
            &data_source.source_type,
            data_source.properties,
        ));
    }
    for bean in definition.form_beans {
        builder.add_form_bean_config(form_bean_config(bean));
    }
    for forward in definition.global_forwards {
        builder.add_forward_config(forward_config(forward));
    }
    for exception in definition.global_exceptions {
        builder.add_exception_config(exception_config(exception));
    }
    for action in definition.actions {
        if action.name.as_deref().map_or(false, |name| builder.find_form_bean_config(name).is_none()) {
            warn!("动作{}引用的表单{:?}尚未声明", action.path, action.name);
        }
        builder.add_action_config(action_config(action));
    }
    for plug_in in definition.plug_ins {
        builder.add_plug_in_config(PlugInConfig::new(&plug_in.plug_in_type, plug_in.properties));
    }
    Ok(())
}

/// 按消息资源配置读取 TOML 消息表
pub fn load_message_resources(
    config: &MessageResourcesConfig,
) -> Result<PropertyMessageResources, ConfigError> {
    let path = config.parameter();
    let content = fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_string(), e))?;
    PropertyMessageResources::from_toml(&content, config.return_null())
        .map_err(|e| ConfigError::Parse(path.to_string(), e))
}

/// 读取模块的默认消息资源（键为 `MESSAGES_KEY` 的那一份），模块没有声明时返回 `None`
pub fn load_default_resources(
    module: &ModuleConfig,
) -> Result<Option<PropertyMessageResources>, ConfigError> {
    match module.find_message_resources_config(MESSAGES_KEY) {
        Some(config) => load_message_resources(config).map(Some),
        None => Ok(None),
    }
}

fn with_source(error: ConfigError, source: &str) -> ConfigError {
    match error {
        ConfigError::Parse(_, e) => ConfigError::Parse(source.to_string(), e),
        ConfigError::Validation(errors) => ConfigError::Validation(
            errors
                .into_iter()
                .map(|e| format!("{}: {}", source, e))
                .collect(),
        ),
        other => other,
    }
}

fn validate(definition: &ModuleDefinition) -> Result<(), ConfigError> {
    let mut errors = vec![];
    for action in &definition.actions {
        if action.path.trim().is_empty() {
            errors.push("action path must not be empty".to_string());
        }
        if action.forward.is_some() && action.include.is_some() {
            warn!("动作{}同时声明了forward与include，include将被忽略", action.path);
        }
        for forward in &action.forwards {
            if forward.name.is_none() {
                errors.push(format!("forward {} has no name", forward.path));
            }
        }
        for exception in &action.exceptions {
            if exception.exception_type.trim().is_empty() {
                errors.push(format!("action {} has an exception without type", action.path));
            }
        }
    }
    for forward in &definition.global_forwards {
        if forward.name.is_none() {
            errors.push(format!("forward {} has no name", forward.path));
        }
    }
    for exception in &definition.global_exceptions {
        if exception.exception_type.trim().is_empty() {
            errors.push("global exception without type".to_string());
        }
    }
    for bean in &definition.form_beans {
        if bean.name.trim().is_empty() {
            errors.push("form bean name must not be empty".to_string());
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Validation(errors))
    }
}

fn controller_config(definition: ControllerDefinition) -> ControllerConfig {
    let mut controller = ControllerConfig::default();
    if let Some(content_type) = definition.content_type.as_deref() {
        controller.set_content_type(Some(content_type).filter(|t| !t.is_empty()));
    }
    controller.set_input_forward(flag(&definition.input_forward, controller.input_forward()));
    controller.set_locale(flag(&definition.locale, controller.locale()));
    if let Some(default_locale) = definition.default_locale.as_deref() {
        controller.set_default_locale(Some(default_locale).filter(|l| !l.trim().is_empty()));
    }
    controller.set_nocache(flag(&definition.nocache, controller.nocache()));
    controller
}

fn form_bean_config(definition: FormBeanDefinition) -> FormBeanConfig {
    let mut bean = FormBeanConfig::new(&definition.name, &definition.form_type);
    bean.set_dynamic(flag(&definition.dynamic, false));
    for property in definition.properties {
        let mut config = FormPropertyConfig::new(&property.name);
        if let Some(property_type) = property.property_type.as_deref() {
            config.set_property_type(property_type);
        }
        if let Some(initial) = property.initial.as_deref() {
            config.set_initial(initial);
        }
        if let Some(size) = property.size {
            config.set_size(size);
        }
        bean.add_property(config);
    }
    bean
}

fn forward_config(definition: ForwardDefinition) -> ForwardConfig {
    let name = definition.name.as_deref().unwrap_or("");
    ForwardConfig::new(name, &definition.path)
        .with_redirect(flag(&definition.redirect, false))
        .with_context_relative(flag(&definition.context_relative, false))
}

fn exception_config(definition: ExceptionDefinition) -> ExceptionConfig {
    let mut exception = ExceptionConfig::new(&definition.exception_type, &definition.key);
    if let Some(path) = definition.path.as_deref() {
        exception.set_path(path);
    }
    if let Some(scope) = definition.scope.as_deref() {
        exception.set_scope(Scope::parse(scope));
    }
    if let Some(handler) = definition.handler.as_deref() {
        exception.set_handler(handler);
    }
    exception
}

fn action_config(definition: ActionDefinition) -> ActionConfig {
    let mut action = ActionConfig::new(definition.path.trim());
    if let Some(action_type) = definition.action_type.as_deref() {
        action.set_action_type(action_type);
    }
    if let Some(name) = definition.name.as_deref() {
        action.set_name(name);
    }
    if let Some(attribute) = definition.attribute.as_deref() {
        action.set_attribute(attribute);
    }
    if let Some(input) = definition.input.as_deref() {
        action.set_input(input);
    }
    if let Some(forward) = definition.forward.as_deref() {
        action.set_forward(forward);
    }
    if let Some(include) = definition.include.as_deref() {
        action.set_include(include);
    }
    if let Some(roles) = definition.roles.as_deref() {
        action.set_roles(roles);
    }
    if let Some(parameter) = definition.parameter.as_deref() {
        action.set_parameter(parameter);
    }
    if let Some(prefix) = definition.prefix.as_deref() {
        action.set_prefix(prefix);
    }
    if let Some(suffix) = definition.suffix.as_deref() {
        action.set_suffix(suffix);
    }
    if let Some(scope) = definition.scope.as_deref() {
        action.set_scope(Scope::parse(scope));
    }
    action.set_validate(flag(&definition.validate, true));
    action.set_unknown(flag(&definition.unknown, false));
    for forward in definition.forwards {
        action.add_forward_config(forward_config(forward));
    }
    for exception in definition.exceptions {
        action.add_exception_config(exception_config(exception));
    }
    action
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MAIN: &str = r#"
        [controller]
        content_type = "text/html;charset=utf-8"
        nocache = "yes"
        input_forward = "no"
        locale = "0"
        default_locale = "en-US"

        [[message_resources]]
        parameter = "config/messages.toml"
        null = "false"

        [[form_beans]]
        name = "userForm"
        type = "dyna"
        dynamic = "true"
        properties = [
            { name = "name", initial = "guest" },
            { name = "tags", type = "string[]", size = 2 },
        ]

        [[global_forwards]]
        name = "home"
        path = "/index.html"
        context_relative = "TRUE"

        [[global_exceptions]]
        type = "app.Failure"
        key = "error.failure"
        path = "/err.html"
        scope = "session"

        [[actions]]
        path = "user/save"
        type = "app.SaveUser"
        name = "userForm"
        scope = "request"
        validate = "No"
        input = "/user/form.html"
        roles = "editor, admin"
        forwards = [{ name = "success", path = "/user/done.html", redirect = "yes" }]
        exceptions = [{ type = "app.Duplicate", key = "error.duplicate", handler = "default" }]

        [[actions]]
        path = "/page/*"
        type = "forward"
        parameter = "/pages/{0}.html"
        unknown = false

        [[plug_ins]]
        type = "app.Warmup"
        properties = { size = "10" }
    "#;

    fn module(content: &str) -> ModuleConfig {
        let mut builder = ModuleConfigBuilder::new("");
        apply_definition(&mut builder, content).unwrap();
        builder.freeze()
    }

    #[test]
    fn test_flag_convention() {
        assert!(Flag::Text("0".into()).value());
        assert!(Flag::Text("yes".into()).value());
        assert!(!Flag::Text("NO".into()).value());
        assert!(!Flag::Bool(false).value());
    }

    #[test]
    fn test_controller_section() {
        let module = module(MAIN);
        let controller = module.controller_config();
        assert_eq!(controller.content_type(), Some("text/html;charset=utf-8"));
        assert!(controller.nocache());
        assert!(!controller.input_forward());
        // "0" 在这个约定下为真
        assert!(controller.locale());
        assert_eq!(controller.default_locale(), Some("en-US"));
    }

    #[test]
    fn test_actions_and_nested_configs() {
        let module = module(MAIN);
        let save = module.find_action_config("/user/save").unwrap();
        assert_eq!(save.action_type(), Some("app.SaveUser"));
        assert_eq!(save.scope(), Scope::Request);
        assert!(!save.validate());
        assert_eq!(save.role_names(), &["editor", "admin"]);
        let success = save.find_forward_config("success").unwrap();
        assert!(success.redirect());
        assert!(!success.context_relative());
        assert!(save.find_exception_config("app.Duplicate").is_some());

        assert_eq!(module.matcher().len(), 1);
        let page = module.matcher().match_path("/page/about").unwrap();
        assert_eq!(page.parameter(), Some("/pages/about.html"));
    }

    #[test]
    fn test_globals_forms_and_plug_ins() {
        let module = module(MAIN);
        assert!(module.find_forward_config("home").unwrap().context_relative());
        let failure = module.find_exception_config("app.Failure").unwrap();
        assert_eq!(failure.scope(), Scope::Session);
        assert_eq!(failure.path(), Some("/err.html"));

        let bean = module.find_form_bean_config("userForm").unwrap();
        assert!(bean.dynamic());
        assert_eq!(bean.find_property("name").unwrap().initial(), Some("guest"));
        assert!(bean.find_property("tags").unwrap().is_indexed());

        let resources = module.find_message_resources_config(MESSAGES_KEY).unwrap();
        assert!(!resources.return_null());
        assert_eq!(module.plug_in_configs()[0].plug_in_type(), "app.Warmup");
        assert_eq!(module.plug_in_configs()[0].properties()["size"], "10");
    }

    #[test]
    fn test_validation_errors() {
        let mut builder = ModuleConfigBuilder::new("");
        let result = apply_definition(
            &mut builder,
            r#"
            [[actions]]
            path = " "

            [[actions]]
            path = "/both"
            forward = "/a.html"
            include = "/b.html"
            forwards = [{ path = "/nameless.html" }]
            "#,
        );
        match result {
            Err(ConfigError::Validation(errors)) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.contains("/nameless.html")));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_forward_and_include_together_load() {
        let module = module(
            r#"
            [[actions]]
            path = "/both"
            forward = "/a.html"
            include = "/b.html"
            "#,
        );
        let both = module.find_action_config("/both").unwrap();
        assert_eq!(both.forward(), Some("/a.html"));
        assert_eq!(both.include(), Some("/b.html"));
    }

    #[test]
    fn test_load_module_merges_files() {
        let mut first = NamedTempFile::new().unwrap();
        first
            .write_all(b"[[actions]]\npath = \"/a\"\nforward = \"/a.html\"\n")
            .unwrap();
        let mut second = NamedTempFile::new().unwrap();
        second
            .write_all(b"[[actions]]\npath = \"/a\"\nforward = \"/a2.html\"\n[[actions]]\npath = \"/b\"\nforward = \"/b.html\"\n")
            .unwrap();
        let sources = vec![
            first.path().to_str().unwrap().to_string(),
            second.path().to_str().unwrap().to_string(),
        ];
        let module = load_module("admin", &sources).unwrap();
        assert_eq!(module.prefix(), "admin");
        assert_eq!(module.find_action_configs().len(), 2);
        assert_eq!(module.find_action_config("/a").unwrap().forward(), Some("/a2.html"));
    }

    #[test]
    fn test_load_module_reports_source() {
        let mut broken = NamedTempFile::new().unwrap();
        broken.write_all(b"[[actions]]\npath = 12\n").unwrap();
        let source = broken.path().to_str().unwrap().to_string();
        match load_module("", &[source.clone()]) {
            Err(ConfigError::Parse(path, _)) => assert_eq!(path, source),
            other => panic!("unexpected: {:?}", other.map(|m| m.prefix().to_string())),
        }
        assert!(matches!(
            load_module("", &["/nonexistent/module.toml".to_string()]),
            Err(ConfigError::Io(_, _))
        ));
    }

    #[test]
    fn test_load_message_resources() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all("\"error.internal\" = \"Internal error\"\n[zh_CN]\n\"error.internal\" = \"服务器内部错误\"\n".as_bytes())
            .unwrap();
        let config = MessageResourcesConfig::new(MESSAGES_KEY, file.path().to_str().unwrap(), false);
        let resources = load_message_resources(&config).unwrap();
        use crate::messages::MessageResources;
        assert_eq!(
            resources.message(Some("zh-CN"), "error.internal", &[]),
            Some("服务器内部错误".to_string())
        );
    }
}
