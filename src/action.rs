// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 动作、表单与插件
//!
//! 业务处理器（[`Action`]）、表单（[`ActionForm`]）与插件（[`PlugIn`]）都是 trait 对象，
//! 配置中以字符串类型名引用。[`ActionRegistry`] 在模块加载时把类型名映射到工厂闭包，
//! 请求处理期间只按名字查找，不做任何运行时反射。

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use log::{debug, error};

use crate::{
    exception::{ActionException, Exception},
    exception_handler::{DefaultExceptionHandler, ExceptionHandler},
    messages::ActionMessages,
    model::{ActionMapping, FormBeanConfig, ForwardConfig, ModuleConfig, PlugInConfig},
    param::DEFAULT_EXCEPTION_HANDLER,
    request::Request,
    response::Response,
};

/// 内置的转发动作类型名
pub const FORWARD_ACTION: &str = "forward";

/// 内置的动态表单类型名
pub const DYNA_FORM: &str = "dyna";

/// 业务处理器。
///
/// 同一类型的处理器在每个模块内只构造一次，并被并发请求共享，因此不应持有请求相关的状态。
pub trait Action: Send + Sync {
    /// 处理请求。返回 `None` 表示响应已经由处理器自己完成。
    ///
    /// 执行期间表单处于锁定状态，处理器不应再通过请求属性去锁同一个表单。
    fn execute(
        &self,
        mapping: &ActionMapping,
        form: Option<&mut dyn ActionForm>,
        request: &mut Request,
        response: &mut Response,
    ) -> Result<Option<ForwardConfig>, ActionException>;
}

/// 表单：在处理器执行之前由请求参数填充并校验的数据容器。
pub trait ActionForm: Send + Any {
    /// 表单的类型名，用于判断作用域中已有的表单能否复用
    fn form_type(&self) -> &str;

    /// 动态表单所属的表单声明名
    fn bean_name(&self) -> Option<&str> {
        None
    }

    /// 填充之前调用，用于清空复选框之类"未提交即为假"的属性
    fn reset(&mut self, _mapping: &ActionMapping, _request: &Request) {}

    /// 返回空的错误报告表示校验通过
    fn validate(&self, _mapping: &ActionMapping, _request: &Request) -> ActionMessages {
        ActionMessages::new()
    }

    /// 设置属性值；表单没有该属性时返回 `false`
    fn set_property(&mut self, name: &str, values: &[String]) -> bool;

    fn property(&self, name: &str) -> Option<String>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// 在请求与会话之间共享的表单实例
pub type SharedForm = Arc<Mutex<Box<dyn ActionForm>>>;

/// 按表单声明中的属性列表构建的通用表单。
#[derive(Debug, Clone)]
pub struct DynaActionForm {
    name: String,
    form_type: String,
    config: Arc<FormBeanConfig>,
    values: BTreeMap<String, Vec<String>>,
}

impl DynaActionForm {
    pub fn new(config: Arc<FormBeanConfig>) -> Self {
        let values = config
            .properties()
            .iter()
            .map(|p| (p.name().to_string(), p.initial_values()))
            .collect();
        Self {
            name: config.name().to_string(),
            form_type: config.form_type().to_string(),
            config,
            values,
        }
    }

    pub fn values(&self, name: &str) -> Option<&[String]> {
        self.values.get(name).map(Vec::as_slice)
    }

    /// 恢复所有属性的初始值
    pub fn initialize(&mut self) {
        for property in self.config.properties() {
            self.values
                .insert(property.name().to_string(), property.initial_values());
        }
    }
}

impl ActionForm for DynaActionForm {
    fn form_type(&self) -> &str {
        &self.form_type
    }

    fn bean_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn set_property(&mut self, name: &str, values: &[String]) -> bool {
        let property = match self.config.find_property(name) {
            Some(p) => p,
            None => return false,
        };
        let stored = if property.is_indexed() {
            values.to_vec()
        } else {
            values.iter().take(1).cloned().collect()
        };
        self.values.insert(name.to_string(), stored);
        true
    }

    fn property(&self, name: &str) -> Option<String> {
        self.values.get(name).and_then(|v| v.first()).cloned()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// 把请求转发到映射的 `parameter` 指定的路径。
pub struct ForwardAction;

impl Action for ForwardAction {
    fn execute(
        &self,
        mapping: &ActionMapping,
        _form: Option<&mut dyn ActionForm>,
        request: &mut Request,
        response: &mut Response,
    ) -> Result<Option<ForwardConfig>, ActionException> {
        match mapping.parameter() {
            Some(path) => Ok(Some(ForwardConfig::unnamed(path))),
            None => {
                error!(
                    "[ID{}]转发动作{}没有配置parameter",
                    request.id(),
                    mapping.path()
                );
                response.send_error(500, None);
                Ok(None)
            }
        }
    }
}

/// 插件：随内核一起初始化、随内核一起销毁的模块级组件。
pub trait PlugIn: Send {
    fn init(&mut self, module: &Arc<ModuleConfig>) -> Result<(), String>;

    fn destroy(&mut self) {}
}

type ActionFactory = Box<dyn Fn() -> Result<Arc<dyn Action>, String> + Send + Sync>;
type FormFactory = Box<dyn Fn(&Arc<FormBeanConfig>) -> Box<dyn ActionForm> + Send + Sync>;
type PlugInFactory = Box<dyn Fn(&PlugInConfig) -> Box<dyn PlugIn> + Send + Sync>;

/// 类型名到工厂的注册表。
pub struct ActionRegistry {
    actions: HashMap<String, ActionFactory>,
    forms: HashMap<String, FormFactory>,
    handlers: HashMap<String, Arc<dyn ExceptionHandler>>,
    plug_ins: HashMap<String, PlugInFactory>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("forms", &self.forms.keys().collect::<Vec<_>>())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .field("plug_ins", &self.plug_ins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ActionRegistry {
    /// 创建带有内置类型的注册表：`forward` 动作、`dyna` 表单与 `default` 异常处理器
    pub fn new() -> Self {
        let mut registry = Self {
            actions: HashMap::new(),
            forms: HashMap::new(),
            handlers: HashMap::new(),
            plug_ins: HashMap::new(),
        };
        registry.register_action(FORWARD_ACTION, || Arc::new(ForwardAction) as Arc<dyn Action>);
        registry.register_form(DYNA_FORM, |config| {
            Box::new(DynaActionForm::new(Arc::clone(config))) as Box<dyn ActionForm>
        });
        registry.register_exception_handler(
            DEFAULT_EXCEPTION_HANDLER,
            Arc::new(DefaultExceptionHandler),
        );
        registry
    }

    pub fn register_action<F>(&mut self, action_type: &str, factory: F)
    where
        F: Fn() -> Arc<dyn Action> + Send + Sync + 'static,
    {
        self.register_action_factory(action_type, move || Ok(factory()));
    }

    /// 注册可能构造失败的处理器工厂，失败会在请求时转为内部错误
    pub fn register_action_factory<F>(&mut self, action_type: &str, factory: F)
    where
        F: Fn() -> Result<Arc<dyn Action>, String> + Send + Sync + 'static,
    {
        self.actions.insert(action_type.to_string(), Box::new(factory));
    }

    pub fn register_form<F>(&mut self, form_type: &str, factory: F)
    where
        F: Fn(&Arc<FormBeanConfig>) -> Box<dyn ActionForm> + Send + Sync + 'static,
    {
        self.forms.insert(form_type.to_string(), Box::new(factory));
    }

    pub fn register_exception_handler(
        &mut self,
        handler_type: &str,
        handler: Arc<dyn ExceptionHandler>,
    ) {
        self.handlers.insert(handler_type.to_string(), handler);
    }

    pub fn register_plug_in<F>(&mut self, plug_in_type: &str, factory: F)
    where
        F: Fn(&PlugInConfig) -> Box<dyn PlugIn> + Send + Sync + 'static,
    {
        self.plug_ins.insert(plug_in_type.to_string(), Box::new(factory));
    }

    pub fn has_action(&self, action_type: &str) -> bool {
        self.actions.contains_key(action_type)
    }

    pub fn create_action(&self, action_type: &str) -> Result<Arc<dyn Action>, Exception> {
        let factory = match self.actions.get(action_type) {
            Some(f) => f,
            None => {
                return Err(Exception::InternalError(format!(
                    "no action registered for type {}",
                    action_type
                )))
            }
        };
        debug!("构造处理器{}", action_type);
        factory().map_err(|e| {
            Exception::InternalError(format!("cannot create action {}: {}", action_type, e))
        })
    }

    /// 按表单声明构造新表单；未注册的动态表单类型回退到 [`DynaActionForm`]
    pub fn create_form(&self, config: &Arc<FormBeanConfig>) -> Result<SharedForm, Exception> {
        let form = match self.forms.get(config.form_type()) {
            Some(factory) => factory(config),
            None if config.dynamic() => Box::new(DynaActionForm::new(Arc::clone(config))),
            None => {
                return Err(Exception::InternalError(format!(
                    "no form registered for type {}",
                    config.form_type()
                )))
            }
        };
        Ok(Arc::new(Mutex::new(form)))
    }

    pub fn exception_handler(&self, handler_type: &str) -> Option<Arc<dyn ExceptionHandler>> {
        self.handlers.get(handler_type).cloned()
    }

    pub fn create_plug_in(&self, config: &PlugInConfig) -> Result<Box<dyn PlugIn>, Exception> {
        match self.plug_ins.get(config.plug_in_type()) {
            Some(factory) => Ok(factory(config)),
            None => Err(Exception::InternalError(format!(
                "no plug-in registered for type {}",
                config.plug_in_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionConfig, FormPropertyConfig, ModuleConfigBuilder};
    use crate::param::HttpRequestMethod;

    fn form_config() -> Arc<FormBeanConfig> {
        let mut config = FormBeanConfig::new("userForm", DYNA_FORM);
        config.set_dynamic(true);
        let mut name = FormPropertyConfig::new("name");
        name.set_initial("guest");
        config.add_property(name);
        let mut tags = FormPropertyConfig::new("tags");
        tags.set_property_type("string[]");
        config.add_property(tags);
        Arc::new(config)
    }

    fn mapping(config: ActionConfig) -> ActionMapping {
        let mut builder = ModuleConfigBuilder::new("");
        builder.add_action_config(config.clone());
        let module = Arc::new(builder.freeze());
        let config = Arc::clone(module.find_action_config(config.path()).unwrap());
        ActionMapping::new(config, module)
    }

    #[test]
    fn test_dyna_form_properties() {
        let mut form = DynaActionForm::new(form_config());
        assert_eq!(form.form_type(), DYNA_FORM);
        assert_eq!(form.bean_name(), Some("userForm"));
        assert_eq!(form.property("name"), Some("guest".to_string()));

        let values = vec!["ana".to_string(), "ignored".to_string()];
        assert!(form.set_property("name", &values));
        assert_eq!(form.values("name").unwrap(), &["ana"]);

        assert!(form.set_property("tags", &values));
        assert_eq!(form.values("tags").unwrap().len(), 2);

        assert!(!form.set_property("missing", &values));

        form.initialize();
        assert_eq!(form.property("name"), Some("guest".to_string()));
    }

    #[test]
    fn test_forward_action_uses_parameter() {
        let mut config = ActionConfig::new("/home");
        config.set_action_type(FORWARD_ACTION);
        config.set_parameter("/index.html");
        let mapping = mapping(config);
        let mut request = Request::new(HttpRequestMethod::Get, "/home");
        let mut response = Response::new();

        let forward = ForwardAction
            .execute(&mapping, None, &mut request, &mut response)
            .unwrap()
            .unwrap();
        assert_eq!(forward.path(), "/index.html");
        assert!(forward.name().is_none());
    }

    #[test]
    fn test_forward_action_without_parameter_sends_error() {
        let mapping = mapping(ActionConfig::new("/home"));
        let mut request = Request::new(HttpRequestMethod::Get, "/home");
        let mut response = Response::new();

        let forward = ForwardAction
            .execute(&mapping, None, &mut request, &mut response)
            .unwrap();
        assert!(forward.is_none());
        assert_eq!(response.status_code(), 500);
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ActionRegistry::new();
        assert!(registry.has_action(FORWARD_ACTION));
        assert!(registry.create_action(FORWARD_ACTION).is_ok());
        assert!(registry.exception_handler(DEFAULT_EXCEPTION_HANDLER).is_some());

        let form = registry.create_form(&form_config()).unwrap();
        let form = form.lock().unwrap();
        assert!(form.as_any().downcast_ref::<DynaActionForm>().is_some());
    }

    #[test]
    fn test_registry_unknown_types_are_internal_errors() {
        let registry = ActionRegistry::new();
        assert!(matches!(
            registry.create_action("missing"),
            Err(Exception::InternalError(_))
        ));
        let static_form = Arc::new(FormBeanConfig::new("f", "app.MissingForm"));
        assert!(matches!(
            registry.create_form(&static_form),
            Err(Exception::InternalError(_))
        ));
        let plug_in = PlugInConfig::new("app.Missing", BTreeMap::new());
        assert!(matches!(
            registry.create_plug_in(&plug_in),
            Err(Exception::InternalError(_))
        ));
    }

    #[test]
    fn test_failing_factory() {
        let mut registry = ActionRegistry::new();
        registry.register_action_factory("broken", || Err("missing database".to_string()));
        match registry.create_action("broken") {
            Err(Exception::InternalError(detail)) => assert!(detail.contains("missing database")),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }
}
