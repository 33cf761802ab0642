// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求处理流水线
//!
//! 每个模块对应一个 [`RequestProcessor`]。一次请求按固定顺序经过以下阶段：
//!
//! 1. `process_path`：从请求中取出分发路径，校验并去掉模块前缀。
//! 2. `process_locale`：需要时把请求的区域设置保存到会话。
//! 3. `process_content`：设置默认的 `Content-Type`。
//! 4. `process_no_cache`：需要时写入禁止缓存的响应头。
//! 5. `process_preprocess`：扩展钩子，返回 `false` 则终止。
//! 6. `process_mapping`：精确匹配、通配符匹配、`unknown` 动作，依次查找映射。
//! 7. `process_roles`：角色检查，满足任意一个即可。
//! 8. `process_action_form`：复用或新建表单，放回声明的作用域。
//! 9. `process_populate`：重置表单并用请求参数填充，识别取消按钮。
//! 10. `process_validate`：校验失败时保存错误报告并回到输入目标。
//! 11. `process_forward` / `process_include`：静态转发或包含。
//! 12. `process_action_create`：构造并缓存业务处理器。
//! 13. `process_action_perform`：执行处理器，业务异常交给异常处理器。
//! 14. `process_forward_config`：重定向或内部转发到处理结果。
//!
//! 每个阶段返回 `Ok(true)` 表示继续，`Ok(false)` 表示响应已经完成，`Err` 表示终止性错误。

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use log::{debug, error, info, warn};

use crate::{
    action::{Action, ActionForm, ActionRegistry, SharedForm},
    exception::Exception,
    exception_handler::handle_exception,
    model::{ActionMapping, ForwardConfig, ModuleConfig},
    param::*,
    request::{Attribute, Request},
    response::Response,
    util::{expired_date, format_http_date, lock, read_lock, write_lock},
};

/// 内部转发与包含的执行者，由内核实现。
///
/// 传入的路径都是相对于应用根路径的。
pub trait Dispatcher {
    fn forward(&self, path: &str, request: &mut Request, response: &mut Response) -> Result<(), Exception>;

    fn include(&self, path: &str, request: &mut Request, response: &mut Response) -> Result<(), Exception>;
}

/// 预处理钩子，返回 `false` 表示请求已被钩子处理，流水线不再继续。
pub trait Preprocess: Send + Sync {
    fn preprocess(&self, request: &mut Request, response: &mut Response) -> bool;
}

pub struct RequestProcessor {
    module: Arc<ModuleConfig>,
    registry: Arc<ActionRegistry>,
    /// 按处理器类型名缓存的处理器实例
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
    preprocessors: Vec<Arc<dyn Preprocess>>,
}

impl fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestProcessor")
            .field("module", &self.module.prefix())
            .field("actions", &read_lock(&self.actions).keys().collect::<Vec<_>>())
            .field("preprocessors", &self.preprocessors.len())
            .finish()
    }
}

impl RequestProcessor {
    pub fn new(module: Arc<ModuleConfig>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            module,
            registry,
            actions: RwLock::new(HashMap::new()),
            preprocessors: vec![],
        }
    }

    pub fn with_preprocessors(mut self, preprocessors: Vec<Arc<dyn Preprocess>>) -> Self {
        self.preprocessors = preprocessors;
        self
    }

    pub fn module(&self) -> &Arc<ModuleConfig> {
        &self.module
    }

    /// 已缓存的处理器数量
    pub fn cached_actions(&self) -> usize {
        read_lock(&self.actions).len()
    }

    /// 释放缓存的处理器实例
    pub fn destroy(&self) {
        write_lock(&self.actions).clear();
    }

    /// 依次执行流水线的各个阶段。
    pub fn process(
        &self,
        request: &mut Request,
        response: &mut Response,
        dispatcher: &dyn Dispatcher,
    ) -> Result<(), Exception> {
        let path = self.process_path(request)?;
        debug!("[ID{}]模块'{}'处理路径{}", request.id(), self.module.prefix(), path);

        self.process_locale(request);
        self.process_content(response);
        self.process_no_cache(response);
        if !self.process_preprocess(request, response) {
            return Ok(());
        }

        let mapping = self.process_mapping(request, &path)?;
        self.process_roles(request, &mapping)?;

        let form = self.process_action_form(request, &mapping)?;
        self.process_populate(request, &mapping, form.as_ref());
        if !self.process_validate(request, response, &mapping, form.as_ref(), dispatcher)? {
            return Ok(());
        }

        if !self.process_forward(request, response, &mapping, dispatcher)? {
            return Ok(());
        }
        if !self.process_include(request, response, &mapping, dispatcher)? {
            return Ok(());
        }

        let action = self.process_action_create(request, &mapping)?;
        let forward =
            self.process_action_perform(request, response, action, &mapping, form.as_ref())?;
        self.process_forward_config(request, response, forward, dispatcher)
    }

    /// 分发路径：请求的 path-info，缺少前导 `/` 时补上；非默认模块还要去掉 `/{prefix}`。
    fn process_path(&self, request: &Request) -> Result<String, Exception> {
        let path = request.path_info();
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{}", path)
        };
        if self.module.prefix().is_empty() {
            return Ok(path);
        }
        let module_path = self.module.module_path();
        match path.strip_prefix(&module_path) {
            Some(rest) if rest.starts_with('/') => Ok(rest.to_string()),
            _ => {
                error!(
                    "[ID{}]路径{}不属于模块{}",
                    request.id(),
                    path,
                    module_path
                );
                Err(Exception::BadRequest(format!(
                    "path {} is outside module {}",
                    path, module_path
                )))
            }
        }
    }

    fn process_locale(&self, request: &mut Request) {
        let controller = self.module.controller_config();
        if !controller.locale() {
            return;
        }
        let locale = match request.locale().or(controller.default_locale()) {
            Some(locale) => locale.to_string(),
            None => return,
        };
        let session = request.session();
        if session.attribute(LOCALE_KEY).is_none() {
            debug!("[ID{}]保存区域设置{}到会话", request.id(), locale);
            session.set_attribute(LOCALE_KEY, Attribute::Text(locale));
        }
    }

    fn process_content(&self, response: &mut Response) {
        if let Some(content_type) = self.module.controller_config().content_type() {
            response.set_content_type(content_type);
        }
    }

    fn process_no_cache(&self, response: &mut Response) {
        if self.module.controller_config().nocache() {
            response
                .set_header("Pragma", "no-cache")
                .set_header("Cache-Control", "no-cache,no-store,max-age=0")
                .set_header("Expires", &format_http_date(&expired_date()));
        }
    }

    fn process_preprocess(&self, request: &mut Request, response: &mut Response) -> bool {
        for preprocessor in &self.preprocessors {
            if !preprocessor.preprocess(request, response) {
                debug!("[ID{}]预处理钩子终止了请求", request.id());
                return false;
            }
        }
        true
    }

    /// 精确匹配优先，其次是通配符匹配，最后是声明顺序中第一个 `unknown` 动作。
    fn process_mapping(&self, request: &mut Request, path: &str) -> Result<ActionMapping, Exception> {
        let config = self
            .module
            .find_action_config(path)
            .cloned()
            .or_else(|| self.module.matcher().match_path(path))
            .or_else(|| self.module.find_unknown_action_config().cloned());
        match config {
            Some(config) => {
                debug!("[ID{}]路径{}映射到动作{}", request.id(), path, config.path());
                request.set_attribute(MAPPING_KEY, Attribute::Mapping(Arc::clone(&config)));
                Ok(ActionMapping::new(config, Arc::clone(&self.module)))
            }
            None => {
                request.remove_attribute(MAPPING_KEY);
                error!("[ID{}]路径{}没有对应的映射", request.id(), path);
                Err(Exception::BadRequest(format!("no mapping for path {}", path)))
            }
        }
    }

    fn process_roles(&self, request: &Request, mapping: &ActionMapping) -> Result<(), Exception> {
        let roles = mapping.role_names();
        if roles.is_empty() {
            return Ok(());
        }
        match roles.iter().find(|role| request.is_user_in_role(role)) {
            Some(role) => {
                debug!(
                    "[ID{}]用户{:?}具有角色{}，允许访问{}",
                    request.id(),
                    request.user(),
                    role,
                    mapping.path()
                );
                Ok(())
            }
            None => {
                warn!(
                    "[ID{}]用户{:?}不具备访问{}所需的任何角色",
                    request.id(),
                    request.user(),
                    mapping.path()
                );
                Err(Exception::AccessDenied(mapping.path().to_string()))
            }
        }
    }

    /// 在声明的作用域中查找可以复用的表单，没有时新建一个并放回作用域。
    fn process_action_form(
        &self,
        request: &mut Request,
        mapping: &ActionMapping,
    ) -> Result<Option<SharedForm>, Exception> {
        let name = match mapping.name() {
            Some(name) => name,
            None => return Ok(None),
        };
        let attribute = mapping.attribute().unwrap_or(name);
        let bean = match self.module.find_form_bean_config(name) {
            Some(bean) => bean,
            None => {
                warn!("[ID{}]映射{}引用了不存在的表单{}", request.id(), mapping.path(), name);
                return Ok(None);
            }
        };

        let existing = match mapping.scope() {
            Scope::Request => request.attribute(attribute).cloned(),
            Scope::Session => request.session().attribute(attribute),
        };
        let reusable = existing
            .as_ref()
            .and_then(Attribute::as_form)
            .filter(|form| {
                let form = lock(form);
                form.form_type() == bean.form_type()
                    && (!bean.dynamic() || form.bean_name() == Some(bean.name()))
            })
            .cloned();

        let form = match reusable {
            Some(form) => {
                debug!("[ID{}]复用{}作用域中的表单{}", request.id(), mapping.scope(), attribute);
                form
            }
            None => {
                debug!("[ID{}]新建表单{}", request.id(), name);
                self.registry.create_form(bean)?
            }
        };

        match mapping.scope() {
            Scope::Request => request.set_attribute(attribute, Attribute::Form(Arc::clone(&form))),
            Scope::Session => request
                .session()
                .set_attribute(attribute, Attribute::Form(Arc::clone(&form))),
        }
        Ok(Some(form))
    }

    fn process_populate(&self, request: &mut Request, mapping: &ActionMapping, form: Option<&SharedForm>) {
        let form = match form {
            Some(form) => form,
            None => return,
        };
        let prefix = mapping.prefix().unwrap_or("");
        let suffix = mapping.suffix().unwrap_or("");
        {
            let mut form = lock(form);
            form.reset(mapping, request);
            for name in request.parameter_names() {
                if name.len() < prefix.len() + suffix.len()
                    || !name.starts_with(prefix)
                    || !name.ends_with(suffix)
                {
                    continue;
                }
                let property = &name[prefix.len()..name.len() - suffix.len()];
                if let Some(values) = request.parameter_values(name) {
                    if !form.set_property(property, values) {
                        debug!("[ID{}]表单没有属性{}，忽略", request.id(), property);
                    }
                }
            }
        }

        if request.parameter(CANCEL_PARAMETER).is_some()
            || request.parameter(CANCEL_PARAMETER_X).is_some()
        {
            debug!("[ID{}]请求被取消", request.id());
            request.set_attribute(CANCEL_KEY, Attribute::Flag(true));
        }
    }

    /// 返回 `Ok(false)` 表示校验失败且已经转发回输入目标。
    fn process_validate(
        &self,
        request: &mut Request,
        response: &mut Response,
        mapping: &ActionMapping,
        form: Option<&SharedForm>,
        dispatcher: &dyn Dispatcher,
    ) -> Result<bool, Exception> {
        let form = match form {
            Some(form) => form,
            None => return Ok(true),
        };
        if request.attribute(CANCEL_KEY).and_then(Attribute::as_flag) == Some(true) {
            debug!("[ID{}]请求已取消，跳过校验", request.id());
            return Ok(true);
        }
        if !mapping.validate() {
            return Ok(true);
        }

        let errors = lock(form).validate(mapping, request);
        if errors.is_empty() {
            debug!("[ID{}]表单校验通过", request.id());
            return Ok(true);
        }
        debug!("[ID{}]表单校验失败：{}条错误", request.id(), errors.len());

        let input = match mapping.input() {
            Some(input) => input.to_string(),
            None => {
                error!("[ID{}]映射{}校验失败但没有input", request.id(), mapping.path());
                return Err(Exception::NoInputTarget(mapping.path().to_string()));
            }
        };
        request.set_attribute(ERROR_KEY, Attribute::Messages(errors));

        if self.module.controller_config().input_forward() {
            let forward = match mapping.find_forward(&input) {
                Some(forward) => forward,
                None => {
                    error!(
                        "[ID{}]映射{}的input转发{}不存在",
                        request.id(),
                        mapping.path(),
                        input
                    );
                    return Err(Exception::NoInputTarget(mapping.path().to_string()));
                }
            };
            self.process_forward_config(request, response, Some(forward), dispatcher)?;
        } else {
            let uri = format!("{}{}", self.module.module_path(), input);
            dispatcher.forward(&uri, request, response)?;
        }
        Ok(false)
    }

    fn process_forward(
        &self,
        request: &mut Request,
        response: &mut Response,
        mapping: &ActionMapping,
        dispatcher: &dyn Dispatcher,
    ) -> Result<bool, Exception> {
        let forward = match mapping.forward() {
            Some(forward) => forward,
            None => return Ok(true),
        };
        let uri = format!("{}{}", self.module.module_path(), forward);
        debug!("[ID{}]映射{}静态转发到{}", request.id(), mapping.path(), uri);
        dispatcher.forward(&uri, request, response)?;
        Ok(false)
    }

    fn process_include(
        &self,
        request: &mut Request,
        response: &mut Response,
        mapping: &ActionMapping,
        dispatcher: &dyn Dispatcher,
    ) -> Result<bool, Exception> {
        let include = match mapping.include() {
            Some(include) => include,
            None => return Ok(true),
        };
        let uri = format!("{}{}", self.module.module_path(), include);
        debug!("[ID{}]映射{}静态包含{}", request.id(), mapping.path(), uri);
        dispatcher.include(&uri, request, response)?;
        Ok(false)
    }

    /// 按类型名取出处理器，首次使用时构造并缓存。
    ///
    /// 写锁下再次检查，保证同一类型只构造一次。
    fn process_action_create(
        &self,
        request: &Request,
        mapping: &ActionMapping,
    ) -> Result<Arc<dyn Action>, Exception> {
        let action_type = match mapping.action_type() {
            Some(action_type) => action_type,
            None => {
                error!("[ID{}]映射{}没有配置处理器类型", request.id(), mapping.path());
                return Err(Exception::InternalError(format!(
                    "no action type for mapping {}",
                    mapping.path()
                )));
            }
        };

        if let Some(action) = read_lock(&self.actions).get(action_type) {
            return Ok(Arc::clone(action));
        }

        let mut actions = write_lock(&self.actions);
        if let Some(action) = actions.get(action_type) {
            return Ok(Arc::clone(action));
        }
        let action = match self.registry.create_action(action_type) {
            Ok(action) => action,
            Err(e) => {
                error!("[ID{}]无法构造处理器{}：{}", request.id(), action_type, e);
                return Err(e);
            }
        };
        info!("模块'{}'创建处理器{}", self.module.prefix(), action_type);
        actions.insert(action_type.to_string(), Arc::clone(&action));
        Ok(action)
    }

    /// 执行处理器。业务异常在这里被拦截并交给异常处理器。
    fn process_action_perform(
        &self,
        request: &mut Request,
        response: &mut Response,
        action: Arc<dyn Action>,
        mapping: &ActionMapping,
        form: Option<&SharedForm>,
    ) -> Result<Option<ForwardConfig>, Exception> {
        let result = match form {
            Some(shared) => {
                let mut guard = lock(shared);
                let form: &mut dyn ActionForm = &mut **guard;
                action.execute(mapping, Some(form), request, response)
            }
            None => action.execute(mapping, None, request, response),
        };
        match result {
            Ok(forward) => Ok(forward),
            Err(exception) => {
                handle_exception(&self.registry, exception, mapping, form, request, response)
            }
        }
    }

    /// 处理结果：没有转发则结束；重定向加上应用根路径；否则内部转发。
    ///
    /// 以 `/` 开头且不是 `context_relative` 的路径先加上模块前缀。
    fn process_forward_config(
        &self,
        request: &mut Request,
        response: &mut Response,
        forward: Option<ForwardConfig>,
        dispatcher: &dyn Dispatcher,
    ) -> Result<(), Exception> {
        let forward = match forward {
            Some(forward) => forward,
            None => return Ok(()),
        };
        let mut path = forward.path().to_string();
        if path.starts_with('/') && !forward.context_relative() {
            path = format!("{}{}", self.module.module_path(), path);
        }

        if forward.redirect() {
            if path.starts_with('/') {
                path = format!("{}{}", request.context_path(), path);
            }
            debug!("[ID{}]重定向到{}", request.id(), path);
            response.redirect(&path);
            Ok(())
        } else {
            debug!("[ID{}]转发到{}", request.id(), path);
            dispatcher.forward(&path, request, response)
        }
    }
}
