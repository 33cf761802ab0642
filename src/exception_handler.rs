// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 异常处理
//!
//! 业务处理器抛出的 [`ActionException`] 在这里被映射为错误报告与转发目标。
//! 查找顺序沿异常的类型链进行，每一级先查动作的局部配置，再查模块的全局配置；
//! 没有任何配置匹配时异常以 [`Exception::Unhandled`] 原样抛给调用方。

use log::{error, warn};

use crate::{
    action::{ActionRegistry, SharedForm},
    exception::{ActionException, Exception},
    messages::{ActionMessage, ActionMessages},
    model::{ActionMapping, ExceptionConfig, ForwardConfig},
    param::*,
    request::{Attribute, Request},
    response::Response,
};

/// 异常处理器，以 `ExceptionConfig.handler` 中的名字在注册表中查找。
pub trait ExceptionHandler: Send + Sync {
    fn execute(
        &self,
        exception: &ActionException,
        config: &ExceptionConfig,
        mapping: &ActionMapping,
        form: Option<&SharedForm>,
        request: &mut Request,
        response: &mut Response,
    ) -> Result<Option<ForwardConfig>, Exception>;
}

/// 默认的异常处理器。
///
/// 1. 转发目标：异常配置的 `path`，没有时回到映射的输入目标。
/// 2. 错误报告：模块异常直接复用其中的消息，否则以异常配置的 `key` 生成一条消息，
///    属性名同样是 `key`。
/// 3. 错误报告存放在异常配置声明的作用域中，原始异常存放在请求的 `EXCEPTION_KEY` 下。
#[derive(Debug, Default)]
pub struct DefaultExceptionHandler;

impl ExceptionHandler for DefaultExceptionHandler {
    fn execute(
        &self,
        exception: &ActionException,
        config: &ExceptionConfig,
        mapping: &ActionMapping,
        _form: Option<&SharedForm>,
        request: &mut Request,
        response: &mut Response,
    ) -> Result<Option<ForwardConfig>, Exception> {
        let id = request.id();
        warn!("[ID{}]处理动作{}抛出的异常：{}", id, mapping.path(), exception);

        let forward = match config.path() {
            Some(path) => Some(ForwardConfig::unnamed(path)),
            None => mapping.input_forward(),
        };

        let key = config.key().unwrap_or_else(|| exception.kind());
        let (property, message) = match exception.module_message() {
            Some(message) => (
                exception.property().unwrap_or_else(|| message.key()).to_string(),
                message.clone(),
            ),
            None => (
                key.to_string(),
                ActionMessage::with_values(key, vec![exception.message().to_string()]),
            ),
        };
        let errors = ActionMessages::single(&property, message);
        match config.scope() {
            Scope::Request => request.set_attribute(ERROR_KEY, Attribute::Messages(errors)),
            Scope::Session => request
                .session()
                .set_attribute(ERROR_KEY, Attribute::Messages(errors)),
        }
        request.set_attribute(EXCEPTION_KEY, Attribute::Exception(exception.clone()));

        if forward.is_none() {
            error!(
                "[ID{}]异常配置{}没有path，映射{}也没有输入目标",
                id,
                config.exception_type(),
                mapping.path()
            );
            response.send_error(500, None);
        }
        Ok(forward)
    }
}

/// 为业务异常寻找异常配置并交给对应的处理器。
pub fn handle_exception(
    registry: &ActionRegistry,
    exception: ActionException,
    mapping: &ActionMapping,
    form: Option<&SharedForm>,
    request: &mut Request,
    response: &mut Response,
) -> Result<Option<ForwardConfig>, Exception> {
    let config = match mapping.find_exception(&exception) {
        Some(config) => config,
        None => {
            warn!(
                "[ID{}]异常{}没有匹配的异常配置，向上抛出",
                request.id(),
                exception.kind()
            );
            return Err(Exception::Unhandled(exception));
        }
    };
    let handler = match registry.exception_handler(config.handler()) {
        Some(handler) => handler,
        None => {
            return Err(Exception::InternalError(format!(
                "no exception handler registered for type {}",
                config.handler()
            )))
        }
    };
    handler.execute(&exception, &config, mapping, form, request, response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ActionConfig, ControllerConfig, ModuleConfigBuilder};
    use std::sync::Arc;

    fn mapping(action: ActionConfig, builder: &mut ModuleConfigBuilder) -> ActionMapping {
        let path = action.path().to_string();
        builder.add_action_config(action);
        let module = Arc::new(builder.clone().freeze());
        let config = Arc::clone(module.find_action_config(&path).unwrap());
        ActionMapping::new(config, module)
    }

    fn request() -> Request {
        Request::new(HttpRequestMethod::Post, "/save")
    }

    #[test]
    fn test_path_override_and_request_scope() {
        let mut action = ActionConfig::new("/save");
        let mut config = ExceptionConfig::new("app.Failure", "error.failure");
        config.set_path("/err.html");
        action.add_exception_config(config);
        let mapping = mapping(action, &mut ModuleConfigBuilder::new(""));
        let registry = ActionRegistry::new();
        let mut request = request();
        let mut response = Response::new();

        let forward = handle_exception(
            &registry,
            ActionException::new("app.Failure", "disk full"),
            &mapping,
            None,
            &mut request,
            &mut response,
        )
        .unwrap()
        .unwrap();

        assert_eq!(forward.path(), "/err.html");
        let errors = request.attribute(ERROR_KEY).and_then(Attribute::as_messages).unwrap();
        assert_eq!(errors.len(), 1);
        let message = errors.get("error.failure")[0];
        assert_eq!(message.key(), "error.failure");
        assert_eq!(message.values(), &["disk full"]);
        assert_eq!(
            request
                .attribute(EXCEPTION_KEY)
                .and_then(Attribute::as_exception)
                .unwrap()
                .message(),
            "disk full"
        );
        assert!(request.existing_session().is_none());
    }

    #[test]
    fn test_session_scope_and_input_fallback() {
        let mut builder = ModuleConfigBuilder::new("");
        let mut global = ExceptionConfig::new("app.Failure", "error.failure");
        global.set_scope(Scope::Session);
        builder.add_exception_config(global);
        let mut action = ActionConfig::new("/save");
        action.set_input("/form.html");
        let mapping = mapping(action, &mut builder);
        let mut request = request();
        let mut response = Response::new();

        let forward = handle_exception(
            &ActionRegistry::new(),
            ActionException::new("app.Failure", "x"),
            &mapping,
            None,
            &mut request,
            &mut response,
        )
        .unwrap()
        .unwrap();

        assert_eq!(forward.path(), "/form.html");
        assert!(request.attribute(ERROR_KEY).is_none());
        let session = request.existing_session().unwrap();
        assert!(session.attribute(ERROR_KEY).is_some());
    }

    #[test]
    fn test_module_exception_reuses_message() {
        let mut action = ActionConfig::new("/save");
        let mut config = ExceptionConfig::new("app.Duplicate", "error.generic");
        config.set_path("/err.html");
        action.add_exception_config(config);
        let mapping = mapping(action, &mut ModuleConfigBuilder::new(""));
        let mut request = request();

        handle_exception(
            &ActionRegistry::new(),
            ActionException::module("app.Duplicate", "error.duplicate", vec!["ana".into()])
                .with_property("username"),
            &mapping,
            None,
            &mut request,
            &mut Response::new(),
        )
        .unwrap();

        let errors = request.attribute(ERROR_KEY).and_then(Attribute::as_messages).unwrap();
        assert_eq!(errors.properties(), vec!["username"]);
        assert_eq!(errors.get("username")[0].key(), "error.duplicate");
        assert_eq!(errors.get("username")[0].values(), &["ana"]);
    }

    #[test]
    fn test_parent_kind_is_matched() {
        let mut builder = ModuleConfigBuilder::new("");
        let mut config = ExceptionConfig::new("app.DataError", "error.data");
        config.set_path("/data-error.html");
        builder.add_exception_config(config);
        let mapping = mapping(ActionConfig::new("/save"), &mut builder);

        let forward = handle_exception(
            &ActionRegistry::new(),
            ActionException::new("app.Timeout", "slow").extends("app.DataError"),
            &mapping,
            None,
            &mut request(),
            &mut Response::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(forward.path(), "/data-error.html");
    }

    #[test]
    fn test_unmatched_exception_is_reraised() {
        let mapping = mapping(ActionConfig::new("/save"), &mut ModuleConfigBuilder::new(""));
        let exception = ActionException::new("app.Unknown", "boom");
        let result = handle_exception(
            &ActionRegistry::new(),
            exception.clone(),
            &mapping,
            None,
            &mut request(),
            &mut Response::new(),
        );
        match result {
            Err(Exception::Unhandled(e)) => assert_eq!(e, exception),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unregistered_handler() {
        let mut action = ActionConfig::new("/save");
        let mut config = ExceptionConfig::new("app.Failure", "error.failure");
        config.set_handler("app.CustomHandler");
        action.add_exception_config(config);
        let mapping = mapping(action, &mut ModuleConfigBuilder::new(""));
        let result = handle_exception(
            &ActionRegistry::new(),
            ActionException::new("app.Failure", "x"),
            &mapping,
            None,
            &mut request(),
            &mut Response::new(),
        );
        assert!(matches!(result, Err(Exception::InternalError(_))));
    }

    #[test]
    fn test_input_forward_name_lookup() {
        let mut builder = ModuleConfigBuilder::new("");
        let mut controller = ControllerConfig::default();
        controller.set_input_forward(true);
        builder.set_controller_config(controller);
        builder.add_forward_config(ForwardConfig::new("editor", "/editor.html"));
        builder.add_exception_config(ExceptionConfig::new("app.Failure", "error.failure"));
        let mut action = ActionConfig::new("/save");
        action.set_input("editor");
        let mapping = mapping(action, &mut builder);

        let forward = handle_exception(
            &ActionRegistry::new(),
            ActionException::new("app.Failure", "x"),
            &mapping,
            None,
            &mut request(),
            &mut Response::new(),
        )
        .unwrap()
        .unwrap();
        assert_eq!(forward.path(), "/editor.html");
    }
}
