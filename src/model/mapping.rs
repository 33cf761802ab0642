// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::ops::Deref;
use std::sync::Arc;

use crate::{
    exception::ActionException,
    model::{ActionConfig, ExceptionConfig, ForwardConfig, ModuleConfig},
};

/// 单次请求解析出的映射：动作配置加上它所属的模块。
///
/// 动作配置本身不持有指向模块的引用，局部配置找不到时由这里回退到模块的全局配置。
#[derive(Debug, Clone)]
pub struct ActionMapping {
    config: Arc<ActionConfig>,
    module: Arc<ModuleConfig>,
}

impl ActionMapping {
    pub fn new(config: Arc<ActionConfig>, module: Arc<ModuleConfig>) -> Self {
        Self { config, module }
    }

    pub fn config(&self) -> &Arc<ActionConfig> {
        &self.config
    }

    pub fn module(&self) -> &Arc<ModuleConfig> {
        &self.module
    }

    /// 先查局部转发，再查模块的全局转发
    pub fn find_forward(&self, name: &str) -> Option<ForwardConfig> {
        self.config
            .find_forward_config(name)
            .or_else(|| self.module.find_forward_config(name))
            .cloned()
    }

    /// 局部与全局转发名的并集，局部优先、不重复
    pub fn find_forwards(&self) -> Vec<String> {
        let mut names: Vec<String> = vec![];
        let all = self
            .config
            .find_forward_configs()
            .iter()
            .chain(self.module.find_forward_configs());
        for forward in all {
            if let Some(name) = forward.name() {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        names
    }

    /// 按异常类型链查找异常配置：每一级先查局部、再查全局，然后才轮到父类型
    pub fn find_exception(&self, exception: &ActionException) -> Option<Arc<ExceptionConfig>> {
        exception.kinds().iter().find_map(|kind| {
            self.config
                .find_exception_config(kind)
                .or_else(|| self.module.find_exception_config(kind))
                .cloned()
        })
    }

    /// 校验失败或异常处理时的回退目标。
    ///
    /// 控制器配置了 `input_forward` 时 `input` 是转发名，否则是模块内的字面路径。
    pub fn input_forward(&self) -> Option<ForwardConfig> {
        let input = self.config.input()?;
        if self.module.controller_config().input_forward() {
            self.find_forward(input)
        } else {
            Some(ForwardConfig::unnamed(input))
        }
    }
}

impl Deref for ActionMapping {
    type Target = ActionConfig;

    fn deref(&self) -> &ActionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ControllerConfig, ModuleConfigBuilder};

    fn mapping(input_forward: bool) -> ActionMapping {
        let mut builder = ModuleConfigBuilder::new("");
        let mut controller = ControllerConfig::default();
        controller.set_input_forward(input_forward);
        builder.set_controller_config(controller);

        let mut save = ActionConfig::new("/save");
        save.set_input("edit");
        save.add_forward_config(ForwardConfig::new("success", "/local.html"));
        save.add_exception_config(ExceptionConfig::new("app.Specific", "error.local"));
        builder.add_action_config(save);
        builder.add_forward_config(ForwardConfig::new("success", "/global.html"));
        builder.add_forward_config(ForwardConfig::new("edit", "/edit.html"));
        builder.add_exception_config(ExceptionConfig::new("app.Specific", "error.global"));
        builder.add_exception_config(ExceptionConfig::new("app.Base", "error.base"));

        let module = Arc::new(builder.freeze());
        let config = module.find_action_config("/save").unwrap().clone();
        ActionMapping::new(config, module)
    }

    #[test]
    fn test_local_forward_precedes_global() {
        let mapping = mapping(false);
        assert_eq!(mapping.find_forward("success").unwrap().path(), "/local.html");
        assert_eq!(mapping.find_forward("edit").unwrap().path(), "/edit.html");
        assert!(mapping.find_forward("missing").is_none());
        assert_eq!(mapping.find_forwards(), vec!["success".to_string(), "edit".to_string()]);
    }

    #[test]
    fn test_exception_lookup_walks_kind_chain() {
        let mapping = mapping(false);
        let specific = ActionException::new("app.Specific", "x");
        assert_eq!(mapping.find_exception(&specific).unwrap().key(), Some("error.local"));

        let derived = ActionException::new("app.Derived", "x").extends("app.Base");
        assert_eq!(mapping.find_exception(&derived).unwrap().key(), Some("error.base"));

        let unrelated = ActionException::new("app.Other", "x");
        assert!(mapping.find_exception(&unrelated).is_none());
    }

    #[test]
    fn test_input_forward_modes() {
        let literal = mapping(false).input_forward().unwrap();
        assert_eq!(literal.path(), "edit");
        assert!(literal.name().is_none());

        let named = mapping(true).input_forward().unwrap();
        assert_eq!(named.path(), "/edit.html");
    }
}
