// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 配置模型
//!
//! 一个模块的静态路由图：控制器开关、动作、表单、转发与异常配置。
//!
//! 配置在加载阶段通过 [`ModuleConfigBuilder`] 构建，冻结后成为只读的 [`ModuleConfig`]，
//! 嵌套配置以 `Arc` 共享，请求处理期间不会再被修改。

mod action;
mod controller;
mod exception;
mod form_bean;
mod forward;
mod mapping;
mod module;

pub use action::ActionConfig;
pub use controller::ControllerConfig;
pub use exception::ExceptionConfig;
pub use form_bean::{FormBeanConfig, FormPropertyConfig};
pub use forward::ForwardConfig;
pub use mapping::ActionMapping;
pub use module::{
    DataSourceConfig, MessageResourcesConfig, ModuleConfig, ModuleConfigBuilder, PlugInConfig,
};
