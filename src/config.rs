// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

use std::fs;

use log::{info, warn};
use serde_derive::Deserialize;
use serde_derive::Serialize;

use crate::{
    exception::ConfigError,
    param::{DEFAULT_MAX_FORWARD_DEPTH, MAX_FORWARD_DEPTH_LIMIT},
};

/// 一个模块的声明：URL 前缀与组成该模块的定义文件
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModuleSource {
    #[serde(default)]
    prefix: String,
    config: Vec<String>,
}

impl ModuleSource {
    pub fn new(prefix: &str, config: &[&str]) -> Self {
        Self {
            prefix: prefix.to_string(),
            config: config.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn config(&self) -> &[String] {
        &self.config
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ServerConfig {
    www_root: String,
    port: u16,
    worker_threads: usize,
    cache_size: usize,
    local: bool,
    #[serde(default = "default_session_capacity")]
    session_capacity: usize,
    #[serde(default)]
    context_path: String,
    #[serde(default = "default_action_extension")]
    action_extension: String,
    #[serde(default = "default_max_forward_depth")]
    max_forward_depth: usize,
    #[serde(default)]
    modules: Vec<ModuleSource>,
}

fn default_session_capacity() -> usize {
    1024
}

fn default_action_extension() -> String {
    "do".to_string()
}

fn default_max_forward_depth() -> usize {
    DEFAULT_MAX_FORWARD_DEPTH
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self {
            www_root: "www".to_string(),
            port: 7878,
            worker_threads: 0,
            cache_size: 5,
            local: true,
            session_capacity: default_session_capacity(),
            context_path: String::new(),
            action_extension: default_action_extension(),
            max_forward_depth: default_max_forward_depth(),
            modules: vec![ModuleSource::new("", &["config/modules/default.toml"])],
        }
    }

    pub fn from_toml(filename: &str) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(filename).map_err(|e| ConfigError::Io(filename.to_string(), e))?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| ConfigError::Parse(filename.to_string(), e))?;
        info!("已从{}载入服务器配置", filename);
        Ok(config)
    }

    /// 解析配置文本，并把需要自动推导的值补齐
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        let mut raw_config: ServerConfig = toml::from_str(content)?;
        if raw_config.worker_threads == 0 {
            raw_config.worker_threads = num_cpus::get();
        }
        if raw_config.cache_size == 0 {
            warn!("cache_size被设置为0，但目前尚不支持禁用缓存，因此该值将被改为5。");
            raw_config.cache_size = 5;
        }
        if raw_config.session_capacity == 0 {
            warn!("session_capacity被设置为0，该值将被改为{}。", default_session_capacity());
            raw_config.session_capacity = default_session_capacity();
        }
        if raw_config.max_forward_depth == 0 {
            warn!("max_forward_depth被设置为0，该值将被改为{}。", DEFAULT_MAX_FORWARD_DEPTH);
            raw_config.max_forward_depth = DEFAULT_MAX_FORWARD_DEPTH;
        } else if raw_config.max_forward_depth > MAX_FORWARD_DEPTH_LIMIT {
            warn!(
                "max_forward_depth={}超过上限，该值将被改为{}。",
                raw_config.max_forward_depth, MAX_FORWARD_DEPTH_LIMIT
            );
            raw_config.max_forward_depth = MAX_FORWARD_DEPTH_LIMIT;
        }
        raw_config.context_path = raw_config.context_path.trim_end_matches('/').to_string();
        raw_config.action_extension = raw_config.action_extension.trim_start_matches('.').to_string();
        Ok(raw_config)
    }
}

impl ServerConfig {
    pub fn www_root(&self) -> &str {
        &self.www_root
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn worker_threads(&self) -> usize {
        self.worker_threads
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn local(&self) -> bool {
        self.local
    }

    pub fn session_capacity(&self) -> usize {
        self.session_capacity
    }

    pub fn context_path(&self) -> &str {
        &self.context_path
    }

    /// 动作路径的扩展名，不含点；为空表示所有路径都交给动作处理
    pub fn action_extension(&self) -> &str {
        &self.action_extension
    }

    pub fn max_forward_depth(&self) -> usize {
        self.max_forward_depth
    }

    pub fn modules(&self) -> &[ModuleSource] {
        &self.modules
    }
}
