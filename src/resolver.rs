// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 模块选择
//!
//! 根据请求路径的前缀选择模块：从最长的 `/` 分隔前缀开始逐级缩短，
//! 第一个出现在已配置前缀中的即为当前模块，都不匹配时使用默认模块（空前缀）。

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::{
    messages::MessageResources,
    model::ModuleConfig,
    param::*,
    request::{Attribute, Request},
};

#[derive(Default)]
pub struct ModuleResolver {
    modules: HashMap<String, Arc<ModuleConfig>>,
    resources: HashMap<String, Arc<dyn MessageResources>>,
}

impl fmt::Debug for ModuleResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleResolver")
            .field("prefixes", &self.prefixes())
            .finish()
    }
}

impl ModuleResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册模块及其默认消息资源，相同前缀的旧模块被替换
    pub fn add_module(&mut self, module: Arc<ModuleConfig>, resources: Option<Arc<dyn MessageResources>>) {
        let prefix = module.prefix().to_string();
        match resources {
            Some(resources) => {
                self.resources.insert(prefix.clone(), resources);
            }
            None => {
                self.resources.remove(&prefix);
            }
        }
        self.modules.insert(prefix, module);
    }

    pub fn prefixes(&self) -> Vec<&str> {
        let mut prefixes: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        prefixes.sort_unstable();
        prefixes
    }

    pub fn module(&self, prefix: &str) -> Option<&Arc<ModuleConfig>> {
        self.modules.get(prefix)
    }

    pub fn modules(&self) -> impl Iterator<Item = &Arc<ModuleConfig>> {
        self.modules.values()
    }

    pub fn resources(&self, prefix: &str) -> Option<&Arc<dyn MessageResources>> {
        self.resources.get(prefix)
    }

    /// 路径所属模块的前缀，没有匹配的非默认模块时返回空字符串。
    ///
    /// `/admin/users/list` 依次尝试 `admin/users`、`admin`。
    pub fn module_prefix(&self, path: &str) -> &str {
        if !path.starts_with('/') {
            return "";
        }
        let mut end = path.rfind('/').unwrap_or(0);
        while end > 0 {
            let candidate = &path[1..end];
            if let Some((prefix, _)) = self.modules.get_key_value(candidate) {
                return prefix;
            }
            end = path[..end].rfind('/').unwrap_or(0);
        }
        ""
    }

    /// 为请求选择模块，并把模块配置与其默认消息资源保存为请求属性。
    pub fn select_module(&self, request: &mut Request) -> Option<Arc<ModuleConfig>> {
        let prefix = self.module_prefix(request.path_info()).to_string();
        let module = match self.modules.get(&prefix) {
            Some(module) => Arc::clone(module),
            None => {
                request.remove_attribute(MODULE_KEY);
                request.remove_attribute(MESSAGES_KEY);
                return None;
            }
        };
        debug!(
            "[ID{}]路径{}选择模块'{}'",
            request.id(),
            request.path_info(),
            prefix
        );
        request.set_attribute(MODULE_KEY, Attribute::Module(Arc::clone(&module)));
        match self.resources.get(&prefix) {
            Some(resources) => {
                request.set_attribute(MESSAGES_KEY, Attribute::Resources(Arc::clone(resources)))
            }
            None => {
                request.remove_attribute(MESSAGES_KEY);
            }
        }
        Some(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::PropertyMessageResources;
    use crate::model::ModuleConfigBuilder;

    fn resolver(prefixes: &[&str]) -> ModuleResolver {
        let mut resolver = ModuleResolver::new();
        for prefix in prefixes {
            let resources = PropertyMessageResources::new(false);
            resolver.add_module(
                Arc::new(ModuleConfigBuilder::new(prefix).freeze()),
                Some(Arc::new(resources)),
            );
        }
        resolver
    }

    #[test]
    fn test_select_named_module() {
        let resolver = resolver(&["", "admin", "other"]);
        let mut request = Request::new(HttpRequestMethod::Get, "/admin/users");
        let module = resolver.select_module(&mut request).unwrap();
        assert_eq!(module.prefix(), "admin");
        assert_eq!(
            request.attribute(MODULE_KEY).and_then(Attribute::as_module).unwrap().prefix(),
            "admin"
        );
        assert!(request.attribute(MESSAGES_KEY).and_then(Attribute::as_resources).is_some());
    }

    #[test]
    fn test_unknown_prefix_selects_default() {
        let resolver = resolver(&["", "admin", "other"]);
        let mut request = Request::new(HttpRequestMethod::Get, "/unknown/x");
        assert_eq!(resolver.select_module(&mut request).unwrap().prefix(), "");
    }

    #[test]
    fn test_longest_prefix_wins() {
        let resolver = resolver(&["", "shop", "shop/admin"]);
        assert_eq!(resolver.module_prefix("/shop/admin/list"), "shop/admin");
        assert_eq!(resolver.module_prefix("/shop/list"), "shop");
        assert_eq!(resolver.module_prefix("/shop"), "");
        assert_eq!(resolver.module_prefix("/"), "");
        assert_eq!(resolver.module_prefix(""), "");
        assert_eq!(resolver.module_prefix("/shopping/list"), "");
    }

    #[test]
    fn test_missing_default_module() {
        let resolver = resolver(&["admin"]);
        let mut request = Request::new(HttpRequestMethod::Get, "/index");
        request.set_attribute(MODULE_KEY, Attribute::Flag(true));
        assert!(resolver.select_module(&mut request).is_none());
        assert!(request.attribute(MODULE_KEY).is_none());
    }

    #[test]
    fn test_prefixes_are_sorted() {
        let resolver = resolver(&["other", "", "admin"]);
        assert_eq!(resolver.prefixes(), vec!["", "admin", "other"]);
    }
}
