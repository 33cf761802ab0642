// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 消息与本地化模块
//!
//! - [`ActionMessage`] / [`ActionMessages`]：校验与异常处理产生的错误报告，按属性名有序保存。
//! - [`MessageResources`]：本地化消息提供者，只用于生成人类可读的诊断文本，不参与分发逻辑。
//! - [`PropertyMessageResources`]：基于 TOML 消息表的默认实现，支持 `{N}` 参数替换与区域回退链。

use std::collections::HashMap;

use log::warn;

/// 与具体表单字段无关的全局消息使用的属性名
pub const GLOBAL_MESSAGE: &str = "actionweb.action.GLOBAL_MESSAGE";

/// 一条待本地化的消息：资源键加替换参数
#[derive(Debug, Clone, PartialEq)]
pub struct ActionMessage {
    key: String,
    values: Vec<String>,
}

impl ActionMessage {
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            values: vec![],
        }
    }

    pub fn with_values(key: &str, values: Vec<String>) -> Self {
        Self {
            key: key.to_string(),
            values,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// 错误报告：属性名到消息的有序集合。
///
/// 为空表示校验通过。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionMessages {
    entries: Vec<(String, ActionMessage)>,
}

impl ActionMessages {
    pub fn new() -> Self {
        Self { entries: vec![] }
    }

    /// 只包含一条消息的错误报告
    pub fn single(property: &str, message: ActionMessage) -> Self {
        let mut messages = Self::new();
        messages.add(property, message);
        messages
    }

    pub fn add(&mut self, property: &str, message: ActionMessage) {
        self.entries.push((property.to_string(), message));
    }

    /// 合并另一份错误报告，保持各自的插入顺序
    pub fn extend(&mut self, other: ActionMessages) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 指定属性下的全部消息
    pub fn get(&self, property: &str) -> Vec<&ActionMessage> {
        self.entries
            .iter()
            .filter(|(p, _)| p == property)
            .map(|(_, m)| m)
            .collect()
    }

    /// 出现过的属性名，按首次出现的顺序
    pub fn properties(&self) -> Vec<&str> {
        let mut properties: Vec<&str> = vec![];
        for (p, _) in &self.entries {
            if !properties.contains(&p.as_str()) {
                properties.push(p);
            }
        }
        properties
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ActionMessage)> {
        self.entries.iter().map(|(p, m)| (p.as_str(), m))
    }
}

/// 本地化消息提供者。
#[cfg_attr(test, mockall::automock)]
pub trait MessageResources: Send + Sync {
    /// 按区域查找消息并替换 `{0}`..`{N}` 参数；找不到时的行为由实现决定。
    fn message<'a>(&self, locale: Option<&'a str>, key: &str, args: &[String]) -> Option<String>;

    fn is_present<'a>(&self, locale: Option<&'a str>, key: &str) -> bool {
        self.message(locale, key, &[]).is_some()
    }
}

/// 基于内存消息表的消息资源。
///
/// 区域名统一规范为 `ll_CC` 形式；查找顺序为 `en_US` → `en` → 默认表（空区域名）。
#[derive(Debug, Clone, Default)]
pub struct PropertyMessageResources {
    bundles: HashMap<String, HashMap<String, String>>,
    return_null: bool,
}

impl PropertyMessageResources {
    pub fn new(return_null: bool) -> Self {
        Self {
            bundles: HashMap::new(),
            return_null,
        }
    }

    /// 从 TOML 文本构建。
    ///
    /// 顶层的字符串键属于默认表，顶层的表以区域名为键：
    ///
    /// ```toml
    /// "error.internal" = "Internal error"
    ///
    /// [zh_CN]
    /// "error.internal" = "服务器内部错误"
    /// ```
    pub fn from_toml(content: &str, return_null: bool) -> Result<Self, toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let mut resources = Self::new(return_null);
        for (name, value) in table {
            match value {
                toml::Value::String(text) => resources.add_message("", &name, &text),
                toml::Value::Table(section) => {
                    for (key, value) in section {
                        match value {
                            toml::Value::String(text) => resources.add_message(&name, &key, &text),
                            other => warn!("消息表{}中的键{}不是字符串：{}", name, key, other),
                        }
                    }
                }
                other => warn!("消息表中的键{}不是字符串或表：{}", name, other),
            }
        }
        Ok(resources)
    }

    pub fn add_message(&mut self, locale: &str, key: &str, text: &str) {
        self.bundles
            .entry(normalize_locale(locale))
            .or_default()
            .insert(key.to_string(), text.to_string());
    }

    fn lookup(&self, locale: &str, key: &str) -> Option<&String> {
        locale_chain(locale)
            .iter()
            .find_map(|l| self.bundles.get(l).and_then(|b| b.get(key)))
    }
}

impl MessageResources for PropertyMessageResources {
    fn message<'a>(&self, locale: Option<&'a str>, key: &str, args: &[String]) -> Option<String> {
        let locale = normalize_locale(locale.unwrap_or(""));
        match self.lookup(&locale, key) {
            Some(template) => Some(format_message(template, args)),
            None if self.return_null => None,
            None => Some(format!("???{}.{}???", locale, key)),
        }
    }

    fn is_present<'a>(&self, locale: Option<&'a str>, key: &str) -> bool {
        let locale = normalize_locale(locale.unwrap_or(""));
        self.lookup(&locale, key).is_some()
    }
}

/// `en-us` / `en_US` → `en_US`
pub fn normalize_locale(locale: &str) -> String {
    let locale = locale.trim().replace('-', "_");
    match locale.split_once('_') {
        Some((language, country)) => {
            format!("{}_{}", language.to_lowercase(), country.to_uppercase())
        }
        None => locale.to_lowercase(),
    }
}

fn locale_chain(locale: &str) -> Vec<String> {
    let mut chain = vec![];
    let mut current = locale.to_string();
    while !current.is_empty() {
        chain.push(current.clone());
        current = match current.rfind('_') {
            Some(index) => current[..index].to_string(),
            None => String::new(),
        };
    }
    chain.push(String::new());
    chain
}

/// 将模板中的 `{N}` 替换为第 N 个参数，缺失的参数保持原样
pub fn format_message(template: &str, args: &[String]) -> String {
    let mut result = template.to_string();
    for (index, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", index), arg);
    }
    result
}
