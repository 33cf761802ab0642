// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 通配符动作匹配
//!
//! 模块冻结时，路径中含有未转义 `*` 的动作会被编译为正则表达式：
//!
//! | 模板片段 | 正则                |
//! |----------|---------------------|
//! | `**`     | `([A-z0-9/_-]+)`    |
//! | `*`      | `([A-z0-9_-]+)`     |
//! | `\*`     | 字面量 `*`          |
//!
//! 匹配按声明顺序进行，第一个命中的模板胜出。命中后克隆模板配置，
//! 把 `{0}`、`{1}`…… 依次替换为第一、第二……个捕获组的值，并把克隆体的路径设为实际请求路径。

use std::sync::Arc;

use log::{debug, warn};
use regex::Regex;

use crate::model::ActionConfig;

const MULTI_SEGMENT: &str = "([A-z0-9/_-]+)";
const SINGLE_SEGMENT: &str = "([A-z0-9_-]+)";

/// 已编译的通配符模板集合，构建后只读。
#[derive(Debug, Default)]
pub struct ActionMatcher {
    patterns: Vec<(Regex, Arc<ActionConfig>)>,
}

impl ActionMatcher {
    pub fn new(configs: &[Arc<ActionConfig>]) -> Self {
        let mut patterns = vec![];
        for config in configs.iter().filter(|c| c.is_wildcard()) {
            match compile_pattern(config.path()) {
                Ok(regex) => {
                    debug!("通配符动作{}编译为{}", config.path(), regex.as_str());
                    patterns.push((regex, Arc::clone(config)));
                }
                Err(e) => warn!("无法编译通配符动作{}：{}", config.path(), e),
            }
        }
        Self { patterns }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 为请求路径寻找通配符动作，返回替换完参数的独立克隆体。
    pub fn match_path(&self, path: &str) -> Option<Arc<ActionConfig>> {
        if self.patterns.is_empty() {
            return None;
        }
        let stripped = path.strip_prefix('/').unwrap_or(path);
        for (regex, template) in &self.patterns {
            let captures = match regex.captures(stripped) {
                Some(c) => c,
                None => continue,
            };
            let vars: Vec<String> = captures
                .iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect();
            debug!("路径{}匹配通配符动作{}，参数：{:?}", path, template.path(), vars);
            return Some(Arc::new(convert_action_config(stripped, template, &vars)));
        }
        None
    }
}

/// 将动作路径模板翻译为锚定的正则表达式，模板的前导 `/` 不参与匹配
fn compile_pattern(path: &str) -> Result<Regex, regex::Error> {
    let template = path.strip_prefix('/').unwrap_or(path);
    let mut pattern = String::from("^");
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) => pattern.push_str(&regex::escape(&escaped.to_string())),
                None => pattern.push_str(&regex::escape("\\")),
            },
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    pattern.push_str(MULTI_SEGMENT);
                } else {
                    pattern.push_str(SINGLE_SEGMENT);
                }
            }
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
}

fn convert_action_config(path: &str, template: &ActionConfig, vars: &[String]) -> ActionConfig {
    let mut config = template.clone();
    config.set_path(&format!("/{}", path));
    config.substitute_with(|value| replace_placeholders(value, vars));
    config
}

fn replace_placeholders(value: &str, vars: &[String]) -> String {
    if !value.contains('{') {
        return value.to_string();
    }
    let mut result = value.to_string();
    for (index, var) in vars.iter().enumerate() {
        result = result.replace(&format!("{{{}}}", index), var);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExceptionConfig, ForwardConfig};
    use proptest::prelude::*;
    use std::thread;

    fn edit_template() -> ActionConfig {
        let mut config = ActionConfig::new("/user/*/edit");
        config.set_action_type("user.{0}.EditAction");
        config.set_name("form{0}");
        config.set_attribute("attr{0}");
        config.set_parameter("id={0}");
        config.set_roles("owner-{0}, admin");
        config.set_input("/user/{0}/form.html");
        config.set_forward("/fwd/{0}");
        config.set_include("/inc/{0}");
        config.add_forward_config(ForwardConfig::new("success", "/user/{0}/done.html"));
        config.add_exception_config(ExceptionConfig::new("app.Failure", "error.{0}"));
        config
    }

    fn matcher(configs: Vec<ActionConfig>) -> ActionMatcher {
        let configs: Vec<Arc<ActionConfig>> = configs.into_iter().map(Arc::new).collect();
        ActionMatcher::new(&configs)
    }

    #[test]
    fn test_single_wildcard_substitution() {
        let matcher = matcher(vec![edit_template()]);
        let config = matcher.match_path("/user/42/edit").unwrap();

        assert_eq!(config.path(), "/user/42/edit");
        assert_eq!(config.action_type(), Some("user.42.EditAction"));
        assert_eq!(config.name(), Some("form42"));
        assert_eq!(config.attribute(), Some("attr42"));
        assert_eq!(config.parameter(), Some("id=42"));
        assert_eq!(config.role_names(), &["owner-42", "admin"]);
        assert_eq!(config.input(), Some("/user/42/form.html"));
        assert_eq!(config.forward(), Some("/fwd/42"));
        assert_eq!(config.include(), Some("/inc/42"));
        assert_eq!(
            config.find_forward_config("success").unwrap().path(),
            "/user/42/done.html"
        );
        // 异常配置按引用共享，不做替换
        assert_eq!(
            config.find_exception_config("app.Failure").unwrap().key(),
            Some("error.{0}")
        );
    }

    #[test]
    fn test_exception_configs_are_shared() {
        let template = Arc::new(edit_template());
        let matcher = ActionMatcher::new(&[Arc::clone(&template)]);
        let config = matcher.match_path("/user/7/edit").unwrap();
        assert!(Arc::ptr_eq(
            config.find_exception_config("app.Failure").unwrap(),
            template.find_exception_config("app.Failure").unwrap()
        ));
    }

    #[test]
    fn test_single_star_does_not_cross_segments() {
        let matcher = matcher(vec![ActionConfig::new("/user/*")]);
        assert!(matcher.match_path("/user/42").is_some());
        assert!(matcher.match_path("/user/42/edit").is_none());
        assert!(matcher.match_path("/user/").is_none());
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let mut template = ActionConfig::new("/files/**");
        template.set_parameter("{0}");
        let matcher = matcher(vec![template]);
        let config = matcher.match_path("/files/a/b/c").unwrap();
        assert_eq!(config.parameter(), Some("a/b/c"));
    }

    #[test]
    fn test_multiple_groups_in_order() {
        let mut template = ActionConfig::new("/*/*");
        template.set_action_type("{1}.{0}");
        let matcher = matcher(vec![template]);
        let config = matcher.match_path("/shop/cart").unwrap();
        assert_eq!(config.action_type(), Some("cart.shop"));
    }

    #[test]
    fn test_first_declared_pattern_wins() {
        let mut general = ActionConfig::new("/*/edit");
        general.set_parameter("general");
        let mut specific = ActionConfig::new("/user/*");
        specific.set_parameter("specific");
        let matcher = matcher(vec![general, specific]);
        let config = matcher.match_path("/user/edit").unwrap();
        assert_eq!(config.parameter(), Some("general"));
    }

    #[test]
    fn test_escaped_star_and_literal_dots() {
        let matcher = matcher(vec![ActionConfig::new("/a\\*b/*.do")]);
        assert!(matcher.match_path("/a*b/list.do").is_some());
        assert!(matcher.match_path("/aXb/list.do").is_none());
        assert!(matcher.match_path("/a*b/listXdo").is_none());
    }

    #[test]
    fn test_non_wildcard_configs_are_ignored() {
        let matcher = matcher(vec![ActionConfig::new("/plain")]);
        assert!(matcher.is_empty());
        assert!(matcher.match_path("/plain").is_none());
    }

    #[test]
    fn test_path_without_leading_slash() {
        let matcher = matcher(vec![edit_template()]);
        let config = matcher.match_path("user/9/edit").unwrap();
        assert_eq!(config.path(), "/user/9/edit");
    }

    #[test]
    fn test_concurrent_matches_are_independent() {
        let matcher = Arc::new(matcher(vec![edit_template()]));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let matcher = Arc::clone(&matcher);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let config = matcher.match_path(&format!("/user/{}/edit", i)).unwrap();
                        assert_eq!(config.parameter(), Some(format!("id={}", i).as_str()));
                        assert_eq!(config.path(), format!("/user/{}/edit", i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    proptest! {
        #[test]
        fn prop_substitution_uses_literal_segment(segment in "[a-z0-9_-]{1,12}") {
            let matcher = matcher(vec![edit_template()]);
            let path = format!("/user/{}/edit", segment);
            let config = matcher.match_path(&path).unwrap();
            prop_assert_eq!(config.path(), path.as_str());
            let expected = format!("id={}", segment);
            prop_assert_eq!(config.parameter(), Some(expected.as_str()));
        }
    }
}
