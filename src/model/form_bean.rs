// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

/// 动态表单中一个属性的声明
#[derive(Debug, Clone, PartialEq)]
pub struct FormPropertyConfig {
    name: String,
    property_type: String,
    initial: Option<String>,
    size: usize,
}

impl FormPropertyConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            property_type: "string".to_string(),
            initial: None,
            size: 0,
        }
    }

    pub fn set_property_type(&mut self, property_type: &str) {
        self.property_type = property_type.to_string();
    }

    pub fn set_initial(&mut self, initial: &str) {
        self.initial = Some(initial.to_string());
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property_type(&self) -> &str {
        &self.property_type
    }

    /// 类型名以 `[]` 结尾的属性可以接收多个值
    pub fn is_indexed(&self) -> bool {
        self.property_type.ends_with("[]")
    }

    pub fn initial(&self) -> Option<&str> {
        self.initial.as_deref()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 表单重置时使用的初始值
    pub fn initial_values(&self) -> Vec<String> {
        match &self.initial {
            Some(initial) if self.is_indexed() => initial
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
            Some(initial) => vec![initial.clone()],
            None if self.is_indexed() => vec![String::new(); self.size],
            None => vec![],
        }
    }
}

/// 表单的声明：名字、类型与（动态表单的）属性列表。
#[derive(Debug, Clone, PartialEq)]
pub struct FormBeanConfig {
    name: String,
    form_type: String,
    dynamic: bool,
    properties: Vec<FormPropertyConfig>,
}

impl FormBeanConfig {
    pub fn new(name: &str, form_type: &str) -> Self {
        Self {
            name: name.to_string(),
            form_type: form_type.to_string(),
            dynamic: false,
            properties: vec![],
        }
    }

    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.dynamic = dynamic;
    }

    /// 同名属性会被替换
    pub fn add_property(&mut self, property: FormPropertyConfig) {
        self.properties.retain(|p| p.name() != property.name());
        self.properties.push(property);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn form_type(&self) -> &str {
        &self.form_type
    }

    pub fn dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn find_property(&self, name: &str) -> Option<&FormPropertyConfig> {
        self.properties.iter().find(|p| p.name() == name)
    }

    pub fn properties(&self) -> &[FormPropertyConfig] {
        &self.properties
    }
}
