// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 会话模块
//!
//! 会话属性只属于单个用户，内部用互斥锁保护；`SessionStore` 以 LRU 方式限制同时保存的会话数量。

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::debug;
use lru::LruCache;
use uuid::Uuid;

use crate::{request::Attribute, util::lock};

#[derive(Debug)]
pub struct Session {
    id: String,
    created: DateTime<Utc>,
    attributes: Mutex<HashMap<String, Attribute>>,
}

impl Session {
    pub fn new() -> Self {
        Self::with_id(&Uuid::new_v4().simple().to_string())
    }

    pub fn with_id(id: &str) -> Self {
        Self {
            id: id.to_string(),
            created: Utc::now(),
            attributes: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn attribute(&self, key: &str) -> Option<Attribute> {
        lock(&self.attributes).get(key).cloned()
    }

    pub fn set_attribute(&self, key: &str, value: Attribute) {
        lock(&self.attributes).insert(key.to_string(), value);
    }

    pub fn remove_attribute(&self, key: &str) -> Option<Attribute> {
        lock(&self.attributes).remove(key)
    }

    pub fn attribute_names(&self) -> Vec<String> {
        lock(&self.attributes).keys().cloned().collect()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// 以会话 ID 为键的会话存储
pub struct SessionStore {
    sessions: Mutex<LruCache<String, Arc<Session>>>,
}

impl SessionStore {
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = match NonZeroUsize::new(capacity) {
            Some(c) => c,
            None => panic!("调用from_capacity时指定的大小是0"),
        };
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn find(&self, id: &str) -> Option<Arc<Session>> {
        lock(&self.sessions).get(id).cloned()
    }

    pub fn insert(&self, session: Arc<Session>) {
        debug!("保存会话{}", session.id());
        lock(&self.sessions).put(session.id().to_string(), session);
    }

    pub fn remove(&self, id: &str) {
        lock(&self.sessions).pop(id);
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
