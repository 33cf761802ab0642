use std::fs;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use log::{debug, info};
use lru::LruCache;

use crate::{exception::ConfigError, loader::load_module, model::ModuleConfig, util::lock};

const DEFAULT_CAPACITY: usize = 5;

#[derive(Clone)]
struct CacheEntry {
    module: Arc<ModuleConfig>,
    sources: Vec<String>,
    modified_times: Vec<SystemTime>,
}

/// 已冻结模块配置的缓存，定义文件的修改时间变化后条目失效
pub struct ConfigCache {
    cache: LruCache<String, CacheEntry>,
}

impl ConfigCache {
    // 根据容量构造，容量为0时使用默认值
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or_else(|| NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
        }
    }

    // 放入
    pub fn push(
        &mut self,
        prefix: &str,
        module: Arc<ModuleConfig>,
        sources: &[String],
        modified_times: Vec<SystemTime>,
    ) {
        let entry = CacheEntry {
            module,
            sources: sources.to_vec(),
            modified_times,
        };
        self.cache.put(prefix.to_string(), entry);
    }

    // 查询有效缓存：文件列表与每个文件的修改时间都一致才算命中
    pub fn find(
        &mut self,
        prefix: &str,
        sources: &[String],
        current_modified_times: &[SystemTime],
    ) -> Option<Arc<ModuleConfig>> {
        match self.cache.get(prefix) {
            Some(entry)
                if entry.sources == sources
                    && entry.modified_times == current_modified_times =>
            {
                Some(Arc::clone(&entry.module))
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }
}

/// 按需加载模块配置；定义文件未修改时直接复用已冻结的配置
pub struct ConfigProvider {
    cache: Mutex<ConfigCache>,
}

impl ConfigProvider {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: Mutex::new(ConfigCache::from_capacity(capacity)),
        }
    }

    pub fn load(&self, prefix: &str, sources: &[String]) -> Result<Arc<ModuleConfig>, ConfigError> {
        let modified_times = sources
            .iter()
            .map(|source| {
                fs::metadata(source)
                    .and_then(|m| m.modified())
                    .map_err(|e| ConfigError::Io(source.to_string(), e))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(module) = lock(&self.cache).find(prefix, sources, &modified_times) {
            debug!("模块'{}'命中配置缓存", prefix);
            return Ok(module);
        }

        let module = Arc::new(load_module(prefix, sources)?);
        lock(&self.cache).push(prefix, Arc::clone(&module), sources, modified_times);
        info!("模块'{}'的配置已写入缓存", prefix);
        Ok(module)
    }

    pub fn cached(&self) -> usize {
        lock(&self.cache).len()
    }
}
