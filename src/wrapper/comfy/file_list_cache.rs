//! 文件列表缓存
//!
//! folder_paths 文件枚举结果的进程级缓存, 以目录修改时间判断失效

use std::{
    collections::BTreeMap,
    sync::{Arc, OnceLock, RwLock},
};

use log::error;

use crate::{core::utils::directory::get_mtime, error::Error};

// 全局文件列表缓存实例
static FILE_LIST_CACHE: OnceLock<Arc<RwLock<BTreeMap<String, CacheEntry>>>> = OnceLock::new();

fn cache() -> &'static Arc<RwLock<BTreeMap<String, CacheEntry>>> {
    FILE_LIST_CACHE.get_or_init(|| Arc::new(RwLock::new(BTreeMap::new())))
}

// 缓存项结构
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// 文件列表
    pub files: Vec<String>,
    /// 目录修改时间
    pub dir_mtimes: BTreeMap<String, f64>,
    /// 时间戳
    pub timestamp: f64,
}

impl CacheEntry {
    /// 检查缓存是否有效
    ///
    /// 任一记录目录的修改时间与缓存值不一致即失效
    pub fn is_valid(&self) -> bool {
        for (dir, cached_time) in &self.dir_mtimes {
            let current_mtime = match get_mtime(dir) {
                Ok(v) => v,
                Err(e) => {
                    error!("get mtime failed, {e}");
                    return false;
                }
            };
            if (current_mtime - cached_time).abs() > f64::EPSILON {
                return false;
            }
        }
        true
    }
}

// 文件列表缓存
#[derive(Default)]
pub struct FileListCache;

impl FileListCache {
    /// 更新文件名缓存
    pub fn set(&self, key: String, entry: CacheEntry) -> Result<(), Error> {
        let mut cache_guard = cache()
            .write()
            .map_err(|e| Error::LockError(e.to_string()))?;
        cache_guard.insert(key, entry);

        Ok(())
    }

    /// 获取文件名缓存
    pub fn get(&self, key: &str) -> Result<Option<CacheEntry>, Error> {
        let cache_guard = cache().read().map_err(|e| Error::LockError(e.to_string()))?;
        Ok(cache_guard.get(key).cloned())
    }

    /// 检查缓存是否有效
    pub fn is_valid(&self, key: &str) -> bool {
        match self.get(key) {
            Ok(Some(cache_entry)) => cache_entry.is_valid(),
            Ok(None) | Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() -> anyhow::Result<()> {
        let entry = CacheEntry {
            files: vec!["sd15.safetensors".to_string()],
            dir_mtimes: BTreeMap::new(),
            timestamp: 1.0,
        };
        FileListCache.set("test_set_then_get".to_string(), entry)?;

        let cached = FileListCache.get("test_set_then_get")?;
        assert_eq!(
            cached.map(|v| v.files),
            Some(vec!["sd15.safetensors".to_string()])
        );
        Ok(())
    }

    #[test]
    fn test_missing_key_is_invalid() {
        assert!(!FileListCache.is_valid("never_inserted"));
    }

    #[test]
    fn test_entry_without_dirs_is_valid() {
        let entry = CacheEntry {
            files: Vec::new(),
            dir_mtimes: BTreeMap::new(),
            timestamp: 0.0,
        };
        assert!(entry.is_valid());
    }

    #[test]
    fn test_entry_with_missing_dir_is_invalid() {
        let mut dir_mtimes = BTreeMap::new();
        dir_mtimes.insert("no_such_directory_here".to_string(), 1.0);
        let entry = CacheEntry {
            files: Vec::new(),
            dir_mtimes,
            timestamp: 0.0,
        };
        assert!(!entry.is_valid());
    }
}
