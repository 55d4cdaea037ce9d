//! 解析结果缓存
//!
//! 缓存按需填充，只能整体清空。条目数达到上限后不再写入新键。

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, trace};

/// 缓存统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// 命中次数
    pub hits: u64,
    /// 未命中次数
    pub misses: u64,
    /// 缓存项数量
    pub size: usize,
}

/// 解析结果缓存
///
/// 每次清空都会推进代数。计算开始后发生过清空的结果不会留在缓存中。
#[derive(Debug)]
pub struct ResolutionCache<K, V>
where
    K: Eq + Hash,
{
    name: &'static str,
    entries: DashMap<K, V>,
    max_size: usize,
    generation: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K, V> ResolutionCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// 创建最多保存 `max_size` 项的缓存
    pub fn new(name: &'static str, max_size: usize) -> Self {
        Self {
            name,
            entries: DashMap::new(),
            max_size,
            generation: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// 读取缓存值并记录命中统计
    pub fn get(&self, key: &K) -> Option<V> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 当前代数，每次清空加一
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// 写入结果；缓存已满时丢弃
    pub fn insert(&self, key: K, value: V) {
        if self.entries.len() >= self.max_size && !self.entries.contains_key(&key) {
            trace!("解析缓存已满，跳过写入: {}", self.name);
            return;
        }
        self.entries.insert(key, value);
    }

    /// 仅当 `generation` 之后没有发生清空时写入
    ///
    /// 写入后再次检查代数：清空若发生在检查之前，撤回本次写入；发生在检查之后，条目会被该次清空移除。
    pub fn insert_if_current(&self, key: K, value: V, generation: u64) -> bool {
        if self.generation() != generation {
            trace!("解析缓存已失效，丢弃结果: {}", self.name);
            return false;
        }
        self.insert(key.clone(), value);
        if self.generation() != generation {
            self.entries.remove(&key);
            trace!("解析缓存在写入期间失效，撤回结果: {}", self.name);
            return false;
        }
        true
    }

    /// 命中时返回缓存值，否则计算；`cacheable` 为假时既不读也不写
    pub fn get_or_compute(&self, key: &K, cacheable: bool, compute: impl FnOnce() -> V) -> V {
        if !cacheable {
            return compute();
        }
        if let Some(hit) = self.get(key) {
            return hit;
        }
        let generation = self.generation();
        let value = compute();
        self.insert_if_current(key.clone(), value.clone(), generation);
        value
    }

    /// 清空全部条目
    pub fn clear(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if !self.entries.is_empty() {
            debug!("清空解析缓存: {} ({} 项)", self.name, self.entries.len());
        }
        self.entries.clear();
    }

    /// 当前条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 缓存是否为空
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 命中统计
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            size: self.entries.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_compute() {
        let cache: ResolutionCache<String, usize> = ResolutionCache::new("test", 8);
        let mut calls = 0;
        let first = cache.get_or_compute(&"a".to_string(), true, || {
            calls += 1;
            1
        });
        let second = cache.get_or_compute(&"a".to_string(), true, || {
            calls += 1;
            2
        });
        assert_eq!((first, second), (1, 1));
        assert_eq!(calls, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_uncacheable_bypasses_cache() {
        let cache: ResolutionCache<String, usize> = ResolutionCache::new("test", 8);
        cache.get_or_compute(&"a".to_string(), false, || 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_clear_during_compute_discards_result() {
        let cache: ResolutionCache<String, usize> = ResolutionCache::new("test", 8);
        let value = cache.get_or_compute(&"a".to_string(), true, || {
            cache.clear();
            1
        });
        assert_eq!(value, 1);
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_compute(&"a".to_string(), true, || 2), 2);
        assert_eq!(cache.get(&"a".to_string()), Some(2));
    }

    #[test]
    fn test_insert_if_current() {
        let cache: ResolutionCache<u32, u32> = ResolutionCache::new("test", 8);
        let generation = cache.generation();
        cache.clear();
        assert!(!cache.insert_if_current(1, 1, generation));
        assert!(cache.is_empty());
        assert!(cache.insert_if_current(1, 1, cache.generation()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_bounded_size() {
        let cache: ResolutionCache<u32, u32> = ResolutionCache::new("test", 2);
        cache.insert(1, 1);
        cache.insert(2, 2);
        cache.insert(3, 3);
        assert_eq!(cache.len(), 2);
        assert!(cache.get(&3).is_none());
        cache.insert(1, 10);
        assert_eq!(cache.get(&1), Some(10));
        cache.clear();
        assert!(cache.is_empty());
    }
}
