//! 组件歧义消解

use super::cache::ResolutionCache;
use cdi_common::BeanIdentifier;
use cdi_spi::Bean;
use std::sync::Arc;

type BeanSet = Arc<Vec<Arc<dyn Bean>>>;

/// 在多个匹配组件中选出唯一组件
///
/// 只有一个备选组件时选它；多个备选组件时选 `@Priority` 最高者，
/// 任一备选组件没有优先级或最高优先级并列时无法消解。
#[derive(Debug)]
pub struct BeanDisambiguator {
    cache: ResolutionCache<Vec<BeanIdentifier>, BeanSet>,
}

impl BeanDisambiguator {
    /// 创建
    pub fn new(cache_size: usize) -> Self {
        Self {
            cache: ResolutionCache::new("disambiguation", cache_size),
        }
    }

    /// 消解歧义；无法消解时原样返回
    pub fn resolve(&self, beans: &BeanSet) -> BeanSet {
        if beans.len() <= 1 {
            return beans.clone();
        }
        let mut key: Vec<BeanIdentifier> = beans.iter().map(|b| b.id().clone()).collect();
        key.sort();
        self.cache.get_or_compute(&key, true, || Self::disambiguate(beans))
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.cache.clear();
    }

    fn disambiguate(beans: &BeanSet) -> BeanSet {
        let alternatives: Vec<&Arc<dyn Bean>> = beans.iter().filter(|b| b.is_alternative()).collect();
        match alternatives.len() {
            0 => beans.clone(),
            1 => Arc::new(vec![alternatives[0].clone()]),
            _ => {
                let priorities: Option<Vec<i32>> = alternatives.iter().map(|b| b.priority()).collect();
                let Some(priorities) = priorities else {
                    return beans.clone();
                };
                let Some(highest) = priorities.iter().copied().max() else {
                    return beans.clone();
                };
                let winners: Vec<Arc<dyn Bean>> = alternatives
                    .iter()
                    .zip(priorities)
                    .filter(|(_, p)| *p == highest)
                    .map(|(b, _)| (*b).clone())
                    .collect();
                if winners.len() == 1 {
                    Arc::new(winners)
                } else {
                    beans.clone()
                }
            }
        }
    }
}
