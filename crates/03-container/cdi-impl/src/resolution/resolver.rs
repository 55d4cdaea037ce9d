//! 通用类型安全解析器

use super::cache::{CacheStats, ResolutionCache};
use super::resolvable::Resolvable;
use super::strategy::{Candidate, MatchContext, MatchStrategy};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolutionKey {
    /// 匹配策略
    pub strategy: MatchStrategy,
    /// 解析请求
    pub resolvable: Resolvable,
}

/// 类型安全解析器
///
/// 候选集合按需惰性获取，只遍历一次且按标识去重。解析不会修改候选集合。
#[derive(Debug)]
pub struct TypeSafeResolver<T: Candidate> {
    cache: ResolutionCache<ResolutionKey, Arc<Vec<T>>>,
}

impl<T: Candidate> TypeSafeResolver<T> {
    /// 创建解析器，`cache_size` 为缓存上限
    pub fn new(name: &'static str, cache_size: usize) -> Self {
        Self {
            cache: ResolutionCache::new(name, cache_size),
        }
    }

    /// 解析匹配的候选项
    ///
    /// `cacheable` 由调用方断言；为假时结果既不读取也不写入缓存。
    pub fn resolve<I, F>(
        &self,
        strategy: MatchStrategy,
        resolvable: &Resolvable,
        cacheable: bool,
        ctx: &MatchContext<'_>,
        candidates: F,
    ) -> Arc<Vec<T>>
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = T>,
    {
        let key = ResolutionKey {
            strategy,
            resolvable: resolvable.clone(),
        };
        self.cache.get_or_compute(&key, cacheable, || {
            let mut seen = HashSet::new();
            let mut matched: Vec<T> = candidates()
                .into_iter()
                .filter(|c| seen.insert(c.candidate_id().clone()))
                .filter(|c| strategy.matches(ctx, resolvable, c.view()))
                .collect();
            strategy.finish(ctx, &mut matched);
            trace!("解析 {:?} {} 得到 {} 个结果", strategy, resolvable, matched.len());
            Arc::new(matched)
        })
    }

    /// 清空缓存
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// 已缓存的解析结果数
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    /// 缓存命中统计
    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::synthetic::SyntheticBean;
    use crate::manager::enablement::ModuleEnablement;
    use crate::resolution::{ResolutionEnvironment, ResolvableBuilder};
    use cdi_common::{AnnotationDefinition, AnnotationStore, ClassDefinition, QualifierInstance, ResolutionConfig, Type, TypeStore};
    use cdi_spi::Bean;

    fn env() -> ResolutionEnvironment {
        let types = Arc::new(TypeStore::new());
        types.register(ClassDefinition::interface("Vehicle"));
        types.register(ClassDefinition::new("Car").implements(Type::class("Vehicle")));
        types.register(ClassDefinition::new("Truck").implements(Type::class("Vehicle")));
        let annotations = Arc::new(AnnotationStore::new());
        annotations.register(AnnotationDefinition::qualifier("Heavy"));
        ResolutionEnvironment::new(types, annotations, &ResolutionConfig::default())
    }

    fn bean(env: &ResolutionEnvironment, class: &str, qualifiers: Vec<QualifierInstance>) -> Arc<dyn Bean> {
        let mut builder = SyntheticBean::builder("app", class).types(env.bean_types(&Type::class(class)));
        for q in qualifiers {
            builder = builder.qualifier(q);
        }
        builder.build()
    }

    #[test]
    fn test_resolve_by_type_and_qualifier() {
        let env = env();
        let enablement = ModuleEnablement::new();
        let specialized = HashSet::new();
        let ctx = MatchContext {
            types: env.types(),
            enablement: &enablement,
            specialized: &specialized,
        };
        let car = bean(&env, "Car", vec![]);
        let truck = bean(&env, "Truck", vec![QualifierInstance::of_type("Heavy")]);
        let pool = vec![car.clone(), truck.clone(), car.clone()];
        let resolver: TypeSafeResolver<Arc<dyn Bean>> = TypeSafeResolver::new("beans", 16);

        let vehicles = ResolvableBuilder::new(&env).for_type(&Type::class("Vehicle")).unwrap().build();
        let result = resolver.resolve(MatchStrategy::Bean, &vehicles, true, &ctx, || pool.clone());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), car.id());

        let heavy = ResolvableBuilder::new(&env)
            .for_type(&Type::class("Vehicle"))
            .unwrap()
            .add_qualifier(QualifierInstance::of_type("Heavy"))
            .unwrap()
            .build();
        let result = resolver.resolve(MatchStrategy::Bean, &heavy, true, &ctx, || pool.clone());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), truck.id());
        assert_eq!(resolver.cached_len(), 2);
    }

    #[test]
    fn test_cached_result_is_reused_until_cleared() {
        let env = env();
        let enablement = ModuleEnablement::new();
        let specialized = HashSet::new();
        let ctx = MatchContext {
            types: env.types(),
            enablement: &enablement,
            specialized: &specialized,
        };
        let resolver: TypeSafeResolver<Arc<dyn Bean>> = TypeSafeResolver::new("beans", 16);
        let query = ResolvableBuilder::new(&env).for_type(&Type::class("Car")).unwrap().build();

        let first = resolver.resolve(MatchStrategy::Bean, &query, true, &ctx, Vec::new);
        assert!(first.is_empty());

        let car = bean(&env, "Car", vec![]);
        let stale = resolver.resolve(MatchStrategy::Bean, &query, true, &ctx, || vec![car.clone()]);
        assert!(stale.is_empty());

        resolver.clear();
        let fresh = resolver.resolve(MatchStrategy::Bean, &query, true, &ctx, || vec![car.clone()]);
        assert_eq!(fresh.len(), 1);

        let uncached = resolver.resolve(MatchStrategy::Bean, &query, false, &ctx, Vec::new);
        assert!(uncached.is_empty());
    }

    #[test]
    fn test_invalidation_during_resolution_is_not_cached() {
        let env = env();
        let enablement = ModuleEnablement::new();
        let specialized = HashSet::new();
        let ctx = MatchContext {
            types: env.types(),
            enablement: &enablement,
            specialized: &specialized,
        };
        let resolver: TypeSafeResolver<Arc<dyn Bean>> = TypeSafeResolver::new("beans", 16);
        let query = ResolvableBuilder::new(&env).for_type(&Type::class("Car")).unwrap().build();

        // 取得候选快照后注册方清空了缓存
        let before = resolver.resolve(MatchStrategy::Bean, &query, true, &ctx, || {
            resolver.clear();
            Vec::<Arc<dyn Bean>>::new()
        });
        assert!(before.is_empty());
        assert_eq!(resolver.cached_len(), 0);

        let car = bean(&env, "Car", vec![]);
        let after = resolver.resolve(MatchStrategy::Bean, &query, true, &ctx, || vec![car.clone()]);
        assert_eq!(after.len(), 1);
        assert_eq!(resolver.cached_len(), 1);
    }

    #[test]
    fn test_same_class_with_different_qualifiers_are_distinct_candidates() {
        let env = env();
        let enablement = ModuleEnablement::new();
        let specialized = HashSet::new();
        let ctx = MatchContext {
            types: env.types(),
            enablement: &enablement,
            specialized: &specialized,
        };
        let plain = bean(&env, "Truck", vec![]);
        let heavy = bean(&env, "Truck", vec![QualifierInstance::of_type("Heavy")]);
        assert_ne!(plain.id(), heavy.id());

        let resolver: TypeSafeResolver<Arc<dyn Bean>> = TypeSafeResolver::new("beans", 16);
        let query = ResolvableBuilder::new(&env)
            .for_type(&Type::class("Vehicle"))
            .unwrap()
            .add_qualifier(QualifierInstance::of_type("Heavy"))
            .unwrap()
            .build();
        let result = resolver.resolve(MatchStrategy::Bean, &query, false, &ctx, || vec![plain.clone(), heavy.clone()]);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id(), heavy.id());
    }

    #[test]
    fn test_disabled_alternative_is_dropped() {
        let env = env();
        let alternative: Arc<dyn Bean> = SyntheticBean::builder("app", "Truck")
            .types(env.bean_types(&Type::class("Truck")))
            .alternative()
            .build();
        let query = ResolvableBuilder::new(&env).for_type(&Type::class("Vehicle")).unwrap().build();
        let resolver: TypeSafeResolver<Arc<dyn Bean>> = TypeSafeResolver::new("beans", 16);
        let specialized = HashSet::new();

        let disabled = ModuleEnablement::new();
        let ctx = MatchContext {
            types: env.types(),
            enablement: &disabled,
            specialized: &specialized,
        };
        assert!(resolver
            .resolve(MatchStrategy::Bean, &query, false, &ctx, || vec![alternative.clone()])
            .is_empty());

        let enabled = ModuleEnablement::new().with_alternative("Truck");
        let ctx = MatchContext {
            types: env.types(),
            enablement: &enabled,
            specialized: &specialized,
        };
        assert_eq!(
            resolver
                .resolve(MatchStrategy::Bean, &query, false, &ctx, || vec![alternative.clone()])
                .len(),
            1
        );
    }
}
