//! 类型安全解析
//!
//! 解析请求由 [`Resolvable`] 描述，[`TypeSafeResolver`] 按 [`MatchStrategy`] 在候选集合中
//! 查找匹配项并缓存结果。

pub mod assignability;
pub mod cache;
pub mod disambiguation;
pub mod resolvable;
pub mod resolver;
pub mod strategy;

pub use assignability::AssignabilityRules;
pub use cache::{CacheStats, ResolutionCache};
pub use disambiguation::BeanDisambiguator;
pub use resolvable::{Resolvable, ResolvableBuilder, ResolutionMode};
pub use resolver::{ResolutionKey, TypeSafeResolver};
pub use strategy::{Candidate, CandidateView, MatchContext, MatchStrategy};

use cdi_common::{AnnotationStore, ClassName, ResolutionConfig, Type, TypeStore};
use std::collections::HashSet;
use std::sync::Arc;

/// 部署范围内共享的解析环境
#[derive(Debug)]
pub struct ResolutionEnvironment {
    types: Arc<TypeStore>,
    annotations: Arc<AnnotationStore>,
    excluded: HashSet<ClassName>,
    cache_size: usize,
}

impl ResolutionEnvironment {
    /// 创建解析环境
    pub fn new(types: Arc<TypeStore>, annotations: Arc<AnnotationStore>, config: &ResolutionConfig) -> Self {
        Self {
            types,
            annotations,
            excluded: config
                .excluded_closure_types
                .iter()
                .map(|name| ClassName::new(name.as_str()))
                .collect(),
            cache_size: config.cache_size,
        }
    }

    /// 类型仓库
    pub fn types(&self) -> &TypeStore {
        &self.types
    }

    /// 注解仓库
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    /// 单个缓存的容量上限
    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    /// 组件类型集合：类型闭包去掉排除的类型
    pub fn bean_types(&self, ty: &Type) -> HashSet<Type> {
        self.types
            .type_closure(ty)
            .iter()
            .filter(|t| !self.is_excluded(t))
            .cloned()
            .collect()
    }

    /// 解析请求的类型闭包：在组件类型集合上补充参数化类型的原始形式
    pub fn request_closure(&self, ty: &Type) -> HashSet<Type> {
        let mut closure = self.bean_types(ty);
        let raw_forms: Vec<Type> = closure
            .iter()
            .filter(|t| matches!(t, Type::Parameterized { .. }))
            .map(Type::erasure)
            .collect();
        closure.extend(raw_forms);
        closure.insert(Type::object());
        closure
    }

    fn is_excluded(&self, ty: &Type) -> bool {
        ty.raw_class().map(|name| self.excluded.contains(name)).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_common::ClassDefinition;

    #[test]
    fn test_request_closure_excludes_interop_marker() {
        let types = Arc::new(TypeStore::new());
        types.register(ClassDefinition::interface("groovy.lang.GroovyObject"));
        types.register(ClassDefinition::interface("List").with_type_parameter("E"));
        types.register(
            ClassDefinition::new("Script")
                .implements(Type::class("groovy.lang.GroovyObject"))
                .implements(Type::parameterized("List", vec![Type::class("String")])),
        );
        let env = ResolutionEnvironment::new(types, Arc::new(AnnotationStore::new()), &ResolutionConfig::default());

        let closure = env.request_closure(&Type::class("Script"));
        assert!(!closure.contains(&Type::class("groovy.lang.GroovyObject")));
        assert!(closure.contains(&Type::parameterized("List", vec![Type::class("String")])));
        assert!(closure.contains(&Type::class("List")));
        assert!(closure.contains(&Type::object()));

        let bean_types = env.bean_types(&Type::class("Script"));
        assert!(!bean_types.contains(&Type::class("List")));
    }
}
