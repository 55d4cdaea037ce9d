//! 依赖作用域上下文

use crate::beans::BeanContextual;
use cdi_common::{names, ClassName, LifecycleError, LifecycleResult};
use cdi_spi::{Bean, Context, Contextual, CreationalContext, Instance};
use std::sync::Arc;

/// 依赖作用域：每次获取都创建新实例，实例随外层创建上下文一起销毁
pub struct DependentContext {
    scope: ClassName,
}

impl DependentContext {
    /// 创建
    pub fn new() -> Self {
        Self {
            scope: ClassName::new(names::DEPENDENT),
        }
    }
}

impl Default for DependentContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for DependentContext {
    fn scope(&self) -> &ClassName {
        &self.scope
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(&self, bean: &Arc<dyn Bean>, ctx: &CreationalContext) -> LifecycleResult<Instance> {
        let child = ctx.child(bean.id());
        let instance = bean.create(&child).map_err(|source| LifecycleError::CreationFailed {
            bean: bean.id().to_string(),
            source,
        })?;
        ctx.add_dependent(Arc::new(BeanContextual(bean.clone())), instance.clone(), child);
        Ok(instance)
    }

    fn get_if_exists(&self, _bean: &dyn Bean) -> Option<Instance> {
        None
    }

    fn destroy(&self, _bean: &dyn Bean) {}

    fn destroy_all(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticBean;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_instance_each_time_and_destroyed_with_parent() {
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = destroyed.clone();
        let bean: Arc<dyn Bean> = SyntheticBean::builder("app", "Wheel")
            .create(|| 4u8)
            .destroy(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let context = DependentContext::new();
        let parent = CreationalContext::new(None);

        let a = context.get(&bean, &parent).unwrap();
        let b = context.get(&bean, &parent).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(context.get_if_exists(bean.as_ref()).is_none());
        assert_eq!(parent.dependent_count(), 2);

        parent.release();
        assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    }
}
