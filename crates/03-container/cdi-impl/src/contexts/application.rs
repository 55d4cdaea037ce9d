//! 应用作用域上下文

use cdi_common::{BeanIdentifier, ClassName, LifecycleError, LifecycleResult};
use cdi_spi::{Bean, Context, Contextual, CreationalContext, Instance};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

struct ContextualInstance {
    bean: Arc<dyn Bean>,
    instance: Instance,
    ctx: CreationalContext,
}

/// 上下文实例存储
///
/// 实例在映射锁之外创建；并发创建时保留先写入的实例，销毁后写入的实例。
#[derive(Default)]
pub(crate) struct InstanceStore {
    instances: DashMap<BeanIdentifier, ContextualInstance>,
}

impl InstanceStore {
    pub(crate) fn get_or_create(&self, bean: &Arc<dyn Bean>, ctx: &CreationalContext) -> LifecycleResult<Instance> {
        if let Some(existing) = self.instances.get(bean.id()) {
            return Ok(existing.instance.clone());
        }

        let child = ctx.child(bean.id());
        let instance = bean.create(&child).map_err(|source| LifecycleError::CreationFailed {
            bean: bean.id().to_string(),
            source,
        })?;

        let stored = self
            .instances
            .entry(bean.id().clone())
            .or_insert_with(|| ContextualInstance {
                bean: bean.clone(),
                instance: instance.clone(),
                ctx: child.clone(),
            })
            .instance
            .clone();
        if !Arc::ptr_eq(&stored, &instance) {
            debug!("并发创建的实例被丢弃: {}", bean.id());
            bean.destroy(instance, &child);
        }
        Ok(stored)
    }

    pub(crate) fn get(&self, id: &BeanIdentifier) -> Option<Instance> {
        self.instances.get(id).map(|entry| entry.instance.clone())
    }

    pub(crate) fn destroy(&self, id: &BeanIdentifier) {
        if let Some((_, entry)) = self.instances.remove(id) {
            entry.bean.destroy(entry.instance, &entry.ctx);
        }
    }

    /// 销毁全部实例，返回销毁的数量
    pub(crate) fn destroy_all(&self) -> usize {
        let ids: Vec<BeanIdentifier> = self.instances.iter().map(|entry| entry.key().clone()).collect();
        for id in &ids {
            self.destroy(id);
        }
        ids.len()
    }

    pub(crate) fn len(&self) -> usize {
        self.instances.len()
    }
}

/// 应用作用域上下文，整个部署内每个组件一个实例
///
/// 同一实现也用于 `@Singleton` 伪作用域。
pub struct ApplicationContext {
    scope: ClassName,
    store: InstanceStore,
}

impl ApplicationContext {
    /// 创建应用上下文
    pub fn new(scope: impl Into<ClassName>) -> Self {
        Self {
            scope: scope.into(),
            store: InstanceStore::default(),
        }
    }

    /// 已创建的实例数量
    pub fn instance_count(&self) -> usize {
        self.store.len()
    }
}

impl Context for ApplicationContext {
    fn scope(&self) -> &ClassName {
        &self.scope
    }

    fn is_active(&self) -> bool {
        true
    }

    fn get(&self, bean: &Arc<dyn Bean>, ctx: &CreationalContext) -> LifecycleResult<Instance> {
        self.store.get_or_create(bean, ctx)
    }

    fn get_if_exists(&self, bean: &dyn Bean) -> Option<Instance> {
        self.store.get(bean.id())
    }

    fn destroy(&self, bean: &dyn Bean) {
        self.store.destroy(bean.id());
    }

    fn destroy_all(&self) {
        let destroyed = self.store.destroy_all();
        if destroyed > 0 {
            debug!("销毁 {} 上下文中的 {} 个实例", self.scope, destroyed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticBean;
    use cdi_common::names;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_single_instance_per_bean() {
        let created = Arc::new(AtomicUsize::new(0));
        let destroyed = Arc::new(AtomicUsize::new(0));
        let counter = created.clone();
        let destroy_counter = destroyed.clone();
        let bean: Arc<dyn Bean> = SyntheticBean::builder("app", "Config")
            .scope(names::APPLICATION_SCOPED)
            .create(move || counter.fetch_add(1, Ordering::SeqCst))
            .destroy(move |_| {
                destroy_counter.fetch_add(1, Ordering::SeqCst);
            })
            .build();
        let context = ApplicationContext::new(names::APPLICATION_SCOPED);
        let ctx = CreationalContext::new(None);

        assert!(context.get_if_exists(bean.as_ref()).is_none());
        let first = context.get(&bean, &ctx).unwrap();
        let second = context.get(&bean, &ctx).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
        assert!(context.get_if_exists(bean.as_ref()).is_some());

        context.destroy_all();
        assert_eq!(destroyed.load(Ordering::SeqCst), 1);
        assert_eq!(context.instance_count(), 0);
    }
}
