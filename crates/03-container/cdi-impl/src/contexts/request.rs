//! 请求作用域上下文
//!
//! 请求作用域由 [`RequestContext::activate`] 显式激活，守卫离开作用域时失活并销毁实例。

use super::application::InstanceStore;
use cdi_common::{names, ClassName, LifecycleError, LifecycleResult};
use cdi_spi::{Bean, Context, CreationalContext, Instance};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// 一次请求作用域的标识
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestScope {
    /// 请求标识
    pub id: Uuid,
    /// 请求开始时间
    pub created_at: DateTime<Utc>,
}

impl RequestScope {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
        }
    }
}

struct ActiveRequest {
    scope: RequestScope,
    store: Arc<InstanceStore>,
}

/// 请求作用域上下文
pub struct RequestContext {
    scope: ClassName,
    active: RwLock<Option<ActiveRequest>>,
}

impl RequestContext {
    /// 创建
    pub fn new() -> Self {
        Self {
            scope: ClassName::new(names::REQUEST_SCOPED),
            active: RwLock::new(None),
        }
    }

    /// 激活请求作用域
    pub fn activate(self: &Arc<Self>) -> LifecycleResult<RequestScopeGuard> {
        let mut active = self.active.write();
        if active.is_some() {
            return Err(LifecycleError::ContextAlreadyActive {
                scope: self.scope.to_string(),
            });
        }
        let scope = RequestScope::new();
        *active = Some(ActiveRequest {
            scope,
            store: Arc::new(InstanceStore::default()),
        });
        debug!("请求作用域已激活: {}", scope.id);
        Ok(RequestScopeGuard {
            context: self.clone(),
            scope,
        })
    }

    /// 当前激活的请求作用域
    pub fn current(&self) -> Option<RequestScope> {
        self.active.read().as_ref().map(|a| a.scope)
    }

    fn deactivate(&self, scope: &RequestScope) {
        let store = {
            let mut active = self.active.write();
            match active.as_ref() {
                Some(current) if current.scope.id == scope.id => active.take().map(|a| a.store),
                _ => None,
            }
        };
        if let Some(store) = store {
            let destroyed = store.destroy_all();
            debug!("请求作用域已失活: {}, 销毁 {} 个实例", scope.id, destroyed);
        }
    }

    fn store(&self) -> LifecycleResult<Arc<InstanceStore>> {
        self.active
            .read()
            .as_ref()
            .map(|a| a.store.clone())
            .ok_or_else(|| LifecycleError::ContextNotActive {
                scope: self.scope.to_string(),
            })
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Context for RequestContext {
    fn scope(&self) -> &ClassName {
        &self.scope
    }

    fn is_active(&self) -> bool {
        self.active.read().is_some()
    }

    fn get(&self, bean: &Arc<dyn Bean>, ctx: &CreationalContext) -> LifecycleResult<Instance> {
        // 创建期间不持有作用域锁
        let store = self.store()?;
        store.get_or_create(bean, ctx)
    }

    fn get_if_exists(&self, bean: &dyn Bean) -> Option<Instance> {
        self.store().ok().and_then(|store| store.get(bean.id()))
    }

    fn destroy(&self, bean: &dyn Bean) {
        if let Ok(store) = self.store() {
            store.destroy(bean.id());
        }
    }

    fn destroy_all(&self) {
        if let Some(scope) = self.current() {
            self.deactivate(&scope);
        }
    }
}

/// 请求作用域守卫
pub struct RequestScopeGuard {
    context: Arc<RequestContext>,
    scope: RequestScope,
}

impl RequestScopeGuard {
    /// 请求标识
    pub fn id(&self) -> Uuid {
        self.scope.id
    }

    /// 请求开始时间
    pub fn created_at(&self) -> DateTime<Utc> {
        self.scope.created_at
    }

    /// 请求作用域
    pub fn scope(&self) -> &RequestScope {
        &self.scope
    }
}

impl Drop for RequestScopeGuard {
    fn drop(&mut self) {
        self.context.deactivate(&self.scope);
    }
}
