//! 观察者通知器
//!
//! 解析事件对应的观察者，按即时与事务阶段分组后依次通知。

use super::lifecycle_events::LIFECYCLE_EVENT_CLASSES;
use super::resolved::ResolvedObservers;
use super::transaction::DeferredEventNotification;
use crate::resolution::{CacheStats, MatchContext, MatchStrategy, Resolvable, ResolutionCache, TypeSafeResolver};
use cdi_common::{ClassName, ObserverError, ObserverResult, Type, TypeResolutionError, TypeStore};
use cdi_spi::{EventContext, ObserverMethod, TransactionServices};
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// 观察者通知器
pub struct ObserverNotifier {
    resolver: TypeSafeResolver<Arc<dyn ObserverMethod>>,
    partitions: ResolutionCache<Resolvable, Arc<ResolvedObservers>>,
    type_checks: DashMap<Type, Result<(), TypeResolutionError>>,
    validate_event_types: bool,
}

impl ObserverNotifier {
    /// 创建通知器
    pub fn new(cache_size: usize, validate_event_types: bool) -> Self {
        Self {
            resolver: TypeSafeResolver::new("observers", cache_size),
            partitions: ResolutionCache::new("observer-partitions", cache_size),
            type_checks: DashMap::new(),
            validate_event_types,
        }
    }

    /// 校验事件类型，结果按类型缓存
    ///
    /// 事件类型不能包含未解析的类型变量，也不能是容器生命周期事件。
    pub fn check_event_type(&self, types: &TypeStore, ty: &Type) -> Result<(), TypeResolutionError> {
        if !self.validate_event_types {
            return Ok(());
        }
        if let Some(cached) = self.type_checks.get(ty) {
            return cached.clone();
        }
        let result = Self::compute_type_check(types, ty);
        self.type_checks.insert(ty.clone(), result.clone());
        result
    }

    fn compute_type_check(types: &TypeStore, ty: &Type) -> Result<(), TypeResolutionError> {
        if ty.has_unresolved_variables() {
            return Err(TypeResolutionError::UnresolvedTypeVariable { ty: ty.to_string() });
        }
        let Some(raw) = ty.raw_class() else {
            return Ok(());
        };
        let is_lifecycle_event = LIFECYCLE_EVENT_CLASSES
            .iter()
            .any(|lifecycle| raw.as_str() == *lifecycle || types.is_subclass(raw, &ClassName::new(*lifecycle)));
        if is_lifecycle_event {
            return Err(TypeResolutionError::ContainerLifecycleEvent { ty: ty.to_string() });
        }
        Ok(())
    }

    /// 解析匹配事件的观察者，按优先级排序
    pub fn resolve_observer_methods<I, F>(
        &self,
        resolvable: &Resolvable,
        cacheable: bool,
        ctx: &MatchContext<'_>,
        candidates: F,
    ) -> Arc<Vec<Arc<dyn ObserverMethod>>>
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = Arc<dyn ObserverMethod>>,
    {
        self.resolver
            .resolve(MatchStrategy::Observer, resolvable, cacheable, ctx, candidates)
    }

    /// 解析并划分观察者
    pub fn resolve<I, F>(
        &self,
        resolvable: &Resolvable,
        cacheable: bool,
        ctx: &MatchContext<'_>,
        candidates: F,
    ) -> Arc<ResolvedObservers>
    where
        F: FnOnce() -> I,
        I: IntoIterator<Item = Arc<dyn ObserverMethod>>,
    {
        self.partitions.get_or_compute(resolvable, cacheable, || {
            let observers = self.resolve_observer_methods(resolvable, cacheable, ctx, candidates);
            ResolvedObservers::partition(&observers)
        })
    }

    /// 同步通知
    ///
    /// 即时观察者按顺序调用，任一失败立即返回；事务阶段观察者在有活动事务时注册为事务同步回调，
    /// 否则立即调用。
    pub fn notify(
        &self,
        resolved: &ResolvedObservers,
        event: &EventContext,
        transactions: Option<&Arc<dyn TransactionServices>>,
    ) -> ObserverResult<()> {
        trace!("通知事件 {}: {:?}", event.metadata(), resolved);
        for observer in resolved.immediate() {
            invoke(observer, event)?;
        }
        if resolved.transactional().is_empty() {
            return Ok(());
        }

        match transactions.filter(|tx| tx.is_transaction_active()) {
            Some(tx) => {
                for observer in resolved.transactional() {
                    let deferred = Arc::new(DeferredEventNotification::new(observer.clone(), event.clone()));
                    if let Err(e) = tx.register_synchronization(deferred) {
                        warn!("注册事务同步回调失败，立即通知观察者: {}, 错误: {:#}", observer.id(), e);
                        invoke(observer, event)?;
                    }
                }
                debug!("{} 个事务阶段观察者已延迟: {}", resolved.transactional().len(), event.metadata());
            }
            None => {
                for observer in resolved.transactional() {
                    invoke(observer, event)?;
                }
            }
        }
        Ok(())
    }

    /// 异步通知，全部观察者都会被调用，失败汇总返回
    pub fn notify_async(observers: &[Arc<dyn ObserverMethod>], event: &EventContext) -> ObserverResult<()> {
        let failures: Vec<ObserverError> = observers
            .iter()
            .filter_map(|observer| invoke(observer, event).err())
            .collect();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(ObserverError::AsyncFailures { failures })
        }
    }

    /// 清空观察者解析缓存与划分缓存
    pub fn clear(&self) {
        self.resolver.clear();
        self.partitions.clear();
    }

    /// 解析缓存统计
    pub fn stats(&self) -> CacheStats {
        self.resolver.stats()
    }
}

fn invoke(observer: &Arc<dyn ObserverMethod>, event: &EventContext) -> ObserverResult<()> {
    observer.notify(event).map_err(|source| ObserverError::Invocation {
        observer: observer.id().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticObserverMethod;
    use crate::event::lifecycle_events::BEFORE_SHUTDOWN;
    use cdi_common::ClassDefinition;
    use cdi_spi::{EventMetadata, Synchronization, TransactionPhase};
    use parking_lot::Mutex;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct FakeTransactions {
        active: AtomicBool,
        registered: Mutex<Vec<Arc<dyn Synchronization>>>,
    }

    impl TransactionServices for FakeTransactions {
        fn is_transaction_active(&self) -> bool {
            self.active.load(Ordering::SeqCst)
        }

        fn register_synchronization(&self, synchronization: Arc<dyn Synchronization>) -> anyhow::Result<()> {
            self.registered.lock().push(synchronization);
            Ok(())
        }
    }

    fn event() -> EventContext {
        let metadata = Arc::new(EventMetadata::new(Type::class("Order"), HashSet::new()));
        EventContext::new(Arc::new(7u32), metadata)
    }

    fn recording(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str, phase: TransactionPhase) -> Arc<dyn ObserverMethod> {
        SyntheticObserverMethod::builder("app", name, Type::class("Order"))
            .phase(phase)
            .notify_with(move |_| {
                log.lock().push(name);
                Ok(())
            })
            .build()
    }

    #[test]
    fn test_event_type_checks() {
        let types = TypeStore::new();
        types.register(ClassDefinition::new("CustomShutdown").extends(Type::class(BEFORE_SHUTDOWN)));
        let notifier = ObserverNotifier::new(16, true);
        assert!(notifier.check_event_type(&types, &Type::class("Order")).is_ok());
        assert!(matches!(
            notifier.check_event_type(&types, &Type::parameterized("List", vec![Type::variable("T")])),
            Err(TypeResolutionError::UnresolvedTypeVariable { .. })
        ));
        assert!(matches!(
            notifier.check_event_type(&types, &Type::class("CustomShutdown")),
            Err(TypeResolutionError::ContainerLifecycleEvent { .. })
        ));
        assert_eq!(notifier.type_checks.len(), 3);

        let lenient = ObserverNotifier::new(16, false);
        assert!(lenient.check_event_type(&types, &Type::class(BEFORE_SHUTDOWN)).is_ok());
    }

    #[test]
    fn test_transactional_observers_without_transaction_notify_immediately() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observers = vec![
            recording(log.clone(), "a", TransactionPhase::InProgress),
            recording(log.clone(), "b", TransactionPhase::AfterSuccess),
        ];
        let notifier = ObserverNotifier::new(16, true);
        let resolved = ResolvedObservers::partition(&observers);
        notifier.notify(&resolved, &event(), None).unwrap();
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_transactional_observers_deferred_in_transaction() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let observers = vec![
            recording(log.clone(), "a", TransactionPhase::InProgress),
            recording(log.clone(), "b", TransactionPhase::AfterSuccess),
        ];
        let tx = Arc::new(FakeTransactions::default());
        tx.active.store(true, Ordering::SeqCst);
        let services: Arc<dyn TransactionServices> = tx.clone();
        let notifier = ObserverNotifier::new(16, true);
        let resolved = ResolvedObservers::partition(&observers);

        notifier.notify(&resolved, &event(), Some(&services)).unwrap();
        assert_eq!(*log.lock(), vec!["a"]);
        let registered = tx.registered.lock().clone();
        assert_eq!(registered.len(), 1);
        registered[0].after_completion(cdi_spi::TransactionStatus::Committed);
        assert_eq!(*log.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_sync_failure_aborts_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = SyntheticObserverMethod::builder("app", "Failing", Type::class("Order"))
            .notify_with(|_| Err(anyhow::anyhow!("rejected")))
            .build();
        let observers = vec![failing, recording(log.clone(), "after", TransactionPhase::InProgress)];
        let notifier = ObserverNotifier::new(16, true);
        let result = notifier.notify(&ResolvedObservers::partition(&observers), &event(), None);
        assert!(matches!(result, Err(ObserverError::Invocation { .. })));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_async_failures_are_aggregated() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let failing = |name: &'static str| -> Arc<dyn ObserverMethod> {
            SyntheticObserverMethod::builder("app", name, Type::class("Order"))
                .asynchronous()
                .notify_with(|_| Err(anyhow::anyhow!("rejected")))
                .build()
        };
        let observers = vec![failing("x"), recording(log.clone(), "ok", TransactionPhase::InProgress), failing("y")];
        match ObserverNotifier::notify_async(&observers, &event()) {
            Err(ObserverError::AsyncFailures { failures }) => assert_eq!(failures.len(), 2),
            other => panic!("unexpected {:?}", other.err()),
        }
        assert_eq!(*log.lock(), vec!["ok"]);
    }
}
