//! 事务阶段观察者的延迟通知

use cdi_spi::{EventContext, ObserverMethod, Synchronization, TransactionPhase, TransactionStatus};
use std::sync::Arc;
use tracing::{debug, warn};

/// 注册到当前事务上的一次延迟通知
///
/// 回调中的观察者失败只记录日志，不影响事务与其他观察者。
pub struct DeferredEventNotification {
    observer: Arc<dyn ObserverMethod>,
    event: EventContext,
}

impl DeferredEventNotification {
    /// 创建
    pub fn new(observer: Arc<dyn ObserverMethod>, event: EventContext) -> Self {
        Self { observer, event }
    }

    /// 观察者的事务阶段
    pub fn phase(&self) -> TransactionPhase {
        self.observer.transaction_phase()
    }

    /// 给定事务结束状态时是否应通知
    pub fn should_notify(&self, status: TransactionStatus) -> bool {
        match self.phase() {
            TransactionPhase::AfterCompletion => true,
            TransactionPhase::AfterSuccess => status == TransactionStatus::Committed,
            TransactionPhase::AfterFailure => status != TransactionStatus::Committed,
            TransactionPhase::InProgress | TransactionPhase::BeforeCompletion => false,
        }
    }

    fn deliver(&self) {
        debug!("事务回调通知观察者: {} ({})", self.observer.id(), self.event.metadata());
        if let Err(e) = self.observer.notify(&self.event) {
            warn!(
                "事务阶段观察者调用失败: {}, 阶段 {:?}, 错误: {:#}",
                self.observer.id(),
                self.phase(),
                e
            );
        }
    }
}

impl Synchronization for DeferredEventNotification {
    fn before_completion(&self) {
        if self.phase().is_before_completion() {
            self.deliver();
        }
    }

    fn after_completion(&self, status: TransactionStatus) {
        if self.should_notify(status) {
            self.deliver();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticObserverMethod;
    use cdi_common::Type;
    use cdi_spi::EventMetadata;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn deferred(phase: TransactionPhase, calls: Arc<AtomicUsize>) -> DeferredEventNotification {
        let observer = SyntheticObserverMethod::builder("app", "Audit", Type::class("Order"))
            .phase(phase)
            .notify_with(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();
        let metadata = Arc::new(EventMetadata::new(Type::class("Order"), HashSet::new()));
        DeferredEventNotification::new(observer, EventContext::new(Arc::new(1u32), metadata))
    }

    #[test]
    fn test_after_success_only_on_commit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sync = deferred(TransactionPhase::AfterSuccess, calls.clone());
        sync.before_completion();
        sync.after_completion(TransactionStatus::RolledBack);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sync.after_completion(TransactionStatus::Committed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_after_failure_and_before_completion() {
        let calls = Arc::new(AtomicUsize::new(0));
        let failure = deferred(TransactionPhase::AfterFailure, calls.clone());
        failure.after_completion(TransactionStatus::Committed);
        failure.after_completion(TransactionStatus::Unknown);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let before = deferred(TransactionPhase::BeforeCompletion, calls.clone());
        before.before_completion();
        before.after_completion(TransactionStatus::Committed);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failure_is_swallowed() {
        let observer = SyntheticObserverMethod::builder("app", "Audit", Type::class("Order"))
            .phase(TransactionPhase::AfterCompletion)
            .notify_with(|_| Err(anyhow::anyhow!("boom")))
            .build();
        let metadata = Arc::new(EventMetadata::new(Type::class("Order"), HashSet::new()));
        let sync = DeferredEventNotification::new(observer, EventContext::new(Arc::new(1u32), metadata));
        sync.after_completion(TransactionStatus::Committed);
    }
}
