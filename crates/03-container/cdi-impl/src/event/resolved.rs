//! 观察者解析结果

use cdi_spi::ObserverMethod;
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;

static EMPTY: Lazy<Arc<ResolvedObservers>> = Lazy::new(|| {
    Arc::new(ResolvedObservers {
        immediate: Vec::new(),
        transactional: Vec::new(),
        asynchronous: Vec::new(),
    })
});

/// 一次事件解析得到的观察者，按通知方式划分
///
/// 三个列表各自保持解析顺序，合起来恰好是匹配到的观察者集合。
pub struct ResolvedObservers {
    immediate: Vec<Arc<dyn ObserverMethod>>,
    transactional: Vec<Arc<dyn ObserverMethod>>,
    asynchronous: Vec<Arc<dyn ObserverMethod>>,
}

impl ResolvedObservers {
    /// 共享的空结果
    pub fn empty() -> Arc<Self> {
        EMPTY.clone()
    }

    /// 划分已排序的观察者
    pub fn partition(observers: &[Arc<dyn ObserverMethod>]) -> Arc<Self> {
        if observers.is_empty() {
            return Self::empty();
        }
        let mut immediate = Vec::new();
        let mut transactional = Vec::new();
        let mut asynchronous = Vec::new();
        for observer in observers {
            if observer.is_async() {
                asynchronous.push(observer.clone());
            } else if observer.transaction_phase().is_transactional() {
                transactional.push(observer.clone());
            } else {
                immediate.push(observer.clone());
            }
        }
        Arc::new(Self {
            immediate,
            transactional,
            asynchronous,
        })
    }

    /// 立即通知的同步观察者
    pub fn immediate(&self) -> &[Arc<dyn ObserverMethod>] {
        &self.immediate
    }

    /// 事务观察者
    pub fn transactional(&self) -> &[Arc<dyn ObserverMethod>] {
        &self.transactional
    }

    /// 异步观察者
    pub fn asynchronous(&self) -> &[Arc<dyn ObserverMethod>] {
        &self.asynchronous
    }

    /// 同步触发需要通知的观察者数
    pub fn synchronous_len(&self) -> usize {
        self.immediate.len() + self.transactional.len()
    }

    /// 观察者总数
    pub fn len(&self) -> usize {
        self.synchronous_len() + self.asynchronous.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否为共享的空结果
    pub fn is_shared_empty(self: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, &EMPTY)
    }

    /// 全部观察者，按划分顺序
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn ObserverMethod>> {
        self.immediate
            .iter()
            .chain(self.transactional.iter())
            .chain(self.asynchronous.iter())
    }
}

impl fmt::Debug for ResolvedObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedObservers")
            .field("immediate", &self.immediate.len())
            .field("transactional", &self.transactional.len())
            .field("asynchronous", &self.asynchronous.len())
            .finish()
    }
}
