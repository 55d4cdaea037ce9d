//! 异步通知句柄

use cdi_common::{ObserverError, ObserverResult};
use cdi_spi::{AsyncExecutor, EventMetadata};
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Notify;

/// 进行中的异步通知计数
#[derive(Default)]
pub struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

impl InFlight {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 进入一次异步通知，守卫释放时退出
    pub fn enter(self: &Arc<Self>) -> InFlightGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        InFlightGuard { tracker: self.clone() }
    }

    /// 正在进行的异步通知数
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// 等待全部异步通知结束
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.count() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// [`InFlight`] 计数守卫
pub struct InFlightGuard {
    tracker: Arc<InFlight>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.tracker.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.tracker.idle.notify_waiters();
        }
    }
}

fn receive<T: Send + 'static>(rx: oneshot::Receiver<ObserverResult<T>>) -> BoxFuture<'static, ObserverResult<T>> {
    async move {
        rx.await.unwrap_or_else(|_| {
            Err(ObserverError::Cancelled {
                reason: "异步任务在完成前被丢弃".to_string(),
            })
        })
    }
    .boxed()
}

/// 异步事件通知的结果
///
/// 携带触发时的事件元数据，后续阶段仍在原执行器上运行。
pub struct NotificationStage<T> {
    inner: BoxFuture<'static, ObserverResult<T>>,
    metadata: Arc<EventMetadata>,
    executor: Arc<dyn AsyncExecutor>,
}

impl<T: Send + 'static> NotificationStage<T> {
    /// 在执行器上运行通知
    pub(crate) fn spawn<F>(
        executor: Arc<dyn AsyncExecutor>,
        metadata: Arc<EventMetadata>,
        in_flight: &Arc<InFlight>,
        work: F,
    ) -> Self
    where
        F: FnOnce() -> ObserverResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let guard = in_flight.enter();
        executor.spawn_blocking(Box::new(move || {
            let _guard = guard;
            let _ = tx.send(work());
        }));
        Self {
            inner: receive(rx),
            metadata,
            executor,
        }
    }

    /// 已完成的阶段
    pub fn completed(value: T, metadata: Arc<EventMetadata>, executor: Arc<dyn AsyncExecutor>) -> Self {
        Self {
            inner: futures::future::ready(Ok(value)).boxed(),
            metadata,
            executor,
        }
    }

    /// 事件元数据
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// 共享的事件元数据
    pub fn shared_metadata(&self) -> Arc<EventMetadata> {
        self.metadata.clone()
    }

    /// 异步执行器
    pub fn executor(&self) -> &Arc<dyn AsyncExecutor> {
        &self.executor
    }

    fn chain<U, F>(self, f: F) -> NotificationStage<U>
    where
        U: Send + 'static,
        F: FnOnce(ObserverResult<T>) -> ObserverResult<U> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let inner = self.inner;
        self.executor.spawn(
            async move {
                let result = inner.await;
                let _ = tx.send(f(result));
            }
            .boxed(),
        );
        NotificationStage {
            inner: receive(rx),
            metadata: self.metadata,
            executor: self.executor,
        }
    }

    /// 成功时转换结果
    pub fn then_apply<U, F>(self, f: F) -> NotificationStage<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.chain(move |result| result.map(f))
    }

    /// 成功时消费结果
    pub fn then_accept<F>(self, f: F) -> NotificationStage<()>
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.then_apply(f)
    }

    /// 失败时以 `f` 的返回值恢复
    pub fn exceptionally<F>(self, f: F) -> NotificationStage<T>
    where
        F: FnOnce(ObserverError) -> T + Send + 'static,
    {
        self.chain(move |result| Ok(result.unwrap_or_else(f)))
    }
}

impl<T> Future for NotificationStage<T> {
    type Output = ObserverResult<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.as_mut().poll(cx)
    }
}

impl<T> fmt::Debug for NotificationStage<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationStage")
            .field("event", &self.metadata.to_string())
            .field("executor", &self.executor.name())
            .finish()
    }
}
