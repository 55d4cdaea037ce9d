//! 默认异步执行器

use cdi_common::{ContainerError, ContainerResult, ExecutorConfig};
use cdi_spi::AsyncExecutor;
use futures::future::BoxFuture;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

/// 基于 tokio 的执行器
///
/// 在运行时内创建时复用当前运行时；否则按配置的线程数创建自有的多线程运行时。
pub struct TokioExecutor {
    handle: Handle,
    runtime: Option<Runtime>,
}

impl TokioExecutor {
    /// 复用给定运行时
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle, runtime: None }
    }

    /// 复用当前运行时，不在运行时内时创建新运行时
    pub fn current_or_new(config: &ExecutorConfig) -> ContainerResult<Self> {
        match Handle::try_current() {
            Ok(handle) => {
                debug!("异步执行器复用当前 tokio 运行时");
                Ok(Self::with_handle(handle))
            }
            Err(_) => Self::new(config),
        }
    }

    /// 创建自有运行时
    pub fn new(config: &ExecutorConfig) -> ContainerResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.thread_pool_size.max(1))
            .thread_name("cdi-async")
            .enable_all()
            .build()
            .map_err(|e| ContainerError::bootstrap(format!("创建异步执行器失败: {}", e)))?;
        info!("异步执行器已创建: {} 个工作线程", config.thread_pool_size.max(1));
        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
        })
    }

    /// 运行时句柄
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// 运行时是否由本执行器创建
    pub fn owns_runtime(&self) -> bool {
        self.runtime.is_some()
    }
}

impl AsyncExecutor for TokioExecutor {
    fn spawn(&self, task: BoxFuture<'static, ()>) {
        self.handle.spawn(task);
    }

    fn spawn_blocking(&self, task: Box<dyn FnOnce() + Send + 'static>) {
        self.handle.spawn_blocking(task);
    }

    fn name(&self) -> &str {
        "tokio"
    }
}

impl Drop for TokioExecutor {
    fn drop(&mut self) {
        // 自有运行时可能在异步上下文中被释放
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}
