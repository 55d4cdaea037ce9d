//! 异步执行器接口

use futures::future::BoxFuture;

/// 异步事件通知使用的执行器
pub trait AsyncExecutor: Send + Sync {
    /// 提交异步任务
    fn spawn(&self, task: BoxFuture<'static, ()>);

    /// 提交可能阻塞的任务
    fn spawn_blocking(&self, task: Box<dyn FnOnce() + Send + 'static>);

    /// 执行器名称
    fn name(&self) -> &str {
        "executor"
    }
}
