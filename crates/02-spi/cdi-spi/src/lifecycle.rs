//! 容器生命周期

use async_trait::async_trait;
use cdi_common::ContainerResult;

/// 生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LifecycleState {
    /// 未初始化
    #[default]
    Uninitialized,
    /// 初始化中
    Initializing,
    /// 运行中
    Running,
    /// 停止中
    Stopping,
    /// 已停止
    Stopped,
    /// 错误状态
    Error,
}

/// 生命周期管理 trait
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// 启动
    async fn on_start(&mut self) -> ContainerResult<()>;

    /// 停止
    async fn on_stop(&mut self) -> ContainerResult<()>;

    /// 获取生命周期状态
    fn lifecycle_state(&self) -> LifecycleState;

    /// 是否可以启动
    fn can_start(&self) -> bool {
        matches!(
            self.lifecycle_state(),
            LifecycleState::Uninitialized | LifecycleState::Stopped
        )
    }

    /// 是否可以停止
    fn can_stop(&self) -> bool {
        matches!(self.lifecycle_state(), LifecycleState::Running)
    }
}
