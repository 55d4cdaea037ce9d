//! 事务服务接口

use std::sync::Arc;

/// 事务结束状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionStatus {
    /// 已提交
    Committed,
    /// 已回滚
    RolledBack,
    /// 未知
    Unknown,
}

/// 事务同步回调
pub trait Synchronization: Send + Sync {
    /// 事务提交前
    fn before_completion(&self);

    /// 事务完成后
    fn after_completion(&self, status: TransactionStatus);
}

/// 容器使用的事务服务
pub trait TransactionServices: Send + Sync {
    /// 当前调用方是否处于活动事务中
    fn is_transaction_active(&self) -> bool;

    /// 为当前事务注册同步回调
    fn register_synchronization(&self, synchronization: Arc<dyn Synchronization>) -> anyhow::Result<()>;
}
