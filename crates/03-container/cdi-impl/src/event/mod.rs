//! 事件
//!
//! 观察者解析、同步与事务阶段通知、异步通知句柄、注入的事件门面以及容器生命周期事件。

pub mod async_stage;
pub mod facade;
pub mod lifecycle_events;
pub mod notifier;
pub mod resolved;
pub mod transaction;

pub use async_stage::{InFlight, InFlightGuard, NotificationStage};
pub use facade::Event;
pub use lifecycle_events::{
    AfterBeanDiscovery, AfterDeploymentValidation, BeforeBeanDiscovery, BeforeShutdown, ProcessAnnotatedType,
};
pub use notifier::ObserverNotifier;
pub use resolved::ResolvedObservers;
pub use transaction::DeferredEventNotification;
