//! # CDI SPI
//!
//! 容器与组件之间的接口层。
//!
//! ## 核心接口
//!
//! - [`Bean`] / [`Contextual`] - 可注入组件
//! - [`ObserverMethod`] - 事件观察者
//! - [`Interceptor`] / [`Decorator`] - 拦截器与装饰器
//! - [`Context`] / [`CreationalContext`] - 作用域上下文与创建上下文
//! - [`TransactionServices`] / [`AsyncExecutor`] - 容器使用的外部服务
//! - [`Lifecycle`] - 容器生命周期

pub mod bean;
pub mod context;
pub mod decorator;
pub mod event;
pub mod executor;
pub mod injection;
pub mod interceptor;
pub mod lifecycle;
pub mod observer;
pub mod transaction;

pub use bean::*;
pub use context::*;
pub use decorator::*;
pub use event::*;
pub use executor::*;
pub use injection::*;
pub use interceptor::*;
pub use lifecycle::*;
pub use observer::*;
pub use transaction::*;
