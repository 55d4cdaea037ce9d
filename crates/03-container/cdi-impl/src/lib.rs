//! # CDI Impl
//!
//! 上下文依赖注入容器的实现。
//!
//! ## 核心内容
//!
//! - [`resolution`] - 类型安全解析器、可赋值规则与解析缓存
//! - [`manager`] - 每个归档一个的组件管理器以及管理器之间的可访问关系
//! - [`event`] - 观察者解析、同步、事务阶段与异步通知
//! - [`contexts`] - 内置作用域上下文
//! - [`beans`] - 托管组件、合成组件、拦截器、装饰器与观察者方法
//! - [`bootstrap`] - 组件发现、部署与验证
//! - [`Container`] - 带生命周期的容器入口
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use cdi_impl::{BeanArchive, Container};
//! use cdi_spi::Lifecycle;
//!
//! # async fn run() -> cdi_common::ContainerResult<()> {
//! let mut container = Container::builder()
//!     .add_archive(BeanArchive::new("app"))
//!     .build()?;
//! container.on_start().await?;
//! container.on_stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod beans;
pub mod bootstrap;
pub mod container;
pub mod contexts;
pub mod event;
pub mod executor;
pub mod manager;
pub mod resolution;

pub use beans::{BeanImplementation, SyntheticBean, SyntheticObserverMethod};
pub use bootstrap::{BeanArchive, ContainerBuilder, DiscoveryMode};
pub use container::Container;
pub use event::{Event, NotificationStage};
pub use executor::TokioExecutor;
pub use manager::{BeanManager, Deployment, ModuleEnablement};
pub use resolution::{Resolvable, ResolvableBuilder};
