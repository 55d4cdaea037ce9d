//! 启动与部署
//!
//! [`ContainerBuilder`] 收集配置、类型与归档，[`Deployer`] 按阶段完成组件发现与验证。

pub mod archive;
pub mod builder;
pub mod deployer;
pub mod validator;

pub use archive::{has_bean_defining_annotation, BeanArchive, DiscoveryMode};
pub use builder::ContainerBuilder;
pub use deployer::Deployer;
pub use validator::validate_manager;
