//! # CDI Common
//!
//! 这个 crate 提供了上下文依赖注入容器的公共模型。
//!
//! ## 核心内容
//!
//! - [`Type`] / [`TypeStore`] - 类型模型与带泛型替换的类型闭包
//! - [`Annotation`] / [`AnnotationStore`] - 注解实例、注解定义与元注解模型
//! - [`QualifierInstance`] - 忽略非绑定成员的限定符规范值
//! - [`AnnotatedType`] - 外部扫描器提供的注解类型描述符
//! - [`BeanIdentifier`] - 稳定的组件标识符
//! - [`ContainerConfig`] - 容器配置
//!
//! ## 设计原则
//!
//! - 类型与注解都是纯数据，不依赖运行时反射
//! - 元数据模型按需计算并缓存
//! - 所有错误类型集中定义

pub mod annotated;
pub mod annotations;
pub mod configuration;
pub mod errors;
pub mod hierarchy;
pub mod identifier;
pub mod logging;
pub mod qualifier;
pub mod types;

pub use annotated::*;
pub use annotations::*;
pub use configuration::*;
pub use errors::*;
pub use hierarchy::*;
pub use identifier::*;
pub use logging::*;
pub use qualifier::*;
pub use types::*;
