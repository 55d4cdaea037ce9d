//! 作用域上下文实现

pub mod application;
pub mod dependent;
pub mod request;

pub use application::ApplicationContext;
pub use dependent::DependentContext;
pub use request::{RequestContext, RequestScope, RequestScopeGuard};
