//! 装饰器接口

use crate::bean::{Bean, Instance};
use crate::context::CreationalContext;
use cdi_common::{QualifierInstance, Type};
use std::collections::HashSet;
use std::sync::Arc;

/// 装饰器
pub trait Decorator: Bean {
    /// `@Delegate` 注入点的类型
    fn delegate_type(&self) -> &Type;

    /// `@Delegate` 注入点的限定符
    fn delegate_qualifiers(&self) -> &HashSet<QualifierInstance>;

    /// 被装饰的类型
    fn decorated_types(&self) -> &HashSet<Type>;

    /// 以 `delegate` 为委托创建装饰器实例
    fn decorate(&self, delegate: Instance, ctx: &CreationalContext) -> anyhow::Result<Instance>;

    /// 作为组件访问
    fn as_bean(&self) -> &dyn Bean;

    /// 转换为组件
    fn into_bean(self: Arc<Self>) -> Arc<dyn Bean>;
}
