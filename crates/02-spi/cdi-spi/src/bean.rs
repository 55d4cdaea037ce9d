//! 组件接口

use crate::context::CreationalContext;
use crate::injection::InjectionPoint;
use cdi_common::{BeanIdentifier, ClassName, QualifierInstance, Type};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 组件实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 可由上下文创建与销毁的对象
pub trait Contextual: Send + Sync {
    /// 创建新实例
    fn create(&self, ctx: &CreationalContext) -> anyhow::Result<Instance>;

    /// 销毁实例
    fn destroy(&self, instance: Instance, ctx: &CreationalContext);
}

/// 组件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeanKind {
    /// 托管组件
    Managed,
    /// 合成组件
    Synthetic,
    /// 容器内置组件，不参与可访问性传递
    BuiltIn,
    /// 拦截器
    Interceptor,
    /// 装饰器
    Decorator,
}

/// 可注入组件
pub trait Bean: Contextual + fmt::Debug {
    /// 组件标识
    fn id(&self) -> &BeanIdentifier;

    /// 组件种类
    fn kind(&self) -> BeanKind;

    /// 组件类
    fn bean_class(&self) -> &ClassName;

    /// 组件类型，总是包含 Object
    fn types(&self) -> &HashSet<Type>;

    /// 限定符，总是包含 `@Any`
    fn qualifiers(&self) -> &HashSet<QualifierInstance>;

    /// 作用域
    fn scope(&self) -> &ClassName;

    /// EL 名称
    fn name(&self) -> Option<&str>;

    /// 构造型
    fn stereotypes(&self) -> &HashSet<ClassName>;

    /// 是否为备选组件
    fn is_alternative(&self) -> bool;

    /// `@Priority`，也可能来自构造型
    fn priority(&self) -> Option<i32>;

    /// 注入点
    fn injection_points(&self) -> &[InjectionPoint];

    /// 被本组件特化的类
    fn specialized_class(&self) -> Option<&ClassName> {
        None
    }

    /// 是否可钝化
    fn is_passivation_capable(&self) -> bool {
        true
    }
}

/// 以标识比较组件
pub fn same_bean(a: &dyn Bean, b: &dyn Bean) -> bool {
    a.id() == b.id()
}
