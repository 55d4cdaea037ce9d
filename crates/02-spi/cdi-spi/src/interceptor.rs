//! 拦截器接口

use crate::bean::{Bean, Instance};
use cdi_common::QualifierInstance;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 拦截类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptionType {
    /// `@AroundInvoke`
    AroundInvoke,
    /// `@AroundConstruct`
    AroundConstruct,
    /// `@PostConstruct`
    PostConstruct,
    /// `@PreDestroy`
    PreDestroy,
}

impl InterceptionType {
    /// 对应的方法注解
    pub fn annotation(&self) -> &'static str {
        use cdi_common::names;
        match self {
            Self::AroundInvoke => names::AROUND_INVOKE,
            Self::AroundConstruct => names::AROUND_CONSTRUCT,
            Self::PostConstruct => names::POST_CONSTRUCT,
            Self::PreDestroy => names::PRE_DESTROY,
        }
    }

    /// 全部拦截类型
    pub fn all() -> [InterceptionType; 4] {
        [
            Self::AroundInvoke,
            Self::AroundConstruct,
            Self::PostConstruct,
            Self::PreDestroy,
        ]
    }

    /// 生命周期回调拦截
    pub fn is_lifecycle_callback(&self) -> bool {
        matches!(self, Self::PostConstruct | Self::PreDestroy)
    }
}

impl fmt::Display for InterceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// 拦截器
pub trait Interceptor: Bean {
    /// 拦截器绑定，非绑定成员已排除
    fn interceptor_bindings(&self) -> &HashSet<QualifierInstance>;

    /// 是否处理该拦截类型
    fn intercepts(&self, kind: InterceptionType) -> bool;

    /// 执行拦截
    fn intercept(&self, kind: InterceptionType, interceptor: &Instance, target: &Instance) -> anyhow::Result<()>;

    /// 作为组件访问
    fn as_bean(&self) -> &dyn Bean;

    /// 转换为组件
    fn into_bean(self: Arc<Self>) -> Arc<dyn Bean>;
}
