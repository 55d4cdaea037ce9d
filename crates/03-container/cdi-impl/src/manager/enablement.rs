//! 备选组件、拦截器与装饰器的启用
//!
//! 带 `@Priority` 的组件全局启用；其余组件需要在所在归档中显式启用。

use cdi_common::ClassName;
use cdi_spi::Bean;
use std::collections::HashSet;

/// 启用顺序键：全局启用的按优先级升序在前，归档启用的按声明顺序在后
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct EnablementOrder(u8, i64);

/// 归档级启用配置
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleEnablement {
    alternatives: HashSet<ClassName>,
    alternative_stereotypes: HashSet<ClassName>,
    interceptors: Vec<ClassName>,
    decorators: Vec<ClassName>,
}

impl ModuleEnablement {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用备选类
    pub fn with_alternative(mut self, class: impl Into<ClassName>) -> Self {
        self.alternatives.insert(class.into());
        self
    }

    /// 启用备选构造型
    pub fn with_alternative_stereotype(mut self, stereotype: impl Into<ClassName>) -> Self {
        self.alternative_stereotypes.insert(stereotype.into());
        self
    }

    /// 按顺序启用拦截器
    pub fn with_interceptor(mut self, class: impl Into<ClassName>) -> Self {
        let class = class.into();
        if !self.interceptors.contains(&class) {
            self.interceptors.push(class);
        }
        self
    }

    /// 按顺序启用装饰器
    pub fn with_decorator(mut self, class: impl Into<ClassName>) -> Self {
        let class = class.into();
        if !self.decorators.contains(&class) {
            self.decorators.push(class);
        }
        self
    }

    /// 已启用的拦截器，按顺序
    pub fn interceptors(&self) -> &[ClassName] {
        &self.interceptors
    }

    /// 已启用的装饰器，按顺序
    pub fn decorators(&self) -> &[ClassName] {
        &self.decorators
    }

    /// 非备选组件总是启用
    pub fn is_bean_enabled(&self, bean: &dyn Bean) -> bool {
        !bean.is_alternative()
            || bean.priority().is_some()
            || self.alternatives.contains(bean.bean_class())
            || bean
                .stereotypes()
                .iter()
                .any(|s| self.alternative_stereotypes.contains(s))
    }

    /// 拦截器是否在本模块启用
    pub fn is_interceptor_enabled(&self, interceptor: &dyn Bean) -> bool {
        interceptor.priority().is_some() || self.interceptors.contains(interceptor.bean_class())
    }

    /// 装饰器是否在本模块启用
    pub fn is_decorator_enabled(&self, decorator: &dyn Bean) -> bool {
        decorator.priority().is_some() || self.decorators.contains(decorator.bean_class())
    }

    /// 拦截器的启用顺序
    pub fn interceptor_order(&self, interceptor: &dyn Bean) -> EnablementOrder {
        Self::order(&self.interceptors, interceptor)
    }

    /// 装饰器的启用顺序
    pub fn decorator_order(&self, decorator: &dyn Bean) -> EnablementOrder {
        Self::order(&self.decorators, decorator)
    }

    fn order(enabled: &[ClassName], bean: &dyn Bean) -> EnablementOrder {
        if let Some(priority) = bean.priority() {
            return EnablementOrder(0, priority as i64);
        }
        match enabled.iter().position(|c| c == bean.bean_class()) {
            Some(index) => EnablementOrder(1, index as i64),
            None => EnablementOrder(2, 0),
        }
    }
}
