//! 通过管理器获取的组件实例

use cdi_spi::{Bean, CreationalContext};
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// 组件实例句柄
///
/// 依赖作用域实例挂在句柄的创建上下文上，调用 [`InstanceHandle::destroy`] 时销毁；
/// 其他作用域的实例由所在上下文管理。
pub struct InstanceHandle<T> {
    instance: Arc<T>,
    bean: Arc<dyn Bean>,
    ctx: CreationalContext,
}

impl<T> InstanceHandle<T> {
    pub(crate) fn new(instance: Arc<T>, bean: Arc<dyn Bean>, ctx: CreationalContext) -> Self {
        Self { instance, bean, ctx }
    }

    /// 实例
    pub fn get(&self) -> &Arc<T> {
        &self.instance
    }

    /// 解析到的组件
    pub fn bean(&self) -> &Arc<dyn Bean> {
        &self.bean
    }

    /// 释放句柄持有的依赖作用域实例
    pub fn destroy(self) {
        self.ctx.release();
    }
}

impl<T> Deref for InstanceHandle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.instance
    }
}

impl<T> fmt::Debug for InstanceHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceHandle")
            .field("bean", self.bean.id())
            .field("dependents", &self.ctx.dependent_count())
            .finish()
    }
}
