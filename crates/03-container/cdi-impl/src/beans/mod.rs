//! 组件实现
//!
//! 受管组件、拦截器、装饰器、合成组件、内置组件与观察者方法。

pub mod attributes;
pub mod builtin;
pub mod decorator;
pub mod implementation;
pub mod interceptor;
pub mod managed;
pub mod observer_method;
pub mod synthetic;

pub use attributes::{default_name, BeanAttributes};
pub use builtin::{
    bean_manager_bean, event_bean, is_builtin_class, register_builtin_types, BEAN_MANAGER_CLASS, EVENT_CLASS,
    EVENT_METADATA_CLASS, FACADE_TYPES,
};
pub use decorator::DecoratorBean;
pub use implementation::{BeanImplementation, InjectedValues, ObserverInvocation};
pub use interceptor::InterceptorBean;
pub use managed::ManagedBean;
pub use observer_method::{ObserverMethodImpl, SyntheticObserverMethod, SyntheticObserverMethodBuilder};
pub use synthetic::{SyntheticBean, SyntheticBeanBuilder};

use anyhow::Context as _;
use cdi_spi::{Bean, Contextual, CreationalContext, InjectionPoint, Instance};
use std::sync::Arc;

/// 以 [`Contextual`] 形式持有组件，用于登记依赖作用域实例
pub(crate) struct BeanContextual(pub Arc<dyn Bean>);

impl Contextual for BeanContextual {
    fn create(&self, ctx: &CreationalContext) -> anyhow::Result<Instance> {
        self.0.create(ctx)
    }

    fn destroy(&self, instance: Instance, ctx: &CreationalContext) {
        self.0.destroy(instance, ctx);
    }
}

/// 解析全部非委托注入点
pub(crate) fn inject(injection_points: &[InjectionPoint], ctx: &CreationalContext) -> anyhow::Result<InjectedValues> {
    let mut values = InjectedValues::new();
    for ip in injection_points.iter().filter(|ip| !ip.delegate) {
        let instance = ctx
            .injectable_reference(ip)
            .with_context(|| format!("注入失败: {}", ip))?;
        values.insert(ip.member_name.clone(), instance);
    }
    Ok(values)
}

/// 在 `impl Bean` 中委托到 `self.attributes` 的属性访问方法
macro_rules! delegate_bean_attributes {
    () => {
        fn types(&self) -> &std::collections::HashSet<cdi_common::Type> {
            &self.attributes.types
        }

        fn qualifiers(&self) -> &std::collections::HashSet<cdi_common::QualifierInstance> {
            &self.attributes.qualifiers
        }

        fn scope(&self) -> &cdi_common::ClassName {
            &self.attributes.scope
        }

        fn name(&self) -> Option<&str> {
            self.attributes.name.as_deref()
        }

        fn stereotypes(&self) -> &std::collections::HashSet<cdi_common::ClassName> {
            &self.attributes.stereotypes
        }

        fn is_alternative(&self) -> bool {
            self.attributes.alternative
        }

        fn priority(&self) -> Option<i32> {
            self.attributes.priority
        }
    };
}

pub(crate) use delegate_bean_attributes;
