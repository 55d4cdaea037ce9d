//! 拦截器组件

use super::attributes::BeanAttributes;
use super::implementation::BeanImplementation;
use super::{delegate_bean_attributes, inject};
use cdi_common::{BeanIdentifier, ClassName, QualifierInstance};
use cdi_spi::{Bean, BeanKind, Contextual, CreationalContext, InjectionPoint, InterceptionType, Interceptor, Instance};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 以 `@Interceptor` 声明的拦截器
pub struct InterceptorBean {
    id: BeanIdentifier,
    bean_class: ClassName,
    attributes: BeanAttributes,
    injection_points: Vec<InjectionPoint>,
    bindings: HashSet<QualifierInstance>,
    kinds: HashSet<InterceptionType>,
    implementation: BeanImplementation,
}

impl InterceptorBean {
    /// 创建拦截器组件
    pub fn new(
        id: BeanIdentifier,
        bean_class: ClassName,
        attributes: BeanAttributes,
        injection_points: Vec<InjectionPoint>,
        bindings: HashSet<QualifierInstance>,
        kinds: HashSet<InterceptionType>,
        implementation: BeanImplementation,
    ) -> Self {
        Self {
            id,
            bean_class,
            attributes,
            injection_points,
            bindings,
            kinds,
            implementation,
        }
    }
}

impl Contextual for InterceptorBean {
    fn create(&self, ctx: &CreationalContext) -> anyhow::Result<Instance> {
        let create = self
            .implementation
            .create_fn()
            .ok_or_else(|| anyhow::anyhow!("拦截器没有构造函数: {}", self.id))?;
        let values = inject(&self.injection_points, ctx)?;
        create(&values)
    }

    fn destroy(&self, _instance: Instance, ctx: &CreationalContext) {
        ctx.release();
    }
}

impl Bean for InterceptorBean {
    fn id(&self) -> &BeanIdentifier {
        &self.id
    }

    fn kind(&self) -> BeanKind {
        BeanKind::Interceptor
    }

    fn bean_class(&self) -> &ClassName {
        &self.bean_class
    }

    delegate_bean_attributes!();

    fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }
}

impl Interceptor for InterceptorBean {
    fn interceptor_bindings(&self) -> &HashSet<QualifierInstance> {
        &self.bindings
    }

    fn intercepts(&self, kind: InterceptionType) -> bool {
        self.kinds.contains(&kind)
    }

    fn intercept(&self, kind: InterceptionType, interceptor: &Instance, target: &Instance) -> anyhow::Result<()> {
        match self.implementation.intercept_fn() {
            Some(intercept) => intercept(kind, interceptor, target),
            None => Err(anyhow::anyhow!("拦截器没有拦截逻辑: {}", self.id)),
        }
    }

    fn as_bean(&self) -> &dyn Bean {
        self
    }

    fn into_bean(self: Arc<Self>) -> Arc<dyn Bean> {
        self
    }
}

impl fmt::Debug for InterceptorBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterceptorBean")
            .field("id", &self.id)
            .field("bindings", &self.bindings)
            .field("kinds", &self.kinds)
            .finish()
    }
}
