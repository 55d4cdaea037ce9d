//! 装饰器组件

use super::attributes::BeanAttributes;
use super::implementation::BeanImplementation;
use super::{delegate_bean_attributes, inject};
use cdi_common::{BeanIdentifier, ClassName, QualifierInstance, Type};
use cdi_spi::{Bean, BeanKind, Contextual, CreationalContext, Decorator, InjectionPoint, Instance};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 以 `@Decorator` 声明的装饰器
pub struct DecoratorBean {
    id: BeanIdentifier,
    bean_class: ClassName,
    attributes: BeanAttributes,
    injection_points: Vec<InjectionPoint>,
    delegate_type: Type,
    delegate_qualifiers: HashSet<QualifierInstance>,
    decorated_types: HashSet<Type>,
    implementation: BeanImplementation,
}

impl DecoratorBean {
    /// `injection_points` 中必须恰好有一个委托注入点
    pub fn new(
        id: BeanIdentifier,
        bean_class: ClassName,
        attributes: BeanAttributes,
        injection_points: Vec<InjectionPoint>,
        implementation: BeanImplementation,
    ) -> anyhow::Result<Self> {
        let mut delegates = injection_points.iter().filter(|ip| ip.delegate);
        let delegate = delegates
            .next()
            .ok_or_else(|| anyhow::anyhow!("装饰器没有 @Delegate 注入点: {}", id))?;
        anyhow::ensure!(delegates.next().is_none(), "装饰器有多个 @Delegate 注入点: {}", id);

        let delegate_type = delegate.required_type.clone();
        let mut delegate_qualifiers = delegate.qualifiers.clone();
        if delegate_qualifiers.iter().all(QualifierInstance::is_any) {
            delegate_qualifiers.insert(QualifierInstance::default_qualifier());
        }
        delegate_qualifiers.insert(QualifierInstance::any());

        let own_type = Type::class(bean_class.clone());
        let decorated_types = attributes
            .types
            .iter()
            .filter(|t| !t.is_object() && **t != own_type)
            .cloned()
            .collect();

        Ok(Self {
            id,
            bean_class,
            attributes,
            injection_points,
            delegate_type,
            delegate_qualifiers,
            decorated_types,
            implementation,
        })
    }
}

impl Contextual for DecoratorBean {
    fn create(&self, _ctx: &CreationalContext) -> anyhow::Result<Instance> {
        Err(anyhow::anyhow!("装饰器实例只能围绕委托创建: {}", self.id))
    }

    fn destroy(&self, _instance: Instance, ctx: &CreationalContext) {
        ctx.release();
    }
}

impl Bean for DecoratorBean {
    fn id(&self) -> &BeanIdentifier {
        &self.id
    }

    fn kind(&self) -> BeanKind {
        BeanKind::Decorator
    }

    fn bean_class(&self) -> &ClassName {
        &self.bean_class
    }

    delegate_bean_attributes!();

    fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }
}

impl Decorator for DecoratorBean {
    fn delegate_type(&self) -> &Type {
        &self.delegate_type
    }

    fn delegate_qualifiers(&self) -> &HashSet<QualifierInstance> {
        &self.delegate_qualifiers
    }

    fn decorated_types(&self) -> &HashSet<Type> {
        &self.decorated_types
    }

    fn decorate(&self, delegate: Instance, ctx: &CreationalContext) -> anyhow::Result<Instance> {
        let decorate = self
            .implementation
            .decorate_fn()
            .ok_or_else(|| anyhow::anyhow!("装饰器没有装饰逻辑: {}", self.id))?;
        let values = inject(&self.injection_points, ctx)?;
        decorate(delegate, &values)
    }

    fn as_bean(&self) -> &dyn Bean {
        self
    }

    fn into_bean(self: Arc<Self>) -> Arc<dyn Bean> {
        self
    }
}

impl fmt::Debug for DecoratorBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoratorBean")
            .field("id", &self.id)
            .field("delegate_type", &self.delegate_type)
            .finish()
    }
}
