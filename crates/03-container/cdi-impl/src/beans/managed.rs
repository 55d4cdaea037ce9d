//! 受管组件

use super::attributes::BeanAttributes;
use super::implementation::BeanImplementation;
use super::{delegate_bean_attributes, inject, BeanContextual};
use anyhow::Context as _;
use cdi_common::{BeanIdentifier, ClassName, QualifierInstance};
use cdi_spi::{Bean, BeanKind, Contextual, CreationalContext, InjectionPoint, InterceptionType, Instance};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

fn instance_key(instance: &Instance) -> usize {
    Arc::as_ptr(instance) as *const () as usize
}

/// 由注解类型描述符发现的受管组件
pub struct ManagedBean {
    id: BeanIdentifier,
    bean_class: ClassName,
    attributes: BeanAttributes,
    injection_points: Vec<InjectionPoint>,
    interceptor_bindings: HashSet<QualifierInstance>,
    implementation: BeanImplementation,
    specialized_class: Option<ClassName>,
    passivation_capable: bool,
    /// 被装饰实例到原始实例
    undecorated: DashMap<usize, Instance>,
}

impl ManagedBean {
    /// 创建托管组件
    pub fn new(
        id: BeanIdentifier,
        bean_class: ClassName,
        attributes: BeanAttributes,
        injection_points: Vec<InjectionPoint>,
        implementation: BeanImplementation,
    ) -> Self {
        Self {
            id,
            bean_class,
            attributes,
            injection_points,
            interceptor_bindings: HashSet::new(),
            implementation,
            specialized_class: None,
            passivation_capable: true,
            undecorated: DashMap::new(),
        }
    }

    /// 设置类级拦截器绑定
    pub fn with_interceptor_bindings(mut self, bindings: HashSet<QualifierInstance>) -> Self {
        self.interceptor_bindings = bindings;
        self
    }

    /// 声明特化的父类组件
    pub fn specializing(mut self, specialized: ClassName) -> Self {
        self.specialized_class = Some(specialized);
        self
    }

    /// 标记为不可钝化
    pub fn not_passivation_capable(mut self) -> Self {
        self.passivation_capable = false;
        self
    }

    /// 组件属性
    pub fn attributes(&self) -> &BeanAttributes {
        &self.attributes
    }

    /// 类级拦截器绑定
    pub fn interceptor_bindings(&self) -> &HashSet<QualifierInstance> {
        &self.interceptor_bindings
    }

    /// 实例创建逻辑
    pub fn implementation(&self) -> &BeanImplementation {
        &self.implementation
    }

    fn run_interceptors(
        &self,
        kind: InterceptionType,
        target: &Instance,
        ctx: &CreationalContext,
        created: &mut HashMap<BeanIdentifier, Instance>,
    ) -> anyhow::Result<()> {
        let Some(services) = ctx.services() else {
            return Ok(());
        };
        if self.interceptor_bindings.is_empty() {
            return Ok(());
        }
        for interceptor in services.interceptors(&self.interceptor_bindings, kind) {
            let instance = match created.get(interceptor.id()) {
                Some(existing) => existing.clone(),
                None => {
                    let child = ctx.child(interceptor.id());
                    let instance = interceptor.create(&child)?;
                    ctx.add_dependent(Arc::new(BeanContextual(interceptor.clone().into_bean())), instance.clone(), child);
                    created.insert(interceptor.id().clone(), instance.clone());
                    instance
                }
            };
            interceptor
                .intercept(kind, &instance, target)
                .with_context(|| format!("拦截器 {} 执行 {} 失败", interceptor.id(), kind))?;
        }
        Ok(())
    }
}

impl Contextual for ManagedBean {
    fn create(&self, ctx: &CreationalContext) -> anyhow::Result<Instance> {
        let create = self
            .implementation
            .create_fn()
            .ok_or_else(|| anyhow::anyhow!("组件没有构造函数: {}", self.id))?;
        let values = inject(&self.injection_points, ctx)?;
        let instance = create(&values)?;

        let mut interceptors = HashMap::new();
        self.run_interceptors(InterceptionType::AroundConstruct, &instance, ctx, &mut interceptors)?;
        self.run_interceptors(InterceptionType::PostConstruct, &instance, ctx, &mut interceptors)?;
        if let Some(post_construct) = self.implementation.post_construct_fn() {
            post_construct(&instance).with_context(|| format!("组件初始化回调失败: {}", self.id))?;
        }

        let decorators = ctx.services().map(|s| s.decorators(self)).unwrap_or_default();
        if decorators.is_empty() {
            return Ok(instance);
        }
        // 第一个装饰器在最外层
        let mut decorated = instance.clone();
        for decorator in decorators.iter().rev() {
            decorated = decorator
                .decorate(decorated, ctx)
                .with_context(|| format!("装饰器 {} 装饰 {} 失败", decorator.id(), self.id))?;
        }
        self.undecorated.insert(instance_key(&decorated), instance);
        Ok(decorated)
    }

    fn destroy(&self, instance: Instance, ctx: &CreationalContext) {
        let raw = self
            .undecorated
            .remove(&instance_key(&instance))
            .map(|(_, raw)| raw)
            .unwrap_or(instance);
        let mut interceptors = HashMap::new();
        if let Err(e) = self.run_interceptors(InterceptionType::PreDestroy, &raw, ctx, &mut interceptors) {
            warn!("组件销毁拦截失败: {}, 错误: {:#}", self.id, e);
        }
        if let Some(pre_destroy) = self.implementation.pre_destroy_fn() {
            if let Err(e) = pre_destroy(&raw) {
                warn!("组件销毁回调失败: {}, 错误: {:#}", self.id, e);
            }
        }
        ctx.release();
    }
}

impl Bean for ManagedBean {
    fn id(&self) -> &BeanIdentifier {
        &self.id
    }

    fn kind(&self) -> BeanKind {
        BeanKind::Managed
    }

    fn bean_class(&self) -> &ClassName {
        &self.bean_class
    }

    delegate_bean_attributes!();

    fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    fn specialized_class(&self) -> Option<&ClassName> {
        self.specialized_class.as_ref()
    }

    fn is_passivation_capable(&self) -> bool {
        self.passivation_capable
    }
}

impl fmt::Debug for ManagedBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedBean")
            .field("id", &self.id)
            .field("scope", &self.attributes.scope)
            .field("injection_points", &self.injection_points.len())
            .finish()
    }
}
