//! 组件实现能力
//!
//! 没有运行时反射，组件类的构造、回调与观察者方法体由调用方以闭包提供。

use cdi_spi::{EventContext, EventMetadata, InterceptionType, Instance};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// 已解析的注入值，按字段名或参数名索引
#[derive(Clone, Default)]
pub struct InjectedValues {
    values: HashMap<String, Instance>,
}

impl InjectedValues {
    /// 创建
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录注入值
    pub fn insert(&mut self, member: impl Into<String>, instance: Instance) {
        self.values.insert(member.into(), instance);
    }

    /// 按成员名读取原始实例
    pub fn instance(&self, member: &str) -> Option<&Instance> {
        self.values.get(member)
    }

    /// 按具体类型读取注入值
    pub fn get<T: Any + Send + Sync>(&self, member: &str) -> anyhow::Result<Arc<T>> {
        let instance = self
            .values
            .get(member)
            .ok_or_else(|| anyhow::anyhow!("没有名为 {} 的注入值", member))?;
        instance
            .clone()
            .downcast::<T>()
            .map_err(|_| anyhow::anyhow!("注入值 {} 不是 {}", member, std::any::type_name::<T>()))
    }

    /// 数量
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for InjectedValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut members: Vec<&String> = self.values.keys().collect();
        members.sort();
        f.debug_struct("InjectedValues").field("members", &members).finish()
    }
}

/// 一次观察者方法调用
pub struct ObserverInvocation<'a> {
    /// 声明观察者的组件实例，静态观察者为 `None`
    pub bean: Option<&'a Instance>,
    /// 事件
    pub event: &'a EventContext,
    /// 观察者方法的其余参数
    pub parameters: &'a InjectedValues,
}

impl ObserverInvocation<'_> {
    /// 按具体类型读取所属组件实例
    pub fn bean<T: Any>(&self) -> anyhow::Result<&T> {
        self.bean
            .and_then(|b| b.downcast_ref::<T>())
            .ok_or_else(|| anyhow::anyhow!("观察者所属实例不是 {}", std::any::type_name::<T>()))
    }

    /// 按具体类型读取事件载荷
    pub fn event<E: Any>(&self) -> anyhow::Result<&E> {
        self.event
            .payload_ref::<E>()
            .ok_or_else(|| anyhow::anyhow!("事件载荷不是 {}", std::any::type_name::<E>()))
    }

    /// 事件元数据
    pub fn metadata(&self) -> &EventMetadata {
        self.event.metadata()
    }
}

/// 实例创建函数
pub type CreateFn = Arc<dyn Fn(&InjectedValues) -> anyhow::Result<Instance> + Send + Sync>;
/// 生命周期回调
pub type CallbackFn = Arc<dyn Fn(&Instance) -> anyhow::Result<()> + Send + Sync>;
/// 观察者方法体
pub type ObserverFn = Arc<dyn Fn(&ObserverInvocation<'_>) -> anyhow::Result<()> + Send + Sync>;
/// 拦截器回调，参数为拦截类型、拦截器实例与目标实例
pub type InterceptFn = Arc<dyn Fn(InterceptionType, &Instance, &Instance) -> anyhow::Result<()> + Send + Sync>;
/// 装饰函数，包装委托实例
pub type DecorateFn = Arc<dyn Fn(Instance, &InjectedValues) -> anyhow::Result<Instance> + Send + Sync>;

/// 组件类的实现
#[derive(Clone, Default)]
pub struct BeanImplementation {
    create: Option<CreateFn>,
    post_construct: Option<CallbackFn>,
    pre_destroy: Option<CallbackFn>,
    observers: HashMap<String, ObserverFn>,
    intercept: Option<InterceptFn>,
    decorate: Option<DecorateFn>,
}

impl BeanImplementation {
    /// 以构造函数创建实现
    pub fn new<T, F>(create: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&InjectedValues) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        Self {
            create: Some(Arc::new(move |values: &InjectedValues| -> anyhow::Result<Instance> {
                Ok(Arc::new(create(values)?))
            })),
            ..Self::default()
        }
    }

    /// 只包含观察者方法的实现，用于没有实例的静态观察者
    pub fn empty() -> Self {
        Self::default()
    }

    /// 注册 `@PostConstruct` 回调
    pub fn on_post_construct<T, F>(mut self, callback: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.post_construct = Some(typed_callback(callback));
        self
    }

    /// 注册 `@PreDestroy` 回调
    pub fn on_pre_destroy<T, F>(mut self, callback: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.pre_destroy = Some(typed_callback(callback));
        self
    }

    /// 观察者方法体，按方法名关联
    pub fn observer<F>(mut self, method: impl Into<String>, body: F) -> Self
    where
        F: Fn(&ObserverInvocation<'_>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.insert(method.into(), Arc::new(body));
        self
    }

    /// 拦截器的拦截逻辑：拦截类型、拦截器实例、目标实例
    pub fn interceptor<F>(mut self, intercept: F) -> Self
    where
        F: Fn(InterceptionType, &Instance, &Instance) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.intercept = Some(Arc::new(intercept));
        self
    }

    /// 装饰器的构造逻辑：委托实例与其余注入值
    pub fn decorator<F>(mut self, decorate: F) -> Self
    where
        F: Fn(Instance, &InjectedValues) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        self.decorate = Some(Arc::new(decorate));
        self
    }

    /// 实例创建函数
    pub fn create_fn(&self) -> Option<&CreateFn> {
        self.create.as_ref()
    }

    /// `@PostConstruct` 回调
    pub fn post_construct_fn(&self) -> Option<&CallbackFn> {
        self.post_construct.as_ref()
    }

    /// `@PreDestroy` 回调
    pub fn pre_destroy_fn(&self) -> Option<&CallbackFn> {
        self.pre_destroy.as_ref()
    }

    /// 按方法名查找观察者方法体
    pub fn observer_fn(&self, method: &str) -> Option<&ObserverFn> {
        self.observers.get(method)
    }

    /// 拦截器回调
    pub fn intercept_fn(&self) -> Option<&InterceptFn> {
        self.intercept.as_ref()
    }

    /// 装饰函数
    pub fn decorate_fn(&self) -> Option<&DecorateFn> {
        self.decorate.as_ref()
    }
}

fn typed_callback<T, F>(callback: F) -> CallbackFn
where
    T: Any + Send + Sync,
    F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Arc::new(move |instance: &Instance| match instance.downcast_ref::<T>() {
        Some(typed) => callback(typed),
        None => Err(anyhow::anyhow!("实例不是 {}", std::any::type_name::<T>())),
    })
}

impl fmt::Debug for BeanImplementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut observers: Vec<&String> = self.observers.keys().collect();
        observers.sort();
        f.debug_struct("BeanImplementation")
            .field("create", &self.create.is_some())
            .field("post_construct", &self.post_construct.is_some())
            .field("pre_destroy", &self.pre_destroy.is_some())
            .field("observers", &observers)
            .field("intercept", &self.intercept.is_some())
            .field("decorate", &self.decorate.is_some())
            .finish()
    }
}
