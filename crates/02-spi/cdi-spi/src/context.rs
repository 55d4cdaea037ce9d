//! 作用域上下文与创建上下文

use crate::bean::{Bean, Contextual, Instance};
use crate::decorator::Decorator;
use crate::injection::InjectionPoint;
use crate::interceptor::{InterceptionType, Interceptor};
use cdi_common::{BeanIdentifier, ClassName, LifecycleResult, QualifierInstance};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 作用域上下文
pub trait Context: Send + Sync {
    /// 作用域注解
    fn scope(&self) -> &ClassName;

    /// 上下文是否激活
    fn is_active(&self) -> bool;

    /// 返回已有实例，不存在时创建
    fn get(&self, bean: &Arc<dyn Bean>, ctx: &CreationalContext) -> LifecycleResult<Instance>;

    /// 仅返回已有实例
    fn get_if_exists(&self, bean: &dyn Bean) -> Option<Instance>;

    /// 销毁指定组件的实例
    fn destroy(&self, bean: &dyn Bean);

    /// 销毁全部实例
    fn destroy_all(&self);
}

/// 实例创建期间由容器提供的服务
pub trait CreationServices: Send + Sync {
    /// 解析注入点并返回可注入引用
    fn injectable_reference(&self, ip: &InjectionPoint, ctx: &CreationalContext) -> anyhow::Result<Instance>;

    /// 与拦截器绑定匹配的拦截器，按启用顺序
    fn interceptors(&self, _bindings: &HashSet<QualifierInstance>, _kind: InterceptionType) -> Vec<Arc<dyn Interceptor>> {
        Vec::new()
    }

    /// 适用于组件的装饰器，按启用顺序
    fn decorators(&self, _bean: &dyn Bean) -> Vec<Arc<dyn Decorator>> {
        Vec::new()
    }
}

/// 带作用域守卫的栈
///
/// `push` 返回的守卫在离开作用域时弹出对应元素，任何退出路径都会释放。
pub struct ScopedStack<T> {
    items: Mutex<Vec<T>>,
}

impl<T: Clone> ScopedStack<T> {
    /// 创建
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    /// 压入元素，守卫释放时弹出
    pub fn push(&self, value: T) -> ScopedGuard<'_, T> {
        let mut items = self.items.lock();
        let depth = items.len();
        items.push(value);
        ScopedGuard { stack: self, depth }
    }

    /// 栈顶元素
    pub fn peek(&self) -> Option<T> {
        self.items.lock().last().cloned()
    }

    /// 数量
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T: Clone> Default for ScopedStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// [`ScopedStack`] 的出栈守卫
pub struct ScopedGuard<'a, T> {
    stack: &'a ScopedStack<T>,
    depth: usize,
}

impl<T> Drop for ScopedGuard<'_, T> {
    fn drop(&mut self) {
        self.stack.items.lock().truncate(self.depth);
    }
}

struct DependentInstance {
    contextual: Arc<dyn Contextual>,
    instance: Instance,
    ctx: CreationalContext,
}

struct CreationalState {
    contextual: Option<BeanIdentifier>,
    /// 外层正在创建的组件，由外到内
    creation_chain: Vec<BeanIdentifier>,
    /// 创建时外层所处的注入点
    injection_point: Option<InjectionPoint>,
    injection_points: ScopedStack<InjectionPoint>,
    dependents: Mutex<Vec<DependentInstance>>,
    services: Option<Arc<dyn CreationServices>>,
}

/// 创建上下文
///
/// 记录正在创建的组件链，持有依赖作用域实例直到释放。
#[derive(Clone)]
pub struct CreationalContext {
    state: Arc<CreationalState>,
}

impl CreationalContext {
    /// 根创建上下文
    pub fn new(services: Option<Arc<dyn CreationServices>>) -> Self {
        Self {
            state: Arc::new(CreationalState {
                contextual: None,
                creation_chain: Vec::new(),
                injection_point: None,
                injection_points: ScopedStack::new(),
                dependents: Mutex::new(Vec::new()),
                services,
            }),
        }
    }

    /// 为组件创建子上下文
    pub fn child(&self, contextual: &BeanIdentifier) -> Self {
        let mut chain = self.state.creation_chain.clone();
        if let Some(own) = &self.state.contextual {
            chain.push(own.clone());
        }
        Self {
            state: Arc::new(CreationalState {
                contextual: Some(contextual.clone()),
                creation_chain: chain,
                injection_point: self.current_injection_point(),
                injection_points: ScopedStack::new(),
                dependents: Mutex::new(Vec::new()),
                services: self.state.services.clone(),
            }),
        }
    }

    /// 本上下文正在创建的组件
    pub fn contextual(&self) -> Option<&BeanIdentifier> {
        self.state.contextual.as_ref()
    }

    /// 外层正在创建的组件，由外到内
    pub fn creation_chain(&self) -> &[BeanIdentifier] {
        &self.state.creation_chain
    }

    /// 组件是否已在外层创建链中
    pub fn is_being_created(&self, id: &BeanIdentifier) -> bool {
        self.state.contextual.as_ref() == Some(id) || self.state.creation_chain.contains(id)
    }

    /// 当前注入点：本上下文最近压入的注入点，否则为创建时外层的注入点
    pub fn current_injection_point(&self) -> Option<InjectionPoint> {
        self.state
            .injection_points
            .peek()
            .or_else(|| self.state.injection_point.clone())
    }

    /// 压入当前注入点
    pub fn push_injection_point(&self, ip: InjectionPoint) -> ScopedGuard<'_, InjectionPoint> {
        self.state.injection_points.push(ip)
    }

    /// 注入服务
    pub fn services(&self) -> Option<&Arc<dyn CreationServices>> {
        self.state.services.as_ref()
    }

    /// 解析注入点
    pub fn injectable_reference(&self, ip: &InjectionPoint) -> anyhow::Result<Instance> {
        let services = self
            .state
            .services
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("创建上下文没有可用的注入服务: {}", ip))?;
        let _guard = self.push_injection_point(ip.clone());
        services.injectable_reference(ip, self)
    }

    /// 记录依赖作用域实例
    pub fn add_dependent(&self, contextual: Arc<dyn Contextual>, instance: Instance, ctx: CreationalContext) {
        self.state.dependents.lock().push(DependentInstance {
            contextual,
            instance,
            ctx,
        });
    }

    /// 已记录的依赖实例数量
    pub fn dependent_count(&self) -> usize {
        self.state.dependents.lock().len()
    }

    /// 按创建的逆序销毁全部依赖作用域实例
    pub fn release(&self) {
        let dependents: Vec<DependentInstance> = std::mem::take(&mut *self.state.dependents.lock());
        if !dependents.is_empty() {
            debug!("释放 {} 个依赖作用域实例", dependents.len());
        }
        for dependent in dependents.into_iter().rev() {
            dependent.contextual.destroy(dependent.instance, &dependent.ctx);
        }
    }
}

impl fmt::Debug for CreationalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreationalContext")
            .field("contextual", &self.state.contextual)
            .field("creation_chain", &self.state.creation_chain)
            .field("dependents", &self.dependent_count())
            .finish()
    }
}
