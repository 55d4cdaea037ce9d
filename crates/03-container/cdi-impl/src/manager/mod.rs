//! 组件管理器
//!
//! 每个归档一个 [`BeanManager`]，持有本归档注册的组件、观察者、拦截器与装饰器。
//! 解析时沿可访问关系合并全部可达管理器的注册表，结果按管理器缓存；
//! 任何注册或可访问关系的变化都会清空所有能到达变化管理器的缓存。

pub mod arena;
pub mod deployment;
pub mod enablement;
pub mod instance;
pub mod node;
pub mod specialization;

pub use arena::{ManagerArena, ManagerId};
pub use deployment::{Deployment, EXTENSIONS_ARCHIVE};
pub use enablement::{EnablementOrder, ModuleEnablement};
pub use instance::InstanceHandle;
pub use node::{ManagerNode, ManagerState};

use crate::event::{Event, NotificationStage, ObserverNotifier, ResolvedObservers};
use crate::resolution::{MatchContext, MatchStrategy, Resolvable, ResolvableBuilder, ResolutionEnvironment};
use cdi_common::{
    format_qualifiers, Annotation, BeanIdentifier, ClassName, ContainerError, ContainerResult, DefinitionError,
    DefinitionResult, LifecycleError, LifecycleResult, QualifierInstance, ResolutionError, Type,
};
use cdi_spi::{
    AsyncExecutor, Bean, BeanKind, Context, CreationServices, CreationalContext, Decorator, EventContext,
    EventMetadata, InjectionPoint, InterceptionType, Interceptor, Instance, ObserverMethod, Payload,
};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 不持有部署的管理器引用，供注册在管理器内的组件使用
#[derive(Clone)]
pub struct ManagerHandle {
    deployment: Weak<Deployment>,
    id: ManagerId,
}

impl ManagerHandle {
    pub(crate) fn new(deployment: Weak<Deployment>, id: ManagerId) -> Self {
        Self { deployment, id }
    }

    /// 管理器标识
    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// 部署已释放时返回 `None`
    pub fn upgrade(&self) -> Option<BeanManager> {
        let deployment = self.deployment.upgrade()?;
        deployment.manager(self.id)
    }
}

impl fmt::Debug for ManagerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ManagerHandle({})", self.id)
    }
}

struct PreparedEvent {
    resolved: Arc<ResolvedObservers>,
    context: EventContext,
}

/// 组件管理器
#[derive(Clone)]
pub struct BeanManager {
    deployment: Arc<Deployment>,
    node: Arc<ManagerNode>,
}

impl BeanManager {
    pub(crate) fn from_parts(deployment: Arc<Deployment>, node: Arc<ManagerNode>) -> Self {
        Self { deployment, node }
    }

    /// 管理器标识
    pub fn id(&self) -> ManagerId {
        self.node.id()
    }

    /// 所属归档
    pub fn archive(&self) -> &str {
        self.node.archive()
    }

    /// 当前状态
    pub fn state(&self) -> ManagerState {
        self.node.state()
    }

    /// 注册表中的节点
    pub fn node(&self) -> &Arc<ManagerNode> {
        &self.node
    }

    /// 所属部署
    pub fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// 解析环境
    pub fn env(&self) -> &ResolutionEnvironment {
        self.deployment.env()
    }

    /// 不持有部署的轻量句柄
    pub fn handle(&self) -> ManagerHandle {
        ManagerHandle::new(Arc::downgrade(&self.deployment), self.id())
    }

    /// 本模块的启用配置
    pub fn enablement(&self) -> &ModuleEnablement {
        self.node.enablement()
    }

    // ---- 注册 ----

    fn ensure_open(&self) -> LifecycleResult<()> {
        if self.state() == ManagerState::CleanedUp {
            return Err(LifecycleError::illegal_state(format!("管理器已清理: {}", self.id())));
        }
        Ok(())
    }

    /// 本管理器及其全部子活动
    fn registration_targets(&self) -> Vec<Arc<ManagerNode>> {
        let mut visited = HashSet::new();
        let mut targets = Vec::new();
        let mut stack = vec![self.node.clone()];
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id()) {
                continue;
            }
            for child in node.children() {
                if let Some(child) = self.deployment.arena().get(child) {
                    stack.push(child);
                }
            }
            targets.push(node);
        }
        targets
    }

    /// 清空所有能到达变化管理器的缓存
    fn invalidate(&self, changed: &[Arc<ManagerNode>]) {
        let mut cleared = HashSet::new();
        for node in changed {
            for reaching in self.deployment.arena().reaching(node.id()) {
                if cleared.insert(reaching.id()) {
                    reaching.clear_caches();
                }
            }
        }
        debug!("{} 个管理器的解析缓存已清空", cleared.len());
    }

    fn register<F>(&self, what: &BeanIdentifier, push: F) -> LifecycleResult<()>
    where
        F: Fn(&ManagerNode),
    {
        self.ensure_open()?;
        let targets = self.registration_targets();
        for target in &targets {
            push(target);
        }
        debug!("注册 {} -> {} ({} 个管理器)", what, self.archive(), targets.len());
        self.invalidate(&targets);
        Ok(())
    }

    /// 注册组件
    ///
    /// 本管理器中已有相同标识的组件时返回 [`DefinitionError::DuplicateIdentifier`]。
    pub fn add_bean(&self, bean: Arc<dyn Bean>) -> ContainerResult<()> {
        let id = bean.id().clone();
        self.ensure_unique_bean(&id)?;
        self.register(&id, |node| node.push_bean(bean.clone()))?;
        Ok(())
    }

    /// 检查组件标识在本管理器中尚未使用
    pub fn ensure_unique_bean(&self, id: &BeanIdentifier) -> DefinitionResult<()> {
        if self.node.contains_bean(id) {
            return Err(DefinitionError::DuplicateIdentifier { id: id.to_string() });
        }
        Ok(())
    }

    /// 注册观察者方法
    pub fn add_observer(&self, observer: Arc<dyn ObserverMethod>) -> LifecycleResult<()> {
        let id = observer.id().clone();
        self.register(&id, |node| node.push_observer(observer.clone()))
    }

    /// 注册拦截器
    pub fn add_interceptor(&self, interceptor: Arc<dyn Interceptor>) -> LifecycleResult<()> {
        let id = interceptor.id().clone();
        self.register(&id, |node| node.push_interceptor(interceptor.clone()))
    }

    /// 注册装饰器
    pub fn add_decorator(&self, decorator: Arc<dyn Decorator>) -> LifecycleResult<()> {
        let id = decorator.id().clone();
        self.register(&id, |node| node.push_decorator(decorator.clone()))
    }

    /// 使 `other` 的注册对本管理器可见
    pub fn add_accessible_manager(&self, other: &BeanManager) -> LifecycleResult<()> {
        self.ensure_open()?;
        let targets = self.registration_targets();
        let added = targets
            .iter()
            .filter(|node| node.push_accessible(other.id()))
            .count();
        if added > 0 {
            debug!("管理器 {} 可访问 {}", self.id(), other.id());
            self.invalidate(&targets);
        }
        Ok(())
    }

    /// 创建子活动
    ///
    /// 子活动继承父管理器当前的注册表，之后父管理器的注册也会传播给它，子活动自己的注册不会回传。
    pub fn create_child_activity(&self) -> LifecycleResult<BeanManager> {
        self.ensure_open()?;
        let child = self.deployment.insert_manager(
            self.archive().to_string(),
            Some(self.node.as_ref()),
            self.enablement().clone(),
        );
        info!("创建子活动: {} -> {}", self.id(), child.id());
        Ok(child)
    }

    // ---- 可达注册表 ----

    /// 可达的全部组件，其他管理器的内置组件除外
    pub fn transitive_beans(&self) -> Vec<Arc<dyn Bean>> {
        let own = self.id();
        self.deployment
            .arena()
            .reachable_from(own)
            .into_iter()
            .flat_map(|node| {
                let foreign = node.id() != own;
                node.beans()
                    .into_iter()
                    .filter(move |bean| !(foreign && bean.kind() == BeanKind::BuiltIn))
            })
            .collect()
    }

    /// 本管理器可见的全部观察者
    pub fn transitive_observers(&self) -> Vec<Arc<dyn ObserverMethod>> {
        self.reachable().into_iter().flat_map(|node| node.observers()).collect()
    }

    /// 本管理器可见的全部拦截器
    pub fn transitive_interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        self.reachable().into_iter().flat_map(|node| node.interceptors()).collect()
    }

    /// 本管理器可见的全部装饰器
    pub fn transitive_decorators(&self) -> Vec<Arc<dyn Decorator>> {
        self.reachable().into_iter().flat_map(|node| node.decorators()).collect()
    }

    fn reachable(&self) -> Vec<Arc<ManagerNode>> {
        self.deployment.arena().reachable_from(self.id())
    }

    fn specialized(&self) -> Arc<HashSet<BeanIdentifier>> {
        let (cached, generation) = self.node.specialized();
        if let Some(specialized) = cached {
            return specialized;
        }
        let specialized = Arc::new(specialization::specialized_beans(
            &self.transitive_beans(),
            self.enablement(),
        ));
        self.node.set_specialized(specialized.clone(), generation);
        specialized
    }

    fn with_match_context<R>(&self, f: impl FnOnce(&MatchContext<'_>) -> R) -> R {
        let specialized = self.specialized();
        let ctx = MatchContext {
            types: self.env().types(),
            enablement: self.enablement(),
            specialized: &specialized,
        };
        f(&ctx)
    }

    // ---- 组件解析 ----

    /// 解析请求构建器
    pub fn resolvable(&self) -> ResolvableBuilder<'_> {
        ResolvableBuilder::new(self.env())
    }

    /// 按类型与限定符注解构造解析请求
    pub fn resolvable_for(&self, ty: &Type, qualifiers: &[Annotation]) -> ContainerResult<Resolvable> {
        Ok(self
            .resolvable()
            .for_type(ty)?
            .add_qualifier_annotations(qualifiers)?
            .build())
    }

    /// 类型安全解析，返回全部匹配的启用组件
    pub fn resolve_beans(&self, resolvable: &Resolvable, cacheable: bool) -> Arc<Vec<Arc<dyn Bean>>> {
        self.with_match_context(|ctx| {
            self.node
                .bean_resolver
                .resolve(MatchStrategy::Bean, resolvable, cacheable, ctx, || self.transitive_beans())
        })
    }

    /// 按类型与限定符查找组件
    ///
    /// 只有使用 `@Default` 的请求会被缓存。
    pub fn get_beans(&self, ty: &Type, qualifiers: &[Annotation]) -> ContainerResult<Arc<Vec<Arc<dyn Bean>>>> {
        let resolvable = self.resolvable_for(ty, qualifiers)?;
        Ok(self.resolve_beans(&resolvable, qualifiers.is_empty()))
    }

    /// 解析注入点的候选组件
    pub fn get_beans_for_injection_point(&self, ip: &InjectionPoint) -> ContainerResult<Arc<Vec<Arc<dyn Bean>>>> {
        let resolvable = Resolvable::for_injection_point(self.env(), ip)?;
        Ok(self.resolve_beans(&resolvable, true))
    }

    /// 歧义消解
    pub fn resolve(&self, beans: &Arc<Vec<Arc<dyn Bean>>>) -> Arc<Vec<Arc<dyn Bean>>> {
        self.node.disambiguator.resolve(beans)
    }

    /// 解析出唯一组件
    pub fn resolve_bean(&self, resolvable: &Resolvable, cacheable: bool) -> ContainerResult<Arc<dyn Bean>> {
        let beans = self.resolve(&self.resolve_beans(resolvable, cacheable));
        match beans.as_slice() {
            [bean] => Ok(bean.clone()),
            [] => Err(ResolutionError::Unsatisfied {
                required: resolvable.required_type().to_string(),
                qualifiers: format_qualifiers(resolvable.qualifiers()),
            }
            .into()),
            many => {
                let mut candidates: Vec<String> = many.iter().map(|b| b.id().to_string()).collect();
                candidates.sort();
                Err(ResolutionError::Ambiguous {
                    required: resolvable.required_type().to_string(),
                    qualifiers: format_qualifiers(resolvable.qualifiers()),
                    candidates,
                }
                .into())
            }
        }
    }

    /// 解析唯一组件，歧义或无匹配时报错
    pub fn get_bean(&self, ty: &Type, qualifiers: &[Annotation]) -> ContainerResult<Arc<dyn Bean>> {
        let resolvable = self.resolvable_for(ty, qualifiers)?;
        self.resolve_bean(&resolvable, qualifiers.is_empty())
    }

    // ---- 实例 ----

    /// 以本管理器为注入服务的根创建上下文
    pub fn creational_context(&self) -> CreationalContext {
        CreationalContext::new(Some(Arc::new(self.clone())))
    }

    /// 当前激活的作用域上下文
    pub fn context(&self, scope: &ClassName) -> ContainerResult<Arc<dyn Context>> {
        self.deployment.context(scope).ok_or_else(|| {
            LifecycleError::NoSuchContext {
                scope: scope.to_string(),
            }
            .into()
        })
    }

    /// 请求上下文
    pub fn request_context(&self) -> &Arc<crate::contexts::RequestContext> {
        self.deployment.request_context()
    }

    /// 组件的上下文实例
    ///
    /// 尚无实例且组件已在创建链中时报告循环依赖。
    pub fn get_reference(&self, bean: &Arc<dyn Bean>, ctx: &CreationalContext) -> ContainerResult<Instance> {
        let context = self.context(bean.scope())?;
        if !context.is_active() {
            return Err(LifecycleError::ContextNotActive {
                scope: bean.scope().to_string(),
            }
            .into());
        }
        if let Some(existing) = context.get_if_exists(bean.as_ref()) {
            return Ok(existing);
        }
        if ctx.is_being_created(bean.id()) {
            let mut chain: Vec<String> = ctx.creation_chain().iter().map(ToString::to_string).collect();
            if let Some(own) = ctx.contextual() {
                chain.push(own.to_string());
            }
            chain.push(bean.id().to_string());
            return Err(LifecycleError::CircularDependency {
                chain: chain.join(" -> "),
            }
            .into());
        }
        Ok(context.get(bean, ctx)?)
    }

    /// 解析注入点并返回引用
    pub fn get_injectable_reference(&self, ip: &InjectionPoint, ctx: &CreationalContext) -> ContainerResult<Instance> {
        let resolvable = Resolvable::for_injection_point(self.env(), ip)?;
        let bean = self.resolve_bean(&resolvable, true)?;
        let _guard = ctx.push_injection_point(ip.clone());
        self.get_reference(&bean, ctx)
    }

    /// 按类型获取实例
    pub fn get_instance<T: Any + Send + Sync>(
        &self,
        ty: &Type,
        qualifiers: &[Annotation],
    ) -> ContainerResult<InstanceHandle<T>> {
        let bean = self.get_bean(ty, qualifiers)?;
        let ctx = self.creational_context();
        let instance = self.get_reference(&bean, &ctx)?;
        let typed = instance.downcast::<T>().map_err(|_| LifecycleError::InstanceTypeMismatch {
            bean: bean.id().to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })?;
        Ok(InstanceHandle::new(typed, bean, ctx))
    }

    /// 按标识查找可钝化组件，范围为整个部署
    pub fn get_passivation_capable_bean(&self, id: &BeanIdentifier) -> Option<Arc<dyn Bean>> {
        self.deployment
            .find_bean(id)
            .filter(|bean| bean.is_passivation_capable())
    }

    // ---- 拦截器与装饰器 ----

    /// 与绑定匹配的拦截器，按启用顺序
    pub fn resolve_interceptors(
        &self,
        kind: InterceptionType,
        bindings: &HashSet<QualifierInstance>,
    ) -> Arc<Vec<Arc<dyn Interceptor>>> {
        if bindings.is_empty() {
            return Arc::new(Vec::new());
        }
        let resolvable = Resolvable::for_bindings(bindings.clone());
        self.with_match_context(|ctx| {
            self.node.interceptor_resolver.resolve(
                MatchStrategy::Interceptor(kind),
                &resolvable,
                true,
                ctx,
                || self.transitive_interceptors(),
            )
        })
    }

    /// 适用于组件的装饰器，按启用顺序
    pub fn resolve_decorators(&self, bean: &dyn Bean) -> Arc<Vec<Arc<dyn Decorator>>> {
        let resolvable = Resolvable::for_bean(bean);
        self.with_match_context(|ctx| {
            self.node
                .decorator_resolver
                .resolve(MatchStrategy::Decorator, &resolvable, true, ctx, || self.transitive_decorators())
        })
    }

    // ---- 事件 ----

    fn event_resolvable(&self, event_type: &Type, qualifiers: &HashSet<QualifierInstance>) -> ContainerResult<Resolvable> {
        Ok(self
            .resolvable()
            .lenient()
            .for_type(event_type)?
            .add_qualifiers(qualifiers.iter().cloned())?
            .build())
    }

    fn prepare_event(
        &self,
        payload: Payload,
        mut metadata: EventMetadata,
        lenient: bool,
        cacheable: bool,
    ) -> ContainerResult<PreparedEvent> {
        if !lenient {
            self.node
                .notifier
                .check_event_type(self.env().types(), &metadata.event_type)?;
        }
        let resolvable = self.event_resolvable(&metadata.event_type, &metadata.qualifiers)?;
        metadata.qualifiers = resolvable.qualifiers().clone();
        let resolved = self.with_match_context(|ctx| {
            self.node
                .notifier
                .resolve(&resolvable, cacheable, ctx, || self.transitive_observers())
        });
        Ok(PreparedEvent {
            resolved,
            context: EventContext::new(payload, Arc::new(metadata)),
        })
    }

    /// 解析事件的观察者方法，按优先级排序
    pub fn resolve_observer_methods(
        &self,
        event_type: &Type,
        qualifiers: &[Annotation],
    ) -> ContainerResult<Vec<Arc<dyn ObserverMethod>>> {
        self.node
            .notifier
            .check_event_type(self.env().types(), event_type)?;
        let qualifiers = QualifierInstance::of_all(qualifiers, self.env().annotations())?;
        let cacheable = qualifiers.is_empty();
        let resolvable = self.event_resolvable(event_type, &qualifiers)?;
        let observers = self.with_match_context(|ctx| {
            self.node
                .notifier
                .resolve_observer_methods(&resolvable, cacheable, ctx, || self.transitive_observers())
        });
        Ok(observers.to_vec())
    }

    /// 同步触发事件
    pub fn fire_event(&self, payload: Payload, event_type: &Type, qualifiers: &[Annotation]) -> ContainerResult<()> {
        let qualifiers = QualifierInstance::of_all(qualifiers, self.env().annotations())?;
        let cacheable = qualifiers.is_empty();
        self.fire_sync(payload, EventMetadata::new(event_type.clone(), qualifiers), cacheable)
    }

    /// 以给定元数据同步触发事件
    pub fn fire_event_with_metadata(&self, payload: Payload, metadata: EventMetadata) -> ContainerResult<()> {
        self.fire_sync(payload, metadata, false)
    }

    /// 异步触发事件，`executor` 为空时使用部署的默认执行器
    pub fn fire_event_async(
        &self,
        payload: Payload,
        event_type: &Type,
        qualifiers: &[Annotation],
        executor: Option<Arc<dyn AsyncExecutor>>,
    ) -> ContainerResult<NotificationStage<Payload>> {
        let qualifiers = QualifierInstance::of_all(qualifiers, self.env().annotations())?;
        let cacheable = qualifiers.is_empty();
        self.fire_async(payload, EventMetadata::new(event_type.clone(), qualifiers), executor, cacheable)
    }

    pub(crate) fn fire_sync(&self, payload: Payload, metadata: EventMetadata, cacheable: bool) -> ContainerResult<()> {
        let prepared = self.prepare_event(payload, metadata, false, cacheable)?;
        self.node
            .notifier
            .notify(&prepared.resolved, &prepared.context, self.deployment.transactions())?;
        Ok(())
    }

    pub(crate) fn fire_async(
        &self,
        payload: Payload,
        metadata: EventMetadata,
        executor: Option<Arc<dyn AsyncExecutor>>,
        cacheable: bool,
    ) -> ContainerResult<NotificationStage<Payload>> {
        let prepared = self.prepare_event(payload.clone(), metadata, false, cacheable)?;
        let executor = executor.unwrap_or_else(|| self.deployment.executor().clone());
        let metadata = prepared.context.shared_metadata();
        let observers = prepared.resolved.asynchronous().to_vec();
        if observers.is_empty() {
            return Ok(NotificationStage::completed(payload, metadata, executor));
        }
        let event = prepared.context;
        Ok(NotificationStage::spawn(executor, metadata, self.deployment.in_flight(), move || {
            ObserverNotifier::notify_async(&observers, &event)?;
            Ok(event.payload().clone())
        }))
    }

    /// 触发容器生命周期事件
    ///
    /// 跳过事件类型校验，`filter` 为假的观察者不被通知。
    pub(crate) fn fire_lifecycle_event<F>(&self, payload: Payload, event_type: Type, filter: F) -> ContainerResult<()>
    where
        F: Fn(&dyn ObserverMethod) -> bool,
    {
        let prepared = self.prepare_event(payload, EventMetadata::new(event_type, HashSet::new()), true, true)?;
        let observers: Vec<Arc<dyn ObserverMethod>> = prepared
            .resolved
            .all()
            .filter(|&observer| filter(observer.as_ref()))
            .cloned()
            .collect();
        let resolved = ResolvedObservers::partition(&observers);
        self.node.notifier.notify(&resolved, &prepared.context, None)?;
        Ok(())
    }

    /// 给定事件类型的事件门面
    pub fn event(&self, event_type: Type) -> Event {
        Event::new(self.clone(), event_type, HashSet::new(), None)
    }

    // ---- 生命周期 ----

    /// 验证部署，成功后进入已验证状态
    pub fn validate(&self) -> Result<(), Vec<ContainerError>> {
        let errors = crate::bootstrap::validator::validate_manager(self);
        if !errors.is_empty() {
            warn!("管理器 {} ({}) 验证失败: {} 个错误", self.id(), self.archive(), errors.len());
            return Err(errors);
        }
        self.node.set_state(ManagerState::Validated);
        info!("管理器 {} ({}) 验证通过", self.id(), self.archive());
        Ok(())
    }

    /// 清空注册表与缓存并断开图中的边
    pub fn cleanup(&self) {
        self.node.clean_up();
    }

    /// 组件解析缓存统计
    pub fn cache_stats(&self) -> crate::resolution::CacheStats {
        self.node.bean_resolver.stats()
    }
}

impl CreationServices for BeanManager {
    fn injectable_reference(&self, ip: &InjectionPoint, ctx: &CreationalContext) -> anyhow::Result<Instance> {
        Ok(self.get_injectable_reference(ip, ctx)?)
    }

    fn interceptors(&self, bindings: &HashSet<QualifierInstance>, kind: InterceptionType) -> Vec<Arc<dyn Interceptor>> {
        self.resolve_interceptors(kind, bindings).to_vec()
    }

    fn decorators(&self, bean: &dyn Bean) -> Vec<Arc<dyn Decorator>> {
        self.resolve_decorators(bean).to_vec()
    }
}

impl fmt::Debug for BeanManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanManager")
            .field("id", &self.id())
            .field("archive", &self.archive())
            .field("state", &self.state())
            .finish()
    }
}
