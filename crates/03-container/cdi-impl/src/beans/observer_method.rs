//! 观察者方法实现

use super::builtin::EVENT_METADATA_CLASS;
use super::implementation::{InjectedValues, ObserverFn, ObserverInvocation};
use crate::manager::ManagerHandle;
use anyhow::{anyhow, Context as _};
use cdi_common::{BeanIdentifier, ClassName, ComponentKind, QualifierInstance, Type};
use cdi_spi::{
    Bean, CreationalContext, EventContext, InjectionPoint, Instance, ObserverMethod, Reception, TransactionPhase,
    DEFAULT_PRIORITY,
};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::trace;

/// 离开作用域时释放创建上下文中的依赖作用域实例
struct ReleaseOnDrop(CreationalContext);

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}

fn is_event_metadata(ip: &InjectionPoint) -> bool {
    ip.required_type
        .raw_class()
        .map(|raw| raw.as_str() == EVENT_METADATA_CLASS)
        .unwrap_or(false)
}

/// 组件类上声明的观察者方法
///
/// 非静态观察者通过所属组件的上下文实例调用；`IF_EXISTS` 观察者在实例不存在时跳过。
/// 方法的其余参数按注入点解析，类型为 `EventMetadata` 的参数取自当前事件。
pub struct ObserverMethodImpl {
    id: BeanIdentifier,
    bean_class: ClassName,
    declaring_bean: Option<Arc<dyn Bean>>,
    method: String,
    body: ObserverFn,
    observed_type: Type,
    observed_qualifiers: HashSet<QualifierInstance>,
    reception: Reception,
    phase: TransactionPhase,
    priority: i32,
    asynchronous: bool,
    required_annotations: Vec<ClassName>,
    injection_points: Vec<InjectionPoint>,
    manager: ManagerHandle,
}

impl ObserverMethodImpl {
    /// 声明在组件上的观察者方法
    pub fn new(
        manager: ManagerHandle,
        declaring_bean: Arc<dyn Bean>,
        method: impl Into<String>,
        body: ObserverFn,
        observed_type: Type,
        observed_qualifiers: HashSet<QualifierInstance>,
    ) -> Self {
        let bean_class = declaring_bean.bean_class().clone();
        let archive = declaring_bean.id().archive().to_string();
        let mut observer = Self::static_method(
            manager,
            archive,
            bean_class,
            method,
            body,
            observed_type,
            observed_qualifiers,
        );
        observer.declaring_bean = Some(declaring_bean);
        observer
    }

    /// 不需要组件实例的静态观察者方法
    pub fn static_method(
        manager: ManagerHandle,
        archive: impl Into<String>,
        bean_class: ClassName,
        method: impl Into<String>,
        body: ObserverFn,
        observed_type: Type,
        observed_qualifiers: HashSet<QualifierInstance>,
    ) -> Self {
        let method = method.into();
        Self {
            id: BeanIdentifier::new(ComponentKind::ObserverMethod, archive, bean_class.as_str()).with_member(method.clone()),
            bean_class,
            declaring_bean: None,
            method,
            body,
            observed_type,
            observed_qualifiers,
            reception: Reception::Always,
            phase: TransactionPhase::InProgress,
            priority: DEFAULT_PRIORITY,
            asynchronous: false,
            required_annotations: Vec::new(),
            injection_points: Vec::new(),
            manager,
        }
    }

    /// 设置接收方式
    pub fn with_reception(mut self, reception: Reception) -> Self {
        self.reception = reception;
        self
    }

    /// 设置事务阶段
    pub fn with_phase(mut self, phase: TransactionPhase) -> Self {
        self.phase = phase;
        self
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 标记为异步观察者
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// 设置 `@WithAnnotations` 要求的注解
    pub fn with_required_annotations(mut self, annotations: Vec<ClassName>) -> Self {
        self.required_annotations = annotations;
        self
    }

    /// 事件参数以外的方法参数
    pub fn with_injection_points(mut self, injection_points: Vec<InjectionPoint>) -> Self {
        self.injection_points = injection_points;
        self
    }

    /// 方法名
    pub fn method(&self) -> &str {
        &self.method
    }

    /// 声明该观察者的组件
    pub fn declaring_bean(&self) -> Option<&Arc<dyn Bean>> {
        self.declaring_bean.as_ref()
    }

    /// 事件参数以外的注入点
    pub fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    fn parameters(&self, event: &EventContext, ctx: &CreationalContext) -> anyhow::Result<InjectedValues> {
        let mut values = InjectedValues::new();
        for ip in &self.injection_points {
            let value: Instance = if is_event_metadata(ip) {
                event.shared_metadata()
            } else {
                ctx.injectable_reference(ip)
                    .with_context(|| format!("观察者参数注入失败: {}", ip))?
            };
            values.insert(ip.member_name.clone(), value);
        }
        Ok(values)
    }
}

impl ObserverMethod for ObserverMethodImpl {
    fn id(&self) -> &BeanIdentifier {
        &self.id
    }

    fn bean_class(&self) -> &ClassName {
        &self.bean_class
    }

    fn observed_type(&self) -> &Type {
        &self.observed_type
    }

    fn observed_qualifiers(&self) -> &HashSet<QualifierInstance> {
        &self.observed_qualifiers
    }

    fn reception(&self) -> Reception {
        self.reception
    }

    fn transaction_phase(&self) -> TransactionPhase {
        self.phase
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_async(&self) -> bool {
        self.asynchronous
    }

    fn required_annotations(&self) -> &[ClassName] {
        &self.required_annotations
    }

    fn notify(&self, event: &EventContext) -> anyhow::Result<()> {
        let manager = self
            .manager
            .upgrade()
            .ok_or_else(|| anyhow!("管理器已随部署释放: {}", self.manager.id()))?;
        let guard = ReleaseOnDrop(manager.creational_context());
        let ctx = &guard.0;

        let instance = match &self.declaring_bean {
            None => None,
            Some(bean) if self.reception == Reception::IfExists => {
                let context = manager.context(bean.scope())?;
                if !context.is_active() {
                    trace!("作用域未激活，跳过观察者: {}", self.id);
                    return Ok(());
                }
                match context.get_if_exists(bean.as_ref()) {
                    Some(instance) => Some(instance),
                    None => {
                        trace!("组件实例不存在，跳过观察者: {}", self.id);
                        return Ok(());
                    }
                }
            }
            Some(bean) => Some(manager.get_reference(bean, ctx)?),
        };

        let parameters = self.parameters(event, ctx)?;
        (self.body)(&ObserverInvocation {
            bean: instance.as_ref(),
            event,
            parameters: &parameters,
        })
    }
}

impl fmt::Debug for ObserverMethodImpl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverMethodImpl")
            .field("id", &self.id)
            .field("observed_type", &self.observed_type)
            .field("priority", &self.priority)
            .field("phase", &self.phase)
            .field("async", &self.asynchronous)
            .finish()
    }
}

type NotifyFn = Arc<dyn Fn(&EventContext) -> anyhow::Result<()> + Send + Sync>;

static SYNTHETIC_OBSERVER_SEQ: AtomicUsize = AtomicUsize::new(0);

/// 由扩展或调用方直接构造的观察者
pub struct SyntheticObserverMethod {
    id: BeanIdentifier,
    bean_class: ClassName,
    observed_type: Type,
    observed_qualifiers: HashSet<QualifierInstance>,
    reception: Reception,
    phase: TransactionPhase,
    priority: i32,
    asynchronous: bool,
    required_annotations: Vec<ClassName>,
    notify: NotifyFn,
}

impl SyntheticObserverMethod {
    /// 创建合成观察者构建器
    pub fn builder(
        archive: impl Into<String>,
        bean_class: impl Into<ClassName>,
        observed_type: Type,
    ) -> SyntheticObserverMethodBuilder {
        SyntheticObserverMethodBuilder {
            archive: archive.into(),
            bean_class: bean_class.into(),
            identifier: None,
            observed_type,
            observed_qualifiers: HashSet::new(),
            reception: Reception::Always,
            phase: TransactionPhase::InProgress,
            priority: DEFAULT_PRIORITY,
            asynchronous: false,
            required_annotations: Vec::new(),
            notify: None,
        }
    }
}

impl ObserverMethod for SyntheticObserverMethod {
    fn id(&self) -> &BeanIdentifier {
        &self.id
    }

    fn bean_class(&self) -> &ClassName {
        &self.bean_class
    }

    fn observed_type(&self) -> &Type {
        &self.observed_type
    }

    fn observed_qualifiers(&self) -> &HashSet<QualifierInstance> {
        &self.observed_qualifiers
    }

    fn reception(&self) -> Reception {
        self.reception
    }

    fn transaction_phase(&self) -> TransactionPhase {
        self.phase
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_async(&self) -> bool {
        self.asynchronous
    }

    fn required_annotations(&self) -> &[ClassName] {
        &self.required_annotations
    }

    fn notify(&self, event: &EventContext) -> anyhow::Result<()> {
        (self.notify)(event)
    }
}

impl fmt::Debug for SyntheticObserverMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticObserverMethod")
            .field("id", &self.id)
            .field("observed_type", &self.observed_type)
            .field("priority", &self.priority)
            .finish()
    }
}

/// [`SyntheticObserverMethod`] 构建器
pub struct SyntheticObserverMethodBuilder {
    archive: String,
    bean_class: ClassName,
    identifier: Option<String>,
    observed_type: Type,
    observed_qualifiers: HashSet<QualifierInstance>,
    reception: Reception,
    phase: TransactionPhase,
    priority: i32,
    asynchronous: bool,
    required_annotations: Vec<ClassName>,
    notify: Option<NotifyFn>,
}

impl SyntheticObserverMethodBuilder {
    /// 标识中的成员部分，默认按创建顺序编号
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// 追加限定符
    pub fn qualifier(mut self, qualifier: QualifierInstance) -> Self {
        self.observed_qualifiers.insert(qualifier);
        self
    }

    /// 设置优先级
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 设置接收方式
    pub fn reception(mut self, reception: Reception) -> Self {
        self.reception = reception;
        self
    }

    /// 设置事务阶段
    pub fn phase(mut self, phase: TransactionPhase) -> Self {
        self.phase = phase;
        self
    }

    /// 标记为异步观察者
    pub fn asynchronous(mut self) -> Self {
        self.asynchronous = true;
        self
    }

    /// 仅接收带有给定注解的类型发现事件
    pub fn with_annotations(mut self, annotation: impl Into<ClassName>) -> Self {
        self.required_annotations.push(annotation.into());
        self
    }

    /// 设置通知回调
    pub fn notify_with<F>(mut self, notify: F) -> Self
    where
        F: Fn(&EventContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(notify));
        self
    }

    /// 以载荷类型 `E` 接收事件
    pub fn on<E, F>(self, handler: F) -> Self
    where
        E: Any,
        F: Fn(&E) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.notify_with(move |event: &EventContext| -> anyhow::Result<()> {
            let payload = event
                .payload_ref::<E>()
                .ok_or_else(|| anyhow!("事件载荷不是 {}", std::any::type_name::<E>()))?;
            handler(payload)
        })
    }

    /// 构建
    pub fn build(self) -> Arc<SyntheticObserverMethod> {
        let member = self
            .identifier
            .unwrap_or_else(|| format!("observer#{}", SYNTHETIC_OBSERVER_SEQ.fetch_add(1, Ordering::Relaxed)));
        let notify = self
            .notify
            .unwrap_or_else(|| Arc::new(|_: &EventContext| -> anyhow::Result<()> { Ok(()) }));
        Arc::new(SyntheticObserverMethod {
            id: BeanIdentifier::new(ComponentKind::ObserverMethod, self.archive, self.bean_class.as_str())
                .with_member(member),
            bean_class: self.bean_class,
            observed_type: self.observed_type,
            observed_qualifiers: self.observed_qualifiers,
            reception: self.reception,
            phase: self.phase,
            priority: self.priority,
            asynchronous: self.asynchronous,
            required_annotations: self.required_annotations,
            notify,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticBean;
    use crate::executor::TokioExecutor;
    use crate::manager::{BeanManager, Deployment, ModuleEnablement};
    use cdi_common::{names, AnnotationStore, ContainerConfig, TypeStore};
    use cdi_spi::EventMetadata;
    use parking_lot::Mutex;

    fn manager() -> BeanManager {
        let executor = Arc::new(TokioExecutor::new(&Default::default()).unwrap());
        let deployment = Deployment::new(
            ContainerConfig::default(),
            Arc::new(TypeStore::new()),
            Arc::new(AnnotationStore::new()),
            None,
            executor,
        );
        deployment.create_manager("app", ModuleEnablement::new())
    }

    struct Audit {
        seen: Mutex<Vec<String>>,
    }

    fn audit_bean() -> Arc<dyn Bean> {
        SyntheticBean::builder("app", "Audit")
            .scope(names::APPLICATION_SCOPED)
            .create(|| Audit {
                seen: Mutex::new(Vec::new()),
            })
            .build()
    }

    fn record_body() -> ObserverFn {
        Arc::new(|call: &ObserverInvocation<'_>| -> anyhow::Result<()> {
            let audit = call.bean::<Audit>()?;
            let event = call.event::<String>()?;
            audit.seen.lock().push(event.clone());
            Ok(())
        })
    }

    fn fire(observer: &dyn ObserverMethod, text: &str) -> anyhow::Result<()> {
        let payload: Arc<String> = Arc::new(text.to_string());
        let metadata = EventMetadata::new(Type::class("String"), HashSet::new());
        observer.notify(&EventContext::new(payload, Arc::new(metadata)))
    }

    #[test]
    fn test_if_exists_observer_skips_missing_instance() {
        let manager = manager();
        let bean = audit_bean();
        manager.add_bean(bean.clone()).unwrap();
        let observer = ObserverMethodImpl::new(
            manager.handle(),
            bean.clone(),
            "onMessage",
            record_body(),
            Type::class("String"),
            HashSet::new(),
        )
        .with_reception(Reception::IfExists);

        fire(&observer, "first").unwrap();
        let audit = manager.get_instance::<Audit>(&Type::class("Audit"), &[]).unwrap();
        assert!(audit.seen.lock().is_empty());

        fire(&observer, "second").unwrap();
        assert_eq!(*audit.seen.lock(), vec!["second".to_string()]);
    }

    #[test]
    fn test_always_observer_creates_instance() {
        let manager = manager();
        let bean = audit_bean();
        manager.add_bean(bean.clone()).unwrap();
        let observer = ObserverMethodImpl::new(
            manager.handle(),
            bean,
            "onMessage",
            record_body(),
            Type::class("String"),
            HashSet::new(),
        );
        fire(&observer, "hello").unwrap();
        let audit = manager.get_instance::<Audit>(&Type::class("Audit"), &[]).unwrap();
        assert_eq!(audit.seen.lock().len(), 1);
        assert_eq!(observer.id().member(), Some("onMessage"));
    }

    #[test]
    fn test_event_metadata_parameter() {
        let manager = manager();
        let captured = Arc::new(Mutex::new(None));
        let sink = captured.clone();
        let body: ObserverFn = Arc::new(move |call: &ObserverInvocation<'_>| -> anyhow::Result<()> {
            let metadata = call.parameters.get::<EventMetadata>("metadata")?;
            *sink.lock() = Some(metadata.event_type.clone());
            Ok(())
        });
        let observer = ObserverMethodImpl::static_method(
            manager.handle(),
            "app",
            ClassName::new("Listener"),
            "onAny",
            body,
            Type::object(),
            HashSet::new(),
        )
        .with_injection_points(vec![InjectionPoint::parameter(
            1,
            "metadata",
            Type::class(EVENT_METADATA_CLASS),
            HashSet::new(),
        )]);

        fire(&observer, "ping").unwrap();
        assert_eq!(*captured.lock(), Some(Type::class("String")));
    }

    #[test]
    fn test_synthetic_observer_builder() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let observer = SyntheticObserverMethod::builder("ext", "Extension", Type::class("String"))
            .priority(10)
            .asynchronous()
            .on(move |event: &String| {
                anyhow::ensure!(event == "ping", "unexpected {}", event);
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .build();

        assert_eq!(observer.priority(), 10);
        assert!(observer.is_async());
        fire(observer.as_ref(), "ping").unwrap();
        assert!(fire(observer.as_ref(), "pong").is_err());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let other = SyntheticObserverMethod::builder("ext", "Extension", Type::class("String")).build();
        assert_ne!(observer.id(), other.id());
    }
}
