//! 注入的事件对象

use super::async_stage::NotificationStage;
use crate::manager::BeanManager;
use cdi_common::{Annotation, ContainerResult, DefinitionError, QualifierInstance, Type, TypeResolutionError};
use cdi_spi::{AsyncExecutor, EventMetadata, InjectionPoint, Payload};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// 事件门面
///
/// 持有事件类型与限定符，通过 [`Event::select`] 派生带有更多限定符的门面。
#[derive(Clone)]
pub struct Event {
    manager: BeanManager,
    event_type: Type,
    qualifiers: HashSet<QualifierInstance>,
    injection_point: Option<InjectionPoint>,
    /// 限定符全部来自注入点或容器时可以缓存观察者解析结果
    cacheable: bool,
}

impl Event {
    pub(crate) fn new(
        manager: BeanManager,
        event_type: Type,
        qualifiers: HashSet<QualifierInstance>,
        injection_point: Option<InjectionPoint>,
    ) -> Self {
        Self {
            manager,
            event_type,
            qualifiers,
            injection_point,
            cacheable: true,
        }
    }

    /// 事件类型
    pub fn event_type(&self) -> &Type {
        &self.event_type
    }

    /// 限定符
    pub fn qualifiers(&self) -> &HashSet<QualifierInstance> {
        &self.qualifiers
    }

    /// 注入本门面的注入点
    pub fn injection_point(&self) -> Option<&InjectionPoint> {
        self.injection_point.as_ref()
    }

    /// 追加限定符
    pub fn select(&self, qualifiers: &[Annotation]) -> ContainerResult<Event> {
        self.select_type(self.event_type.clone(), qualifiers)
    }

    /// 以子类型与追加的限定符派生门面
    pub fn select_type(&self, subtype: Type, qualifiers: &[Annotation]) -> ContainerResult<Event> {
        if subtype.has_unresolved_variables() {
            return Err(TypeResolutionError::UnresolvedTypeVariable {
                ty: subtype.to_string(),
            }
            .into());
        }
        let types = self.manager.env().types();
        let is_subtype = match (subtype.raw_class(), self.event_type.raw_class()) {
            (Some(sub), Some(sup)) => types.is_subclass(sub, sup),
            _ => subtype == self.event_type,
        };
        if !is_subtype {
            return Err(TypeResolutionError::NotSubtype {
                sub: subtype.to_string(),
                sup: self.event_type.to_string(),
            }
            .into());
        }

        let annotations = self.manager.env().annotations();
        let added = QualifierInstance::of_all(qualifiers, annotations)?;
        let mut merged = self.qualifiers.clone();
        for qualifier in added {
            let repeatable = annotations.qualifier_model(qualifier.annotation_type()).repeatable;
            let duplicate = merged
                .iter()
                .any(|existing| existing.annotation_type() == qualifier.annotation_type());
            if duplicate && !repeatable {
                return Err(DefinitionError::DuplicateQualifiers {
                    qualifiers: qualifier.annotation_type().to_string(),
                }
                .into());
            }
            merged.insert(qualifier);
        }

        Ok(Self {
            manager: self.manager.clone(),
            event_type: subtype,
            qualifiers: merged,
            injection_point: self.injection_point.clone(),
            cacheable: self.cacheable && qualifiers.is_empty(),
        })
    }

    fn metadata(&self) -> EventMetadata {
        let metadata = EventMetadata::new(self.event_type.clone(), self.qualifiers.clone());
        match &self.injection_point {
            Some(ip) => metadata.with_injection_point(ip.clone()),
            None => metadata,
        }
    }

    /// 同步触发
    pub fn fire<E: Any + Send + Sync>(&self, payload: E) -> ContainerResult<()> {
        self.fire_payload(Arc::new(payload))
    }

    /// 同步触发已装箱的事件载荷
    pub fn fire_payload(&self, payload: Payload) -> ContainerResult<()> {
        self.manager.fire_sync(payload, self.metadata(), self.cacheable)
    }

    /// 在部署的默认执行器上异步触发
    pub fn fire_async<E: Any + Send + Sync>(&self, payload: E) -> ContainerResult<NotificationStage<Arc<E>>> {
        self.fire_async_on(payload, None)
    }

    /// 在给定执行器上异步触发，后续阶段也在该执行器上运行
    pub fn fire_async_with<E: Any + Send + Sync>(
        &self,
        payload: E,
        executor: Arc<dyn AsyncExecutor>,
    ) -> ContainerResult<NotificationStage<Arc<E>>> {
        self.fire_async_on(payload, Some(executor))
    }

    fn fire_async_on<E: Any + Send + Sync>(
        &self,
        payload: E,
        executor: Option<Arc<dyn AsyncExecutor>>,
    ) -> ContainerResult<NotificationStage<Arc<E>>> {
        let typed = Arc::new(payload);
        let erased: Payload = typed.clone();
        let stage = self
            .manager
            .fire_async(erased, self.metadata(), executor, self.cacheable)?;
        Ok(stage.then_apply(move |_| typed))
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("manager", &self.manager.id())
            .field("event_type", &self.event_type)
            .field("qualifiers", &self.qualifiers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beans::SyntheticObserverMethod;
    use crate::executor::TokioExecutor;
    use crate::manager::{Deployment, ModuleEnablement};
    use cdi_common::{AnnotationDefinition, AnnotationStore, ClassDefinition, ContainerConfig, TypeStore};
    use parking_lot::Mutex;

    struct OrderPlaced {
        id: u32,
    }

    fn manager() -> BeanManager {
        let types = Arc::new(TypeStore::new());
        types.register(ClassDefinition::new("OrderEvent"));
        types.register(ClassDefinition::new("OrderPlaced").extends(Type::class("OrderEvent")));
        let annotations = Arc::new(AnnotationStore::new());
        annotations.register(AnnotationDefinition::qualifier("Urgent"));
        let executor = Arc::new(TokioExecutor::current_or_new(&Default::default()).unwrap());
        let deployment = Deployment::new(ContainerConfig::default(), types, annotations, None, executor);
        deployment.create_manager("app", ModuleEnablement::new())
    }

    #[test]
    fn test_select_routes_to_qualified_observers() {
        let manager = manager();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let all = seen.clone();
        let urgent = seen.clone();
        manager
            .add_observer(
                SyntheticObserverMethod::builder("app", "Listener", Type::class("OrderEvent"))
                    .on(move |e: &OrderPlaced| {
                        all.lock().push(format!("all:{}", e.id));
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();
        manager
            .add_observer(
                SyntheticObserverMethod::builder("app", "Listener", Type::class("OrderPlaced"))
                    .qualifier(QualifierInstance::of_type("Urgent"))
                    .on(move |e: &OrderPlaced| {
                        urgent.lock().push(format!("urgent:{}", e.id));
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();

        let event = manager.event(Type::class("OrderEvent"));
        event
            .select_type(Type::class("OrderPlaced"), &[])
            .unwrap()
            .fire(OrderPlaced { id: 1 })
            .unwrap();
        event
            .select_type(Type::class("OrderPlaced"), &[Annotation::new("Urgent")])
            .unwrap()
            .fire(OrderPlaced { id: 2 })
            .unwrap();

        assert_eq!(*seen.lock(), vec!["all:1", "all:2", "urgent:2"]);
    }

    #[test]
    fn test_select_rejects_duplicate_and_foreign_types() {
        let manager = manager();
        let event = manager.event(Type::class("OrderEvent"));
        let urgent = event.select(&[Annotation::new("Urgent")]).unwrap();
        assert!(urgent.select(&[Annotation::new("Urgent")]).is_err());
        assert!(event.select_type(Type::class("String"), &[]).is_err());
        assert!(event.select_type(Type::variable("T"), &[]).is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_fire_async_returns_typed_payload() {
        let manager = manager();
        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        manager
            .add_observer(
                SyntheticObserverMethod::builder("app", "Listener", Type::class("OrderPlaced"))
                    .asynchronous()
                    .on(move |_: &OrderPlaced| {
                        *counter.lock() += 1;
                        Ok(())
                    })
                    .build(),
            )
            .unwrap();

        let executor: Arc<dyn AsyncExecutor> = Arc::new(TokioExecutor::current_or_new(&Default::default()).unwrap());
        let stage = manager
            .event(Type::class("OrderPlaced"))
            .fire_async_with(OrderPlaced { id: 7 }, executor.clone())
            .unwrap();
        assert_eq!(stage.executor().name(), executor.name());
        let payload = stage.await.unwrap();
        assert_eq!(payload.id, 7);
        assert_eq!(*hits.lock(), 1);
    }
}
