//! 内置组件
//!
//! 每个管理器自带 `BeanManager` 与 `Event<T>` 两个内置组件，它们只在所属管理器内可见。

use super::synthetic::SyntheticBean;
use crate::event::Event;
use crate::manager::ManagerHandle;
use anyhow::anyhow;
use cdi_common::{ClassDefinition, ClassName, Type, TypeStore};
use cdi_spi::{Bean, BeanKind, CreationalContext, Instance};
use std::sync::Arc;

/// `Event` 的类名
pub const EVENT_CLASS: &str = "jakarta.enterprise.event.Event";
/// `BeanManager` 的类名
pub const BEAN_MANAGER_CLASS: &str = "jakarta.enterprise.inject.spi.BeanManager";
/// `EventMetadata` 的类名
pub const EVENT_METADATA_CLASS: &str = "jakarta.enterprise.inject.spi.EventMetadata";

/// 只以 `@Any` 解析的门面类型
pub const FACADE_TYPES: &[&str] = &[EVENT_CLASS];

/// 在类型仓库中登记内置组件的类型
pub fn register_builtin_types(types: &TypeStore) {
    types.register_all([
        ClassDefinition::interface(EVENT_CLASS).with_type_parameter("T"),
        ClassDefinition::interface(BEAN_MANAGER_CLASS),
        ClassDefinition::interface(EVENT_METADATA_CLASS),
    ]);
}

fn identifier(class: &str, handle: &ManagerHandle) -> String {
    format!("{}#{}", class, handle.id().index())
}

fn detached(handle: &ManagerHandle) -> anyhow::Error {
    anyhow!("管理器已随部署释放: {}", handle.id())
}

/// `BeanManager` 内置组件，实例为所属管理器本身
pub fn bean_manager_bean(archive: &str, handle: ManagerHandle) -> Arc<dyn Bean> {
    SyntheticBean::builder(archive, BEAN_MANAGER_CLASS)
        .identifier(identifier(BEAN_MANAGER_CLASS, &handle))
        .kind(BeanKind::BuiltIn)
        .not_passivation_capable()
        .create_with(move |_: &CreationalContext| -> anyhow::Result<Instance> {
            let manager = handle.upgrade().ok_or_else(|| detached(&handle))?;
            Ok(Arc::new(manager))
        })
        .build()
}

/// `Event<T>` 内置组件
///
/// 事件类型取自注入点类型的第一个类型实参，限定符取自注入点。
pub fn event_bean(archive: &str, handle: ManagerHandle) -> Arc<dyn Bean> {
    SyntheticBean::builder(archive, EVENT_CLASS)
        .identifier(identifier(EVENT_CLASS, &handle))
        .kind(BeanKind::BuiltIn)
        .add_type(Type::parameterized(EVENT_CLASS, vec![Type::variable("T")]))
        .not_passivation_capable()
        .create_with(move |ctx: &CreationalContext| -> anyhow::Result<Instance> {
            let manager = handle.upgrade().ok_or_else(|| detached(&handle))?;
            let ip = ctx
                .current_injection_point()
                .ok_or_else(|| anyhow!("事件门面只能通过注入点获取"))?;
            let event_type = ip
                .required_type
                .type_arguments()
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("事件注入点缺少类型实参: {}", ip))?;
            let qualifiers = ip.qualifiers.iter().filter(|q| !q.is_any()).cloned().collect();
            Ok(Arc::new(Event::new(manager, event_type, qualifiers, Some(ip))))
        })
        .build()
}

/// 组件类是否为内置组件类
pub fn is_builtin_class(class: &ClassName) -> bool {
    class.as_str() == EVENT_CLASS || class.as_str() == BEAN_MANAGER_CLASS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::TokioExecutor;
    use crate::manager::{Deployment, ModuleEnablement};
    use cdi_common::{AnnotationStore, ContainerConfig, QualifierInstance};
    use cdi_spi::InjectionPoint;
    use std::collections::HashSet;

    #[test]
    fn test_event_bean_reads_injection_point() {
        let executor = Arc::new(TokioExecutor::new(&Default::default()).unwrap());
        let deployment = Deployment::new(
            ContainerConfig::default(),
            Arc::new(TypeStore::new()),
            Arc::new(AnnotationStore::new()),
            None,
            executor,
        );
        let manager = deployment.create_manager("app", ModuleEnablement::new());
        let ip = InjectionPoint::field(
            "orders",
            Type::parameterized(EVENT_CLASS, vec![Type::class("Order")]),
            HashSet::from([QualifierInstance::named("paid")]),
        );

        let bean = manager.get_beans_for_injection_point(&ip).unwrap();
        assert_eq!(bean.len(), 1);
        assert_eq!(bean[0].kind(), BeanKind::BuiltIn);

        let ctx = manager.creational_context();
        let event = manager.get_injectable_reference(&ip, &ctx).unwrap();
        let event = event.downcast::<Event>().unwrap();
        assert_eq!(event.event_type(), &Type::class("Order"));
        assert!(event.qualifiers().contains(&QualifierInstance::named("paid")));
    }

    #[test]
    fn test_event_bean_requires_injection_point() {
        let handle = ManagerHandle::new(std::sync::Weak::new(), crate::manager::ManagerId::default());
        let bean = event_bean("app", handle);
        assert!(bean.create(&CreationalContext::new(None)).is_err());
        assert!(is_builtin_class(bean.bean_class()));
    }
}
