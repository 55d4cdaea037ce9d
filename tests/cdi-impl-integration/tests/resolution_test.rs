//! 解析与事件集成测试
mod common;

use cdi_common::{
    names, Annotation, AnnotationDefinition, AnnotationStore, ClassDefinition, ContainerConfig, MemberValue,
    QualifierInstance, Type, TypeStore,
};
use cdi_impl::beans::{SyntheticBean, SyntheticObserverMethod};
use cdi_impl::event::ResolvedObservers;
use cdi_impl::{BeanManager, Deployment, ModuleEnablement, TokioExecutor};
use cdi_spi::{Bean, TransactionPhase};
use common::Journal;
use parking_lot::Mutex;
use std::sync::Arc;

fn deployment() -> anyhow::Result<Arc<Deployment>> {
    let types = Arc::new(TypeStore::new());
    types.register(ClassDefinition::interface("com.acme.Engine"));
    types.register(ClassDefinition::new("com.acme.V8Engine").implements(Type::class("com.acme.Engine")));
    types.register(ClassDefinition::new("com.acme.ElectricEngine").implements(Type::class("com.acme.Engine")));
    types.register(ClassDefinition::new("com.acme.Ignition"));
    let annotations = Arc::new(AnnotationStore::new());
    annotations.register(AnnotationDefinition::qualifier("com.acme.Urgent"));
    annotations.register(
        AnnotationDefinition::qualifier("com.acme.Tier")
            .with_member("level", None)
            .with_nonbinding_member("comment", Some(MemberValue::Str(String::new()))),
    );
    let executor = Arc::new(TokioExecutor::current_or_new(&Default::default())?);
    Ok(Deployment::new(ContainerConfig::default(), types, annotations, None, executor))
}

fn engine(manager: &BeanManager, class: &str) -> Arc<SyntheticBean> {
    SyntheticBean::builder(manager.archive(), class)
        .types(manager.env().bean_types(&Type::class(class)))
        .scope(names::APPLICATION_SCOPED)
        .create(|| ())
        .build()
}

fn bean_classes(beans: &[Arc<dyn Bean>]) -> Vec<String> {
    let mut classes: Vec<String> = beans.iter().map(|b| b.bean_class().to_string()).collect();
    classes.sort();
    classes
}

#[test]
fn test_qualifier_equality_ignores_nonbinding_members() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let store = deployment.env().annotations();
    let tier = |level: i64, comment: &str| {
        Annotation::new("com.acme.Tier")
            .with("level", MemberValue::Int(level))
            .with("comment", MemberValue::Str(comment.to_string()))
    };

    let gold = QualifierInstance::of(&tier(1, "gold"), store)?;
    let renamed = QualifierInstance::of(&tier(1, "premium"), store)?;
    let silver = QualifierInstance::of(&tier(2, "gold"), store)?;
    assert_eq!(gold, renamed);
    assert_ne!(gold, silver);
    Ok(())
}

#[test]
fn test_resolution_is_deterministic() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let manager = deployment.create_manager("app", ModuleEnablement::new());
    manager.add_bean(engine(&manager, "com.acme.V8Engine"))?;
    manager.add_bean(engine(&manager, "com.acme.ElectricEngine"))?;

    let ty = Type::class("com.acme.Engine");
    let first = manager.get_beans(&ty, &[])?;
    let second = manager.get_beans(&ty, &[])?;
    let uncached = manager.get_beans(&ty, &[Annotation::new(names::DEFAULT)])?;
    assert_eq!(bean_classes(&first), bean_classes(&second));
    assert_eq!(bean_classes(&first), bean_classes(&uncached));
    assert_eq!(first.len(), 2);
    Ok(())
}

#[test]
fn test_registration_invalidates_cached_results() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let app = deployment.create_manager("app", ModuleEnablement::new());
    let lib = deployment.create_manager("lib", ModuleEnablement::new());
    app.add_accessible_manager(&lib)?;

    let ty = Type::class("com.acme.Engine");
    assert!(app.get_beans(&ty, &[])?.is_empty());

    lib.add_bean(engine(&lib, "com.acme.V8Engine"))?;
    assert_eq!(bean_classes(&app.get_beans(&ty, &[])?), vec!["com.acme.V8Engine"]);

    app.add_bean(engine(&app, "com.acme.ElectricEngine"))?;
    assert_eq!(app.get_beans(&ty, &[])?.len(), 2);
    assert_eq!(lib.get_beans(&ty, &[])?.len(), 1);
    Ok(())
}

#[test]
fn test_unsatisfied_and_ambiguous_resolution() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let manager = deployment.create_manager("app", ModuleEnablement::new());
    let ty = Type::class("com.acme.Engine");

    assert!(manager.get_bean(&ty, &[]).is_err_and(|e| e.is_unsatisfied()));

    manager.add_bean(engine(&manager, "com.acme.V8Engine"))?;
    manager.add_bean(engine(&manager, "com.acme.ElectricEngine"))?;
    assert!(manager.get_bean(&ty, &[]).is_err_and(|e| e.is_ambiguous()));

    // 带优先级的备选组件消除歧义
    manager.add_bean(
        SyntheticBean::builder(manager.archive(), "com.acme.TestEngine")
            .add_type(ty.clone())
            .alternative()
            .priority(100)
            .create(|| ())
            .build(),
    )?;
    assert_eq!(manager.get_bean(&ty, &[])?.bean_class().as_str(), "com.acme.TestEngine");
    Ok(())
}

#[test]
fn test_event_partitions_and_sync_delivery() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let manager = deployment.create_manager("app", ModuleEnablement::new());
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let ignition = Type::class("com.acme.Ignition");

    let observer = |label: &'static str| {
        let journal = journal.clone();
        SyntheticObserverMethod::builder("app", "com.acme.Listener", ignition.clone())
            .identifier(label)
            .on(move |_: &common::Ignition| {
                journal.lock().push(label.to_string());
                Ok(())
            })
    };
    manager.add_observer(observer("first").build())?;
    manager.add_observer(observer("second").build())?;
    manager.add_observer(observer("after-success").phase(TransactionPhase::AfterSuccess).build())?;
    manager.add_observer(observer("async").asynchronous().build())?;

    let resolved = ResolvedObservers::partition(&manager.resolve_observer_methods(&ignition, &[])?);
    assert_eq!(resolved.immediate().len(), 2);
    assert_eq!(resolved.transactional().len(), 1);
    assert_eq!(resolved.asynchronous().len(), 1);

    // 没有事务服务时事务观察者立即通知，异步观察者不参与同步触发
    manager.fire_event(Arc::new(common::Ignition { key: 1 }), &ignition, &[])?;
    let mut seen = journal.lock().clone();
    seen.sort();
    assert_eq!(seen, vec!["after-success", "first", "second"]);
    Ok(())
}

#[test]
fn test_observer_registration_invalidates_event_resolution() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let app = deployment.create_manager("app", ModuleEnablement::new());
    let lib = deployment.create_manager("lib", ModuleEnablement::new());
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let ignition = Type::class("com.acme.Ignition");

    let observer = |archive: &str, label: &'static str| {
        let journal = journal.clone();
        SyntheticObserverMethod::builder(archive, "com.acme.Listener", ignition.clone())
            .identifier(label)
            .on(move |event: &common::Ignition| {
                journal.lock().push(format!("{}:{}", label, event.key));
                Ok(())
            })
            .build()
    };

    // 第一次触发使空的解析结果进入缓存
    app.fire_event(Arc::new(common::Ignition { key: 1 }), &ignition, &[])?;
    assert!(journal.lock().is_empty());

    app.add_observer(observer("app", "local"))?;
    app.fire_event(Arc::new(common::Ignition { key: 2 }), &ignition, &[])?;
    assert_eq!(*journal.lock(), vec!["local:2"]);

    lib.add_observer(observer("lib", "shared"))?;
    app.fire_event(Arc::new(common::Ignition { key: 3 }), &ignition, &[])?;
    assert_eq!(journal.lock().len(), 2);

    app.add_accessible_manager(&lib)?;
    app.fire_event(Arc::new(common::Ignition { key: 4 }), &ignition, &[])?;
    let mut seen = journal.lock().clone();
    seen.sort();
    assert_eq!(seen, vec!["local:2", "local:3", "local:4", "shared:4"]);
    Ok(())
}

#[test]
fn test_equal_priority_observers_run_in_registration_order() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let manager = deployment.create_manager("app", ModuleEnablement::new());
    let journal: Journal = Arc::new(Mutex::new(Vec::new()));
    let ignition = Type::class("com.acme.Ignition");

    for (label, priority) in [("wipers", 10), ("radio", 10), ("lights", 5), ("heater", 10), ("seats", 20)] {
        let journal = journal.clone();
        manager.add_observer(
            SyntheticObserverMethod::builder("app", "com.acme.Listener", ignition.clone())
                .identifier(label)
                .priority(priority)
                .on(move |_: &common::Ignition| {
                    journal.lock().push(label.to_string());
                    Ok(())
                })
                .build(),
        )?;
    }

    manager.fire_event(Arc::new(common::Ignition { key: 9 }), &ignition, &[])?;
    assert_eq!(*journal.lock(), vec!["lights", "wipers", "radio", "heater", "seats"]);
    Ok(())
}

#[test]
fn test_extension_style_beans_resolved_by_name() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let manager = deployment.create_manager("app", ModuleEnablement::new());
    let data_source = Type::class("com.acme.DataSource");
    for name in ["primary", "replica"] {
        manager.add_bean(
            SyntheticBean::builder(manager.archive(), "com.acme.DataSource")
                .qualifier(QualifierInstance::named(name))
                .scope(names::APPLICATION_SCOPED)
                .create(move || name.to_string())
                .build(),
        )?;
    }

    let replica = manager.get_bean(&data_source, &[Annotation::named("replica")])?;
    assert!(replica.qualifiers().contains(&QualifierInstance::named("replica")));
    let primary = manager.get_bean(&data_source, &[Annotation::named("primary")])?;
    assert_ne!(primary.id(), replica.id());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn test_async_fire_propagates_metadata() -> anyhow::Result<()> {
    let deployment = deployment()?;
    let manager = deployment.create_manager("app", ModuleEnablement::new());
    let ignition = Type::class("com.acme.Ignition");
    let observed = Arc::new(Mutex::new(None));

    let slot = observed.clone();
    manager.add_observer(
        SyntheticObserverMethod::builder("app", "com.acme.Listener", ignition.clone())
            .qualifier(QualifierInstance::of_type("com.acme.Urgent"))
            .asynchronous()
            .notify_with(move |event| {
                *slot.lock() = Some(event.metadata().clone());
                Ok(())
            })
            .build(),
    )?;

    let stage = manager.fire_event_async(
        Arc::new(common::Ignition { key: 3 }),
        &ignition,
        &[Annotation::new("com.acme.Urgent")],
        None,
    )?;
    let fired = stage.shared_metadata();
    let executor = stage.executor().name().to_string();
    let chained = stage.then_apply(|payload| payload);
    assert_eq!(chained.executor().name(), executor);
    chained.await?;

    let metadata = observed.lock().clone().expect("异步观察者已通知");
    assert_eq!(metadata.id, fired.id);
    assert!(metadata.qualifiers.contains(&QualifierInstance::of_type("com.acme.Urgent")));
    assert_eq!(metadata.event_type, ignition);
    Ok(())
}
