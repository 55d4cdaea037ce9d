//! 部署流程集成测试
mod common;

use cdi_common::{names, Annotation, AnnotatedField, ClassName, AnnotatedMethod, AnnotatedType, AnnotationDefinition, ClassDefinition, ContainerError, Type};
use cdi_impl::beans::SyntheticObserverMethod;
use cdi_impl::event::ProcessAnnotatedType;
use cdi_impl::{BeanArchive, BeanImplementation, Container};
use cdi_spi::{Instance, Lifecycle, LifecycleState};
use common::*;
use std::sync::Arc;

async fn started(fixture: &Fixture, journal: &Journal) -> anyhow::Result<Container> {
    let mut container = fixture.builder().add_archive(vehicle_archive(fixture, journal)).build()?;
    container.on_start().await?;
    Ok(container)
}

#[tokio::test]
async fn test_car_receives_default_engine() -> anyhow::Result<()> {
    let fixture = Fixture::vehicles()?;
    let container = started(&fixture, &journal()).await?;
    let manager = container.manager("app").expect("app 管理器");

    let first = manager.get_instance::<Car>(&Type::class("com.acme.Car"), &[])?;
    let second = manager.get_instance::<Car>(&Type::class("com.acme.Vehicle"), &[])?;
    assert_eq!(first.engine.horsepower, 450);
    // 依赖作用域的 Car 每次都是新实例，应用作用域的引擎是同一个
    assert!(!Arc::ptr_eq(first.get(), second.get()));
    assert!(Arc::ptr_eq(&first.engine, &second.engine));
    Ok(())
}

#[tokio::test]
async fn test_default_qualifier_convention() -> anyhow::Result<()> {
    let fixture = Fixture::vehicles()?;
    let container = started(&fixture, &journal()).await?;
    let manager = container.manager("app").expect("app 管理器");
    let engine = Type::class("com.acme.Engine");

    let default = manager.get_bean(&engine, &[])?;
    assert_eq!(default.bean_class().as_str(), "com.acme.V8Engine");
    let fast = manager.get_bean(&engine, &[Annotation::new("com.acme.Fast")])?;
    assert_eq!(fast.bean_class().as_str(), "com.acme.ElectricEngine");
    assert_eq!(manager.get_beans(&engine, &[Annotation::new(names::ANY)])?.len(), 2);

    let electric = manager.get_instance::<ElectricEngine>(&engine, &[Annotation::new("com.acme.Fast")])?;
    assert_eq!(electric.horsepower, 300);
    Ok(())
}

#[tokio::test]
async fn test_observers_notified_by_priority() -> anyhow::Result<()> {
    let fixture = Fixture::vehicles()?;
    let journal = journal();
    let container = started(&fixture, &journal).await?;
    let manager = container.manager("app").expect("app 管理器");

    manager.fire_event(Arc::new(Ignition { key: 7 }), &Type::class("com.acme.Ignition"), &[])?;
    assert_eq!(*journal.lock(), vec!["dashboard:7", "car:7:450", "alarm:7"]);

    let priorities: Vec<i32> = manager
        .resolve_observer_methods(&Type::class("com.acme.Ignition"), &[])?
        .iter()
        .map(|o| o.priority())
        .collect();
    assert_eq!(priorities, vec![5, 10, 20]);
    Ok(())
}

#[tokio::test]
async fn test_unsatisfied_injection_point_fails_start() -> anyhow::Result<()> {
    let fixture = Fixture::vehicles()?;
    let archive = with_vehicle_implementations(
        BeanArchive::new("app").with_types(fixture.types_except(&["com.acme.V8Engine"])),
        &journal(),
    );
    let mut container = fixture.builder().add_archive(archive).build()?;

    let error = container.on_start().await.expect_err("Car.engine 无法满足");
    match error {
        ContainerError::Validation { errors } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].is_unsatisfied());
        }
        other => panic!("意外的错误: {}", other),
    }
    assert_eq!(container.lifecycle_state(), LifecycleState::Error);
    Ok(())
}

#[tokio::test]
async fn test_extension_vetoes_annotated_type() -> anyhow::Result<()> {
    let fixture = Fixture::vehicles()?;
    let veto = SyntheticObserverMethod::builder(
        "extensions",
        "VetoExtension",
        ProcessAnnotatedType::event_type_for(&ClassName::new("com.acme.ElectricEngine")),
    )
    .on(|event: &ProcessAnnotatedType| {
        event.veto();
        Ok(())
    })
    .build();
    let mut container = fixture
        .builder()
        .add_archive(vehicle_archive(&fixture, &journal()))
        .add_extension_observer(veto)
        .build()?;
    container.on_start().await?;

    let manager = container.manager("app").expect("app 管理器");
    let engines = manager.get_beans(&Type::class("com.acme.Engine"), &[Annotation::new(names::ANY)])?;
    assert_eq!(engines.len(), 1);
    assert!(manager
        .get_bean(&Type::class("com.acme.Engine"), &[Annotation::new("com.acme.Fast")])
        .is_err_and(|e| e.is_unsatisfied()));
    Ok(())
}

#[tokio::test]
async fn test_archive_accessibility_controls_visibility() -> anyhow::Result<()> {
    let fixture = Fixture::vehicles()?;
    let engines: Vec<AnnotatedType> = fixture
        .types
        .iter()
        .filter(|t| t.class().as_str().ends_with("Engine"))
        .cloned()
        .collect();
    let cars = fixture.types_except(&["com.acme.V8Engine", "com.acme.ElectricEngine"]);

    let build = |accessible: bool| {
        let log = journal();
        let mut app = with_vehicle_implementations(BeanArchive::new("app").with_types(cars.clone()), &log);
        if accessible {
            app = app.accessing("engines");
        }
        let lib = with_vehicle_implementations(BeanArchive::new("engines").with_types(engines.clone()), &log);
        fixture.builder().add_archive(app).add_archive(lib).build()
    };

    let mut visible = build(true)?;
    visible.on_start().await?;
    let car = visible
        .manager("app")
        .expect("app 管理器")
        .get_instance::<Car>(&Type::class("com.acme.Car"), &[])?;
    assert_eq!(car.engine.horsepower, 450);

    let mut hidden = build(false)?;
    assert!(hidden.on_start().await.is_err());
    Ok(())
}

#[derive(Debug)]
struct PlainGreeter;

struct LoudGreeter {
    inner: Instance,
}

#[derive(Debug)]
struct Ledger;

#[tokio::test]
async fn test_interceptors_and_decorators_discovered() -> anyhow::Result<()> {
    let log = journal();
    let intercepted = log.clone();

    let greeter = Type::class("com.acme.Greeter");
    let types = vec![
        AnnotatedType::new(ClassDefinition::new("com.acme.PlainGreeter").implements(greeter.clone()))
            .with_annotation(Annotation::new(names::DEPENDENT)),
        AnnotatedType::new(ClassDefinition::new("com.acme.LoudGreeter").implements(greeter.clone()))
            .with_annotation(Annotation::new(names::DECORATOR))
            .with_annotation(Annotation::priority(10))
            .with_field(
                AnnotatedField::new("delegate", greeter.clone())
                    .with_annotation(Annotation::new(names::INJECT))
                    .with_annotation(Annotation::new(names::DELEGATE)),
            ),
        AnnotatedType::new(ClassDefinition::new("com.acme.Ledger"))
            .with_annotation(Annotation::new(names::APPLICATION_SCOPED))
            .with_annotation(Annotation::new("com.acme.Audited")),
        AnnotatedType::new(ClassDefinition::new("com.acme.AuditInterceptor"))
            .with_annotation(Annotation::new(names::INTERCEPTOR))
            .with_annotation(Annotation::new("com.acme.Audited"))
            .with_annotation(Annotation::priority(100))
            .with_method(AnnotatedMethod::new("afterCreate").with_annotation(Annotation::new(names::POST_CONSTRUCT))),
    ];
    let archive = BeanArchive::new("app")
        .with_types(types)
        .with_implementation("com.acme.PlainGreeter", BeanImplementation::new(|_| Ok(PlainGreeter)))
        .with_implementation(
            "com.acme.LoudGreeter",
            BeanImplementation::empty().decorator(|delegate, _| Ok(Arc::new(LoudGreeter { inner: delegate }))),
        )
        .with_implementation("com.acme.Ledger", BeanImplementation::new(|_| Ok(Ledger)))
        .with_implementation(
            "com.acme.AuditInterceptor",
            BeanImplementation::new(|_| Ok(())).interceptor(move |kind, _, target| {
                assert!(target.downcast_ref::<Ledger>().is_some());
                intercepted.lock().push(format!("{}", kind));
                Ok(())
            }),
        );

    let mut container = Container::builder()
        .add_class(ClassDefinition::interface("com.acme.Greeter"))
        .add_annotation(AnnotationDefinition::interceptor_binding("com.acme.Audited"))
        .add_archive(archive)
        .build()?;
    container.on_start().await?;
    let manager = container.manager("app").expect("app 管理器");

    let loud = manager.get_instance::<LoudGreeter>(&greeter, &[])?;
    assert!(loud.inner.downcast_ref::<PlainGreeter>().is_some());

    manager.get_instance::<Ledger>(&Type::class("com.acme.Ledger"), &[])?;
    assert_eq!(log.lock().len(), 1);
    Ok(())
}
