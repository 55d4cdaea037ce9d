//! 集成测试共用的夹具与组件实现
#![allow(dead_code)]

use cdi_common::{AnnotatedType, AnnotationDefinition, ClassDefinition};
use cdi_impl::{BeanArchive, BeanImplementation, ContainerBuilder};
use parking_lot::Mutex;
use serde::Deserialize;
use std::sync::Arc;

/// 描述符夹具
#[derive(Debug, Deserialize)]
pub struct Fixture {
    #[serde(default)]
    pub classes: Vec<ClassDefinition>,
    #[serde(default)]
    pub annotations: Vec<AnnotationDefinition>,
    pub types: Vec<AnnotatedType>,
}

impl Fixture {
    pub fn vehicles() -> anyhow::Result<Self> {
        Ok(serde_json::from_str(include_str!("../fixtures/vehicles.json"))?)
    }

    pub fn types_except(&self, excluded: &[&str]) -> Vec<AnnotatedType> {
        self.types
            .iter()
            .filter(|t| !excluded.contains(&t.class().as_str()))
            .cloned()
            .collect()
    }

    /// 登记夹具中的类与注解定义
    pub fn builder(&self) -> ContainerBuilder {
        let mut builder = ContainerBuilder::new().add_classes(self.classes.clone());
        for definition in &self.annotations {
            builder = builder.add_annotation(definition.clone());
        }
        builder
    }
}

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

#[derive(Debug)]
pub struct V8Engine {
    pub horsepower: u32,
}

#[derive(Debug)]
pub struct ElectricEngine {
    pub horsepower: u32,
}

#[derive(Debug)]
pub struct Car {
    pub engine: Arc<V8Engine>,
}

#[derive(Debug)]
pub struct Dashboard;

#[derive(Debug)]
pub struct Ignition {
    pub key: u32,
}

/// 夹具类型的实现，观察者把调用记入 `journal`
pub fn with_vehicle_implementations(archive: BeanArchive, journal: &Journal) -> BeanArchive {
    let car = journal.clone();
    let dashboard = journal.clone();
    let alarm = journal.clone();
    archive
        .with_implementation(
            "com.acme.V8Engine",
            BeanImplementation::new(|_| Ok(V8Engine { horsepower: 450 })),
        )
        .with_implementation(
            "com.acme.ElectricEngine",
            BeanImplementation::new(|_| Ok(ElectricEngine { horsepower: 300 })),
        )
        .with_implementation(
            "com.acme.Car",
            BeanImplementation::new(|values| {
                Ok(Car {
                    engine: values.get::<V8Engine>("engine")?,
                })
            })
            .observer("onIgnition", move |invocation| {
                let engine = &invocation.bean::<Car>()?.engine;
                let key = invocation.event::<Ignition>()?.key;
                car.lock().push(format!("car:{}:{}", key, engine.horsepower));
                Ok(())
            }),
        )
        .with_implementation(
            "com.acme.Dashboard",
            BeanImplementation::new(|_| Ok(Dashboard)).observer("onIgnition", move |invocation| {
                dashboard.lock().push(format!("dashboard:{}", invocation.event::<Ignition>()?.key));
                Ok(())
            }),
        )
        .with_implementation(
            "com.acme.Alarm",
            BeanImplementation::empty().observer("audit", move |invocation| {
                assert!(invocation.bean.is_none());
                alarm.lock().push(format!("alarm:{}", invocation.event::<Ignition>()?.key));
                Ok(())
            }),
        )
}

pub fn vehicle_archive(fixture: &Fixture, journal: &Journal) -> BeanArchive {
    with_vehicle_implementations(BeanArchive::new("app").with_types(fixture.types.clone()), journal)
}
