//! 容器生命周期事件
//!
//! 这些事件只由容器在部署过程中触发，扩展观察者通过它们参与部署。

use cdi_common::{AnnotatedType, AnnotationDefinition, AnnotationStore, ClassDefinition, ClassName, Type, TypeStore};
use cdi_spi::{Bean, ObserverMethod};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `BeforeBeanDiscovery` 的类名
pub const BEFORE_BEAN_DISCOVERY: &str = "jakarta.enterprise.inject.spi.BeforeBeanDiscovery";
/// `ProcessAnnotatedType` 的类名
pub const PROCESS_ANNOTATED_TYPE: &str = "jakarta.enterprise.inject.spi.ProcessAnnotatedType";
/// `AfterBeanDiscovery` 的类名
pub const AFTER_BEAN_DISCOVERY: &str = "jakarta.enterprise.inject.spi.AfterBeanDiscovery";
/// `AfterDeploymentValidation` 的类名
pub const AFTER_DEPLOYMENT_VALIDATION: &str = "jakarta.enterprise.inject.spi.AfterDeploymentValidation";
/// `BeforeShutdown` 的类名
pub const BEFORE_SHUTDOWN: &str = "jakarta.enterprise.inject.spi.BeforeShutdown";

/// 不能由应用直接触发的事件类型
pub const LIFECYCLE_EVENT_CLASSES: &[&str] = &[
    BEFORE_BEAN_DISCOVERY,
    PROCESS_ANNOTATED_TYPE,
    AFTER_BEAN_DISCOVERY,
    AFTER_DEPLOYMENT_VALIDATION,
    BEFORE_SHUTDOWN,
];

/// 在类型仓库中登记生命周期事件类型
pub fn register_lifecycle_event_types(types: &TypeStore) {
    types.register_all([
        ClassDefinition::interface(BEFORE_BEAN_DISCOVERY),
        ClassDefinition::interface(PROCESS_ANNOTATED_TYPE).with_type_parameter("X"),
        ClassDefinition::interface(AFTER_BEAN_DISCOVERY),
        ClassDefinition::interface(AFTER_DEPLOYMENT_VALIDATION),
        ClassDefinition::interface(BEFORE_SHUTDOWN),
    ]);
}

/// 类型发现之前触发，可登记注解定义与额外的注解类型
#[derive(Default)]
pub struct BeforeBeanDiscovery {
    annotations: Mutex<Vec<AnnotationDefinition>>,
    types: Mutex<Vec<AnnotatedType>>,
}

impl BeforeBeanDiscovery {
    /// 事件类型
    pub fn event_type() -> Type {
        Type::class(BEFORE_BEAN_DISCOVERY)
    }

    /// 登记限定符
    pub fn add_qualifier(&self, name: impl Into<ClassName>) {
        self.add_annotation(AnnotationDefinition::qualifier(name));
    }

    /// 登记拦截器绑定
    pub fn add_interceptor_binding(&self, name: impl Into<ClassName>) {
        self.add_annotation(AnnotationDefinition::interceptor_binding(name));
    }

    /// 登记任意注解定义，包括构造型与作用域
    pub fn add_annotation(&self, definition: AnnotationDefinition) {
        self.annotations.lock().push(definition);
    }

    /// 追加一个注解类型，与扫描得到的类型一起处理
    pub fn add_annotated_type(&self, annotated: AnnotatedType) {
        self.types.lock().push(annotated);
    }

    pub(crate) fn apply_annotations(&self, store: &AnnotationStore) -> usize {
        let definitions = std::mem::take(&mut *self.annotations.lock());
        let count = definitions.len();
        for definition in definitions {
            store.register(definition);
        }
        count
    }

    pub(crate) fn take_annotated_types(&self) -> Vec<AnnotatedType> {
        std::mem::take(&mut *self.types.lock())
    }
}

/// 每个发现的注解类型触发一次
pub struct ProcessAnnotatedType {
    archive: String,
    annotated: RwLock<AnnotatedType>,
    vetoed: AtomicBool,
}

impl ProcessAnnotatedType {
    pub(crate) fn new(archive: impl Into<String>, annotated: AnnotatedType) -> Self {
        Self {
            archive: archive.into(),
            annotated: RwLock::new(annotated),
            vetoed: AtomicBool::new(false),
        }
    }

    /// 事件类型 `ProcessAnnotatedType<X>`
    pub fn event_type_for(class: &ClassName) -> Type {
        Type::parameterized(PROCESS_ANNOTATED_TYPE, vec![Type::class(class.clone())])
    }

    /// 所属归档
    pub fn archive(&self) -> &str {
        &self.archive
    }

    /// 当前注解类型
    pub fn annotated_type(&self) -> AnnotatedType {
        self.annotated.read().clone()
    }

    /// 替换注解类型
    pub fn set_annotated_type(&self, annotated: AnnotatedType) {
        *self.annotated.write() = annotated;
    }

    /// 排除该类型，不再为它定义组件
    pub fn veto(&self) {
        self.vetoed.store(true, Ordering::SeqCst);
    }

    /// 是否已被否决
    pub fn is_vetoed(&self) -> bool {
        self.vetoed.load(Ordering::SeqCst)
    }

    pub(crate) fn into_annotated_type(self) -> AnnotatedType {
        self.annotated.into_inner()
    }

    /// 类型本身或其成员是否带有给定注解之一，注解也可以作为元注解出现
    pub(crate) fn matches_any_annotation(&self, required: &[ClassName], store: &AnnotationStore) -> bool {
        if required.is_empty() {
            return true;
        }
        let present: HashSet<ClassName> = self.annotated.read().all_annotation_types();
        required.iter().any(|wanted| {
            present.contains(wanted)
                || present.iter().any(|name| {
                    store
                        .definition(name)
                        .map(|definition| definition.has_meta(wanted.as_str()))
                        .unwrap_or(false)
                })
        })
    }
}

impl fmt::Debug for ProcessAnnotatedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessAnnotatedType")
            .field("archive", &self.archive)
            .field("class", &self.annotated.read().class().to_string())
            .field("vetoed", &self.is_vetoed())
            .finish()
    }
}

/// 组件发现完成后触发，可追加组件与观察者方法
#[derive(Default)]
pub struct AfterBeanDiscovery {
    beans: Mutex<Vec<Arc<dyn Bean>>>,
    observers: Mutex<Vec<Arc<dyn ObserverMethod>>>,
    problems: Mutex<Vec<String>>,
}

impl AfterBeanDiscovery {
    /// 事件类型
    pub fn event_type() -> Type {
        Type::class(AFTER_BEAN_DISCOVERY)
    }

    /// 追加组件，事件结束后注册
    pub fn add_bean(&self, bean: Arc<dyn Bean>) {
        self.beans.lock().push(bean);
    }

    /// 追加观察者方法，事件结束后注册
    pub fn add_observer_method(&self, observer: Arc<dyn ObserverMethod>) {
        self.observers.lock().push(observer);
    }

    /// 报告定义错误，部署随后失败
    pub fn add_definition_error(&self, message: impl Into<String>) {
        self.problems.lock().push(message.into());
    }

    pub(crate) fn take_beans(&self) -> Vec<Arc<dyn Bean>> {
        std::mem::take(&mut *self.beans.lock())
    }

    pub(crate) fn take_observers(&self) -> Vec<Arc<dyn ObserverMethod>> {
        std::mem::take(&mut *self.observers.lock())
    }

    pub(crate) fn take_problems(&self) -> Vec<String> {
        std::mem::take(&mut *self.problems.lock())
    }
}

/// 部署验证完成后触发
#[derive(Default)]
pub struct AfterDeploymentValidation {
    problems: Mutex<Vec<String>>,
}

impl AfterDeploymentValidation {
    /// 事件类型
    pub fn event_type() -> Type {
        Type::class(AFTER_DEPLOYMENT_VALIDATION)
    }

    /// 报告部署问题，部署随后失败
    pub fn add_deployment_problem(&self, message: impl Into<String>) {
        self.problems.lock().push(message.into());
    }

    pub(crate) fn take_problems(&self) -> Vec<String> {
        std::mem::take(&mut *self.problems.lock())
    }
}

/// 容器关闭前触发
#[derive(Debug, Default, Clone, Copy)]
pub struct BeforeShutdown;

impl BeforeShutdown {
    /// 事件类型
    pub fn event_type() -> Type {
        Type::class(BEFORE_SHUTDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_common::{Annotation, AnnotatedField};

    #[test]
    fn test_veto_and_replace() {
        let pat = ProcessAnnotatedType::new("app", AnnotatedType::new(ClassDefinition::new("Car")));
        assert!(!pat.is_vetoed());
        pat.set_annotated_type(AnnotatedType::new(ClassDefinition::new("Car")).with_identifier("car-v2"));
        pat.veto();
        assert!(pat.is_vetoed());
        assert_eq!(pat.into_annotated_type().id(), "car-v2");
    }

    #[test]
    fn test_with_annotations_filter_sees_members_and_meta() {
        let store = AnnotationStore::new();
        store.register(AnnotationDefinition::new("Marker").with_meta(Annotation::new("Tracked")));
        let annotated = AnnotatedType::new(ClassDefinition::new("Car"))
            .with_field(AnnotatedField::new("engine", Type::class("Engine")).with_annotation(Annotation::new("Marker")));
        let pat = ProcessAnnotatedType::new("app", annotated);

        assert!(pat.matches_any_annotation(&[], &store));
        assert!(pat.matches_any_annotation(&[ClassName::new("Marker")], &store));
        assert!(pat.matches_any_annotation(&[ClassName::new("Tracked")], &store));
        assert!(!pat.matches_any_annotation(&[ClassName::new("Other")], &store));
    }

    #[test]
    fn test_lifecycle_event_types_registered() {
        let types = TypeStore::new();
        register_lifecycle_event_types(&types);
        let closure = types.type_closure(&ProcessAnnotatedType::event_type_for(&ClassName::new("Car")));
        assert!(closure.contains(&Type::object()));
        assert!(types.contains(&ClassName::new(PROCESS_ANNOTATED_TYPE)));
    }
}
