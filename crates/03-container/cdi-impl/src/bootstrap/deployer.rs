//! 部署流程
//!
//! 按固定顺序处理归档：`BeforeBeanDiscovery`、每个类型的 `ProcessAnnotatedType`、组件发现、
//! `AfterBeanDiscovery`、建立可访问关系、验证、`AfterDeploymentValidation`。
//! 定义错误在发现阶段累积，发现结束后一并报告。

use super::archive::BeanArchive;
use crate::beans::{BeanAttributes, BeanImplementation, DecoratorBean, InterceptorBean, ManagedBean, ObserverMethodImpl};
use crate::event::lifecycle_events::{
    AfterBeanDiscovery, AfterDeploymentValidation, BeforeBeanDiscovery, ProcessAnnotatedType, LIFECYCLE_EVENT_CLASSES,
};
use crate::manager::{BeanManager, Deployment, EXTENSIONS_ARCHIVE};
use cdi_common::{
    names, Annotated, AnnotatedMethod, AnnotatedType, Annotation, AnnotationStore, BeanIdentifier, ClassName,
    ComponentKind, ContainerError, ContainerResult, DefinitionError, DefinitionResult, MemberValue, QualifierInstance,
};
use cdi_spi::{Bean, InjectionPoint, InterceptionType, ObserverMethod, Payload, Reception, TransactionPhase};
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// 通过了 `ProcessAnnotatedType` 的类型
struct Discovered {
    /// 所在归档在部署列表中的位置，扩展追加的类型为 `None`
    archive: Option<usize>,
    annotated: AnnotatedType,
}

/// 部署器
pub struct Deployer {
    deployment: Arc<Deployment>,
    archives: Vec<BeanArchive>,
    errors: Vec<ContainerError>,
}

impl Deployer {
    /// 创建
    pub fn new(deployment: Arc<Deployment>, archives: Vec<BeanArchive>) -> Self {
        Self {
            deployment,
            archives,
            errors: Vec::new(),
        }
    }

    /// 执行部署，按归档顺序返回各归档的管理器
    pub fn deploy(mut self) -> ContainerResult<Vec<BeanManager>> {
        info!("开始部署: {} 个归档", self.archives.len());
        let extensions = self.deployment.extensions_manager();

        // 第一步：登记类型并触发 BeforeBeanDiscovery
        self.register_class_definitions();
        let added = self.before_bean_discovery(&extensions)?;

        // 第二步：为每个归档创建管理器
        let managers = self.create_managers()?;

        // 第三步：ProcessAnnotatedType
        let discovered = self.process_annotated_types(&extensions, added)?;

        // 第四步：发现组件、拦截器、装饰器与观察者方法
        self.register_components(&managers, &extensions, &discovered)?;

        // 第五步：AfterBeanDiscovery
        self.after_bean_discovery(&extensions)?;

        // 第六步：建立归档之间的可访问关系
        self.wire_accessibility(&managers, &extensions)?;

        if !self.errors.is_empty() {
            error!("组件发现失败: {} 个定义错误", self.errors.len());
            for problem in &self.errors {
                error!("定义错误: {}", problem);
            }
            return Err(ContainerError::Validation { errors: self.errors });
        }

        // 第七步：验证
        Self::validate(&managers, &extensions)?;

        // 第八步：AfterDeploymentValidation
        Self::after_deployment_validation(&extensions)?;

        info!("部署完成: {} 个管理器", managers.len() + 1);
        Ok(managers)
    }

    fn register_class_definitions(&self) {
        let types = self.deployment.env().types();
        let mut registered = 0;
        for annotated in self.archives.iter().flat_map(BeanArchive::types) {
            if !types.contains(annotated.class()) {
                types.register(annotated.definition.clone());
                registered += 1;
            }
        }
        debug!("登记类定义: {} 个", registered);
    }

    fn before_bean_discovery(&self, extensions: &BeanManager) -> ContainerResult<Vec<AnnotatedType>> {
        info!("触发 BeforeBeanDiscovery");
        let event = Arc::new(BeforeBeanDiscovery::default());
        let payload: Payload = event.clone();
        extensions.fire_lifecycle_event(payload, BeforeBeanDiscovery::event_type(), |_| true)?;

        let count = event.apply_annotations(self.deployment.env().annotations());
        let added = event.take_annotated_types();
        let types = self.deployment.env().types();
        for annotated in &added {
            if !types.contains(annotated.class()) {
                types.register(annotated.definition.clone());
            }
        }
        debug!("扩展登记注解定义 {} 个，追加类型 {} 个", count, added.len());
        Ok(added)
    }

    fn create_managers(&self) -> ContainerResult<Vec<BeanManager>> {
        let mut seen = HashSet::new();
        let mut managers = Vec::with_capacity(self.archives.len());
        for archive in &self.archives {
            if archive.id() == EXTENSIONS_ARCHIVE || !seen.insert(archive.id()) {
                return Err(ContainerError::bootstrap(format!("归档标识重复或被保留: {}", archive.id())));
            }
            managers.push(
                self.deployment
                    .create_manager(archive.id(), archive.enablement().clone()),
            );
        }
        Ok(managers)
    }

    fn process_annotated_types(
        &self,
        extensions: &BeanManager,
        added: Vec<AnnotatedType>,
    ) -> ContainerResult<Vec<Discovered>> {
        let store = self.deployment.env().annotations();
        let mut discovered = Vec::new();
        for (index, archive) in self.archives.iter().enumerate() {
            for annotated in archive.discovered_types(store) {
                if let Some(annotated) = self.process_annotated_type(extensions, archive.id(), annotated.clone())? {
                    discovered.push(Discovered {
                        archive: Some(index),
                        annotated,
                    });
                }
            }
        }
        for annotated in added {
            if let Some(annotated) = self.process_annotated_type(extensions, EXTENSIONS_ARCHIVE, annotated)? {
                discovered.push(Discovered {
                    archive: None,
                    annotated,
                });
            }
        }
        info!("类型处理完成: {} 个类型参与组件发现", discovered.len());
        Ok(discovered)
    }

    fn process_annotated_type(
        &self,
        extensions: &BeanManager,
        archive: &str,
        annotated: AnnotatedType,
    ) -> ContainerResult<Option<AnnotatedType>> {
        let store = self.deployment.env().annotations();
        let event_type = ProcessAnnotatedType::event_type_for(annotated.class());
        let event = Arc::new(ProcessAnnotatedType::new(archive, annotated));
        let payload: Payload = event.clone();
        extensions.fire_lifecycle_event(payload, event_type, |observer: &dyn ObserverMethod| {
            event.matches_any_annotation(observer.required_annotations(), store)
        })?;

        if event.is_vetoed() {
            debug!("类型被扩展排除: {}", event.annotated_type().class());
            return Ok(None);
        }
        Ok(Some(match Arc::try_unwrap(event) {
            Ok(event) => event.into_annotated_type(),
            Err(shared) => shared.annotated_type(),
        }))
    }

    fn implementation_for(&self, discovered: &Discovered) -> Option<BeanImplementation> {
        let class = discovered.annotated.class();
        discovered
            .archive
            .and_then(|index| self.archives[index].implementation(class))
            .or_else(|| self.archives.iter().find_map(|archive| archive.implementation(class)))
            .cloned()
    }

    fn register_components(
        &mut self,
        managers: &[BeanManager],
        extensions: &BeanManager,
        discovered: &[Discovered],
    ) -> ContainerResult<()> {
        let deployment = self.deployment.clone();
        let store = deployment.env().annotations();
        let mut attributes = AttributeTable::new(discovered);

        for item in discovered {
            let annotated = &item.annotated;
            let manager = match item.archive {
                Some(index) => &managers[index],
                None => extensions,
            };
            let Some(bean_attributes) = attributes.get(&deployment, annotated.class(), &mut self.errors) else {
                continue;
            };
            let implementation = self.implementation_for(item).unwrap_or_else(|| {
                warn!("类型没有关联的实现: {}", annotated.class());
                BeanImplementation::empty()
            });

            let registered = if annotated.is_annotation_present(names::INTERCEPTOR) {
                interceptor_bean(store, manager.archive(), annotated, bean_attributes, implementation)
                    .map(|interceptor| manager.add_interceptor(Arc::new(interceptor)).map_err(ContainerError::from))
            } else if annotated.is_annotation_present(names::DECORATOR) {
                decorator_bean(store, manager.archive(), annotated, bean_attributes, implementation)
                    .map(|decorator| manager.add_decorator(Arc::new(decorator)).map_err(ContainerError::from))
            } else if is_bean_class(annotated) {
                self.managed_bean(manager, extensions, annotated, bean_attributes, implementation)
            } else {
                debug!("类型不是组件类: {}", annotated.class());
                self.observer_methods(manager, extensions, None, annotated, &implementation)
            };

            match registered {
                Ok(result) => result?,
                Err(definition) => self.errors.push(definition.into()),
            }
        }
        Ok(())
    }

    fn managed_bean(
        &mut self,
        manager: &BeanManager,
        extensions: &BeanManager,
        annotated: &AnnotatedType,
        attributes: BeanAttributes,
        implementation: BeanImplementation,
    ) -> DefinitionResult<ContainerResult<()>> {
        let store = self.deployment.env().annotations();
        let id = BeanIdentifier::new(ComponentKind::ManagedBean, manager.archive(), annotated.id());
        let injection_points = injection_points(store, annotated, &id)?;
        let bindings = interceptor_bindings(store, annotated)?;

        let mut bean = ManagedBean::new(id, annotated.class().clone(), attributes, injection_points, implementation.clone())
            .with_interceptor_bindings(bindings);
        if annotated.is_annotation_present(names::SPECIALIZES) {
            let specialized = self
                .deployment
                .env()
                .types()
                .direct_superclass(annotated.class())
                .ok_or_else(|| DefinitionError::InconsistentSpecialization {
                    bean: annotated.class().to_string(),
                    message: "没有可特化的直接父类".to_string(),
                })?;
            bean = bean.specializing(specialized);
        }

        let bean: Arc<dyn Bean> = Arc::new(bean);
        debug!("发现组件: {}", bean.id());
        manager.ensure_unique_bean(bean.id())?;
        if let Err(e) = manager.add_bean(bean.clone()) {
            return Ok(Err(e));
        }
        self.observer_methods(manager, extensions, Some(bean), annotated, &implementation)
    }

    fn observer_methods(
        &mut self,
        manager: &BeanManager,
        extensions: &BeanManager,
        bean: Option<Arc<dyn Bean>>,
        annotated: &AnnotatedType,
        implementation: &BeanImplementation,
    ) -> DefinitionResult<ContainerResult<()>> {
        let store = self.deployment.env().annotations();
        for method in &annotated.methods {
            let Some(observer) = observer_method(store, manager, bean.as_ref(), annotated, method, implementation)? else {
                continue;
            };
            // 生命周期事件只在扩展管理器中触发
            let lifecycle = observer
                .observed_type()
                .raw_class()
                .map(|raw| LIFECYCLE_EVENT_CLASSES.contains(&raw.as_str()))
                .unwrap_or(false);
            let target = if lifecycle { extensions } else { manager };
            debug!("发现观察者方法: {}", observer.id());
            if let Err(e) = target.add_observer(Arc::new(observer)) {
                return Ok(Err(e.into()));
            }
        }
        Ok(Ok(()))
    }

    fn after_bean_discovery(&mut self, extensions: &BeanManager) -> ContainerResult<()> {
        info!("触发 AfterBeanDiscovery");
        let event = Arc::new(AfterBeanDiscovery::default());
        let payload: Payload = event.clone();
        extensions.fire_lifecycle_event(payload, AfterBeanDiscovery::event_type(), |_| true)?;

        let beans = event.take_beans();
        let observers = event.take_observers();
        debug!("扩展追加组件 {} 个，观察者方法 {} 个", beans.len(), observers.len());
        for bean in beans {
            match extensions.add_bean(bean) {
                Ok(()) => {}
                Err(e @ ContainerError::Definition { .. }) => self.errors.push(e),
                Err(e) => return Err(e),
            }
        }
        for observer in observers {
            extensions.add_observer(observer)?;
        }
        for problem in event.take_problems() {
            self.errors.push(ContainerError::bootstrap(format!("扩展报告定义错误: {}", problem)));
        }
        Ok(())
    }

    fn wire_accessibility(&self, managers: &[BeanManager], extensions: &BeanManager) -> ContainerResult<()> {
        for (archive, manager) in self.archives.iter().zip(managers) {
            for target in archive.accessible() {
                let accessible = managers
                    .iter()
                    .find(|m| m.archive() == target.as_str())
                    .ok_or_else(|| ContainerError::bootstrap(format!("归档 {} 引用了不存在的归档 {}", archive.id(), target)))?;
                manager.add_accessible_manager(accessible)?;
            }
            manager.add_accessible_manager(extensions)?;
        }
        debug!("可访问关系建立完成");
        Ok(())
    }

    fn validate(managers: &[BeanManager], extensions: &BeanManager) -> ContainerResult<()> {
        info!("开始验证部署");
        let mut errors = Vec::new();
        for manager in managers.iter().chain(std::iter::once(extensions)) {
            if let Err(mut problems) = manager.validate() {
                errors.append(&mut problems);
            }
        }
        if !errors.is_empty() {
            for problem in &errors {
                error!("部署问题: {}", problem);
            }
            return Err(ContainerError::Validation { errors });
        }
        info!("部署验证通过");
        Ok(())
    }

    fn after_deployment_validation(extensions: &BeanManager) -> ContainerResult<()> {
        info!("触发 AfterDeploymentValidation");
        let event = Arc::new(AfterDeploymentValidation::default());
        let payload: Payload = event.clone();
        extensions.fire_lifecycle_event(payload, AfterDeploymentValidation::event_type(), |_| true)?;
        let problems = event.take_problems();
        if problems.is_empty() {
            return Ok(());
        }
        error!("扩展报告 {} 个部署问题", problems.len());
        Err(ContainerError::Validation {
            errors: problems
                .into_iter()
                .map(|problem| ContainerError::bootstrap(format!("扩展报告部署问题: {}", problem)))
                .collect(),
        })
    }
}

/// 组件属性表
///
/// 特化组件继承被特化组件的限定符与名称，因此按需递归计算并缓存。
struct AttributeTable<'a> {
    by_class: HashMap<&'a ClassName, &'a AnnotatedType>,
    computed: HashMap<ClassName, Option<BeanAttributes>>,
    visiting: HashSet<ClassName>,
}

impl<'a> AttributeTable<'a> {
    fn new(discovered: &'a [Discovered]) -> Self {
        Self {
            by_class: discovered.iter().map(|d| (d.annotated.class(), &d.annotated)).collect(),
            computed: HashMap::new(),
            visiting: HashSet::new(),
        }
    }

    fn get(&mut self, deployment: &Deployment, class: &ClassName, errors: &mut Vec<ContainerError>) -> Option<BeanAttributes> {
        if let Some(done) = self.computed.get(class) {
            return done.clone();
        }
        let annotated = *self.by_class.get(class)?;
        if !self.visiting.insert(class.clone()) {
            errors.push(
                DefinitionError::InconsistentSpecialization {
                    bean: class.to_string(),
                    message: "特化关系成环".to_string(),
                }
                .into(),
            );
            return None;
        }

        let env = deployment.env();
        let mut attributes = match BeanAttributes::from_annotated(env, annotated) {
            Ok(attributes) => Some(attributes),
            Err(e) => {
                errors.push(e.into());
                None
            }
        };
        if let Some(attributes) = attributes.as_mut() {
            if annotated.is_annotation_present(names::SPECIALIZES) {
                let specialized = env
                    .types()
                    .direct_superclass(class)
                    .and_then(|superclass| self.get(deployment, &superclass, errors));
                if let Some(specialized) = specialized {
                    inherit_specialized(attributes, &specialized, annotated.is_annotation_present(names::DEFAULT));
                }
            }
        }

        self.visiting.remove(class);
        self.computed.insert(class.clone(), attributes.clone());
        attributes
    }
}

/// 特化组件取得被特化组件的限定符与名称
fn inherit_specialized(attributes: &mut BeanAttributes, specialized: &BeanAttributes, explicit_default: bool) {
    let default = QualifierInstance::default_qualifier();
    attributes.qualifiers.extend(specialized.qualifiers.iter().cloned());
    if !explicit_default && !specialized.qualifiers.contains(&default) {
        attributes.qualifiers.remove(&default);
    }
    if let Some(name) = &specialized.name {
        attributes.name = Some(name.clone());
        attributes
            .qualifiers
            .retain(|q| !q.is_named() || q.named_value() == Some(name.as_str()));
    }
    attributes.normalize();
}

/// 具体类，并且有 `@Inject` 构造器或无参构造器
fn is_bean_class(annotated: &AnnotatedType) -> bool {
    !annotated.definition.is_abstract
        && !annotated.definition.is_interface()
        && (annotated.constructors.is_empty() || annotated.bean_constructor().is_some())
}

fn qualifiers_of(store: &AnnotationStore, annotations: &[Annotation]) -> DefinitionResult<HashSet<QualifierInstance>> {
    QualifierInstance::of_all(
        annotations.iter().filter(|a| store.is_qualifier(&a.annotation_type)),
        store,
    )
}

/// 注入字段、组件构造器参数与初始化方法参数
fn injection_points(
    store: &AnnotationStore,
    annotated: &AnnotatedType,
    bean: &BeanIdentifier,
) -> DefinitionResult<Vec<InjectionPoint>> {
    let mut points = Vec::new();
    for field in annotated
        .fields
        .iter()
        .filter(|f| !f.is_static && (f.is_annotation_present(names::INJECT) || f.is_annotation_present(names::DELEGATE)))
    {
        let ip = InjectionPoint::field(&field.name, field.base_type.clone(), qualifiers_of(store, &field.annotations)?)
            .declared_by(bean.clone());
        points.push(if field.is_annotation_present(names::DELEGATE) { ip.as_delegate() } else { ip });
    }

    let constructor_parameters = annotated.bean_constructor().map(|c| c.parameters.iter()).into_iter().flatten();
    let initializer_parameters = annotated
        .methods
        .iter()
        .filter(|m| m.is_annotation_present(names::INJECT))
        .flat_map(|m| m.parameters.iter());
    for parameter in constructor_parameters.chain(initializer_parameters) {
        let ip = InjectionPoint::parameter(
            parameter.position,
            &parameter.name,
            parameter.base_type.clone(),
            qualifiers_of(store, &parameter.annotations)?,
        )
        .declared_by(bean.clone());
        points.push(if parameter.is_annotation_present(names::DELEGATE) { ip.as_delegate() } else { ip });
    }
    Ok(points)
}

/// 类型上直接声明的与构造型带来的拦截器绑定，包括传递的元绑定
fn interceptor_bindings(store: &AnnotationStore, annotated: &AnnotatedType) -> DefinitionResult<HashSet<QualifierInstance>> {
    let mut declared: Vec<Annotation> = annotated
        .annotations
        .iter()
        .filter(|a| store.is_interceptor_binding(&a.annotation_type))
        .cloned()
        .collect();
    for stereotype in annotated.annotations.iter().filter(|a| store.is_stereotype(&a.annotation_type)) {
        declared.extend(store.stereotype_model(&stereotype.annotation_type).interceptor_bindings.iter().cloned());
    }

    let mut bindings = HashSet::new();
    for annotation in &declared {
        let model = store.interceptor_binding_model(&annotation.annotation_type);
        bindings.insert(QualifierInstance::of(annotation, store)?);
        for meta in &model.meta_bindings {
            bindings.insert(QualifierInstance::of(meta, store)?);
        }
    }
    Ok(bindings)
}

fn interceptor_bean(
    store: &AnnotationStore,
    archive: &str,
    annotated: &AnnotatedType,
    attributes: BeanAttributes,
    implementation: BeanImplementation,
) -> DefinitionResult<InterceptorBean> {
    let id = BeanIdentifier::new(ComponentKind::Interceptor, archive, annotated.id());
    let bindings = interceptor_bindings(store, annotated)?;
    if bindings.is_empty() {
        return Err(DefinitionError::InvalidBeanDefinition {
            bean: id.to_string(),
            message: "拦截器没有声明拦截器绑定".to_string(),
        });
    }
    let kinds: HashSet<InterceptionType> = InterceptionType::all()
        .into_iter()
        .filter(|kind| annotated.methods.iter().any(|m| m.is_annotation_present(kind.annotation())))
        .collect();
    if kinds.is_empty() {
        return Err(DefinitionError::InvalidBeanDefinition {
            bean: id.to_string(),
            message: "拦截器没有拦截方法".to_string(),
        });
    }
    let injection_points = injection_points(store, annotated, &id)?;
    debug!("发现拦截器: {} {:?}", id, kinds);
    Ok(InterceptorBean::new(
        id,
        annotated.class().clone(),
        attributes,
        injection_points,
        bindings,
        kinds,
        implementation,
    ))
}

fn decorator_bean(
    store: &AnnotationStore,
    archive: &str,
    annotated: &AnnotatedType,
    attributes: BeanAttributes,
    implementation: BeanImplementation,
) -> DefinitionResult<DecoratorBean> {
    let id = BeanIdentifier::new(ComponentKind::Decorator, archive, annotated.id());
    let injection_points = injection_points(store, annotated, &id)?;
    debug!("发现装饰器: {}", id);
    DecoratorBean::new(id.clone(), annotated.class().clone(), attributes, injection_points, implementation).map_err(|e| {
        DefinitionError::InvalidBeanDefinition {
            bean: id.to_string(),
            message: format!("{:#}", e),
        }
    })
}

fn enum_member<T>(store: &AnnotationStore, annotation: &Annotation, member: &str) -> DefinitionResult<Option<T>>
where
    T: FromStr<Err = DefinitionError>,
{
    match store.member_value(annotation, member) {
        Some(MemberValue::Enum(value)) | Some(MemberValue::Str(value)) => value.parse().map(Some),
        _ => Ok(None),
    }
}

/// 由带 `@Observes` 或 `@ObservesAsync` 参数的方法构造观察者方法
///
/// 事件参数之外的参数成为注入点。方法没有事件参数时返回 `None`。
fn observer_method(
    store: &AnnotationStore,
    manager: &BeanManager,
    bean: Option<&Arc<dyn Bean>>,
    annotated: &AnnotatedType,
    method: &AnnotatedMethod,
    implementation: &BeanImplementation,
) -> DefinitionResult<Option<ObserverMethodImpl>> {
    let (event_parameter, observes, asynchronous) = match method.parameter_annotated_with(names::OBSERVES) {
        Some(parameter) => (parameter, names::OBSERVES, false),
        None => match method.parameter_annotated_with(names::OBSERVES_ASYNC) {
            Some(parameter) => (parameter, names::OBSERVES_ASYNC, true),
            None => return Ok(None),
        },
    };
    let Some(observes) = event_parameter.annotation(observes) else {
        return Ok(None);
    };

    let body = implementation
        .observer_fn(&method.name)
        .cloned()
        .ok_or_else(|| DefinitionError::InvalidBeanDefinition {
            bean: annotated.class().to_string(),
            message: format!("观察者方法 {} 没有实现", method.name),
        })?;
    let reception: Option<Reception> = enum_member(store, observes, "notifyObserver")?;
    let phase: Option<TransactionPhase> = if asynchronous {
        None
    } else {
        enum_member(store, observes, "during")?
    };
    let priority = event_parameter
        .annotation_member(names::PRIORITY, "value")
        .or_else(|| method.annotation_member(names::PRIORITY, "value"))
        .and_then(MemberValue::as_int);
    let required: Vec<ClassName> = event_parameter
        .annotation_member(names::WITH_ANNOTATIONS, "value")
        .and_then(MemberValue::as_array)
        .map(|values| values.iter().filter_map(MemberValue::as_class).cloned().collect())
        .unwrap_or_default();

    let qualifiers = qualifiers_of(store, &event_parameter.annotations)?;
    let mut parameters = Vec::new();
    for parameter in method.parameters.iter().filter(|p| p.position != event_parameter.position) {
        let ip = InjectionPoint::parameter(
            parameter.position,
            &parameter.name,
            parameter.base_type.clone(),
            qualifiers_of(store, &parameter.annotations)?,
        );
        parameters.push(match bean {
            Some(bean) => ip.declared_by(bean.id().clone()),
            None => ip,
        });
    }

    let observed_type = event_parameter.base_type.clone();
    let mut observer = match bean {
        Some(bean) if !method.is_static => {
            ObserverMethodImpl::new(manager.handle(), bean.clone(), &method.name, body, observed_type, qualifiers)
        }
        _ => ObserverMethodImpl::static_method(
            manager.handle(),
            manager.archive(),
            annotated.class().clone(),
            &method.name,
            body,
            observed_type,
            qualifiers,
        ),
    }
    .with_reception(reception.unwrap_or_default())
    .with_phase(phase.unwrap_or_default())
    .with_injection_points(parameters);
    if let Some(priority) = priority {
        observer = observer.with_priority(priority as i32);
    }
    if asynchronous {
        observer = observer.asynchronous();
    }
    if !required.is_empty() {
        observer = observer.with_required_annotations(required);
    }
    Ok(Some(observer))
}
