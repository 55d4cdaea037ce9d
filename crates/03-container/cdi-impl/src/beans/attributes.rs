//! 组件属性

use crate::resolution::ResolutionEnvironment;
use cdi_common::{
    names, Annotated, Annotation, AnnotationStore, AnnotatedType, ClassName, DefinitionError, DefinitionResult,
    MemberValue, QualifierInstance, Type,
};
use std::collections::HashSet;

/// 组件属性：类型、限定符、作用域、名称、构造型与备选信息
#[derive(Debug, Clone, PartialEq)]
pub struct BeanAttributes {
    /// 组件类型
    pub types: HashSet<Type>,
    /// 限定符
    pub qualifiers: HashSet<QualifierInstance>,
    /// 作用域
    pub scope: ClassName,
    /// EL 名称
    pub name: Option<String>,
    /// 构造型
    pub stereotypes: HashSet<ClassName>,
    /// 是否为备选组件
    pub alternative: bool,
    /// 优先级
    pub priority: Option<i32>,
}

impl BeanAttributes {
    /// 依赖作用域、仅带默认限定符的属性
    pub fn new(types: HashSet<Type>) -> Self {
        let mut attributes = Self {
            types,
            qualifiers: HashSet::new(),
            scope: ClassName::new(names::DEPENDENT),
            name: None,
            stereotypes: HashSet::new(),
            alternative: false,
            priority: None,
        };
        attributes.normalize();
        attributes
    }

    /// 补齐隐含的类型与限定符
    ///
    /// 类型总是包含 Object；除 `@Named` 与 `@Any` 外没有限定符时补充 `@Default`；
    /// 总是补充 `@Any`；有名称时补充对应的 `@Named`。
    pub fn normalize(&mut self) {
        self.types.insert(Type::object());
        if let Some(name) = &self.name {
            if !self.qualifiers.iter().any(QualifierInstance::is_named) {
                self.qualifiers.insert(QualifierInstance::named(name.clone()));
            }
        }
        if self.qualifiers.iter().all(|q| q.is_any() || q.is_named()) {
            self.qualifiers.insert(QualifierInstance::default_qualifier());
        }
        self.qualifiers.insert(QualifierInstance::any());
    }

    /// 由注解类型描述符计算组件属性
    pub fn from_annotated(env: &ResolutionEnvironment, annotated: &AnnotatedType) -> DefinitionResult<Self> {
        let store = env.annotations();
        let bean = annotated.id();
        let annotations = annotated.annotations();

        let mut stereotypes = HashSet::new();
        let mut default_scope = None;
        let mut alternative = annotated.is_annotation_present(names::ALTERNATIVE);
        let mut named_by_stereotype = false;
        let mut stereotype_priority = None;
        for annotation in annotations.iter().filter(|a| store.is_stereotype(&a.annotation_type)) {
            let model = store.stereotype_model(&annotation.annotation_type);
            stereotypes.insert(annotation.annotation_type.clone());
            stereotypes.extend(model.inherited_stereotypes.iter().cloned());
            if default_scope.is_none() {
                default_scope = model.default_scope.clone();
            }
            alternative |= model.alternative;
            named_by_stereotype |= model.named;
            stereotype_priority = stereotype_priority.or(model.priority);
        }

        let scope = Self::declared_scope(store, &bean, annotations)?
            .or(default_scope)
            .unwrap_or_else(|| ClassName::new(names::DEPENDENT));

        let qualifiers = QualifierInstance::of_all(
            annotations.iter().filter(|a| store.is_qualifier(&a.annotation_type)),
            store,
        )?;

        let name = match annotated.annotation(names::NAMED) {
            Some(named) => match store.member_value(named, "value") {
                Some(MemberValue::Str(value)) if !value.is_empty() => Some(value),
                _ => Some(default_name(annotated.class())),
            },
            None if named_by_stereotype => Some(default_name(annotated.class())),
            None => None,
        };

        let priority = annotated
            .annotation_member(names::PRIORITY, "value")
            .and_then(MemberValue::as_int)
            .map(|p| p as i32)
            .or(stereotype_priority);

        let mut attributes = Self {
            types: env.bean_types(&annotated.base_type()),
            qualifiers,
            scope,
            name,
            stereotypes,
            alternative,
            priority,
        };
        if let Some(named) = attributes.qualifiers.iter().find(|q| q.named_value() == Some("")).cloned() {
            attributes.qualifiers.remove(&named);
        }
        attributes.normalize();
        Ok(attributes)
    }

    fn declared_scope(store: &AnnotationStore, bean: &str, annotations: &[Annotation]) -> DefinitionResult<Option<ClassName>> {
        let scopes: Vec<&ClassName> = annotations
            .iter()
            .map(|a| &a.annotation_type)
            .filter(|t| store.is_scope(t))
            .collect();
        match scopes.as_slice() {
            [] => Ok(None),
            [scope] => Ok(Some((*scope).clone())),
            _ => Err(DefinitionError::InvalidBeanDefinition {
                bean: bean.to_string(),
                message: format!("声明了多个作用域: {:?}", scopes),
            }),
        }
    }

    /// 是否为 `@Dependent` 作用域
    pub fn is_dependent(&self) -> bool {
        self.scope.as_str() == names::DEPENDENT
    }
}

/// 默认组件名称：简单类名首字母小写
pub fn default_name(class: &ClassName) -> String {
    let simple = class.simple_name();
    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
