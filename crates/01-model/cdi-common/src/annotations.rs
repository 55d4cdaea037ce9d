//! 注解模型与元注解仓库
//!
//! 注解实例是纯数据。注解定义声明成员默认值、`@Nonbinding` 标记以及元注解，
//! [`AnnotationStore`] 基于定义计算限定符、构造型、拦截器绑定与作用域模型。

use crate::types::ClassName;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 内置注解名称
pub mod names {
    /// `@Any`
    pub const ANY: &str = "jakarta.enterprise.inject.Any";
    /// `@Default`
    pub const DEFAULT: &str = "jakarta.enterprise.inject.Default";
    /// `@Named`
    pub const NAMED: &str = "jakarta.inject.Named";
    /// `@Qualifier`
    pub const QUALIFIER: &str = "jakarta.inject.Qualifier";
    /// `@Nonbinding`
    pub const NONBINDING: &str = "jakarta.enterprise.util.Nonbinding";
    /// `@Repeatable`
    pub const REPEATABLE: &str = "java.lang.annotation.Repeatable";
    /// `@Stereotype`
    pub const STEREOTYPE: &str = "jakarta.enterprise.inject.Stereotype";
    /// `@InterceptorBinding`
    pub const INTERCEPTOR_BINDING: &str = "jakarta.interceptor.InterceptorBinding";
    /// `@Scope`
    pub const SCOPE: &str = "jakarta.inject.Scope";
    /// `@NormalScope`
    pub const NORMAL_SCOPE: &str = "jakarta.enterprise.context.NormalScope";
    /// `@Dependent`
    pub const DEPENDENT: &str = "jakarta.enterprise.context.Dependent";
    /// `@ApplicationScoped`
    pub const APPLICATION_SCOPED: &str = "jakarta.enterprise.context.ApplicationScoped";
    /// `@RequestScoped`
    pub const REQUEST_SCOPED: &str = "jakarta.enterprise.context.RequestScoped";
    /// `@Singleton`
    pub const SINGLETON: &str = "jakarta.inject.Singleton";
    /// `@Alternative`
    pub const ALTERNATIVE: &str = "jakarta.enterprise.inject.Alternative";
    /// `@Priority`
    pub const PRIORITY: &str = "jakarta.annotation.Priority";
    /// `@Specializes`
    pub const SPECIALIZES: &str = "jakarta.enterprise.inject.Specializes";
    /// `@Vetoed`
    pub const VETOED: &str = "jakarta.enterprise.inject.Vetoed";
    /// `@Inject`
    pub const INJECT: &str = "jakarta.inject.Inject";
    /// `@Observes`
    pub const OBSERVES: &str = "jakarta.enterprise.event.Observes";
    /// `@ObservesAsync`
    pub const OBSERVES_ASYNC: &str = "jakarta.enterprise.event.ObservesAsync";
    /// `@WithAnnotations`
    pub const WITH_ANNOTATIONS: &str = "jakarta.enterprise.inject.spi.WithAnnotations";
    /// `@Interceptor`
    pub const INTERCEPTOR: &str = "jakarta.interceptor.Interceptor";
    /// `@Decorator`
    pub const DECORATOR: &str = "jakarta.decorator.Decorator";
    /// `@Delegate`
    pub const DELEGATE: &str = "jakarta.decorator.Delegate";
    /// `@AroundInvoke`
    pub const AROUND_INVOKE: &str = "jakarta.interceptor.AroundInvoke";
    /// `@AroundConstruct`
    pub const AROUND_CONSTRUCT: &str = "jakarta.interceptor.AroundConstruct";
    /// `@PostConstruct`
    pub const POST_CONSTRUCT: &str = "jakarta.annotation.PostConstruct";
    /// `@PreDestroy`
    pub const PRE_DESTROY: &str = "jakarta.annotation.PreDestroy";
    /// `@Model`
    pub const MODEL: &str = "jakarta.enterprise.inject.Model";
}

/// 注解成员取值
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MemberValue {
    /// 布尔值
    Bool(bool),
    /// 整数
    Int(i64),
    /// 字符串
    Str(String),
    /// 类字面量
    Class(ClassName),
    /// 枚举常量名
    Enum(String),
    /// 数组
    Array(Vec<MemberValue>),
    /// 嵌套注解
    Annotation(Box<Annotation>),
}

impl MemberValue {
    /// 布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// 整数值
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// 字符串值
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }

    /// 枚举常量名
    pub fn as_enum(&self) -> Option<&str> {
        match self {
            Self::Enum(v) => Some(v),
            _ => None,
        }
    }

    /// 类值
    pub fn as_class(&self) -> Option<&ClassName> {
        match self {
            Self::Class(v) => Some(v),
            _ => None,
        }
    }

    /// 数组元素
    pub fn as_array(&self) -> Option<&[MemberValue]> {
        match self {
            Self::Array(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for MemberValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::Str(v) => write!(f, "\"{}\"", v),
            Self::Class(v) => write!(f, "{}.class", v),
            Self::Enum(v) => f.write_str(v),
            Self::Array(values) => {
                f.write_str("{")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                f.write_str("}")
            }
            Self::Annotation(a) => write!(f, "{}", a),
        }
    }
}

/// 注解实例
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Annotation {
    /// 注解类型
    pub annotation_type: ClassName,
    /// 成员取值，按名称排序
    #[serde(default)]
    pub members: BTreeMap<String, MemberValue>,
}

impl Annotation {
    /// 创建不带显式成员的注解
    pub fn new(annotation_type: impl Into<ClassName>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            members: BTreeMap::new(),
        }
    }

    /// 设置成员取值
    pub fn with(mut self, member: impl Into<String>, value: MemberValue) -> Self {
        self.members.insert(member.into(), value);
        self
    }

    /// `@Priority(value)`
    pub fn priority(value: i32) -> Self {
        Self::new(names::PRIORITY).with("value", MemberValue::Int(value as i64))
    }

    /// `@Named(value)`
    pub fn named(value: impl Into<String>) -> Self {
        Self::new(names::NAMED).with("value", MemberValue::Str(value.into()))
    }

    /// 按名称读取成员值
    pub fn member(&self, name: &str) -> Option<&MemberValue> {
        self.members.get(name)
    }

    /// 注解类型是否为 `annotation_type`
    pub fn is(&self, annotation_type: &str) -> bool {
        self.annotation_type.as_str() == annotation_type
    }
}

impl fmt::Display for Annotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.annotation_type.simple_name())?;
        if !self.members.is_empty() {
            f.write_str("(")?;
            for (i, (k, v)) in self.members.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{}={}", k, v)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// 注解成员定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationMember {
    /// 成员名
    pub name: String,
    /// 默认值
    #[serde(default)]
    pub default: Option<MemberValue>,
    /// 是否为 `@Nonbinding`
    #[serde(default)]
    pub nonbinding: bool,
}

/// 注解定义
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationDefinition {
    /// 注解类型名
    pub name: ClassName,
    /// 成员声明
    #[serde(default)]
    pub members: Vec<AnnotationMember>,
    /// 元注解
    #[serde(default)]
    pub meta_annotations: Vec<Annotation>,
}

impl AnnotationDefinition {
    /// 创建注解定义
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            meta_annotations: Vec::new(),
        }
    }

    /// 限定符注解定义
    pub fn qualifier(name: impl Into<ClassName>) -> Self {
        Self::new(name).with_meta(Annotation::new(names::QUALIFIER))
    }

    /// 拦截器绑定注解定义
    pub fn interceptor_binding(name: impl Into<ClassName>) -> Self {
        Self::new(name).with_meta(Annotation::new(names::INTERCEPTOR_BINDING))
    }

    /// 构造型注解定义
    pub fn stereotype(name: impl Into<ClassName>) -> Self {
        Self::new(name).with_meta(Annotation::new(names::STEREOTYPE))
    }

    /// 声明成员及其默认值
    pub fn with_member(mut self, name: impl Into<String>, default: Option<MemberValue>) -> Self {
        self.members.push(AnnotationMember {
            name: name.into(),
            default,
            nonbinding: false,
        });
        self
    }

    /// 声明 `@Nonbinding` 成员，比较时忽略
    pub fn with_nonbinding_member(mut self, name: impl Into<String>, default: Option<MemberValue>) -> Self {
        self.members.push(AnnotationMember {
            name: name.into(),
            default,
            nonbinding: true,
        });
        self
    }

    /// 追加元注解
    pub fn with_meta(mut self, meta: Annotation) -> Self {
        self.meta_annotations.push(meta);
        self
    }

    /// 按名称查找成员声明
    pub fn member(&self, name: &str) -> Option<&AnnotationMember> {
        self.members.iter().find(|m| m.name == name)
    }

    /// 是否带有指定元注解
    pub fn has_meta(&self, annotation_type: &str) -> bool {
        self.meta_annotations.iter().any(|a| a.is(annotation_type))
    }

    /// 读取指定元注解
    pub fn meta(&self, annotation_type: &str) -> Option<&Annotation> {
        self.meta_annotations.iter().find(|a| a.is(annotation_type))
    }
}

/// 限定符模型
#[derive(Debug, Clone, Default)]
pub struct QualifierModel {
    /// 定义是否合法
    pub valid: bool,
    /// 是否可重复
    pub repeatable: bool,
    /// 比较时忽略的成员
    pub nonbinding_members: HashSet<String>,
}

/// 作用域模型
#[derive(Debug, Clone, Copy, Default)]
pub struct ScopeModel {
    /// 定义是否合法
    pub valid: bool,
    /// 普通作用域；否则为伪作用域
    pub normal: bool,
}

/// 构造型模型，已合并全部继承的构造型
#[derive(Debug, Clone, Default)]
pub struct StereotypeModel {
    /// 定义是否合法
    pub valid: bool,
    /// 默认作用域
    pub default_scope: Option<ClassName>,
    /// 是否声明 `@Alternative`
    pub alternative: bool,
    /// 是否声明 `@Named`
    pub named: bool,
    /// 优先级
    pub priority: Option<i32>,
    /// 拦截器绑定
    pub interceptor_bindings: Vec<Annotation>,
    /// 继承的构造型
    pub inherited_stereotypes: Vec<ClassName>,
}

/// 拦截器绑定模型
#[derive(Debug, Clone, Default)]
pub struct InterceptorBindingModel {
    /// 定义是否合法
    pub valid: bool,
    /// 比较时忽略的成员
    pub nonbinding_members: HashSet<String>,
    /// 传递可达的元绑定
    pub meta_bindings: Vec<Annotation>,
}

/// 注解仓库
#[derive(Debug)]
pub struct AnnotationStore {
    definitions: DashMap<ClassName, Arc<AnnotationDefinition>>,
    qualifiers: DashMap<ClassName, Arc<QualifierModel>>,
    stereotypes: DashMap<ClassName, Arc<StereotypeModel>>,
    bindings: DashMap<ClassName, Arc<InterceptorBindingModel>>,
}

impl AnnotationStore {
    /// 创建注解仓库并注册内置注解
    pub fn new() -> Self {
        let store = Self::empty();
        for definition in builtin_definitions() {
            store.register(definition);
        }
        store
    }

    /// 创建空仓库
    pub fn empty() -> Self {
        Self {
            definitions: DashMap::new(),
            qualifiers: DashMap::new(),
            stereotypes: DashMap::new(),
            bindings: DashMap::new(),
        }
    }

    /// 注册注解定义
    pub fn register(&self, definition: AnnotationDefinition) {
        debug!("注册注解定义: {}", definition.name);
        self.definitions.insert(definition.name.clone(), Arc::new(definition));
        self.qualifiers.clear();
        self.stereotypes.clear();
        self.bindings.clear();
    }

    /// 查找注解定义
    pub fn definition(&self, name: &ClassName) -> Option<Arc<AnnotationDefinition>> {
        self.definitions.get(name).map(|entry| entry.value().clone())
    }

    fn has_meta(&self, name: &ClassName, meta: &str) -> bool {
        self.definition(name).map(|d| d.has_meta(meta)).unwrap_or(false)
    }

    /// 是否为限定符
    pub fn is_qualifier(&self, name: &ClassName) -> bool {
        self.has_meta(name, names::QUALIFIER)
    }

    /// 是否为构造型
    pub fn is_stereotype(&self, name: &ClassName) -> bool {
        self.has_meta(name, names::STEREOTYPE)
    }

    /// 是否为拦截器绑定
    pub fn is_interceptor_binding(&self, name: &ClassName) -> bool {
        self.has_meta(name, names::INTERCEPTOR_BINDING)
    }

    /// 是否为作用域注解，伪作用域与普通作用域都算
    pub fn is_scope(&self, name: &ClassName) -> bool {
        self.scope_model(name).valid
    }

    /// 是否为普通作用域
    pub fn is_normal_scope(&self, name: &ClassName) -> bool {
        self.scope_model(name).normal
    }

    /// 成员取值：显式值优先，否则取声明的默认值
    pub fn member_value(&self, annotation: &Annotation, member: &str) -> Option<MemberValue> {
        annotation.member(member).cloned().or_else(|| {
            self.definition(&annotation.annotation_type)
                .and_then(|d| d.member(member).and_then(|m| m.default.clone()))
        })
    }

    fn nonbinding_members(&self, name: &ClassName) -> HashSet<String> {
        self.definition(name)
            .map(|d| {
                d.members
                    .iter()
                    .filter(|m| m.nonbinding)
                    .map(|m| m.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// 限定符模型
    pub fn qualifier_model(&self, name: &ClassName) -> Arc<QualifierModel> {
        if let Some(model) = self.qualifiers.get(name) {
            return model.value().clone();
        }
        let model = Arc::new(QualifierModel {
            valid: self.is_qualifier(name),
            repeatable: self.has_meta(name, names::REPEATABLE),
            nonbinding_members: self.nonbinding_members(name),
        });
        self.qualifiers.insert(name.clone(), model.clone());
        model
    }

    /// 作用域模型
    pub fn scope_model(&self, name: &ClassName) -> ScopeModel {
        match self.definition(name) {
            Some(d) if d.has_meta(names::NORMAL_SCOPE) => ScopeModel {
                valid: true,
                normal: true,
            },
            Some(d) if d.has_meta(names::SCOPE) => ScopeModel {
                valid: true,
                normal: false,
            },
            _ => ScopeModel::default(),
        }
    }

    /// 构造型模型
    pub fn stereotype_model(&self, name: &ClassName) -> Arc<StereotypeModel> {
        if let Some(model) = self.stereotypes.get(name) {
            return model.value().clone();
        }
        let mut model = StereotypeModel::default();
        let mut visited = HashSet::new();
        self.merge_stereotype(name, &mut model, &mut visited, true);
        let model = Arc::new(model);
        self.stereotypes.insert(name.clone(), model.clone());
        model
    }

    fn merge_stereotype(
        &self,
        name: &ClassName,
        model: &mut StereotypeModel,
        visited: &mut HashSet<ClassName>,
        root: bool,
    ) {
        if !visited.insert(name.clone()) {
            return;
        }
        let Some(definition) = self.definition(name) else {
            return;
        };
        if !definition.has_meta(names::STEREOTYPE) {
            return;
        }
        if root {
            model.valid = true;
        }
        for meta in &definition.meta_annotations {
            let meta_type = &meta.annotation_type;
            if meta.is(names::ALTERNATIVE) {
                model.alternative = true;
            } else if meta.is(names::NAMED) {
                model.named = true;
            } else if meta.is(names::PRIORITY) {
                if model.priority.is_none() {
                    model.priority = meta.member("value").and_then(MemberValue::as_int).map(|v| v as i32);
                }
            } else if self.scope_model(meta_type).valid {
                if model.default_scope.is_none() {
                    model.default_scope = Some(meta_type.clone());
                }
            } else if self.is_interceptor_binding(meta_type) {
                if !model.interceptor_bindings.contains(meta) {
                    model.interceptor_bindings.push(meta.clone());
                }
            } else if self.is_stereotype(meta_type) {
                model.inherited_stereotypes.push(meta_type.clone());
                self.merge_stereotype(meta_type, model, visited, false);
            }
        }
    }

    /// 拦截器绑定模型
    pub fn interceptor_binding_model(&self, name: &ClassName) -> Arc<InterceptorBindingModel> {
        if let Some(model) = self.bindings.get(name) {
            return model.value().clone();
        }
        let valid = self.is_interceptor_binding(name);
        let mut meta_bindings = Vec::new();
        if valid {
            let mut visited = HashSet::from([name.clone()]);
            self.collect_meta_bindings(name, &mut meta_bindings, &mut visited);
        }
        let model = Arc::new(InterceptorBindingModel {
            valid,
            nonbinding_members: self.nonbinding_members(name),
            meta_bindings,
        });
        self.bindings.insert(name.clone(), model.clone());
        model
    }

    fn collect_meta_bindings(&self, name: &ClassName, out: &mut Vec<Annotation>, visited: &mut HashSet<ClassName>) {
        let Some(definition) = self.definition(name) else {
            return;
        };
        for meta in &definition.meta_annotations {
            if self.is_interceptor_binding(&meta.annotation_type) && visited.insert(meta.annotation_type.clone()) {
                out.push(meta.clone());
                self.collect_meta_bindings(&meta.annotation_type, out, visited);
            }
        }
    }
}

impl Default for AnnotationStore {
    fn default() -> Self {
        Self::new()
    }
}

fn builtin_definitions() -> Vec<AnnotationDefinition> {
    use names::*;

    let marker = |name: &str| AnnotationDefinition::new(name);
    let enum_default = |v: &str| Some(MemberValue::Enum(v.to_string()));

    vec![
        marker(QUALIFIER),
        marker(NONBINDING),
        marker(REPEATABLE).with_member("value", None),
        marker(STEREOTYPE),
        marker(INTERCEPTOR_BINDING),
        marker(SCOPE),
        marker(NORMAL_SCOPE).with_member("passivating", Some(MemberValue::Bool(false))),
        AnnotationDefinition::qualifier(ANY),
        AnnotationDefinition::qualifier(DEFAULT),
        AnnotationDefinition::qualifier(NAMED).with_member("value", Some(MemberValue::Str(String::new()))),
        marker(DEPENDENT).with_meta(Annotation::new(SCOPE)),
        marker(SINGLETON).with_meta(Annotation::new(SCOPE)),
        marker(APPLICATION_SCOPED).with_meta(Annotation::new(NORMAL_SCOPE)),
        marker(REQUEST_SCOPED).with_meta(Annotation::new(NORMAL_SCOPE)),
        marker(ALTERNATIVE),
        marker(PRIORITY).with_member("value", None),
        marker(SPECIALIZES),
        marker(VETOED),
        marker(INJECT),
        marker(OBSERVES)
            .with_member("notifyObserver", enum_default("ALWAYS"))
            .with_member("during", enum_default("IN_PROGRESS")),
        marker(OBSERVES_ASYNC).with_member("notifyObserver", enum_default("ALWAYS")),
        marker(WITH_ANNOTATIONS).with_member("value", Some(MemberValue::Array(Vec::new()))),
        marker(INTERCEPTOR),
        marker(DECORATOR),
        marker(DELEGATE),
        marker(AROUND_INVOKE),
        marker(AROUND_CONSTRUCT),
        marker(POST_CONSTRUCT),
        marker(PRE_DESTROY),
        AnnotationDefinition::stereotype(MODEL)
            .with_meta(Annotation::new(REQUEST_SCOPED))
            .with_meta(Annotation::new(NAMED)),
    ]
}
