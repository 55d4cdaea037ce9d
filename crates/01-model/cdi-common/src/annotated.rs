//! 注解类型描述符
//!
//! 外部扫描器产出的类描述：类定义、类型上的注解以及字段、方法、构造器、参数上的注解。
//! 描述符可以序列化，便于从 JSON 加载。

use crate::annotations::{Annotation, MemberValue};
use crate::hierarchy::ClassDefinition;
use crate::types::{ClassName, Type};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 带注解的元素
pub trait Annotated {
    /// 直接声明的注解
    fn annotations(&self) -> &[Annotation];

    /// 按类型查找注解
    fn annotation(&self, annotation_type: &str) -> Option<&Annotation> {
        self.annotations().iter().find(|a| a.is(annotation_type))
    }

    /// 是否带有指定注解
    fn is_annotation_present(&self, annotation_type: &str) -> bool {
        self.annotation(annotation_type).is_some()
    }

    /// 指定注解的成员取值
    fn annotation_member(&self, annotation_type: &str, member: &str) -> Option<&MemberValue> {
        self.annotation(annotation_type).and_then(|a| a.member(member))
    }
}

/// 参数描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedParameter {
    /// 参数位置，从 0 开始
    pub position: usize,
    /// 名称
    #[serde(default)]
    pub name: String,
    /// 声明类型
    pub base_type: Type,
    /// 注解
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl AnnotatedParameter {
    /// 创建参数，尚无注解
    pub fn new(position: usize, name: impl Into<String>, base_type: Type) -> Self {
        Self {
            position,
            name: name.into(),
            base_type,
            annotations: Vec::new(),
        }
    }

    /// 追加一个注解
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// 字段描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedField {
    /// 名称
    pub name: String,
    /// 声明类型
    pub base_type: Type,
    /// 注解
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// 是否为静态成员
    #[serde(default)]
    pub is_static: bool,
}

impl AnnotatedField {
    /// 创建字段，尚无注解
    pub fn new(name: impl Into<String>, base_type: Type) -> Self {
        Self {
            name: name.into(),
            base_type,
            annotations: Vec::new(),
            is_static: false,
        }
    }

    /// 追加一个注解
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// 方法描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedMethod {
    /// 名称
    pub name: String,
    /// 参数，按位置排列
    #[serde(default)]
    pub parameters: Vec<AnnotatedParameter>,
    /// 注解
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// 是否为静态成员
    #[serde(default)]
    pub is_static: bool,
}

impl AnnotatedMethod {
    /// 创建无参方法
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            annotations: Vec::new(),
            is_static: false,
        }
    }

    /// 追加参数，位置按追加顺序编号
    pub fn with_parameter(mut self, name: impl Into<String>, base_type: Type, annotations: Vec<Annotation>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(AnnotatedParameter {
            position,
            name: name.into(),
            base_type,
            annotations,
        });
        self
    }

    /// 追加一个方法注解
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// 第一个带有指定注解的参数
    pub fn parameter_annotated_with(&self, annotation_type: &str) -> Option<&AnnotatedParameter> {
        self.parameters.iter().find(|p| p.is_annotation_present(annotation_type))
    }
}

/// 构造器描述
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnnotatedConstructor {
    /// 参数，按位置排列
    #[serde(default)]
    pub parameters: Vec<AnnotatedParameter>,
    /// 注解
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl AnnotatedConstructor {
    /// 创建无参构造器
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加构造器参数，位置按追加顺序
    pub fn with_parameter(mut self, name: impl Into<String>, base_type: Type, annotations: Vec<Annotation>) -> Self {
        let position = self.parameters.len();
        self.parameters.push(AnnotatedParameter {
            position,
            name: name.into(),
            base_type,
            annotations,
        });
        self
    }

    /// 追加一个构造器注解
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// 注解类型描述符
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedType {
    /// 每个类型稳定且唯一的标识，缺省为类名
    #[serde(default)]
    pub identifier: Option<String>,
    /// 类定义
    pub definition: ClassDefinition,
    /// 注解
    #[serde(default)]
    pub annotations: Vec<Annotation>,
    /// 字段
    #[serde(default)]
    pub fields: Vec<AnnotatedField>,
    /// 方法
    #[serde(default)]
    pub methods: Vec<AnnotatedMethod>,
    /// 构造器
    #[serde(default)]
    pub constructors: Vec<AnnotatedConstructor>,
}

impl AnnotatedType {
    /// 以类定义创建注解类型，标识默认为类名
    pub fn new(definition: ClassDefinition) -> Self {
        Self {
            identifier: None,
            definition,
            annotations: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    /// 指定注解类型标识
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// 追加一个类注解
    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// 追加字段
    pub fn with_field(mut self, field: AnnotatedField) -> Self {
        self.fields.push(field);
        self
    }

    /// 追加方法
    pub fn with_method(mut self, method: AnnotatedMethod) -> Self {
        self.methods.push(method);
        self
    }

    /// 设置构造器
    pub fn with_constructor(mut self, constructor: AnnotatedConstructor) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// 类名
    pub fn class(&self) -> &ClassName {
        &self.definition.name
    }

    /// 类型标识
    pub fn id(&self) -> String {
        self.identifier
            .clone()
            .unwrap_or_else(|| self.definition.name.to_string())
    }

    /// 声明类型
    pub fn base_type(&self) -> Type {
        self.definition.declared_type()
    }

    /// 注入构造器，否则为无参构造器
    pub fn bean_constructor(&self) -> Option<&AnnotatedConstructor> {
        self.constructors
            .iter()
            .find(|c| c.is_annotation_present(crate::annotations::names::INJECT))
            .or_else(|| self.constructors.iter().find(|c| c.parameters.is_empty()))
    }

    /// 类型本身及其成员上出现过的全部注解类型
    pub fn all_annotation_types(&self) -> HashSet<ClassName> {
        let parameters = self
            .methods
            .iter()
            .flat_map(|m| m.parameters.iter())
            .chain(self.constructors.iter().flat_map(|c| c.parameters.iter()))
            .flat_map(|p| p.annotations.iter());
        self.annotations
            .iter()
            .chain(self.fields.iter().flat_map(|f| f.annotations.iter()))
            .chain(self.methods.iter().flat_map(|m| m.annotations.iter()))
            .chain(self.constructors.iter().flat_map(|c| c.annotations.iter()))
            .chain(parameters)
            .map(|a| a.annotation_type.clone())
            .collect()
    }
}

impl Annotated for AnnotatedType {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for AnnotatedField {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for AnnotatedMethod {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for AnnotatedConstructor {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}

impl Annotated for AnnotatedParameter {
    fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }
}
