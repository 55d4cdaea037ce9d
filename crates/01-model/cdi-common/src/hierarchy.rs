//! 类层次结构与类型闭包

use crate::types::{ClassName, Type};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 类型形参
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeParameter {
    /// 名称
    pub name: String,
    /// 上界
    #[serde(default)]
    pub bounds: Vec<Type>,
}

/// 类的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// 普通类
    #[default]
    Class,
    /// 接口
    Interface,
    /// 注解
    Annotation,
    /// 枚举
    Enum,
}

/// 类定义
///
/// 父类与接口可以引用本类的类型形参，计算闭包时按实参替换。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDefinition {
    /// 名称
    pub name: ClassName,
    /// 类或接口
    #[serde(default)]
    pub kind: ClassKind,
    /// 类型参数
    #[serde(default)]
    pub type_parameters: Vec<TypeParameter>,
    /// 父类
    #[serde(default)]
    pub superclass: Option<Type>,
    /// 直接实现的接口
    #[serde(default)]
    pub interfaces: Vec<Type>,
    /// 是否为抽象类
    #[serde(default)]
    pub is_abstract: bool,
}

impl ClassDefinition {
    /// 创建普通类定义
    pub fn new(name: impl Into<ClassName>) -> Self {
        Self {
            name: name.into(),
            kind: ClassKind::Class,
            type_parameters: Vec::new(),
            superclass: None,
            interfaces: Vec::new(),
            is_abstract: false,
        }
    }

    /// 创建接口定义
    pub fn interface(name: impl Into<ClassName>) -> Self {
        Self {
            kind: ClassKind::Interface,
            is_abstract: true,
            ..Self::new(name)
        }
    }

    /// 声明类型参数
    pub fn with_type_parameter(mut self, name: impl Into<String>) -> Self {
        self.type_parameters.push(TypeParameter {
            name: name.into(),
            bounds: Vec::new(),
        });
        self
    }

    /// 声明带上界的类型参数
    pub fn with_bounded_type_parameter(mut self, name: impl Into<String>, bounds: Vec<Type>) -> Self {
        self.type_parameters.push(TypeParameter {
            name: name.into(),
            bounds,
        });
        self
    }

    /// 设置父类
    pub fn extends(mut self, superclass: Type) -> Self {
        self.superclass = Some(superclass);
        self
    }

    /// 追加实现的接口
    pub fn implements(mut self, interface: Type) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// 标记为抽象类
    pub fn abstract_class(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// 是否为接口
    pub fn is_interface(&self) -> bool {
        self.kind == ClassKind::Interface
    }

    /// 声明类型：泛型类返回以自身类型形参参数化的类型
    pub fn declared_type(&self) -> Type {
        if self.type_parameters.is_empty() {
            Type::class(self.name.clone())
        } else {
            Type::parameterized(
                self.name.clone(),
                self.type_parameters
                    .iter()
                    .map(|p| Type::bounded_variable(p.name.clone(), p.bounds.clone()))
                    .collect(),
            )
        }
    }

    /// 直接父类型
    pub fn supertypes(&self) -> impl Iterator<Item = &Type> {
        self.superclass.iter().chain(self.interfaces.iter())
    }
}

/// 类型仓库
///
/// 保存已注册的类定义，并缓存类型闭包。
#[derive(Debug)]
pub struct TypeStore {
    classes: DashMap<ClassName, Arc<ClassDefinition>>,
    closures: DashMap<Type, Arc<HashSet<Type>>>,
}

impl TypeStore {
    /// 创建类型仓库，预先注册根类型
    pub fn new() -> Self {
        let store = Self {
            classes: DashMap::new(),
            closures: DashMap::new(),
        };
        store.register(ClassDefinition::new(ClassName::object()));
        store
    }

    /// 注册类定义
    pub fn register(&self, definition: ClassDefinition) {
        debug!("注册类定义: {}", definition.name);
        self.classes.insert(definition.name.clone(), Arc::new(definition));
        // 新的定义可能改变任意闭包
        self.closures.clear();
    }

    /// 批量注册类定义
    pub fn register_all(&self, definitions: impl IntoIterator<Item = ClassDefinition>) {
        for definition in definitions {
            self.register(definition);
        }
    }

    /// 查找类定义
    pub fn get(&self, name: &ClassName) -> Option<Arc<ClassDefinition>> {
        self.classes.get(name).map(|entry| entry.value().clone())
    }

    /// 是否已注册
    pub fn contains(&self, name: &ClassName) -> bool {
        self.classes.contains_key(name)
    }

    /// 已注册的类数量
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// 计算类型闭包
    ///
    /// 闭包包含类型本身以及按实参替换后的全部父类与接口，总是包含 Object。
    /// 原始类型的父类型全部擦除。
    pub fn type_closure(&self, ty: &Type) -> Arc<HashSet<Type>> {
        if let Some(cached) = self.closures.get(ty) {
            return cached.value().clone();
        }
        let mut closure = HashSet::new();
        self.discover(ty.clone(), &mut closure);
        closure.insert(Type::object());
        let closure = Arc::new(closure);
        self.closures.insert(ty.clone(), closure.clone());
        closure
    }

    fn discover(&self, ty: Type, out: &mut HashSet<Type>) {
        if out.contains(&ty) {
            return;
        }
        out.insert(ty.clone());
        match &ty {
            Type::Class { name } => {
                if let Some(definition) = self.get(name) {
                    let erase = !definition.type_parameters.is_empty();
                    for supertype in definition.supertypes() {
                        let supertype = if erase { supertype.erasure() } else { supertype.clone() };
                        self.discover(supertype, out);
                    }
                }
            }
            Type::Parameterized { raw, args } => {
                if let Some(definition) = self.get(raw) {
                    let bindings: HashMap<String, Type> = definition
                        .type_parameters
                        .iter()
                        .map(|p| p.name.clone())
                        .zip(args.iter().cloned())
                        .collect();
                    for supertype in definition.supertypes() {
                        self.discover(supertype.substitute(&bindings), out);
                    }
                }
            }
            Type::Array { .. } | Type::Variable { .. } | Type::Wildcard { .. } => {}
        }
    }

    /// 原始类层面的子类型判断
    pub fn is_subclass(&self, sub: &ClassName, sup: &ClassName) -> bool {
        if sup.is_object() || sub == sup {
            return true;
        }
        self.type_closure(&Type::class(sub.clone()))
            .iter()
            .filter_map(Type::raw_class)
            .any(|name| name == sup)
    }

    /// 直接父类名
    pub fn direct_superclass(&self, name: &ClassName) -> Option<ClassName> {
        self.get(name)
            .and_then(|definition| definition.superclass.as_ref().and_then(Type::raw_class).cloned())
    }

    /// 在类型闭包中查找原始类为 `raw` 的父类型
    pub fn find_supertype(&self, ty: &Type, raw: &ClassName) -> Option<Type> {
        if ty.raw_class() == Some(raw) {
            return Some(ty.clone());
        }
        self.type_closure(ty)
            .iter()
            .find(|candidate| candidate.raw_class() == Some(raw))
            .cloned()
    }

    /// 清空闭包缓存
    pub fn clear_cache(&self) {
        self.closures.clear();
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}
