//! 类型模型
//!
//! 组件类型、注入点类型与事件类型都用 [`Type`] 描述。类型是纯数据，
//! 由外部扫描器通过描述符提供。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 根类型名称，每个类型闭包都包含它
pub const OBJECT: &str = "java.lang.Object";

/// 类名
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassName(String);

impl ClassName {
    /// 创建类名
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// 根类型名称
    pub fn object() -> Self {
        Self::new(OBJECT)
    }

    /// 完整类名
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 不带包名的简单名称
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// 是否为 `java.lang.Object`
    pub fn is_object(&self) -> bool {
        self.0 == OBJECT
    }
}

impl fmt::Display for ClassName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClassName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ClassName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// 类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Type {
    /// 非泛型类或原始类型
    Class { name: ClassName },
    /// 参数化类型，例如 `List<String>`
    Parameterized { raw: ClassName, args: Vec<Type> },
    /// 数组类型
    Array { component: Box<Type> },
    /// 类型变量，例如 `T extends Number`
    Variable {
        name: String,
        #[serde(default)]
        bounds: Vec<Type>,
    },
    /// 通配符，例如 `? extends Number` 或 `? super Integer`
    Wildcard {
        #[serde(default)]
        upper: Vec<Type>,
        #[serde(default)]
        lower: Vec<Type>,
    },
}

impl Type {
    /// 原始类类型
    pub fn class(name: impl Into<ClassName>) -> Self {
        Self::Class { name: name.into() }
    }

    /// `java.lang.Object`
    pub fn object() -> Self {
        Self::Class {
            name: ClassName::object(),
        }
    }

    /// 参数化类型
    pub fn parameterized(raw: impl Into<ClassName>, args: Vec<Type>) -> Self {
        Self::Parameterized {
            raw: raw.into(),
            args,
        }
    }

    /// 数组类型
    pub fn array(component: Type) -> Self {
        Self::Array {
            component: Box::new(component),
        }
    }

    /// 无上界的类型变量
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable {
            name: name.into(),
            bounds: Vec::new(),
        }
    }

    /// 带上界的类型变量
    pub fn bounded_variable(name: impl Into<String>, bounds: Vec<Type>) -> Self {
        Self::Variable {
            name: name.into(),
            bounds,
        }
    }

    /// 无界通配符 `?`
    pub fn wildcard() -> Self {
        Self::Wildcard {
            upper: Vec::new(),
            lower: Vec::new(),
        }
    }

    /// `? extends bound`
    pub fn wildcard_extends(bound: Type) -> Self {
        Self::Wildcard {
            upper: vec![bound],
            lower: Vec::new(),
        }
    }

    /// `? super bound`
    pub fn wildcard_super(bound: Type) -> Self {
        Self::Wildcard {
            upper: Vec::new(),
            lower: vec![bound],
        }
    }

    /// 类或参数化类型的原始类名
    pub fn raw_class(&self) -> Option<&ClassName> {
        match self {
            Self::Class { name } => Some(name),
            Self::Parameterized { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// 参数化类型的类型实参，其余类型返回空切片
    pub fn type_arguments(&self) -> &[Type] {
        match self {
            Self::Parameterized { args, .. } => args,
            _ => &[],
        }
    }

    /// 是否为 `Object`
    pub fn is_object(&self) -> bool {
        matches!(self, Self::Class { name } if name.is_object())
    }

    /// 类、参数化类型或数组
    pub fn is_actual(&self) -> bool {
        matches!(
            self,
            Self::Class { .. } | Self::Parameterized { .. } | Self::Array { .. }
        )
    }

    /// 上界为空或仅为 Object 的类型变量，或 Object 本身
    pub fn is_unbounded_variable_or_object(&self) -> bool {
        match self {
            Self::Variable { bounds, .. } => bounds.iter().all(Type::is_object),
            Self::Wildcard { upper, lower } => lower.is_empty() && upper.iter().all(Type::is_object),
            other => other.is_object(),
        }
    }

    /// 是否包含类型变量或通配符
    pub fn has_unresolved_variables(&self) -> bool {
        match self {
            Self::Class { .. } => false,
            Self::Parameterized { args, .. } => args.iter().any(Type::has_unresolved_variables),
            Self::Array { component } => component.has_unresolved_variables(),
            Self::Variable { .. } | Self::Wildcard { .. } => true,
        }
    }

    /// 类型擦除
    pub fn erasure(&self) -> Type {
        match self {
            Self::Class { .. } => self.clone(),
            Self::Parameterized { raw, .. } => Type::class(raw.clone()),
            Self::Array { component } => Type::array(component.erasure()),
            Self::Variable { bounds, .. } => bounds.first().map(Type::erasure).unwrap_or_else(Type::object),
            Self::Wildcard { upper, .. } => upper.first().map(Type::erasure).unwrap_or_else(Type::object),
        }
    }

    /// 用类型实参替换类型变量
    pub fn substitute(&self, bindings: &HashMap<String, Type>) -> Type {
        if bindings.is_empty() {
            return self.clone();
        }
        match self {
            Self::Class { .. } => self.clone(),
            Self::Parameterized { raw, args } => Self::Parameterized {
                raw: raw.clone(),
                args: args.iter().map(|arg| arg.substitute(bindings)).collect(),
            },
            Self::Array { component } => Type::array(component.substitute(bindings)),
            Self::Variable { name, .. } => bindings.get(name).cloned().unwrap_or_else(|| self.clone()),
            Self::Wildcard { upper, lower } => Self::Wildcard {
                upper: upper.iter().map(|t| t.substitute(bindings)).collect(),
                lower: lower.iter().map(|t| t.substitute(bindings)).collect(),
            },
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Class { name } => write!(f, "{}", name),
            Self::Parameterized { raw, args } => {
                write!(f, "{}<", raw)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(">")
            }
            Self::Array { component } => write!(f, "{}[]", component),
            Self::Variable { name, .. } => f.write_str(name),
            Self::Wildcard { upper, lower } => {
                if let Some(bound) = lower.first() {
                    write!(f, "? super {}", bound)
                } else if let Some(bound) = upper.first().filter(|b| !b.is_object()) {
                    write!(f, "? extends {}", bound)
                } else {
                    f.write_str("?")
                }
            }
        }
    }
}

impl From<ClassName> for Type {
    fn from(name: ClassName) -> Self {
        Type::class(name)
    }
}
