//! 注入点

use cdi_common::{format_qualifiers, BeanIdentifier, QualifierInstance, Type};
use std::collections::HashSet;
use std::fmt;

/// 注入点所在的成员
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum InjectionPointKind {
    /// 字段
    Field,
    /// 参数
    Parameter { position: usize },
}

/// 注入点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    /// 所需类型
    pub required_type: Type,
    /// 限定符
    pub qualifiers: HashSet<QualifierInstance>,
    /// 字段名或参数名
    pub member_name: String,
    /// 注入点种类
    pub kind: InjectionPointKind,
    /// 声明该注入点的组件
    pub declaring_bean: Option<BeanIdentifier>,
    /// 装饰器的 `@Delegate` 注入点
    pub delegate: bool,
}

impl InjectionPoint {
    /// 字段注入点
    pub fn field(name: impl Into<String>, required_type: Type, qualifiers: HashSet<QualifierInstance>) -> Self {
        Self {
            required_type,
            qualifiers,
            member_name: name.into(),
            kind: InjectionPointKind::Field,
            declaring_bean: None,
            delegate: false,
        }
    }

    /// 构造器或方法参数注入点
    pub fn parameter(
        position: usize,
        name: impl Into<String>,
        required_type: Type,
        qualifiers: HashSet<QualifierInstance>,
    ) -> Self {
        Self {
            required_type,
            qualifiers,
            member_name: name.into(),
            kind: InjectionPointKind::Parameter { position },
            declaring_bean: None,
            delegate: false,
        }
    }

    /// 设置声明该注入点的组件
    pub fn declared_by(mut self, bean: BeanIdentifier) -> Self {
        self.declaring_bean = Some(bean);
        self
    }

    /// 标记为装饰器委托注入点
    pub fn as_delegate(mut self) -> Self {
        self.delegate = true;
        self
    }
}

impl fmt::Display for InjectionPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", format_qualifiers(&self.qualifiers), self.required_type, self.member_name)?;
        if let Some(bean) = &self.declaring_bean {
            write!(f, " [{}]", bean)?;
        }
        Ok(())
    }
}
