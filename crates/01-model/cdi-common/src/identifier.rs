//! 组件标识符
//!
//! 字符串形式为 `CDI%<kind>%<archive>%<type-id>[%<member>]`，在一次部署内唯一，
//! 可以持久化并在之后重新解析。组成部分中的 `%` 与 `\` 以反斜杠转义。

use crate::errors::DefinitionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const PREFIX: &str = "CDI";
const SEPARATOR: char = '%';

/// 组件种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    /// 托管组件
    ManagedBean,
    /// 拦截器
    Interceptor,
    /// 装饰器
    Decorator,
    /// 观察者方法
    ObserverMethod,
    /// 合成组件
    Synthetic,
    /// 内置组件
    BuiltIn,
}

impl ComponentKind {
    /// 标识符中使用的种类名
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ManagedBean => "ManagedBean",
            Self::Interceptor => "Interceptor",
            Self::Decorator => "Decorator",
            Self::ObserverMethod => "ObserverMethod",
            Self::Synthetic => "Synthetic",
            Self::BuiltIn => "BuiltIn",
        }
    }
}

impl FromStr for ComponentKind {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ManagedBean" => Ok(Self::ManagedBean),
            "Interceptor" => Ok(Self::Interceptor),
            "Decorator" => Ok(Self::Decorator),
            "ObserverMethod" => Ok(Self::ObserverMethod),
            "Synthetic" => Ok(Self::Synthetic),
            "BuiltIn" => Ok(Self::BuiltIn),
            other => Err(DefinitionError::InvalidIdentifier {
                value: other.to_string(),
            }),
        }
    }
}

/// 组件标识符
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeanIdentifier {
    kind: ComponentKind,
    archive: String,
    type_id: String,
    member: Option<String>,
}

impl BeanIdentifier {
    /// 创建不带成员部分的标识符
    pub fn new(kind: ComponentKind, archive: impl Into<String>, type_id: impl Into<String>) -> Self {
        Self {
            kind,
            archive: archive.into(),
            type_id: type_id.into(),
            member: None,
        }
    }

    /// 附加成员部分，用于观察者方法等成员级组件
    pub fn with_member(mut self, member: impl Into<String>) -> Self {
        self.member = Some(member.into());
        self
    }

    /// 组件种类
    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// 所属归档
    pub fn archive(&self) -> &str {
        &self.archive
    }

    /// 类型标识
    pub fn type_id(&self) -> &str {
        &self.type_id
    }

    /// 成员部分，如观察者方法名
    pub fn member(&self) -> Option<&str> {
        self.member.as_deref()
    }
}

fn escape(part: &str, out: &mut String) {
    for c in part.chars() {
        if c == SEPARATOR || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

fn split_escaped(value: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.push(chars.next()?),
            SEPARATOR => parts.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    parts.push(current);
    Some(parts)
}

impl fmt::Display for BeanIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::with_capacity(PREFIX.len() + self.archive.len() + self.type_id.len() + 24);
        out.push_str(PREFIX);
        out.push(SEPARATOR);
        out.push_str(self.kind.as_str());
        out.push(SEPARATOR);
        escape(&self.archive, &mut out);
        out.push(SEPARATOR);
        escape(&self.type_id, &mut out);
        if let Some(member) = &self.member {
            out.push(SEPARATOR);
            escape(member, &mut out);
        }
        f.write_str(&out)
    }
}

impl FromStr for BeanIdentifier {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DefinitionError::InvalidIdentifier { value: s.to_string() };
        let parts = split_escaped(s).ok_or_else(invalid)?;
        if !(4..=5).contains(&parts.len()) || parts[0] != PREFIX {
            return Err(invalid());
        }
        let mut parts = parts.into_iter().skip(1);
        let kind = parts.next().ok_or_else(invalid)?.parse::<ComponentKind>().map_err(|_| invalid())?;
        let archive = parts.next().ok_or_else(invalid)?;
        let type_id = parts.next().ok_or_else(invalid)?;
        Ok(Self {
            kind,
            archive,
            type_id,
            member: parts.next(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format() {
        let id = BeanIdentifier::new(ComponentKind::ManagedBean, "app", "com.acme.Car");
        assert_eq!(id.to_string(), "CDI%ManagedBean%app%com.acme.Car");

        let observer = BeanIdentifier::new(ComponentKind::ObserverMethod, "app", "Listener").with_member("onEvent#0");
        assert_eq!(observer.to_string(), "CDI%ObserverMethod%app%Listener%onEvent#0");
    }

    #[test]
    fn test_parse_with_escaped_separator() {
        let id = BeanIdentifier::new(ComponentKind::Synthetic, "lib%1", "a\\b").with_member("m");
        let parsed: BeanIdentifier = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.archive(), "lib%1");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("CDI%ManagedBean%app".parse::<BeanIdentifier>().is_err());
        assert!("XYZ%ManagedBean%app%Car".parse::<BeanIdentifier>().is_err());
        assert!("CDI%Unknown%app%Car".parse::<BeanIdentifier>().is_err());
        assert!("CDI%ManagedBean%app%Car\\".parse::<BeanIdentifier>().is_err());
    }
}
