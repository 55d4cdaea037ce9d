//! 限定符实例
//!
//! [`QualifierInstance`] 是注解实例的规范值：只保留绑定成员，缺省成员取声明的默认值。
//! 两个实例相等当且仅当注解类型相同且全部绑定成员取值相同。

use crate::annotations::{names, Annotation, AnnotationStore, MemberValue};
use crate::errors::{DefinitionError, DefinitionResult};
use crate::types::ClassName;
use once_cell::sync::Lazy;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// `@Any` 限定符
pub static ANY: Lazy<QualifierInstance> = Lazy::new(|| QualifierInstance::of_type(names::ANY));

/// `@Default` 限定符
pub static DEFAULT: Lazy<QualifierInstance> = Lazy::new(|| QualifierInstance::of_type(names::DEFAULT));

/// 限定符实例
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifierInstance {
    annotation_type: ClassName,
    values: BTreeMap<String, MemberValue>,
}

impl QualifierInstance {
    /// 直接由类型与绑定成员构造
    pub fn new(annotation_type: impl Into<ClassName>, values: BTreeMap<String, MemberValue>) -> Self {
        Self {
            annotation_type: annotation_type.into(),
            values,
        }
    }

    /// 无成员限定符
    pub fn of_type(annotation_type: impl Into<ClassName>) -> Self {
        Self::new(annotation_type, BTreeMap::new())
    }

    /// `@Any`
    pub fn any() -> Self {
        ANY.clone()
    }

    /// `@Default`
    pub fn default_qualifier() -> Self {
        DEFAULT.clone()
    }

    /// `@Named(value)`
    pub fn named(value: impl Into<String>) -> Self {
        let mut values = BTreeMap::new();
        values.insert("value".to_string(), MemberValue::Str(value.into()));
        Self::new(names::NAMED, values)
    }

    /// 由注解实例计算规范值
    ///
    /// 注解类型有定义时，非绑定成员被排除，缺少显式取值的成员取默认值；
    /// 既无显式值也无默认值时返回错误。没有定义的注解按显式成员原样比较。
    pub fn of(annotation: &Annotation, store: &AnnotationStore) -> DefinitionResult<Self> {
        let Some(definition) = store.definition(&annotation.annotation_type) else {
            return Ok(Self::new(annotation.annotation_type.clone(), annotation.members.clone()));
        };

        if let Some(member) = annotation
            .members
            .keys()
            .find(|name| definition.member(name).is_none())
        {
            return Err(DefinitionError::UndeclaredMember {
                annotation: annotation.annotation_type.to_string(),
                member: member.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for member in definition.members.iter().filter(|m| !m.nonbinding) {
            let value = annotation
                .member(&member.name)
                .cloned()
                .or_else(|| member.default.clone())
                .ok_or_else(|| DefinitionError::MissingMemberValue {
                    annotation: annotation.annotation_type.to_string(),
                    member: member.name.clone(),
                })?;
            values.insert(member.name.clone(), value);
        }
        Ok(Self::new(annotation.annotation_type.clone(), values))
    }

    /// 将一组限定符注解转换为限定符集合
    ///
    /// 每个注解都必须是合法限定符；不可重复的限定符出现多次时报错。
    pub fn of_all<'a>(
        annotations: impl IntoIterator<Item = &'a Annotation>,
        store: &AnnotationStore,
    ) -> DefinitionResult<HashSet<Self>> {
        let mut result = HashSet::new();
        let mut seen_types = HashSet::new();
        for annotation in annotations {
            let model = store.qualifier_model(&annotation.annotation_type);
            if !model.valid {
                return Err(DefinitionError::InvalidQualifier {
                    annotation: annotation.to_string(),
                });
            }
            if !seen_types.insert(annotation.annotation_type.clone()) && !model.repeatable {
                return Err(DefinitionError::DuplicateQualifiers {
                    qualifiers: annotation.annotation_type.to_string(),
                });
            }
            result.insert(Self::of(annotation, store)?);
        }
        Ok(result)
    }

    /// 限定符注解类型
    pub fn annotation_type(&self) -> &ClassName {
        &self.annotation_type
    }

    /// 读取参与比较的成员值
    pub fn value(&self, member: &str) -> Option<&MemberValue> {
        self.values.get(member)
    }

    /// 参与比较的全部成员，按名称排序
    pub fn values(&self) -> &BTreeMap<String, MemberValue> {
        &self.values
    }

    /// 是否为 `@Any`
    pub fn is_any(&self) -> bool {
        self.annotation_type.as_str() == names::ANY
    }

    /// 是否为 `@Default`
    pub fn is_default(&self) -> bool {
        self.annotation_type.as_str() == names::DEFAULT
    }

    /// 是否为 `@Named`
    pub fn is_named(&self) -> bool {
        self.annotation_type.as_str() == names::NAMED
    }

    /// `@Named` 的取值
    pub fn named_value(&self) -> Option<&str> {
        if self.is_named() {
            self.value("value").and_then(MemberValue::as_str)
        } else {
            None
        }
    }

    /// 转换回注解实例
    pub fn to_annotation(&self) -> Annotation {
        Annotation {
            annotation_type: self.annotation_type.clone(),
            members: self.values.clone(),
        }
    }
}

impl fmt::Display for QualifierInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_annotation())
    }
}

/// `required` 中每个限定符都出现在 `available` 中
pub fn contains_all_qualifiers(required: &HashSet<QualifierInstance>, available: &HashSet<QualifierInstance>) -> bool {
    required.iter().all(|q| available.contains(q))
}

/// 以稳定顺序格式化限定符集合
pub fn format_qualifiers(qualifiers: &HashSet<QualifierInstance>) -> String {
    let mut sorted: Vec<_> = qualifiers.iter().collect();
    sorted.sort();
    let parts: Vec<String> = sorted.iter().map(|q| q.to_string()).collect();
    format!("{{{}}}", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::AnnotationDefinition;

    fn store_with_pay_by() -> AnnotationStore {
        let store = AnnotationStore::new();
        store.register(
            AnnotationDefinition::qualifier("PayBy")
                .with_member("value", None)
                .with_nonbinding_member("comment", Some(MemberValue::Str(String::new()))),
        );
        store
    }

    #[test]
    fn test_equality_ignores_nonbinding_members() {
        let store = store_with_pay_by();
        let a = Annotation::new("PayBy")
            .with("value", MemberValue::Enum("CHEQUE".into()))
            .with("comment", MemberValue::Str("x".into()));
        let b = Annotation::new("PayBy")
            .with("value", MemberValue::Enum("CHEQUE".into()))
            .with("comment", MemberValue::Str("y".into()));
        let c = Annotation::new("PayBy").with("value", MemberValue::Enum("CASH".into()));

        let qa = QualifierInstance::of(&a, &store).unwrap();
        let qb = QualifierInstance::of(&b, &store).unwrap();
        let qc = QualifierInstance::of(&c, &store).unwrap();
        assert_eq!(qa, qb);
        assert_ne!(qa, qc);
    }

    #[test]
    fn test_default_member_values() {
        let store = AnnotationStore::new();
        let implicit = QualifierInstance::of(&Annotation::new(names::NAMED), &store).unwrap();
        assert_eq!(implicit, QualifierInstance::named(""));
    }

    #[test]
    fn test_missing_member_value() {
        let store = store_with_pay_by();
        let result = QualifierInstance::of(&Annotation::new("PayBy"), &store);
        assert!(matches!(result, Err(DefinitionError::MissingMemberValue { .. })));
    }

    #[test]
    fn test_of_all_rejects_invalid_and_duplicates() {
        let store = store_with_pay_by();
        let invalid = [Annotation::new(names::INJECT)];
        assert!(matches!(
            QualifierInstance::of_all(invalid.iter(), &store),
            Err(DefinitionError::InvalidQualifier { .. })
        ));

        let duplicated = [Annotation::named("a"), Annotation::named("b")];
        assert!(matches!(
            QualifierInstance::of_all(duplicated.iter(), &store),
            Err(DefinitionError::DuplicateQualifiers { .. })
        ));
    }

    #[test]
    fn test_containment() {
        let required: HashSet<_> = [QualifierInstance::any()].into_iter().collect();
        let available: HashSet<_> = [QualifierInstance::any(), QualifierInstance::default_qualifier()]
            .into_iter()
            .collect();
        assert!(contains_all_qualifiers(&required, &available));
        assert!(!contains_all_qualifiers(&available, &required));
        assert!(contains_all_qualifiers(&HashSet::new(), &required));
    }
}
