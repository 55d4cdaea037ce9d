//! 解析请求

use super::ResolutionEnvironment;
use crate::beans::builtin::FACADE_TYPES;
use cdi_common::{
    format_qualifiers, Annotation, ContainerResult, DefinitionError, DefinitionResult, QualifierInstance, Type,
    TypeResolutionError,
};
use cdi_spi::{Bean, InjectionPoint};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 解析模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolutionMode {
    /// 组件解析：拒绝包含类型变量或通配符的请求类型
    Strict,
    /// 容器内部事件：跳过类型检查
    Lenient,
}

/// 不可变的解析请求
///
/// 作为缓存键时按类型闭包与限定符集合的集合相等比较，哈希值预先计算且与顺序无关。
#[derive(Clone)]
pub struct Resolvable {
    required_type: Type,
    types: Arc<HashSet<Type>>,
    qualifiers: Arc<HashSet<QualifierInstance>>,
    delegate: bool,
    hash: u64,
}

fn hash_one<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

fn unordered_hash<'a, T: Hash + 'a>(values: impl Iterator<Item = &'a T>) -> u64 {
    values.fold(0u64, |acc, v| acc.wrapping_add(hash_one(v)))
}

impl Resolvable {
    fn new(required_type: Type, types: HashSet<Type>, qualifiers: HashSet<QualifierInstance>, delegate: bool) -> Self {
        let hash = unordered_hash(types.iter())
            .wrapping_mul(31)
            .wrapping_add(unordered_hash(qualifiers.iter()))
            .wrapping_mul(31)
            .wrapping_add(delegate as u64);
        Self {
            required_type,
            types: Arc::new(types),
            qualifiers: Arc::new(qualifiers),
            delegate,
            hash,
        }
    }

    /// 以组件自身的类型与限定符构造，用于装饰器解析
    pub fn for_bean(bean: &dyn Bean) -> Self {
        Self::new(
            Type::class(bean.bean_class().clone()),
            bean.types().clone(),
            bean.qualifiers().clone(),
            false,
        )
    }

    /// 以拦截器绑定构造，用于拦截器解析
    pub fn for_bindings(bindings: HashSet<QualifierInstance>) -> Self {
        Self::new(Type::object(), HashSet::from([Type::object()]), bindings, false)
    }

    /// 按注入点构造
    pub fn for_injection_point(env: &ResolutionEnvironment, ip: &InjectionPoint) -> ContainerResult<Self> {
        let mut builder = ResolvableBuilder::new(env)
            .for_type(&ip.required_type)?
            .delegate(ip.delegate);
        for qualifier in &ip.qualifiers {
            let qualifier = match qualifier.named_value() {
                Some("") => QualifierInstance::named(ip.member_name.clone()),
                _ => qualifier.clone(),
            };
            builder = builder.add_qualifier(qualifier)?;
        }
        Ok(builder.build())
    }

    /// 所需类型
    pub fn required_type(&self) -> &Type {
        &self.required_type
    }

    /// 参与匹配的类型
    pub fn types(&self) -> &HashSet<Type> {
        &self.types
    }

    /// 规范化后的限定符
    pub fn qualifiers(&self) -> &HashSet<QualifierInstance> {
        &self.qualifiers
    }

    /// 是否为委托注入点
    pub fn is_delegate(&self) -> bool {
        self.delegate
    }
}

impl PartialEq for Resolvable {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.delegate == other.delegate
            && self.types == other.types
            && self.qualifiers == other.qualifiers
    }
}

impl Eq for Resolvable {}

impl Hash for Resolvable {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolvable")
            .field("required_type", &self.required_type.to_string())
            .field("types", &self.types.len())
            .field("qualifiers", &format_qualifiers(&self.qualifiers))
            .field("delegate", &self.delegate)
            .finish()
    }
}

impl fmt::Display for Resolvable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.required_type, format_qualifiers(&self.qualifiers))
    }
}

/// 解析请求构建器
pub struct ResolvableBuilder<'a> {
    env: &'a ResolutionEnvironment,
    mode: ResolutionMode,
    required_type: Option<Type>,
    types: HashSet<Type>,
    qualifiers: HashSet<QualifierInstance>,
    delegate: bool,
}

impl<'a> ResolvableBuilder<'a> {
    /// 创建
    pub fn new(env: &'a ResolutionEnvironment) -> Self {
        Self {
            env,
            mode: ResolutionMode::Strict,
            required_type: None,
            types: HashSet::new(),
            qualifiers: HashSet::new(),
            delegate: false,
        }
    }

    /// 设置解析模式
    pub fn mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// 宽松模式，未声明的限定符不报错
    pub fn lenient(self) -> Self {
        self.mode(ResolutionMode::Lenient)
    }

    /// 设置请求类型并计算类型闭包
    pub fn for_type(mut self, ty: &Type) -> Result<Self, TypeResolutionError> {
        if self.mode == ResolutionMode::Strict && ty.has_unresolved_variables() {
            return Err(TypeResolutionError::UnresolvedTypeVariable { ty: ty.to_string() });
        }
        self.types.extend(self.env.request_closure(ty));
        self.required_type = Some(ty.clone());
        Ok(self)
    }

    /// 添加限定符
    pub fn add_qualifier(mut self, qualifier: QualifierInstance) -> DefinitionResult<Self> {
        let model = self.env.annotations().qualifier_model(qualifier.annotation_type());
        if !model.valid {
            return Err(DefinitionError::InvalidQualifier {
                annotation: qualifier.to_string(),
            });
        }
        if !model.repeatable
            && self
                .qualifiers
                .iter()
                .any(|existing| existing.annotation_type() == qualifier.annotation_type())
        {
            return Err(DefinitionError::DuplicateQualifiers {
                qualifiers: qualifier.annotation_type().to_string(),
            });
        }
        self.qualifiers.insert(qualifier);
        Ok(self)
    }

    /// 由注解实例添加限定符
    pub fn add_qualifier_annotation(self, annotation: &Annotation) -> DefinitionResult<Self> {
        if !self.env.annotations().is_qualifier(&annotation.annotation_type) {
            return Err(DefinitionError::InvalidQualifier {
                annotation: annotation.to_string(),
            });
        }
        let qualifier = QualifierInstance::of(annotation, self.env.annotations())?;
        self.add_qualifier(qualifier)
    }

    /// 追加限定符实例
    pub fn add_qualifiers(mut self, qualifiers: impl IntoIterator<Item = QualifierInstance>) -> DefinitionResult<Self> {
        for qualifier in qualifiers {
            self = self.add_qualifier(qualifier)?;
        }
        Ok(self)
    }

    /// 追加限定符注解
    pub fn add_qualifier_annotations<'b>(
        mut self,
        annotations: impl IntoIterator<Item = &'b Annotation>,
    ) -> DefinitionResult<Self> {
        for annotation in annotations {
            self = self.add_qualifier_annotation(annotation)?;
        }
        Ok(self)
    }

    /// 设置是否为委托注入点
    pub fn delegate(mut self, delegate: bool) -> Self {
        self.delegate = delegate;
        self
    }

    /// 构建解析请求
    ///
    /// 没有限定符时补充 `@Default`，总是补充 `@Any`。门面类型只以 `@Any` 解析。
    pub fn build(mut self) -> Resolvable {
        let required_type = self.required_type.take().unwrap_or_else(Type::object);
        if self.types.is_empty() {
            self.types = self.env.request_closure(&required_type);
        }

        let is_facade = required_type
            .raw_class()
            .map(|raw| FACADE_TYPES.contains(&raw.as_str()))
            .unwrap_or(false);
        let mut qualifiers = if is_facade { HashSet::new() } else { self.qualifiers };
        if qualifiers.is_empty() && !is_facade {
            qualifiers.insert(QualifierInstance::default_qualifier());
        }
        qualifiers.insert(QualifierInstance::any());

        Resolvable::new(required_type, self.types, qualifiers, self.delegate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_common::{names, AnnotationDefinition, AnnotationStore, ClassDefinition, ResolutionConfig, TypeStore};

    fn env() -> ResolutionEnvironment {
        let types = Arc::new(TypeStore::new());
        types.register(ClassDefinition::interface("Vehicle"));
        types.register(ClassDefinition::new("Car").implements(Type::class("Vehicle")));
        let annotations = Arc::new(AnnotationStore::new());
        annotations.register(AnnotationDefinition::qualifier("Fast"));
        ResolutionEnvironment::new(types, annotations, &ResolutionConfig::default())
    }

    #[test]
    fn test_default_qualifier_convention() {
        let env = env();
        let resolvable = ResolvableBuilder::new(&env).for_type(&Type::class("Car")).unwrap().build();
        assert_eq!(resolvable.qualifiers().len(), 2);
        assert!(resolvable.qualifiers().contains(&QualifierInstance::default_qualifier()));
        assert!(resolvable.qualifiers().contains(&QualifierInstance::any()));
        assert!(resolvable.types().contains(&Type::class("Vehicle")));

        let fast = ResolvableBuilder::new(&env)
            .for_type(&Type::class("Car"))
            .unwrap()
            .add_qualifier_annotation(&Annotation::new("Fast"))
            .unwrap()
            .build();
        assert!(!fast.qualifiers().contains(&QualifierInstance::default_qualifier()));
        assert!(fast.qualifiers().contains(&QualifierInstance::any()));
    }

    #[test]
    fn test_strict_mode_rejects_type_variables() {
        let env = env();
        let ty = Type::parameterized("List", vec![Type::variable("T")]);
        assert!(ResolvableBuilder::new(&env).for_type(&ty).is_err());
        assert!(ResolvableBuilder::new(&env).lenient().for_type(&ty).is_ok());
    }

    #[test]
    fn test_invalid_and_duplicate_qualifiers() {
        let env = env();
        let builder = ResolvableBuilder::new(&env).for_type(&Type::class("Car")).unwrap();
        assert!(matches!(
            builder.add_qualifier_annotation(&Annotation::new(names::INJECT)),
            Err(DefinitionError::InvalidQualifier { .. })
        ));

        let builder = ResolvableBuilder::new(&env)
            .add_qualifier(QualifierInstance::named("a"))
            .unwrap();
        assert!(matches!(
            builder.add_qualifier(QualifierInstance::named("b")),
            Err(DefinitionError::DuplicateQualifiers { .. })
        ));
    }

    #[test]
    fn test_equality_is_order_independent() {
        let env = env();
        let fast = QualifierInstance::of_type("Fast");
        let a = ResolvableBuilder::new(&env)
            .for_type(&Type::class("Car"))
            .unwrap()
            .add_qualifiers([fast.clone(), QualifierInstance::named("x")])
            .unwrap()
            .build();
        let b = ResolvableBuilder::new(&env)
            .for_type(&Type::class("Car"))
            .unwrap()
            .add_qualifiers([QualifierInstance::named("x"), fast])
            .unwrap()
            .build();
        assert_eq!(a, b);
        assert_eq!(hash_one(&a), hash_one(&b));
    }

    #[test]
    fn test_empty_named_takes_member_name() {
        let env = env();
        let ip = InjectionPoint::field(
            "paymentProcessor",
            Type::class("Car"),
            HashSet::from([QualifierInstance::named("")]),
        );
        let resolvable = Resolvable::for_injection_point(&env, &ip).unwrap();
        assert!(resolvable
            .qualifiers()
            .contains(&QualifierInstance::named("paymentProcessor")));
    }
}
