//! 合成组件
//!
//! 不来自注解类型描述符、由扩展或调用方直接构造的组件。

use super::attributes::BeanAttributes;
use super::delegate_bean_attributes;
use cdi_common::{format_qualifiers, names, BeanIdentifier, ClassName, ComponentKind, QualifierInstance, Type};
use cdi_spi::{Bean, BeanKind, Contextual, CreationalContext, InjectionPoint, Instance};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

type SyntheticCreate = Arc<dyn Fn(&CreationalContext) -> anyhow::Result<Instance> + Send + Sync>;
type SyntheticDestroy = Arc<dyn Fn(Instance) + Send + Sync>;

/// 合成组件
pub struct SyntheticBean {
    id: BeanIdentifier,
    kind: BeanKind,
    bean_class: ClassName,
    attributes: BeanAttributes,
    injection_points: Vec<InjectionPoint>,
    create: Option<SyntheticCreate>,
    destroy: Option<SyntheticDestroy>,
    specialized_class: Option<ClassName>,
    passivation_capable: bool,
}

impl SyntheticBean {
    /// 创建合成组件构建器
    pub fn builder(archive: impl Into<String>, bean_class: impl Into<ClassName>) -> SyntheticBeanBuilder {
        let bean_class = bean_class.into();
        SyntheticBeanBuilder {
            archive: archive.into(),
            identifier: None,
            kind: BeanKind::Synthetic,
            types: HashSet::new(),
            qualifiers: HashSet::new(),
            scope: None,
            name: None,
            stereotypes: HashSet::new(),
            alternative: false,
            priority: None,
            injection_points: Vec::new(),
            create: None,
            destroy: None,
            specialized_class: None,
            passivation_capable: true,
            bean_class,
        }
    }

    /// 组件属性
    pub fn attributes(&self) -> &BeanAttributes {
        &self.attributes
    }
}

impl Contextual for SyntheticBean {
    fn create(&self, ctx: &CreationalContext) -> anyhow::Result<Instance> {
        match &self.create {
            Some(create) => create(ctx),
            None => Err(anyhow::anyhow!("合成组件没有创建函数: {}", self.id)),
        }
    }

    fn destroy(&self, instance: Instance, ctx: &CreationalContext) {
        if let Some(destroy) = &self.destroy {
            destroy(instance);
        }
        ctx.release();
    }
}

impl Bean for SyntheticBean {
    fn id(&self) -> &BeanIdentifier {
        &self.id
    }

    fn kind(&self) -> BeanKind {
        self.kind
    }

    fn bean_class(&self) -> &ClassName {
        &self.bean_class
    }

    delegate_bean_attributes!();

    fn injection_points(&self) -> &[InjectionPoint] {
        &self.injection_points
    }

    fn specialized_class(&self) -> Option<&ClassName> {
        self.specialized_class.as_ref()
    }

    fn is_passivation_capable(&self) -> bool {
        self.passivation_capable
    }
}

impl fmt::Debug for SyntheticBean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticBean")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("scope", &self.attributes.scope)
            .finish()
    }
}

/// [`SyntheticBean`] 构建器
pub struct SyntheticBeanBuilder {
    archive: String,
    identifier: Option<String>,
    kind: BeanKind,
    bean_class: ClassName,
    types: HashSet<Type>,
    qualifiers: HashSet<QualifierInstance>,
    scope: Option<ClassName>,
    name: Option<String>,
    stereotypes: HashSet<ClassName>,
    alternative: bool,
    priority: Option<i32>,
    injection_points: Vec<InjectionPoint>,
    create: Option<SyntheticCreate>,
    destroy: Option<SyntheticDestroy>,
    specialized_class: Option<ClassName>,
    passivation_capable: bool,
}

impl SyntheticBeanBuilder {
    /// 标识中的类型部分
    ///
    /// 默认为组件类名，带有 `@Default` 与 `@Any` 以外的限定符时追加排序后的限定符。
    /// 同一归档中类与限定符都相同的合成组件需要显式指定。
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// 设置组件种类
    pub fn kind(mut self, kind: BeanKind) -> Self {
        self.kind = kind;
        self
    }

    /// 追加组件类型
    pub fn add_type(mut self, ty: Type) -> Self {
        self.types.insert(ty);
        self
    }

    /// 批量追加组件类型
    pub fn types(mut self, types: impl IntoIterator<Item = Type>) -> Self {
        self.types.extend(types);
        self
    }

    /// 追加限定符
    pub fn qualifier(mut self, qualifier: QualifierInstance) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// 设置作用域
    pub fn scope(mut self, scope: impl Into<ClassName>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// 设置 EL 名称
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 追加构造型
    pub fn stereotype(mut self, stereotype: impl Into<ClassName>) -> Self {
        self.stereotypes.insert(stereotype.into());
        self
    }

    /// 标记为备选组件
    pub fn alternative(mut self) -> Self {
        self.alternative = true;
        self
    }

    /// 设置优先级
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// 追加注入点
    pub fn injection_point(mut self, ip: InjectionPoint) -> Self {
        self.injection_points.push(ip);
        self
    }

    /// 特化给定的类
    pub fn specializes(mut self, class: impl Into<ClassName>) -> Self {
        self.specialized_class = Some(class.into());
        self
    }

    /// 标记为不可钝化
    pub fn not_passivation_capable(mut self) -> Self {
        self.passivation_capable = false;
        self
    }

    /// 以创建上下文构造实例
    pub fn create_with<F>(mut self, create: F) -> Self
    where
        F: Fn(&CreationalContext) -> anyhow::Result<Instance> + Send + Sync + 'static,
    {
        self.create = Some(Arc::new(create));
        self
    }

    /// 以无参函数构造实例
    pub fn create<T, F>(self, create: F) -> Self
    where
        T: Any + Send + Sync,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.create_with(move |_: &CreationalContext| -> anyhow::Result<Instance> { Ok(Arc::new(create())) })
    }

    /// 设置销毁回调
    pub fn destroy<F>(mut self, destroy: F) -> Self
    where
        F: Fn(Instance) + Send + Sync + 'static,
    {
        self.destroy = Some(Arc::new(destroy));
        self
    }

    /// 构建合成组件
    pub fn build(self) -> Arc<SyntheticBean> {
        let component_kind = match self.kind {
            BeanKind::BuiltIn => ComponentKind::BuiltIn,
            _ => ComponentKind::Synthetic,
        };
        let mut types = self.types;
        if types.is_empty() {
            types.insert(Type::class(self.bean_class.clone()));
        }
        let mut attributes = BeanAttributes {
            types,
            qualifiers: self.qualifiers,
            scope: self.scope.unwrap_or_else(|| ClassName::new(names::DEPENDENT)),
            name: self.name,
            stereotypes: self.stereotypes,
            alternative: self.alternative,
            priority: self.priority,
        };
        attributes.normalize();
        let type_id = match self.identifier {
            Some(identifier) => identifier,
            None => default_type_id(&self.bean_class, &attributes.qualifiers),
        };
        Arc::new(SyntheticBean {
            id: BeanIdentifier::new(component_kind, self.archive, type_id),
            kind: self.kind,
            bean_class: self.bean_class,
            attributes,
            injection_points: self.injection_points,
            create: self.create,
            destroy: self.destroy,
            specialized_class: self.specialized_class,
            passivation_capable: self.passivation_capable,
        })
    }
}

fn default_type_id(bean_class: &ClassName, qualifiers: &HashSet<QualifierInstance>) -> String {
    let distinguishing: HashSet<QualifierInstance> = qualifiers
        .iter()
        .filter(|q| !q.is_any() && **q != QualifierInstance::default_qualifier())
        .cloned()
        .collect();
    if distinguishing.is_empty() {
        bean_class.to_string()
    } else {
        format!("{}{}", bean_class, format_qualifiers(&distinguishing))
    }
}
