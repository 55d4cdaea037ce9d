//! 组件归档

use crate::beans::BeanImplementation;
use crate::manager::ModuleEnablement;
use cdi_common::{names, Annotated, AnnotatedType, AnnotationStore, ClassName};
use std::collections::HashMap;
use std::fmt;

/// 组件发现模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// 全部具体类都成为组件
    All,
    /// 只有带组件定义注解的类成为组件
    #[default]
    Annotated,
}

/// 组件归档
///
/// 一组注解类型描述符、它们的实现、归档级启用配置以及本归档可以访问的其他归档。
#[derive(Clone)]
pub struct BeanArchive {
    id: String,
    types: Vec<AnnotatedType>,
    implementations: HashMap<ClassName, BeanImplementation>,
    enablement: ModuleEnablement,
    accessible: Vec<String>,
    discovery: DiscoveryMode,
}

impl BeanArchive {
    /// 创建空归档
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            types: Vec::new(),
            implementations: HashMap::new(),
            enablement: ModuleEnablement::new(),
            accessible: Vec::new(),
            discovery: DiscoveryMode::default(),
        }
    }

    /// 归档标识
    pub fn id(&self) -> &str {
        &self.id
    }

    /// 追加注解类型描述符
    pub fn with_type(mut self, annotated: AnnotatedType) -> Self {
        self.types.push(annotated);
        self
    }

    /// 追加注解类型
    pub fn with_types(mut self, types: impl IntoIterator<Item = AnnotatedType>) -> Self {
        self.types.extend(types);
        self
    }

    /// 关联类的实现，同一个类后关联的覆盖先关联的
    pub fn with_implementation(mut self, class: impl Into<ClassName>, implementation: BeanImplementation) -> Self {
        self.implementations.insert(class.into(), implementation);
        self
    }

    /// 设置模块启用配置
    pub fn with_enablement(mut self, enablement: ModuleEnablement) -> Self {
        self.enablement = enablement;
        self
    }

    /// 本归档可以访问 `archive` 中的组件
    pub fn accessing(mut self, archive: impl Into<String>) -> Self {
        let archive = archive.into();
        if archive != self.id && !self.accessible.contains(&archive) {
            self.accessible.push(archive);
        }
        self
    }

    /// 设置发现模式
    pub fn with_discovery(mut self, discovery: DiscoveryMode) -> Self {
        self.discovery = discovery;
        self
    }

    /// 注解类型
    pub fn types(&self) -> &[AnnotatedType] {
        &self.types
    }

    /// 查找类的实例创建逻辑
    pub fn implementation(&self, class: &ClassName) -> Option<&BeanImplementation> {
        self.implementations.get(class)
    }

    /// 模块启用配置
    pub fn enablement(&self) -> &ModuleEnablement {
        &self.enablement
    }

    /// 可访问的其他归档
    pub fn accessible(&self) -> &[String] {
        &self.accessible
    }

    /// 发现模式
    pub fn discovery(&self) -> DiscoveryMode {
        self.discovery
    }

    /// 按发现模式筛选参与部署的类型
    ///
    /// 接口与带 `@Vetoed` 的类型总是被排除。
    pub fn discovered_types<'a>(&'a self, store: &'a AnnotationStore) -> impl Iterator<Item = &'a AnnotatedType> + 'a {
        self.types.iter().filter(move |annotated| {
            if annotated.definition.is_interface() || annotated.is_annotation_present(names::VETOED) {
                return false;
            }
            match self.discovery {
                DiscoveryMode::All => true,
                DiscoveryMode::Annotated => has_bean_defining_annotation(annotated, store),
            }
        })
    }
}

/// 作用域、构造型、`@Interceptor` 与 `@Decorator` 都是组件定义注解
pub fn has_bean_defining_annotation(annotated: &AnnotatedType, store: &AnnotationStore) -> bool {
    annotated.annotations.iter().any(|annotation| {
        let name = &annotation.annotation_type;
        store.is_scope(name)
            || store.is_stereotype(name)
            || annotation.is(names::INTERCEPTOR)
            || annotation.is(names::DECORATOR)
    })
}

impl fmt::Debug for BeanArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanArchive")
            .field("id", &self.id)
            .field("types", &self.types.len())
            .field("implementations", &self.implementations.len())
            .field("accessible", &self.accessible)
            .field("discovery", &self.discovery)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_common::{Annotation, ClassDefinition};

    #[test]
    fn test_annotated_discovery_requires_bean_defining_annotation() {
        let store = AnnotationStore::new();
        let archive = BeanArchive::new("app")
            .with_type(AnnotatedType::new(ClassDefinition::new("Plain")))
            .with_type(
                AnnotatedType::new(ClassDefinition::new("Scoped"))
                    .with_annotation(Annotation::new(names::APPLICATION_SCOPED)),
            )
            .with_type(AnnotatedType::new(ClassDefinition::new("Modelled")).with_annotation(Annotation::new(names::MODEL)))
            .with_type(
                AnnotatedType::new(ClassDefinition::new("Hidden"))
                    .with_annotation(Annotation::new(names::DEPENDENT))
                    .with_annotation(Annotation::new(names::VETOED)),
            )
            .with_type(AnnotatedType::new(ClassDefinition::interface("Api")));

        let annotated: Vec<&str> = archive.discovered_types(&store).map(|t| t.class().as_str()).collect();
        assert_eq!(annotated, vec!["Scoped", "Modelled"]);

        let all = archive.with_discovery(DiscoveryMode::All);
        let names: Vec<&str> = all.discovered_types(&store).map(|t| t.class().as_str()).collect();
        assert_eq!(names, vec!["Plain", "Scoped", "Modelled"]);
    }

    #[test]
    fn test_accessing_ignores_self_and_duplicates() {
        let archive = BeanArchive::new("app").accessing("lib").accessing("app").accessing("lib");
        assert_eq!(archive.accessible(), &["lib".to_string()]);
    }
}
