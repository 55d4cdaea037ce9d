//! 部署验证
//!
//! 检查注入点是否恰好解析到一个组件、特化定义是否一致，以及伪作用域组件之间是否存在循环依赖。
//! 普通作用域之间的循环依赖不在检查范围内：它们在实例创建时由创建链检测。

use crate::manager::BeanManager;
use crate::manager::specialization::check_specialization;
use crate::resolution::Resolvable;
use cdi_common::{BeanIdentifier, ContainerError, LifecycleError};
use cdi_spi::{Bean, BeanKind, InjectionPoint};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// 验证管理器，返回发现的全部问题
pub fn validate_manager(manager: &BeanManager) -> Vec<ContainerError> {
    let mut errors = Vec::new();
    let own: Vec<Arc<dyn Bean>> = manager
        .node()
        .beans()
        .into_iter()
        .filter(|bean| bean.kind() != BeanKind::BuiltIn)
        .chain(manager.node().interceptors().into_iter().map(|i| i.into_bean()))
        .chain(manager.node().decorators().into_iter().map(|d| d.into_bean()))
        .collect();

    // 第一步：注入点
    let mut edges: HashMap<BeanIdentifier, Vec<Arc<dyn Bean>>> = HashMap::new();
    for bean in &own {
        for ip in bean.injection_points().iter().filter(|ip| !ip.delegate) {
            match resolve_injection_point(manager, ip) {
                Ok(target) => edges.entry(bean.id().clone()).or_default().push(target),
                Err(error) => errors.push(error),
            }
        }
    }

    // 第二步：特化
    let transitive = manager.transitive_beans();
    errors.extend(
        check_specialization(&transitive, manager.enablement(), manager.env().types())
            .into_iter()
            .map(ContainerError::from),
    );

    // 第三步：伪作用域循环依赖
    let pseudo: Vec<&Arc<dyn Bean>> = own.iter().filter(|bean| is_pseudo_scoped(manager, bean.as_ref())).collect();
    let mut visited = HashSet::new();
    for bean in pseudo {
        let mut visiting = Vec::new();
        if let Err(error) = dfs_check(manager, bean, &edges, &mut visited, &mut visiting) {
            errors.push(error.into());
        }
    }

    debug!("管理器 {} 验证完成: {} 个问题", manager.id(), errors.len());
    errors
}

fn resolve_injection_point(manager: &BeanManager, ip: &InjectionPoint) -> Result<Arc<dyn Bean>, ContainerError> {
    let resolvable = Resolvable::for_injection_point(manager.env(), ip)?;
    manager.resolve_bean(&resolvable, true)
}

fn is_pseudo_scoped(manager: &BeanManager, bean: &dyn Bean) -> bool {
    !manager.env().annotations().is_normal_scope(bean.scope())
}

/// 深度优先搜索伪作用域依赖链
///
/// 依赖目标不在本管理器时按需解析它的注入点。
fn dfs_check(
    manager: &BeanManager,
    current: &Arc<dyn Bean>,
    edges: &HashMap<BeanIdentifier, Vec<Arc<dyn Bean>>>,
    visited: &mut HashSet<BeanIdentifier>,
    visiting: &mut Vec<BeanIdentifier>,
) -> Result<(), LifecycleError> {
    if let Some(start) = visiting.iter().position(|id| id == current.id()) {
        let chain = visiting[start..]
            .iter()
            .chain(std::iter::once(current.id()))
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(LifecycleError::CircularDependency { chain });
    }
    if visited.contains(current.id()) {
        return Ok(());
    }

    visiting.push(current.id().clone());
    let dependencies = match edges.get(current.id()) {
        Some(targets) => targets.clone(),
        None => current
            .injection_points()
            .iter()
            .filter(|ip| !ip.delegate)
            .filter_map(|ip| resolve_injection_point(manager, ip).ok())
            .collect(),
    };
    for dependency in dependencies.iter().filter(|d| is_pseudo_scoped(manager, d.as_ref())) {
        dfs_check(manager, dependency, edges, visited, visiting)?;
    }
    visiting.pop();
    visited.insert(current.id().clone());
    Ok(())
}
