//! 单个组件管理器的注册表与解析状态

use super::arena::ManagerId;
use super::enablement::ModuleEnablement;
use crate::event::ObserverNotifier;
use crate::resolution::{BeanDisambiguator, TypeSafeResolver};
use cdi_common::BeanIdentifier;
use cdi_spi::{Bean, Decorator, Interceptor, ObserverMethod};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// 管理器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// 已创建
    Created,
    /// 已通过校验
    Validated,
    /// 已清理
    CleanedUp,
}

/// 特化结果与它所属的缓存代数
#[derive(Default)]
struct SpecializedMemo {
    generation: u64,
    value: Option<Arc<HashSet<BeanIdentifier>>>,
}

/// 管理器节点
pub struct ManagerNode {
    id: ManagerId,
    archive: String,
    parent: Option<ManagerId>,
    enablement: ModuleEnablement,

    beans: RwLock<Vec<Arc<dyn Bean>>>,
    observers: RwLock<Vec<Arc<dyn ObserverMethod>>>,
    interceptors: RwLock<Vec<Arc<dyn Interceptor>>>,
    decorators: RwLock<Vec<Arc<dyn Decorator>>>,

    accessible: RwLock<Vec<ManagerId>>,
    children: RwLock<Vec<ManagerId>>,

    pub(crate) bean_resolver: TypeSafeResolver<Arc<dyn Bean>>,
    pub(crate) interceptor_resolver: TypeSafeResolver<Arc<dyn Interceptor>>,
    pub(crate) decorator_resolver: TypeSafeResolver<Arc<dyn Decorator>>,
    pub(crate) disambiguator: BeanDisambiguator,
    pub(crate) notifier: ObserverNotifier,
    specialized: RwLock<SpecializedMemo>,

    state: RwLock<ManagerState>,
}

impl ManagerNode {
    pub(crate) fn new(
        id: ManagerId,
        archive: impl Into<String>,
        parent: Option<ManagerId>,
        enablement: ModuleEnablement,
        cache_size: usize,
        validate_event_types: bool,
    ) -> Self {
        Self {
            id,
            archive: archive.into(),
            parent,
            enablement,
            beans: RwLock::new(Vec::new()),
            observers: RwLock::new(Vec::new()),
            interceptors: RwLock::new(Vec::new()),
            decorators: RwLock::new(Vec::new()),
            accessible: RwLock::new(Vec::new()),
            children: RwLock::new(Vec::new()),
            bean_resolver: TypeSafeResolver::new("beans", cache_size),
            interceptor_resolver: TypeSafeResolver::new("interceptors", cache_size),
            decorator_resolver: TypeSafeResolver::new("decorators", cache_size),
            disambiguator: BeanDisambiguator::new(cache_size),
            notifier: ObserverNotifier::new(cache_size, validate_event_types),
            specialized: RwLock::new(SpecializedMemo::default()),
            state: RwLock::new(ManagerState::Created),
        }
    }

    /// 管理器标识
    pub fn id(&self) -> ManagerId {
        self.id
    }

    /// 所属归档
    pub fn archive(&self) -> &str {
        &self.archive
    }

    /// 子活动的父管理器
    pub fn parent(&self) -> Option<ManagerId> {
        self.parent
    }

    /// 模块启用配置
    pub fn enablement(&self) -> &ModuleEnablement {
        &self.enablement
    }

    /// 当前状态
    pub fn state(&self) -> ManagerState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: ManagerState) {
        *self.state.write() = state;
    }

    /// 本管理器注册的组件快照
    pub fn beans(&self) -> Vec<Arc<dyn Bean>> {
        self.beans.read().clone()
    }

    /// 本管理器注册的观察者快照
    pub fn observers(&self) -> Vec<Arc<dyn ObserverMethod>> {
        self.observers.read().clone()
    }

    /// 本管理器注册的拦截器快照
    pub fn interceptors(&self) -> Vec<Arc<dyn Interceptor>> {
        self.interceptors.read().clone()
    }

    /// 本管理器注册的装饰器快照
    pub fn decorators(&self) -> Vec<Arc<dyn Decorator>> {
        self.decorators.read().clone()
    }

    /// 直接可访问的管理器
    pub fn accessible(&self) -> Vec<ManagerId> {
        self.accessible.read().clone()
    }

    /// 子活动
    pub fn children(&self) -> Vec<ManagerId> {
        self.children.read().clone()
    }

    /// 是否已注册该标识的组件
    pub fn contains_bean(&self, id: &BeanIdentifier) -> bool {
        self.beans.read().iter().any(|bean| bean.id() == id)
    }

    pub(crate) fn push_bean(&self, bean: Arc<dyn Bean>) {
        self.beans.write().push(bean);
    }

    pub(crate) fn push_observer(&self, observer: Arc<dyn ObserverMethod>) {
        self.observers.write().push(observer);
    }

    pub(crate) fn push_interceptor(&self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.write().push(interceptor);
    }

    pub(crate) fn push_decorator(&self, decorator: Arc<dyn Decorator>) {
        self.decorators.write().push(decorator);
    }

    /// 追加可访问的管理器，已存在或指向自身时返回假
    pub(crate) fn push_accessible(&self, other: ManagerId) -> bool {
        if other == self.id {
            return false;
        }
        let mut accessible = self.accessible.write();
        if accessible.contains(&other) {
            return false;
        }
        accessible.push(other);
        true
    }

    pub(crate) fn push_child(&self, child: ManagerId) {
        self.children.write().push(child);
    }

    /// 以父管理器的注册表初始化子活动
    pub(crate) fn inherit_from(&self, parent: &ManagerNode) {
        self.beans
            .write()
            .extend(parent.beans().into_iter().filter(|b| b.kind() != cdi_spi::BeanKind::BuiltIn));
        self.observers.write().extend(parent.observers());
        self.interceptors.write().extend(parent.interceptors());
        self.decorators.write().extend(parent.decorators());
        self.accessible.write().extend(parent.accessible());
    }

    /// 缓存的特化结果及当前代数
    pub(crate) fn specialized(&self) -> (Option<Arc<HashSet<BeanIdentifier>>>, u64) {
        let memo = self.specialized.read();
        (memo.value.clone(), memo.generation)
    }

    /// 仅当 `generation` 之后缓存没有被清空时保存特化结果
    pub(crate) fn set_specialized(&self, specialized: Arc<HashSet<BeanIdentifier>>, generation: u64) -> bool {
        let mut memo = self.specialized.write();
        if memo.generation != generation {
            return false;
        }
        memo.value = Some(specialized);
        true
    }

    /// 清空全部解析缓存
    pub(crate) fn clear_caches(&self) {
        self.bean_resolver.clear();
        self.interceptor_resolver.clear();
        self.decorator_resolver.clear();
        self.disambiguator.clear();
        self.notifier.clear();
        let mut memo = self.specialized.write();
        memo.generation += 1;
        memo.value = None;
    }

    /// 清空注册表与缓存，断开图中的边
    pub(crate) fn clean_up(&self) {
        self.beans.write().clear();
        self.observers.write().clear();
        self.interceptors.write().clear();
        self.decorators.write().clear();
        self.accessible.write().clear();
        self.children.write().clear();
        self.clear_caches();
        self.set_state(ManagerState::CleanedUp);
        debug!("管理器已清理: {} ({})", self.id, self.archive);
    }
}

impl fmt::Debug for ManagerNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerNode")
            .field("id", &self.id)
            .field("archive", &self.archive)
            .field("state", &self.state())
            .field("beans", &self.beans.read().len())
            .field("observers", &self.observers.read().len())
            .field("accessible", &self.accessible())
            .finish()
    }
}

