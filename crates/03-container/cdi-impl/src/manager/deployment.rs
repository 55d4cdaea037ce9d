//! 部署
//!
//! 一次部署内全部管理器共享的状态：解析环境、管理器图、作用域上下文与外部服务。

use super::arena::{ManagerArena, ManagerId};
use super::enablement::ModuleEnablement;
use super::node::ManagerNode;
use super::{BeanManager, ManagerHandle};
use crate::beans::{bean_manager_bean, event_bean, register_builtin_types};
use crate::contexts::{ApplicationContext, DependentContext, RequestContext};
use crate::event::async_stage::InFlight;
use crate::event::lifecycle_events::register_lifecycle_event_types;
use crate::resolution::ResolutionEnvironment;
use cdi_common::{names, AnnotationStore, BeanIdentifier, ClassName, ContainerConfig, TypeStore};
use cdi_spi::{AsyncExecutor, Bean, Context, TransactionServices};
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// 扩展观察者所在管理器的归档名
pub const EXTENSIONS_ARCHIVE: &str = "extensions";

/// 部署
pub struct Deployment {
    env: ResolutionEnvironment,
    config: ContainerConfig,
    arena: ManagerArena,
    contexts: DashMap<ClassName, Arc<dyn Context>>,
    request: Arc<RequestContext>,
    transactions: Option<Arc<dyn TransactionServices>>,
    executor: Arc<dyn AsyncExecutor>,
    in_flight: Arc<InFlight>,
    extensions: OnceCell<ManagerId>,
}

impl Deployment {
    /// 创建部署并注册内置作用域上下文
    pub fn new(
        config: ContainerConfig,
        types: Arc<TypeStore>,
        annotations: Arc<AnnotationStore>,
        transactions: Option<Arc<dyn TransactionServices>>,
        executor: Arc<dyn AsyncExecutor>,
    ) -> Arc<Self> {
        register_lifecycle_event_types(&types);
        register_builtin_types(&types);
        let env = ResolutionEnvironment::new(types, annotations, &config.resolution);
        let request = Arc::new(RequestContext::new());
        let deployment = Self {
            env,
            config,
            arena: ManagerArena::new(),
            contexts: DashMap::new(),
            request: request.clone(),
            transactions,
            executor,
            in_flight: Arc::new(InFlight::new()),
            extensions: OnceCell::new(),
        };
        deployment.register_context(Arc::new(DependentContext::new()));
        deployment.register_context(Arc::new(ApplicationContext::new(names::APPLICATION_SCOPED)));
        deployment.register_context(Arc::new(ApplicationContext::new(names::SINGLETON)));
        deployment.register_context(request);
        Arc::new(deployment)
    }

    /// 解析环境
    pub fn env(&self) -> &ResolutionEnvironment {
        &self.env
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 管理器注册表
    pub fn arena(&self) -> &ManagerArena {
        &self.arena
    }

    /// 事务服务
    pub fn transactions(&self) -> Option<&Arc<dyn TransactionServices>> {
        self.transactions.as_ref()
    }

    /// 异步执行器
    pub fn executor(&self) -> &Arc<dyn AsyncExecutor> {
        &self.executor
    }

    /// 异步通知计数
    pub fn in_flight(&self) -> &Arc<InFlight> {
        &self.in_flight
    }

    /// 请求上下文
    pub fn request_context(&self) -> &Arc<RequestContext> {
        &self.request
    }

    /// 注册作用域上下文，同一作用域后注册的覆盖先注册的
    pub fn register_context(&self, context: Arc<dyn Context>) {
        debug!("注册作用域上下文: {}", context.scope());
        self.contexts.insert(context.scope().clone(), context);
    }

    /// 查找作用域对应的上下文
    pub fn context(&self, scope: &ClassName) -> Option<Arc<dyn Context>> {
        self.contexts.get(scope).map(|entry| entry.value().clone())
    }

    /// 为归档创建管理器
    pub fn create_manager(self: &Arc<Self>, archive: impl Into<String>, enablement: ModuleEnablement) -> BeanManager {
        self.insert_manager(archive.into(), None, enablement)
    }

    pub(crate) fn insert_manager(
        self: &Arc<Self>,
        archive: String,
        parent: Option<&ManagerNode>,
        enablement: ModuleEnablement,
    ) -> BeanManager {
        let cache_size = self.env.cache_size();
        let validate = self.config.events.validate_event_types;
        let node = self.arena.insert(|id| {
            ManagerNode::new(id, archive.as_str(), parent.map(ManagerNode::id), enablement, cache_size, validate)
        });
        if let Some(parent) = parent {
            node.inherit_from(parent);
            parent.push_child(node.id());
        }

        let handle = ManagerHandle::new(Arc::downgrade(self), node.id());
        node.push_bean(bean_manager_bean(&archive, handle.clone()));
        node.push_bean(event_bean(&archive, handle));
        debug!("创建管理器: {} ({})", node.id(), archive);
        BeanManager::from_parts(self.clone(), node)
    }

    /// 按标识取管理器
    pub fn manager(self: &Arc<Self>, id: ManagerId) -> Option<BeanManager> {
        self.arena.get(id).map(|node| BeanManager::from_parts(self.clone(), node))
    }

    /// 全部管理器
    pub fn managers(self: &Arc<Self>) -> Vec<BeanManager> {
        self.arena
            .all()
            .into_iter()
            .map(|node| BeanManager::from_parts(self.clone(), node))
            .collect()
    }

    /// 扩展管理器，首次访问时创建
    pub fn extensions_manager(self: &Arc<Self>) -> BeanManager {
        let id = *self
            .extensions
            .get_or_init(|| self.create_manager(EXTENSIONS_ARCHIVE, ModuleEnablement::new()).id());
        match self.arena.get(id) {
            Some(node) => BeanManager::from_parts(self.clone(), node),
            None => self.create_manager(EXTENSIONS_ARCHIVE, ModuleEnablement::new()),
        }
    }

    /// 在全部管理器中按标识查找组件、拦截器或装饰器
    pub fn find_bean(&self, id: &BeanIdentifier) -> Option<Arc<dyn Bean>> {
        self.arena.all().into_iter().find_map(|node| {
            node.beans()
                .into_iter()
                .find(|bean| bean.id() == id)
                .or_else(|| {
                    node.interceptors()
                        .into_iter()
                        .find(|i| i.id() == id)
                        .map(|i| i.into_bean())
                })
                .or_else(|| {
                    node.decorators()
                        .into_iter()
                        .find(|d| d.id() == id)
                        .map(|d| d.into_bean())
                })
        })
    }

    /// 销毁全部上下文中的实例
    pub fn destroy_contexts(&self) {
        for entry in self.contexts.iter() {
            entry.value().destroy_all();
        }
        info!("全部作用域上下文已销毁");
    }
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scopes: Vec<String> = self.contexts.iter().map(|e| e.key().to_string()).collect();
        scopes.sort();
        f.debug_struct("Deployment")
            .field("managers", &self.arena.len())
            .field("scopes", &scopes)
            .field("executor", &self.executor.name())
            .field("in_flight", &self.in_flight.count())
            .finish()
    }
}
