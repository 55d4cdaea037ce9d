//! 容器主入口

use crate::bootstrap::{BeanArchive, ContainerBuilder, Deployer};
use crate::event::BeforeShutdown;
use crate::manager::{BeanManager, Deployment};
use async_trait::async_trait;
use cdi_common::{ContainerError, ContainerResult, LifecycleError};
use cdi_spi::{Lifecycle, LifecycleState, Payload};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info};

/// 依赖注入容器
///
/// 持有部署与各归档的管理器。[`Lifecycle::on_start`] 执行部署与验证，
/// [`Lifecycle::on_stop`] 触发 `BeforeShutdown` 并销毁全部上下文实例。
pub struct Container {
    /// 部署共享状态
    deployment: Arc<Deployment>,
    /// 等待部署的归档
    pending: Vec<BeanArchive>,
    /// 归档标识到管理器
    managers: HashMap<String, BeanManager>,
    /// 运行状态
    state: LifecycleState,
    /// 启动完成时间
    started_at: Option<DateTime<Utc>>,
}

impl Container {
    /// 创建容器构建器
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub(crate) fn new(deployment: Arc<Deployment>, archives: Vec<BeanArchive>) -> Self {
        Self {
            deployment,
            pending: archives,
            managers: HashMap::new(),
            state: LifecycleState::Uninitialized,
            started_at: None,
        }
    }

    /// 部署
    pub fn deployment(&self) -> &Arc<Deployment> {
        &self.deployment
    }

    /// 归档的管理器
    pub fn manager(&self, archive: &str) -> Option<&BeanManager> {
        self.managers.get(archive)
    }

    /// 全部组件管理器
    pub fn managers(&self) -> impl Iterator<Item = &BeanManager> {
        self.managers.values()
    }

    /// 扩展所用的管理器
    pub fn extensions_manager(&self) -> BeanManager {
        self.deployment.extensions_manager()
    }

    /// 启动完成时间
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    fn deploy(&mut self) -> ContainerResult<()> {
        let archives = std::mem::take(&mut self.pending);
        let ids: Vec<String> = archives.iter().map(|a| a.id().to_string()).collect();
        let managers = Deployer::new(self.deployment.clone(), archives).deploy()?;
        self.managers = ids.into_iter().zip(managers).collect();
        Ok(())
    }

    async fn shutdown(&mut self) -> ContainerResult<()> {
        // 第一步：通知扩展
        let event: Payload = Arc::new(BeforeShutdown);
        let notified = self
            .deployment
            .extensions_manager()
            .fire_lifecycle_event(event, BeforeShutdown::event_type(), |_| true);
        if let Err(e) = &notified {
            error!("BeforeShutdown 通知失败: {}", e);
        }

        // 第二步：等待进行中的异步通知
        let in_flight = self.deployment.in_flight().count();
        if in_flight > 0 {
            info!("等待 {} 个异步通知完成", in_flight);
        }
        self.deployment.in_flight().wait_idle().await;

        // 第三步：销毁上下文并清理管理器
        self.deployment.destroy_contexts();
        for manager in self.deployment.managers() {
            manager.cleanup();
        }

        notified.map_err(|e| ContainerError::ShutdownFailed {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl Lifecycle for Container {
    async fn on_start(&mut self) -> ContainerResult<()> {
        if self.state != LifecycleState::Uninitialized {
            return Err(LifecycleError::illegal_state(format!("容器不能在 {:?} 状态下启动", self.state)).into());
        }
        info!("开始启动容器");
        self.state = LifecycleState::Initializing;

        match self.deploy() {
            Ok(()) => {
                self.state = LifecycleState::Running;
                self.started_at = Some(Utc::now());
                info!("容器启动完成: {} 个归档", self.managers.len());
                Ok(())
            }
            Err(e) => {
                error!("容器启动失败: {}", e);
                self.state = LifecycleState::Error;
                Err(e)
            }
        }
    }

    async fn on_stop(&mut self) -> ContainerResult<()> {
        if !self.can_stop() {
            return Err(LifecycleError::illegal_state(format!("容器不能在 {:?} 状态下停止", self.state)).into());
        }
        info!("开始停止容器");
        self.state = LifecycleState::Stopping;

        let result = self.shutdown().await;
        self.state = if result.is_ok() {
            LifecycleState::Stopped
        } else {
            LifecycleState::Error
        };
        info!("容器已停止");
        result
    }

    fn lifecycle_state(&self) -> LifecycleState {
        self.state
    }

    /// 部署只能执行一次，停止后不能重新启动
    fn can_start(&self) -> bool {
        self.state == LifecycleState::Uninitialized
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut archives: Vec<&String> = self.managers.keys().collect();
        archives.sort();
        f.debug_struct("Container")
            .field("state", &self.state)
            .field("archives", &archives)
            .field("pending", &self.pending.len())
            .field("started_at", &self.started_at)
            .finish()
    }
}
