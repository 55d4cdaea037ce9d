//! 容器构建器

use super::archive::BeanArchive;
use crate::container::Container;
use crate::executor::TokioExecutor;
use crate::manager::Deployment;
use cdi_common::{
    init_logging, AnnotationDefinition, AnnotationStore, ClassDefinition, ContainerConfig, ContainerResult, TypeStore,
};
use cdi_spi::{AsyncExecutor, Lifecycle, ObserverMethod, TransactionServices};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 容器构建器
///
/// 使用建造者模式收集部署所需的全部输入，[`ContainerBuilder::build`] 创建尚未启动的容器。
pub struct ContainerBuilder {
    /// 容器配置
    config: ContainerConfig,
    /// 类定义，组件类型闭包据此计算
    classes: Vec<ClassDefinition>,
    /// 应用自定义的注解定义
    annotations: Vec<AnnotationDefinition>,
    /// 组件归档列表
    archives: Vec<BeanArchive>,
    /// 观察容器生命周期事件的扩展观察者
    extension_observers: Vec<Arc<dyn ObserverMethod>>,
    /// 事务服务
    transactions: Option<Arc<dyn TransactionServices>>,
    /// 异步事件的默认执行器
    executor: Option<Arc<dyn AsyncExecutor>>,
    /// 是否启用日志初始化
    logging_enabled: bool,
}

impl ContainerBuilder {
    /// 创建新的容器构建器
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            classes: Vec::new(),
            annotations: Vec::new(),
            archives: Vec::new(),
            extension_observers: Vec::new(),
            transactions: None,
            executor: None,
            logging_enabled: false, // 默认不启用日志初始化
        }
    }

    /// 使用指定配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 从 TOML 文件与 `CDI__` 前缀的环境变量加载配置
    pub fn load_config<P: AsRef<Path>>(mut self, path: P) -> ContainerResult<Self> {
        let path = path.as_ref();
        info!("加载容器配置: {}", path.display());
        self.config = ContainerConfig::load(Some(path))?;
        Ok(self)
    }

    /// 登记类定义
    pub fn add_class(mut self, definition: ClassDefinition) -> Self {
        debug!("登记类定义: {}", definition.name);
        self.classes.push(definition);
        self
    }

    /// 注册类定义
    pub fn add_classes(mut self, definitions: impl IntoIterator<Item = ClassDefinition>) -> Self {
        self.classes.extend(definitions);
        self
    }

    /// 登记注解定义
    pub fn add_annotation(mut self, definition: AnnotationDefinition) -> Self {
        debug!("登记注解定义: {}", definition.name);
        self.annotations.push(definition);
        self
    }

    /// 添加组件归档
    pub fn add_archive(mut self, archive: BeanArchive) -> Self {
        info!("添加组件归档: {} ({} 个类型)", archive.id(), archive.types().len());
        self.archives.push(archive);
        self
    }

    /// 添加扩展观察者
    pub fn add_extension_observer(mut self, observer: Arc<dyn ObserverMethod>) -> Self {
        info!("添加扩展观察者: {}", observer.id());
        self.extension_observers.push(observer);
        self
    }

    /// 接入事务服务
    pub fn with_transaction_services(mut self, transactions: Arc<dyn TransactionServices>) -> Self {
        self.transactions = Some(transactions);
        self
    }

    /// 指定异步事件的默认执行器
    pub fn with_executor(mut self, executor: Arc<dyn AsyncExecutor>) -> Self {
        info!("使用自定义异步执行器: {}", executor.name());
        self.executor = Some(executor);
        self
    }

    /// 启用或禁用日志初始化
    pub fn enable_logging(mut self, enabled: bool) -> Self {
        self.logging_enabled = enabled;
        self
    }

    /// 构建容器
    pub fn build(self) -> ContainerResult<Container> {
        info!("开始构建容器");
        self.config.validate()?;

        // 只有在明确启用时才初始化日志，避免测试中重复安装订阅者
        if self.logging_enabled {
            if let Err(e) = init_logging(&self.config.logging) {
                warn!("日志初始化失败: {}", e);
            }
        }

        let types = Arc::new(TypeStore::new());
        types.register_all(self.classes);
        let annotations = Arc::new(AnnotationStore::new());
        for definition in self.annotations {
            annotations.register(definition);
        }

        let executor: Arc<dyn AsyncExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(TokioExecutor::current_or_new(&self.config.executor)?),
        };
        let deployment = Deployment::new(self.config, types, annotations, self.transactions, executor);

        let extensions = deployment.extensions_manager();
        for observer in self.extension_observers {
            extensions.add_observer(observer)?;
        }

        info!("容器构建完成: {} 个归档", self.archives.len());
        Ok(Container::new(deployment, self.archives))
    }

    /// 构建并启动容器
    pub async fn start(self) -> ContainerResult<Container> {
        let mut container = self.build()?;
        container.on_start().await?;
        Ok(container)
    }
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdi_spi::LifecycleState;
    use std::io::Write;

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = ContainerConfig::default();
        config.resolution.cache_size = 0;
        let result = ContainerBuilder::new().with_config(config).build();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[resolution]\ncache_size = 64\n\n[executor]\nthread_pool_size = 2").unwrap();

        let container = ContainerBuilder::new().load_config(file.path()).unwrap().build().unwrap();
        assert_eq!(container.deployment().config().resolution.cache_size, 64);
        assert_eq!(container.lifecycle_state(), LifecycleState::Uninitialized);
    }
}
