//! 容器配置
//!
//! 配置来源按优先级从低到高：内置默认值、可选的 TOML 文件、`CDI__` 前缀的环境变量。
//! 例如 `CDI__RESOLUTION__CACHE_SIZE=512` 覆盖 `resolution.cache_size`。

use crate::errors::{ConfigError, ConfigResult};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// 环境变量前缀
pub const ENV_PREFIX: &str = "CDI";

/// 解析配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    /// 每个解析器缓存的最大条目数，达到上限后不再写入
    pub cache_size: usize,
    /// 从类型闭包中排除的类型
    pub excluded_closure_types: Vec<String>,
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            cache_size: 1024,
            excluded_closure_types: vec!["groovy.lang.GroovyObject".to_string()],
        }
    }
}

/// 异步执行器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// 没有外部运行时时，默认执行器创建的工作线程数
    pub thread_pool_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            thread_pool_size: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
        }
    }
}

/// 事件配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// 触发事件前是否校验事件类型
    pub validate_event_types: bool,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            validate_event_types: true,
        }
    }
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 解析配置
    pub resolution: ResolutionConfig,
    /// 异步执行器配置
    pub executor: ExecutorConfig,
    /// 事件配置
    pub events: EventsConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

impl ContainerConfig {
    /// 加载配置
    ///
    /// 文件不存在时只使用默认值与环境变量。
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            info!("加载容器配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("resolution.excluded_closure_types"),
        );

        let loaded: ContainerConfig = builder.build()?.try_deserialize()?;
        loaded.validate()?;
        debug!("容器配置加载完成: {:?}", loaded);
        Ok(loaded)
    }

    /// 从 TOML 字符串加载，主要用于嵌入式配置
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let loaded: ContainerConfig = config::Config::builder()
            .add_source(config::File::from_str(content, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    /// 验证配置
    pub fn validate(&self) -> ConfigResult<()> {
        if self.resolution.cache_size == 0 {
            return Err(ConfigError::Validation {
                message: "resolution.cache_size 必须大于 0".to_string(),
            });
        }
        if self.executor.thread_pool_size == 0 {
            return Err(ConfigError::Validation {
                message: "executor.thread_pool_size 必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ContainerConfig::default();
        assert_eq!(config.resolution.cache_size, 1024);
        assert_eq!(config.resolution.excluded_closure_types, vec!["groovy.lang.GroovyObject"]);
        assert!(config.events.validate_event_types);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[resolution]\ncache_size = 16\n\n[executor]\nthread_pool_size = 2\n\n[logging]\nlevel = \"debug\""
        )
        .unwrap();

        let config = ContainerConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.resolution.cache_size, 16);
        assert_eq!(config.executor.thread_pool_size, 2);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.resolution.excluded_closure_types, vec!["groovy.lang.GroovyObject"]);
    }

    #[test]
    fn test_validation_rejects_zero_cache() {
        let result = ContainerConfig::from_toml_str("[resolution]\ncache_size = 0\n");
        assert!(matches!(result, Err(ConfigError::Validation { .. })));
    }
}
