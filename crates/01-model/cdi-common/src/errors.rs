//! 错误类型定义

use thiserror::Error;

/// 类型安全解析错误
#[derive(Error, Debug, Clone)]
pub enum ResolutionError {
    #[error("没有满足条件的组件: 类型 {required}, 限定符 {qualifiers}")]
    Unsatisfied { required: String, qualifiers: String },

    #[error("存在多个满足条件的组件: 类型 {required}, 限定符 {qualifiers}, 候选 {candidates:?}")]
    Ambiguous {
        required: String,
        qualifiers: String,
        candidates: Vec<String>,
    },
}

/// 类型解析错误
///
/// 该错误按类型缓存，因此必须可克隆。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeResolutionError {
    #[error("类型包含未解析的类型变量或通配符: {ty}")]
    UnresolvedTypeVariable { ty: String },

    #[error("容器生命周期事件不能作为普通事件触发: {ty}")]
    ContainerLifecycleEvent { ty: String },

    #[error("无法提取原始类型: {ty}")]
    CannotExtractRawType { ty: String },

    #[error("{sub} 不是 {sup} 的子类型")]
    NotSubtype { sub: String, sup: String },
}

/// 定义错误
#[derive(Error, Debug, Clone)]
pub enum DefinitionError {
    #[error("注解不是合法的限定符: {annotation}")]
    InvalidQualifier { annotation: String },

    #[error("注解不是合法的拦截器绑定: {annotation}")]
    InvalidInterceptorBinding { annotation: String },

    #[error("重复的限定符: {qualifiers}")]
    DuplicateQualifiers { qualifiers: String },

    #[error("注解成员缺少取值: {annotation}.{member}")]
    MissingMemberValue { annotation: String, member: String },

    #[error("注解未声明该成员: {annotation}.{member}")]
    UndeclaredMember { annotation: String, member: String },

    #[error("注解成员取值无效: {annotation}.{member}, 原因: {message}")]
    InvalidMemberValue {
        annotation: String,
        member: String,
        message: String,
    },

    #[error("特化定义不一致: {bean}, 原因: {message}")]
    InconsistentSpecialization { bean: String, message: String },

    #[error("组件定义无效: {bean}, 原因: {message}")]
    InvalidBeanDefinition { bean: String, message: String },

    #[error("组件标识符格式无效: {value}")]
    InvalidIdentifier { value: String },

    #[error("组件标识符重复: {id}")]
    DuplicateIdentifier { id: String },
}

/// 观察者调用错误
#[derive(Error, Debug)]
pub enum ObserverError {
    #[error("观察者调用失败: {observer}, 原因: {source}")]
    Invocation {
        observer: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{} 个异步观察者调用失败", failures.len())]
    AsyncFailures { failures: Vec<ObserverError> },

    #[error("异步通知被取消: {reason}")]
    Cancelled { reason: String },
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置加载失败: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("配置验证失败: {message}")]
    Validation { message: String },
}

/// 上下文与实例生命周期错误
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("作用域上下文未激活: {scope}")]
    ContextNotActive { scope: String },

    #[error("作用域上下文已激活: {scope}")]
    ContextAlreadyActive { scope: String },

    #[error("未注册作用域上下文: {scope}")]
    NoSuchContext { scope: String },

    #[error("检测到循环依赖: {chain}")]
    CircularDependency { chain: String },

    #[error("组件实例创建失败: {bean}, 原因: {source}")]
    CreationFailed {
        bean: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("组件实例类型不匹配: {bean}, 期望 {expected}")]
    InstanceTypeMismatch { bean: String, expected: String },

    #[error("非法状态: {message}")]
    IllegalState { message: String },
}

/// 容器错误类型
#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("解析错误: {source}")]
    Resolution {
        #[from]
        source: ResolutionError,
    },

    #[error("类型解析错误: {source}")]
    TypeResolution {
        #[from]
        source: TypeResolutionError,
    },

    #[error("定义错误: {source}")]
    Definition {
        #[from]
        source: DefinitionError,
    },

    #[error("观察者错误: {source}")]
    Observer {
        #[from]
        source: ObserverError,
    },

    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("生命周期错误: {source}")]
    Lifecycle {
        #[from]
        source: LifecycleError,
    },

    #[error("部署验证失败: {} 个错误", errors.len())]
    Validation { errors: Vec<ContainerError> },

    #[error("容器启动失败: {message}")]
    BootstrapFailed { message: String },

    #[error("容器关闭失败: {message}")]
    ShutdownFailed { message: String },
}

impl ContainerError {
    /// 创建启动失败错误
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::BootstrapFailed {
            message: message.into(),
        }
    }

    /// 是否为不满足解析错误
    pub fn is_unsatisfied(&self) -> bool {
        matches!(
            self,
            Self::Resolution {
                source: ResolutionError::Unsatisfied { .. }
            }
        )
    }

    /// 是否为歧义解析错误
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Self::Resolution {
                source: ResolutionError::Ambiguous { .. }
            }
        )
    }
}

impl LifecycleError {
    /// 创建非法状态错误
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::IllegalState {
            message: message.into(),
        }
    }
}

/// 结果类型别名
pub type ResolutionResult<T> = Result<T, ResolutionError>;
/// 定义阶段结果
pub type DefinitionResult<T> = Result<T, DefinitionError>;
/// 观察者结果
pub type ObserverResult<T> = Result<T, ObserverError>;
/// 配置结果
pub type ConfigResult<T> = Result<T, ConfigError>;
/// 生命周期结果
pub type LifecycleResult<T> = Result<T, LifecycleError>;
/// 容器操作结果
pub type ContainerResult<T> = Result<T, ContainerError>;
