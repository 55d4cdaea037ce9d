//! 观察者方法接口

use crate::event::EventContext;
use cdi_common::{BeanIdentifier, ClassName, DefinitionError, QualifierInstance, Type};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// 未声明 `@Priority` 的观察者使用的优先级
pub const DEFAULT_PRIORITY: i32 = 2500;

/// 事务阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransactionPhase {
    /// 立即通知
    #[default]
    InProgress,
    /// 提交前
    BeforeCompletion,
    /// 完成后，不论成败
    AfterCompletion,
    /// 提交成功后
    AfterSuccess,
    /// 回滚后
    AfterFailure,
}

impl TransactionPhase {
    /// 需要延迟到事务同步回调的阶段
    pub fn is_transactional(&self) -> bool {
        !matches!(self, Self::InProgress)
    }

    /// 在 `before_completion` 回调中通知
    pub fn is_before_completion(&self) -> bool {
        matches!(self, Self::BeforeCompletion)
    }
}

impl FromStr for TransactionPhase {
    type Err = DefinitionError;

    /// 按枚举常量名解析，例如 `AFTER_SUCCESS`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN_PROGRESS" => Ok(Self::InProgress),
            "BEFORE_COMPLETION" => Ok(Self::BeforeCompletion),
            "AFTER_COMPLETION" => Ok(Self::AfterCompletion),
            "AFTER_SUCCESS" => Ok(Self::AfterSuccess),
            "AFTER_FAILURE" => Ok(Self::AfterFailure),
            other => Err(DefinitionError::InvalidMemberValue {
                annotation: cdi_common::names::OBSERVES.to_string(),
                member: "during".to_string(),
                message: format!("未知的事务阶段 {}", other),
            }),
        }
    }
}

/// 观察者接收条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Reception {
    /// 总是通知
    #[default]
    Always,
    /// 仅当所属组件已存在上下文实例时通知
    IfExists,
}

impl FromStr for Reception {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALWAYS" => Ok(Self::Always),
            "IF_EXISTS" => Ok(Self::IfExists),
            other => Err(DefinitionError::InvalidMemberValue {
                annotation: cdi_common::names::OBSERVES.to_string(),
                member: "notifyObserver".to_string(),
                message: format!("未知的接收条件 {}", other),
            }),
        }
    }
}

/// 观察者方法
pub trait ObserverMethod: Send + Sync + fmt::Debug {
    /// 观察者标识
    fn id(&self) -> &BeanIdentifier;

    /// 声明观察者的类
    fn bean_class(&self) -> &ClassName;

    /// 观察的事件类型
    fn observed_type(&self) -> &Type;

    /// 观察的限定符
    fn observed_qualifiers(&self) -> &HashSet<QualifierInstance>;

    /// 接收方式
    fn reception(&self) -> Reception {
        Reception::Always
    }

    /// 事务阶段
    fn transaction_phase(&self) -> TransactionPhase {
        TransactionPhase::InProgress
    }

    /// 优先级
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// `@ObservesAsync` 观察者
    fn is_async(&self) -> bool {
        false
    }

    /// `@WithAnnotations` 要求的注解，仅对类型发现事件有意义
    fn required_annotations(&self) -> &[ClassName] {
        &[]
    }

    /// 通知观察者
    fn notify(&self, event: &EventContext) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_parsing() {
        assert_eq!("AFTER_SUCCESS".parse::<TransactionPhase>().unwrap(), TransactionPhase::AfterSuccess);
        assert!("LATER".parse::<TransactionPhase>().is_err());
        assert!(TransactionPhase::AfterFailure.is_transactional());
        assert!(!TransactionPhase::InProgress.is_transactional());
        assert_eq!("IF_EXISTS".parse::<Reception>().unwrap(), Reception::IfExists);
    }
}
