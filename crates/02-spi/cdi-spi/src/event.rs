//! 事件上下文与事件元数据

use crate::injection::InjectionPoint;
use cdi_common::{format_qualifiers, QualifierInstance, Type};
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// 事件载荷
pub type Payload = Arc<dyn Any + Send + Sync>;

/// 事件元数据
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    /// 一次触发的唯一标识
    pub id: Uuid,
    /// 事件类型
    pub event_type: Type,
    /// 限定符
    pub qualifiers: HashSet<QualifierInstance>,
    /// 通过注入的事件对象触发时所在的注入点
    pub injection_point: Option<InjectionPoint>,
    /// 触发时间
    pub fired_at: DateTime<Utc>,
}

impl EventMetadata {
    /// 创建事件元数据
    pub fn new(event_type: Type, qualifiers: HashSet<QualifierInstance>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            qualifiers,
            injection_point: None,
            fired_at: Utc::now(),
        }
    }

    /// 记录触发事件的注入点
    pub fn with_injection_point(mut self, ip: InjectionPoint) -> Self {
        self.injection_point = Some(ip);
        self
    }
}

impl fmt::Display for EventMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.event_type, format_qualifiers(&self.qualifiers))
    }
}

/// 一次通知中传递给观察者的上下文
#[derive(Clone)]
pub struct EventContext {
    payload: Payload,
    metadata: Arc<EventMetadata>,
}

impl EventContext {
    /// 创建
    pub fn new(payload: Payload, metadata: Arc<EventMetadata>) -> Self {
        Self { payload, metadata }
    }

    /// 事件载荷
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// 按具体类型读取载荷
    pub fn payload_ref<T: Any>(&self) -> Option<&T> {
        self.payload.downcast_ref::<T>()
    }

    /// 事件元数据
    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// 共享的事件元数据
    pub fn shared_metadata(&self) -> Arc<EventMetadata> {
        self.metadata.clone()
    }
}

impl fmt::Debug for EventContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventContext").field("metadata", &self.metadata).finish()
    }
}
