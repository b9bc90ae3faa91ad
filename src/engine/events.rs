// ==========================================
// 检验验证与工作流状态引擎 - 引擎层事件发布
// ==========================================
// 职责: 定义检验事件发布 trait，通知下游（看板刷新、审计等）
// 说明: 事件在状态提交之后发布，发布失败不回滚状态
// ==========================================

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::sync::Arc;
use uuid::Uuid;

// ==========================================
// 检验事件类型
// ==========================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InspectionEventType {
    /// 分段审批结论已提交
    SectionDecided,
    /// 报验单生命周期状态变更
    LifecycleTransitioned,
    /// 上游数据重新拉取（分段已重置）
    DataRefetched,
    /// 草稿已清理
    DraftsCleared,
}

impl InspectionEventType {
    pub fn as_str(&self) -> &str {
        match self {
            InspectionEventType::SectionDecided => "SectionDecided",
            InspectionEventType::LifecycleTransitioned => "LifecycleTransitioned",
            InspectionEventType::DataRefetched => "DataRefetched",
            InspectionEventType::DraftsCleared => "DraftsCleared",
        }
    }
}

/// 检验事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectionEvent {
    /// 事件ID（下游去重用）
    pub event_id: String,
    /// 报验单号
    pub call_number: String,
    /// 事件类型
    pub event_type: InspectionEventType,
    /// 事件说明（如 "A=APPROVED" / "UNDER_INSPECTION→PAUSED"）
    pub detail: Option<String>,
    /// 发生时间（UTC）
    pub occurred_at: NaiveDateTime,
}

impl InspectionEvent {
    pub fn new(call_number: &str, event_type: InspectionEventType, detail: Option<String>) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            call_number: call_number.to_string(),
            event_type,
            detail,
            occurred_at: Utc::now().naive_utc(),
        }
    }
}

// ==========================================
// 事件发布 Trait
// ==========================================

/// 检验事件发布者 Trait
pub trait InspectionEventPublisher: Send + Sync {
    /// 发布检验事件
    ///
    /// # 返回
    /// - `Ok(id)`: 下游分配的 ID（不支持时为空字符串）
    /// - `Err`: 发布失败
    fn publish(&self, event: InspectionEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件发布者
#[derive(Debug, Clone, Default)]
pub struct NoOpEventPublisher;

impl InspectionEventPublisher for NoOpEventPublisher {
    fn publish(&self, event: InspectionEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventPublisher: 跳过事件发布 - call_number={}, event_type={}",
            event.call_number,
            event.event_type.as_str()
        );
        Ok(String::new())
    }
}

/// 可选的事件发布者包装
pub struct OptionalEventPublisher {
    inner: Option<Arc<dyn InspectionEventPublisher>>,
}

impl OptionalEventPublisher {
    pub fn with_publisher(publisher: Arc<dyn InspectionEventPublisher>) -> Self {
        Self {
            inner: Some(publisher),
        }
    }

    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 发布事件；失败只记录告警
    pub fn publish(&self, event: InspectionEvent) {
        let Some(publisher) = &self.inner else {
            tracing::debug!(
                "OptionalEventPublisher: 未配置发布者,跳过事件 - call_number={}, event_type={}",
                event.call_number,
                event.event_type.as_str()
            );
            return;
        };
        let call_number = event.call_number.clone();
        let event_type = event.event_type.as_str().to_string();
        if let Err(e) = publisher.publish(event) {
            tracing::warn!(%call_number, %event_type, error = %e, "检验事件发布失败");
        }
    }

    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventPublisher {
    fn default() -> Self {
        Self::none()
    }
}
