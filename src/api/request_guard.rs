// ==========================================
// 检验验证与工作流状态引擎 - 请求代次守卫
// ==========================================
// 职责: 同一报验单同一通道的并发请求只采纳最新一次的响应
// 红线: 过期响应不得覆盖内存状态
// ==========================================

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// 请求通道，代次按 （报验单，通道） 独立递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestChannel {
    /// PO / 炉号数据拉取
    PoData,
    /// 分段保存与审批
    Sections,
    /// 工作流转换（生命周期动作与普通工作流动作）
    Workflow,
}

impl fmt::Display for RequestChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestChannel::PoData => "PO_DATA",
            RequestChannel::Sections => "SECTIONS",
            RequestChannel::Workflow => "WORKFLOW",
        };
        write!(f, "{}", name)
    }
}

/// 一次请求的凭据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTicket {
    pub call_number: String,
    pub channel: RequestChannel,
    pub generation: u64,
}

/// 按报验单 + 通道维护单调递增的请求代次
#[derive(Debug, Default)]
pub struct RequestGuard {
    generations: Mutex<HashMap<(String, RequestChannel), u64>>,
}

impl RequestGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// 发起新请求，使同一通道此前未完成的请求全部过期
    pub fn begin(&self, call_number: &str, channel: RequestChannel) -> RequestTicket {
        let mut generations = match self.generations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let generation = generations
            .entry((call_number.to_string(), channel))
            .and_modify(|g| *g += 1)
            .or_insert(1);
        RequestTicket {
            call_number: call_number.to_string(),
            channel,
            generation: *generation,
        }
    }

    /// 凭据是否仍是该报验单该通道的最新请求
    pub fn is_current(&self, ticket: &RequestTicket) -> bool {
        let generations = match self.generations.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        generations
            .get(&(ticket.call_number.clone(), ticket.channel))
            .copied()
            == Some(ticket.generation)
    }
}
