//! 核心调用外部LLM能力的唯一契约

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::compendium::TraceEvent;

/// 请求可携带的工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResearchTool {
    #[serde(rename = "web_search")]
    WebSearch,
    #[serde(rename = "code_interpreter")]
    CodeInterpreter,
}

impl std::fmt::Display for ResearchTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchTool::WebSearch => write!(f, "web_search"),
            ResearchTool::CodeInterpreter => write!(f, "code_interpreter"),
        }
    }
}

/// 模型档位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ModelTier {
    /// 常规推理
    #[default]
    Efficient,
    /// 规划、主题生成等复杂推理
    Powerful,
}

/// 一次外部调用的完整输入
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// 调用点名称，仅用于日志、缓存分类与轨迹
    pub label: String,
    pub tier: ModelTier,
    pub system_prompt: String,
    pub prompt: String,
    pub tools: Vec<ResearchTool>,
    /// 以后台任务方式运行（由实现决定是否轮询）
    pub background: bool,
    pub max_tool_calls: Option<u32>,
}

impl InvokeRequest {
    pub fn new(label: &str, system_prompt: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            label: label.to_string(),
            tier: ModelTier::default(),
            system_prompt: system_prompt.into(),
            prompt: prompt.into(),
            tools: Vec::new(),
            background: false,
            max_tool_calls: None,
        }
    }

    pub fn powerful(mut self) -> Self {
        self.tier = ModelTier::Powerful;
        self
    }

    pub fn with_tools(mut self, tools: &[ResearchTool]) -> Self {
        self.tools = tools.to_vec();
        self
    }

    pub fn in_background(mut self, background: bool) -> Self {
        self.background = background;
        self
    }

    pub fn with_max_tool_calls(mut self, max_tool_calls: Option<u32>) -> Self {
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn uses(&self, tool: ResearchTool) -> bool {
        self.tools.contains(&tool)
    }

    /// 缓存键：请求的全部语义内容
    pub fn cache_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{}\n{}", self.system_prompt, self.prompt))
    }
}

/// 外部调用的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeResponse {
    pub text: String,
    /// 后端报告的工具调用事件
    #[serde(default)]
    pub trace: Vec<TraceEvent>,
}

impl InvokeResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            trace: Vec::new(),
        }
    }
}

/// 外部调用的失败类别
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("call timed out after {0} seconds")]
    Timeout(u64),

    #[error("tool-call budget of {limit} exhausted")]
    BudgetExceeded { limit: u32 },

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("upstream error: {0}")]
    UpstreamError(String),
}

impl InvokeError {
    /// 预算耗尽不重试，其余都按同样输入重试
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InvokeError::BudgetExceeded { .. })
    }

    /// 轨迹中记录的状态
    pub fn trace_status(&self) -> &'static str {
        match self {
            InvokeError::Timeout(_) => "timeout",
            InvokeError::BudgetExceeded { .. } => "budget_exceeded",
            InvokeError::MalformedResponse(_) | InvokeError::UpstreamError(_) => "failed",
        }
    }
}

impl From<anyhow::Error> for InvokeError {
    fn from(err: anyhow::Error) -> Self {
        InvokeError::UpstreamError(err.to_string())
    }
}

/// 外部LLM能力。实现只负责传输，重试、超时、预算与缓存由调用方统一处理。
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, InvokeError>;
}
