//! 一次运行的显式上下文：后端、配置、预算、并发上限、缓存与调用轨迹
//!
//! 所有外部调用都经过 [`GeneratorContext::call`]。

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::compendium::TraceEvent;
use crate::config::Config;
use crate::generator::budget::ToolCallBudget;
use crate::generator::parsing::StructuredResponseParseError;
use crate::llm::{InvokeError, InvokeRequest, LLMClient, ResearchBackend, ResearchTool};

/// 一个调用点用尽重试后的失败
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error(transparent)]
    Parse(#[from] StructuredResponseParseError),
}

impl CallError {
    pub fn is_budget(&self) -> bool {
        matches!(self, CallError::Invoke(InvokeError::BudgetExceeded { .. }))
    }
}

#[derive(Clone)]
pub struct GeneratorContext {
    /// 外部LLM能力
    backend: Arc<dyn ResearchBackend>,
    /// 配置
    pub config: Config,
    /// 响应缓存
    cache: Arc<CacheManager>,
    /// 整次运行共享的调用预算
    budget: Arc<ToolCallBudget>,
    /// 同时进行中的外部调用上限，超出时排队
    limiter: Arc<Semaphore>,
    /// 按发出顺序编号的调用轨迹
    ledger: Arc<Mutex<Vec<TraceEvent>>>,
    sequence: Arc<AtomicUsize>,
}

impl GeneratorContext {
    /// 使用配置中的LLM服务创建上下文
    pub fn new(config: Config) -> Result<Self> {
        let client = LLMClient::new(&config.llm)?;
        Ok(Self::with_backend(config, Arc::new(client)))
    }

    pub fn with_backend(config: Config, backend: Arc<dyn ResearchBackend>) -> Self {
        let cache = Arc::new(CacheManager::new(config.cache.clone()));
        let budget = Arc::new(ToolCallBudget::new(config.research.max_tool_calls));
        let limiter = Arc::new(Semaphore::new(config.llm.max_parallels.max(1)));

        Self {
            backend,
            config,
            cache,
            budget,
            limiter,
            ledger: Arc::new(Mutex::new(Vec::new())),
            sequence: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn budget(&self) -> &ToolCallBudget {
        &self.budget
    }

    /// 调用轨迹，按发出顺序排列
    pub async fn trace(&self) -> Vec<TraceEvent> {
        let mut events = self.ledger.lock().await.clone();
        events.sort_by_key(|event| trace_order(&event.id));
        events
    }

    /// 发出一次外部调用并严格解析结果。
    ///
    /// 顺序：缓存 → 并发许可 → 每次尝试：预算 → 超时 → 记录轨迹 → 解析。
    /// 预算耗尽不重试，其余失败按相同输入重试到 `retry_attempts` 次。
    pub async fn call<T, P>(&self, request: InvokeRequest, parse: P) -> Result<T, CallError>
    where
        P: Fn(&str) -> Result<T, StructuredResponseParseError>,
    {
        let cache_key = request.cache_key();
        if let Ok(Some(text)) = self.cache.get::<String>(&request.label, &cache_key).await {
            match parse(&text) {
                Ok(parsed) => return Ok(parsed),
                Err(e) => debug!("♻️ 缓存内容无法解析，重新调用 {}: {}", request.label, e),
            }
        }

        let attempts = self.config.llm.retry_attempts.max(1);
        let mut last_error = None;
        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(Duration::from_millis(self.config.llm.retry_delay_ms)).await;
            }

            match self.attempt(&request).await {
                Ok(text) => match parse(&text) {
                    Ok(parsed) => {
                        if let Err(e) = self.cache.set(&request.label, &cache_key, text).await {
                            warn!("⚠️ 缓存写入失败 {}: {}", request.label, e);
                        }
                        return Ok(parsed);
                    }
                    Err(e) => {
                        warn!(
                            "⚠️ {} 第{}/{}次响应结构不符: {}",
                            request.label, attempt, attempts, e
                        );
                        last_error = Some(CallError::Parse(e));
                    }
                },
                Err(e) if !e.is_retryable() => return Err(CallError::Invoke(e)),
                Err(e) => {
                    warn!("⚠️ {} 第{}/{}次调用失败: {}", request.label, attempt, attempts, e);
                    last_error = Some(CallError::Invoke(e));
                }
            }
        }

        Err(last_error.unwrap_or(CallError::Invoke(InvokeError::UpstreamError(
            "no attempt was made".to_string(),
        ))))
    }

    async fn attempt(&self, request: &InvokeRequest) -> Result<String, InvokeError> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| InvokeError::UpstreamError(e.to_string()))?;

        if !self.budget.try_acquire() {
            return Err(InvokeError::BudgetExceeded {
                limit: self.budget.limit().unwrap_or_default(),
            });
        }
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        let timeout_seconds = self.config.llm.timeout_seconds;
        let outcome = match tokio::time::timeout(
            Duration::from_secs(timeout_seconds),
            self.backend.invoke(request),
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(InvokeError::Timeout(timeout_seconds)),
        };

        let event_type = if request.uses(ResearchTool::WebSearch) {
            "web_search_call"
        } else {
            "completion_call"
        };
        let status = match &outcome {
            Ok(_) => "completed",
            Err(e) => e.trace_status(),
        };
        let tools: Vec<String> = request.tools.iter().map(ToString::to_string).collect();
        let mut events = vec![TraceEvent::for_call(
            sequence,
            event_type,
            status,
            &request.label,
            &request.prompt,
            &tools,
        )];
        if let Ok(response) = &outcome {
            // 后端报告的工具调用事件挂在本次调用之后
            events.extend(response.trace.iter().enumerate().map(|(index, event)| {
                let mut event = event.clone();
                event.id = format!("call-{:04}.{:02}", sequence, index + 1);
                event
            }));
        }
        self.ledger.lock().await.extend(events);

        outcome.map(|response| response.text)
    }
}

/// `call-NNNN[.MM]` 按数值排序，序号超过四位时仍保持发出顺序
fn trace_order(id: &str) -> (usize, usize) {
    let mut parts = id.trim_start_matches("call-").splitn(2, '.');
    let call = parts
        .next()
        .and_then(|part| part.parse().ok())
        .unwrap_or(usize::MAX);
    let nested = parts.next().and_then(|part| part.parse().ok()).unwrap_or(0);
    (call, nested)
}
