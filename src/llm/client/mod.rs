//! LLM客户端 - 基于rig的 [`ResearchBackend`] 实现

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::config::LLMConfig;
use crate::llm::backend::{
    InvokeError, InvokeRequest, InvokeResponse, ModelTier, ResearchBackend, ResearchTool,
};

mod providers;

use providers::ProviderClient;

/// LLM客户端 - 提供统一的LLM服务接口
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
    /// 联网检索模型，未配置时退回主模型
    online_client: Option<ProviderClient>,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(config)?;
        let online_client = (!config.online_api_key.trim().is_empty()).then(|| {
            ProviderClient::openai_compatible(&config.online_api_key, &config.online_api_base_url)
        });
        Ok(Self {
            config: config.clone(),
            client,
            online_client,
        })
    }

    /// 检查模型连接和功能是否正常，不计入工具调用预算
    pub async fn check_connection(&self) -> Result<()> {
        info!("🔄 正在检查模型连接...");
        let agent = self.client.create_agent(
            &self.config.model_efficient,
            "You are a helpful assistant.",
            &self.config,
        );
        match agent.prompt("Hello").await {
            Ok(_) => {
                info!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                error!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 按请求选择客户端与模型：携带联网检索工具的请求交给联网模型
    fn route(&self, request: &InvokeRequest) -> (&ProviderClient, &str) {
        if request.uses(ResearchTool::WebSearch) {
            if let Some(online) = &self.online_client {
                return (online, &self.config.model_online);
            }
        }
        match request.tier {
            ModelTier::Efficient => (&self.client, &self.config.model_efficient),
            ModelTier::Powerful => (&self.client, &self.config.model_powerful),
        }
    }
}

#[async_trait]
impl ResearchBackend for LLMClient {
    async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
        let (client, model) = self.route(request);
        debug!("🤖 {} -> {}", request.label, model);
        let ignored = ignored_options(request);
        if !ignored.is_empty() {
            debug!("ℹ️ {} 的以下选项不被rig后端支持，已忽略: {}", request.label, ignored.join(", "));
        }

        let agent = client.create_agent(model, &request.system_prompt, &self.config);
        let text = agent.prompt(&request.prompt).await?;
        if text.trim().is_empty() {
            return Err(InvokeError::MalformedResponse(
                "model returned an empty response".to_string(),
            ));
        }
        Ok(InvokeResponse::text(text))
    }
}

/// rig后端无法表达的请求选项：代码解释器工具、后台运行与工具调用上限
fn ignored_options(request: &InvokeRequest) -> Vec<String> {
    let mut ignored = Vec::new();
    if request.uses(ResearchTool::CodeInterpreter) {
        ignored.push(ResearchTool::CodeInterpreter.to_string());
    }
    if request.background {
        ignored.push("background".to_string());
    }
    if let Some(limit) = request.max_tool_calls {
        ignored.push(format!("max_tool_calls={}", limit));
    }
    ignored
}
