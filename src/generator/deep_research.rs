//! 深度研究：一次携带检索工具的调用产出带引用的章节文档

use thiserror::Error;
use tracing::{info, warn};

use crate::compendium::SectionCompendium;
use crate::generator::context::{CallError, GeneratorContext};
use crate::generator::parsing::{ResearchBlueprint, parse_blueprint, parse_compendium_payload};
use crate::generator::prompts;
use crate::llm::{InvokeRequest, ResearchTool};

#[derive(Debug, Error)]
pub enum DeepResearchError {
    #[error("deep research call failed: {0}")]
    Call(#[from] CallError),
}

/// 研究蓝图，未启用或失败时使用固定蓝图
pub async fn plan_research(context: &GeneratorContext, topic: &str) -> ResearchBlueprint {
    if !context.config.research.use_prompt_refinement {
        return ResearchBlueprint::default_for(topic);
    }

    let request = InvokeRequest::new(
        "research_blueprint",
        prompts::RESEARCHER_SYSTEM_PROMPT,
        prompts::blueprint(topic, &context.config.target_language),
    )
    .powerful();
    match context.call(request, parse_blueprint).await {
        Ok(blueprint) => {
            info!("🗺️ 研究蓝图: {}", blueprint.primary_objective);
            blueprint
        }
        Err(e) => {
            warn!("⚠️ 研究蓝图生成失败，使用默认蓝图: {}", e);
            ResearchBlueprint::default_for(topic)
        }
    }
}

fn research_tools(context: &GeneratorContext) -> Vec<ResearchTool> {
    let mut tools = Vec::new();
    if context.config.research.use_web_search {
        tools.push(ResearchTool::WebSearch);
    }
    if context.config.research.enable_code_interpreter {
        tools.push(ResearchTool::CodeInterpreter);
    }
    tools
}

/// 执行深度研究。主调用失败时整次运行失败。
pub async fn run_deep_research(
    context: &GeneratorContext,
    topic: &str,
) -> Result<SectionCompendium, DeepResearchError> {
    info!("🔬 开始深度研究: {}", topic);
    let blueprint = plan_research(context, topic).await;

    let research = &context.config.research;
    let request = InvokeRequest::new(
        "deep_research",
        prompts::DEEP_RESEARCH_SYSTEM_PROMPT,
        prompts::deep_research_assignment(topic, &blueprint, &context.config.target_language),
    )
    .powerful()
    .with_tools(&research_tools(context))
    .in_background(research.background)
    .with_max_tool_calls(research.max_tool_calls);

    let payload = context.call(request, parse_compendium_payload).await?;
    let mut document = SectionCompendium::from_payload(topic, payload, None);
    document.trace = context.trace().await;

    info!(
        "✅ 深度研究完成：{}个章节，{}条引用",
        document.sections.len(),
        document.citations.len()
    );
    Ok(document)
}
