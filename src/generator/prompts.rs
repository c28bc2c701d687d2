//! 每个外部调用点的提示词模板

use crate::compendium::CompendiumPayload;
use crate::generator::parsing::{ResearchBlueprint, TopicPayload};
use crate::i18n::TargetLanguage;

pub const RESEARCHER_SYSTEM_PROMPT: &str = "You are a meticulous research librarian who builds structured, retrieval-oriented knowledge bases. Follow output format instructions exactly.";

pub const ONLINE_RESEARCHER_SYSTEM_PROMPT: &str = "You are a research assistant with live web access. Answer precisely, cite concrete facts, and prefer recent primary sources.";

pub const DEEP_RESEARCH_SYSTEM_PROMPT: &str = "You are a deep research analyst. Investigate the assignment with the tools available, then return only the requested JSON document.";

fn with_language(body: String, language: &TargetLanguage) -> String {
    format!("{}\n\n{}", body.trim_end(), language.prompt_instruction())
}

/// 领域描述扩写
pub fn enhance_domain(domain: &str, language: &TargetLanguage) -> String {
    with_language(
        format!(
            "Rewrite the following domain of expertise as one precise sentence that names its scope, \
core disciplines and typical practitioners. Reply with the sentence only.\n\nDomain: {}",
            domain
        ),
        language,
    )
}

/// 研究领域列表；`context` 为深入研究时父领域已有的知识
pub fn research_areas(domain: &str, context: Option<&str>, language: &TargetLanguage) -> String {
    let mut body = format!(
        "List the areas of research that together cover the domain below comprehensively, \
from fundamentals to current practice.\n\nDomain: {}\n",
        domain
    );
    if let Some(context) = context {
        body.push_str(&format!(
            "\nThe domain is studied more deeply inside an existing knowledge base. \
Avoid repeating what it already covers:\n\n{}\n",
            context
        ));
    }
    body.push_str("\nReply with a JSON array of strings and nothing else.");
    with_language(body, language)
}

pub fn research_questions(
    domain: &str,
    area: &str,
    count: usize,
    language: &TargetLanguage,
) -> String {
    with_language(
        format!(
            "Write {count} research questions that an expert would need answered to master the area \
\"{area}\" within the domain \"{domain}\". Each question must be self-contained.\n\n\
Reply with a JSON array of objects shaped like {{\"number\": 1, \"question\": \"...\"}} and nothing else."
        ),
        language,
    )
}

pub fn answer_question(question: &str, language: &TargetLanguage) -> String {
    with_language(
        format!(
            "Research the following question and answer it thoroughly with concrete facts, \
figures and names.\n\nQuestion: {}",
            question
        ),
        language,
    )
}

pub fn plan_topics(domain: &str, findings: &str, language: &TargetLanguage) -> String {
    with_language(
        format!(
            "Based on the research findings below, list the distinct topics a knowledge base about \
\"{domain}\" should contain. Each topic must be narrow enough to be explained in one paragraph.\n\n\
{findings}\n\nReply with a JSON array of topic names and nothing else."
        ),
        language,
    )
}

pub fn generate_topic(
    domain: &str,
    topic: &str,
    findings: &str,
    siblings: &[String],
    language: &TargetLanguage,
) -> String {
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(TopicPayload))
        .unwrap_or_default();
    let siblings = if siblings.is_empty() {
        "- none".to_string()
    } else {
        siblings
            .iter()
            .map(|name| format!("- {}", name))
            .collect::<Vec<_>>()
            .join("\n")
    };
    with_language(
        format!(
            "Write the topic \"{topic}\" of the knowledge base about \"{domain}\".\n\n\
- content: one dense paragraph grounded in the findings\n\
- keywords: search keywords in order of relevance\n\
- questions: questions this topic answers\n\
- prerequisites: names of other topics a reader should know first, chosen from the list below\n\n\
Other topics:\n{siblings}\n\nResearch findings:\n\n{findings}\n\n\
Reply with one JSON object matching this schema and nothing else:\n{schema}"
        ),
        language,
    )
}

pub fn domain_summary(domain: &str, contents: &str, language: &TargetLanguage) -> String {
    with_language(
        format!(
            "Summarize the knowledge base about \"{domain}\" in one paragraph, based on its topics:\n\n{contents}\n\n\
Reply with the summary only."
        ),
        language,
    )
}

pub fn blueprint(topic: &str, language: &TargetLanguage) -> String {
    with_language(
        format!(
            "Plan a deep research assignment about \"{topic}\". Reply with one JSON object with the keys \
primary_objective (string), audience (string), key_sections (array of {{\"title\", \"focus\"}}), \
research_questions (array of strings) and methodology_preferences (array of strings), and nothing else."
        ),
        language,
    )
}

fn bullets(lines: Vec<String>, fallback: &str) -> String {
    if lines.is_empty() {
        fallback.to_string()
    } else {
        lines.join("\n")
    }
}

/// 深度研究任务书，内嵌期望返回结构的JSON Schema
pub fn deep_research_assignment(
    topic: &str,
    blueprint: &ResearchBlueprint,
    language: &TargetLanguage,
) -> String {
    let section_bullets = bullets(
        blueprint
            .key_sections
            .iter()
            .map(|section| format!("- {}: {}", section.title, section.focus.trim()))
            .collect(),
        "- No specific sections provided",
    );
    let question_bullets = bullets(
        blueprint
            .research_questions
            .iter()
            .map(|question| format!("- {}", question))
            .collect(),
        "- Derive the most pertinent questions",
    );
    let methodology_bullets = bullets(
        blueprint
            .methodology_preferences
            .iter()
            .map(|step| format!("- {}", step))
            .collect(),
        "- Combine qualitative synthesis with quantitative evidence",
    );
    let audience = if blueprint.audience.trim().is_empty() {
        "Analytical readers"
    } else {
        blueprint.audience.as_str()
    };
    let schema = serde_json::to_string_pretty(&schemars::schema_for!(CompendiumPayload))
        .unwrap_or_default();

    with_language(
        format!(
            "Research topic: {topic}\n\
Primary objective: {objective}\n\
Audience: {audience}\n\n\
Key sections:\n{section_bullets}\n\n\
Research questions:\n{question_bullets}\n\n\
Methodology:\n{methodology_bullets}\n\n\
Give every section a stable id (S01, S02, ...) and every citation an id (C01, C02, ...); \
insights reference citations by id.\n\n\
Reply with one JSON object matching this schema and nothing else:\n{schema}",
            objective = blueprint.primary_objective,
        ),
        language,
    )
}
