//! 扁平的章节形态：Section / Insight / Citation，以及研究过程的调用轨迹
//!
//! 深度研究调用返回带引用的证据时使用这一形态，
//! 可以通过 [`SectionCompendium::fold_into_compendium`] 折叠成知识树。

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::address::slugify;
use super::error::KnowledgeError;
use super::model::{Compendium, Domain, Topic, TopicBody};

const TRACE_TEXT_LIMIT: usize = 120;

/// 引用来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub id: String,
    pub title: String,
    pub url: String,
    pub publisher: Option<String>,
    pub published_at: Option<String>,
    pub summary: Option<String>,
}

/// 章节内的一条分析结论
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub evidence: String,
    pub implications: Option<String>,
    /// 指向全局引用表的id
    pub citation_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub title: String,
    pub summary: String,
    pub key_terms: Vec<String>,
    pub guiding_questions: Vec<String>,
    pub insights: Vec<Insight>,
}

/// 研究过程中发出的一次调用，用于审计
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub id: String,
    pub event_type: String,
    pub status: String,
    pub action: Map<String, Value>,
    pub result: Option<Value>,
}

/// 章节形态的完整文档
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionCompendium {
    pub topic: String,
    pub overview: String,
    pub methodology: Vec<String>,
    pub sections: Vec<Section>,
    pub citations: Vec<Citation>,
    pub open_questions: Vec<String>,
    pub trace: Vec<TraceEvent>,
    pub generated_at: DateTime<FixedOffset>,
}

/// 深度研究调用约定返回的JSON结构
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CompendiumPayload {
    #[serde(default)]
    pub topic_overview: Option<String>,
    #[serde(default)]
    pub methodology: Vec<String>,
    #[serde(default)]
    pub sections: Vec<SectionPayload>,
    #[serde(default)]
    pub citations: Vec<CitationPayload>,
    #[serde(default)]
    pub open_questions: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SectionPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub key_terms: Vec<String>,
    #[serde(default)]
    pub guiding_questions: Vec<String>,
    #[serde(default)]
    pub insights: Vec<InsightPayload>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct InsightPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub evidence: Option<String>,
    #[serde(default)]
    pub implications: Option<String>,
    #[serde(default)]
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CitationPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub publisher: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl SectionCompendium {
    /// 用默认值补齐缺省字段，构造章节文档
    pub fn from_payload(
        topic: impl Into<String>,
        payload: CompendiumPayload,
        generated_at: Option<DateTime<FixedOffset>>,
    ) -> Self {
        let sections = payload
            .sections
            .into_iter()
            .enumerate()
            .map(|(index, section)| Section {
                id: non_empty(section.id).unwrap_or_else(|| format!("S{:02}", index + 1)),
                title: non_empty(section.title).unwrap_or_else(|| "Untitled Section".to_string()),
                summary: non_empty(section.summary).unwrap_or_default(),
                key_terms: clean_list(section.key_terms),
                guiding_questions: clean_list(section.guiding_questions),
                insights: section
                    .insights
                    .into_iter()
                    .map(|insight| Insight {
                        title: non_empty(insight.title)
                            .unwrap_or_else(|| "Key Insight".to_string()),
                        evidence: non_empty(insight.evidence).unwrap_or_default(),
                        implications: non_empty(insight.implications),
                        citation_refs: clean_list(insight.citations),
                    })
                    .collect(),
            })
            .collect();

        let citations = payload
            .citations
            .into_iter()
            .enumerate()
            .map(|(index, citation)| Citation {
                id: non_empty(citation.id).unwrap_or_else(|| format!("C{:02}", index + 1)),
                title: non_empty(citation.title).unwrap_or_else(|| "Untitled Source".to_string()),
                url: non_empty(citation.url).unwrap_or_default(),
                publisher: non_empty(citation.publisher),
                published_at: non_empty(citation.published_at),
                summary: non_empty(citation.summary),
            })
            .collect();

        Self {
            topic: topic.into(),
            overview: non_empty(payload.topic_overview).unwrap_or_default(),
            methodology: clean_list(payload.methodology),
            sections,
            citations,
            open_questions: clean_list(payload.open_questions),
            trace: Vec::new(),
            generated_at: generated_at
                .unwrap_or_else(|| Utc::now().fixed_offset())
                .trunc_subsecs(0),
        }
    }

    pub fn citation(&self, id: &str) -> Option<&Citation> {
        self.citations.iter().find(|citation| citation.id == id)
    }

    /// 把每个章节折叠成一个已完成的主题，根领域以研究主题命名
    pub fn fold_into_compendium(&self) -> Result<Compendium, KnowledgeError> {
        let mut root = Domain::new(self.topic.clone());
        if !self.overview.trim().is_empty() {
            root.set_summary(self.overview.clone())?;
        }

        for section in &self.sections {
            let base = slugify(&section.title);
            let mut id = base.clone();
            if root.has_child(&id) {
                id = format!("{}{}", base, slugify(&section.id));
            }
            // 标题与章节id都重复时追加序号
            let mut suffix = 2;
            while root.has_child(&id) {
                id = format!("{}{}", base, suffix);
                suffix += 1;
            }

            root.add_topic(Topic::placeholder_with_id(id.clone(), section.title.clone())?)?;

            // 没有任何内容的章节保留为占位主题
            let content = self.fold_section_content(section);
            if !content.is_empty() {
                let body = TopicBody {
                    content,
                    keywords: section.key_terms.clone(),
                    questions: section.guiding_questions.clone(),
                    relations: Vec::new(),
                };
                root.finalize_topic(&id, body)?;
            }
        }

        Ok(Compendium::with_generated_at(
            root,
            self.topic.clone(),
            self.generated_at,
        ))
    }

    fn fold_section_content(&self, section: &Section) -> String {
        let mut blocks: Vec<String> = Vec::new();
        if !section.summary.trim().is_empty() {
            blocks.push(section.summary.trim().to_string());
        }

        let mut cited: Vec<&str> = Vec::new();
        for insight in &section.insights {
            let mut block = format!("{}: {}", insight.title, insight.evidence);
            if let Some(implications) = &insight.implications {
                block.push_str(&format!("\nImplications: {}", implications));
            }
            if !insight.citation_refs.is_empty() {
                block.push_str(&format!("\n[{}]", insight.citation_refs.join(", ")));
            }
            blocks.push(block);

            for reference in &insight.citation_refs {
                if !cited.contains(&reference.as_str()) {
                    cited.push(reference);
                }
            }
        }

        let sources: Vec<String> = cited
            .iter()
            .filter_map(|id| self.citation(id))
            .map(render_citation_line)
            .collect();
        if !sources.is_empty() {
            blocks.push(format!("Sources:\n{}", sources.join("\n")));
        }

        blocks.join("\n\n")
    }
}

fn render_citation_line(citation: &Citation) -> String {
    let mut line = format!("[{}] {}", citation.id, citation.title);
    let details: Vec<&str> = [citation.publisher.as_deref(), citation.published_at.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    if !details.is_empty() {
        line.push_str(&format!(" ({})", details.join("; ")));
    }
    if !citation.url.is_empty() {
        line.push_str(&format!(" {}", citation.url));
    }
    line
}

impl TraceEvent {
    /// 核心发出的一次外部调用
    pub fn for_call(
        sequence: usize,
        event_type: &str,
        status: &str,
        label: &str,
        prompt: &str,
        tools: &[String],
    ) -> Self {
        let mut action = Map::new();
        action.insert("type".to_string(), Value::String(event_type.to_string()));
        action.insert("label".to_string(), Value::String(label.to_string()));
        action.insert("query".to_string(), Value::String(truncate_text(prompt)));
        if !tools.is_empty() {
            action.insert(
                "tools".to_string(),
                Value::Array(tools.iter().cloned().map(Value::String).collect()),
            );
        }

        Self {
            id: format!("call-{:04}", sequence),
            event_type: event_type.to_string(),
            status: status.to_string(),
            action,
            result: None,
        }
    }
}

/// 折叠空白并截断到固定长度
pub fn truncate_text(value: &str) -> String {
    let cleaned = value.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.chars().count() <= TRACE_TEXT_LIMIT {
        return cleaned;
    }
    let head: String = cleaned.chars().take(TRACE_TEXT_LIMIT - 1).collect();
    format!("{}…", head.trim_end())
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}
