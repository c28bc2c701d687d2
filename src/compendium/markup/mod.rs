//! 两种文档形态的规范化序列化与读取
//!
//! 树形文档以 `domain` 为根；章节文档以 `compendium` 为根。
//! 同一文档读回后再次输出，得到逐字节一致的结果。

use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde_json::{Map, Value};

use super::address::Address;
use super::error::KnowledgeError;
use super::model::{Compendium, Domain, Relation, RelationKind, Topic, TopicBody};
use super::sections::{Citation, Insight, Section, SectionCompendium, TraceEvent};

mod reader;
mod writer;

pub use writer::XmlElement;

/// 读取到的文档
#[derive(Debug, Clone)]
pub enum Document {
    Tree(Compendium),
    Sections(SectionCompendium),
}

impl Document {
    /// 章节文档折叠为树，树形文档原样返回
    pub fn into_tree(self) -> Result<Compendium, KnowledgeError> {
        match self {
            Document::Tree(compendium) => Ok(compendium),
            Document::Sections(sections) => sections.fold_into_compendium(),
        }
    }
}

/// 按根元素识别文档形态
pub fn read_document(markup: &str) -> Result<Document, KnowledgeError> {
    let root = reader::parse(markup)?;
    match root.tag.as_str() {
        "domain" => tree_from_element(&root).map(Document::Tree),
        "compendium" => sections_from_element(&root).map(Document::Sections),
        other => Err(KnowledgeError::markup(format!(
            "unexpected root element `{}`",
            other
        ))),
    }
}

fn format_timestamp(at: &DateTime<FixedOffset>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

fn parse_timestamp(value: Option<&str>) -> Result<DateTime<FixedOffset>, KnowledgeError> {
    let value = value.ok_or_else(|| KnowledgeError::markup("missing `generated_at`"))?;
    DateTime::parse_from_rfc3339(value)
        .map_err(|e| KnowledgeError::markup(format!("invalid `generated_at` `{}`: {}", value, e)))
}

fn required_attr<'a>(element: &'a XmlElement, name: &str) -> Result<&'a str, KnowledgeError> {
    element.get_attr(name).ok_or_else(|| {
        KnowledgeError::markup(format!("<{}> is missing attribute `{}`", element.tag, name))
    })
}

// ---------------------------------------------------------------------------
// 树形文档

impl Compendium {
    /// 深度优先先序输出：属性、摘要、主题，最后是子领域
    pub fn to_markup_string(&self) -> String {
        let root = domain_element(self.root())
            .attr("description", self.description())
            .attr("generated_at", format_timestamp(&self.generated_at()));
        writer::render(&root)
    }

    pub fn from_markup_str(markup: &str) -> Result<Self, KnowledgeError> {
        match read_document(markup)? {
            Document::Tree(compendium) => Ok(compendium),
            Document::Sections(_) => Err(KnowledgeError::markup(
                "expected a `domain` document, found a `compendium` document",
            )),
        }
    }
}

fn domain_element(domain: &Domain) -> XmlElement {
    let mut element = XmlElement::new("domain")
        .attr("id", domain.id())
        .attr("name", domain.name());
    if let Some(summary) = domain.summary() {
        element.push(XmlElement::leaf("summary", summary));
    }
    for topic in domain.topics() {
        element.push(topic_element(topic));
    }
    for child in domain.subdomains() {
        element.push(domain_element(child));
    }
    element
}

fn topic_element(topic: &Topic) -> XmlElement {
    let mut element = XmlElement::new("topic")
        .attr("id", topic.id())
        .attr("name", topic.name());
    if let Some(content) = topic.content() {
        element.push(XmlElement::leaf("content", content));
    }
    if !topic.keywords().is_empty() {
        element.push(XmlElement::list("keywords", "keyword", topic.keywords().iter().cloned()));
    }
    if !topic.questions().is_empty() {
        element.push(XmlElement::list("questions", "question", topic.questions().iter().cloned()));
    }
    if !topic.relations().is_empty() {
        let mut relations = XmlElement::new("relations");
        for relation in topic.relations() {
            let entry = match &relation.kind {
                RelationKind::Prerequisite => XmlElement::new("prerequisite"),
                RelationKind::Related(label) => XmlElement::new("related").attr("type", label.clone()),
            };
            relations.push(entry.text(relation.target.as_str()));
        }
        element.push(relations);
    }
    element
}

fn tree_from_element(root: &XmlElement) -> Result<Compendium, KnowledgeError> {
    let domain = domain_from_element(root)?;
    let description = root.get_attr("description").unwrap_or_default().to_string();
    let generated_at = parse_timestamp(root.get_attr("generated_at"))?;
    Ok(Compendium::with_generated_at(domain, description, generated_at))
}

fn domain_from_element(element: &XmlElement) -> Result<Domain, KnowledgeError> {
    let mut domain = Domain::with_id(required_attr(element, "id")?, required_attr(element, "name")?)?;

    for child in &element.children {
        match child.tag.as_str() {
            "summary" => domain.set_summary(child.text_content())?,
            "topic" => domain.add_topic(topic_from_element(child)?)?,
            "domain" => domain.add_subdomain(domain_from_element(child)?)?,
            other => {
                return Err(KnowledgeError::markup(format!(
                    "unexpected <{}> inside <domain>",
                    other
                )));
            }
        }
    }
    Ok(domain)
}

fn topic_from_element(element: &XmlElement) -> Result<Topic, KnowledgeError> {
    let id = required_attr(element, "id")?;
    let topic = Topic::placeholder_with_id(id, required_attr(element, "name")?)?;

    let Some(content) = element.child_text("content") else {
        return Ok(topic);
    };

    let mut relations = Vec::new();
    if let Some(list) = element.first("relations") {
        for entry in &list.children {
            let target: Address = entry.text_content().parse()?;
            let relation = match entry.tag.as_str() {
                "prerequisite" => Relation::prerequisite(target),
                "related" => Relation::related(entry.get_attr("type").unwrap_or_default(), target),
                other => {
                    return Err(KnowledgeError::markup(format!(
                        "unexpected <{}> inside <relations>",
                        other
                    )));
                }
            };
            relations.push(relation);
        }
    }

    let body = TopicBody {
        content: content.to_string(),
        keywords: element.child_list("keywords", "keyword"),
        questions: element.child_list("questions", "question"),
        relations,
    };
    Topic::finalized_with_id(id, topic.name(), body)
}

// ---------------------------------------------------------------------------
// 章节文档

impl SectionCompendium {
    /// 顺序固定：overview、methodology、sections、open_questions、citations、research_trace
    pub fn to_markup_string(&self) -> String {
        let mut root = XmlElement::new("compendium")
            .attr("topic", self.topic.clone())
            .attr("generated_at", format_timestamp(&self.generated_at))
            .child(XmlElement::leaf("overview", self.overview.clone()));

        if !self.methodology.is_empty() {
            root.push(XmlElement::list("methodology", "step", self.methodology.iter().cloned()));
        }
        if !self.sections.is_empty() {
            let mut sections = XmlElement::new("sections");
            for section in &self.sections {
                sections.push(section_element(section));
            }
            root.push(sections);
        }
        if !self.open_questions.is_empty() {
            root.push(XmlElement::list(
                "open_questions",
                "question",
                self.open_questions.iter().cloned(),
            ));
        }
        if !self.citations.is_empty() {
            let mut citations = XmlElement::new("citations");
            for citation in &self.citations {
                citations.push(citation_element(citation));
            }
            root.push(citations);
        }
        if !self.trace.is_empty() {
            let mut trace = XmlElement::new("research_trace");
            for event in &self.trace {
                trace.push(trace_element(event));
            }
            root.push(trace);
        }

        writer::render(&root)
    }

    pub fn from_markup_str(markup: &str) -> Result<Self, KnowledgeError> {
        match read_document(markup)? {
            Document::Sections(sections) => Ok(sections),
            Document::Tree(_) => Err(KnowledgeError::markup(
                "expected a `compendium` document, found a `domain` document",
            )),
        }
    }
}

fn section_element(section: &Section) -> XmlElement {
    let mut element = XmlElement::new("section")
        .attr("id", section.id.clone())
        .child(XmlElement::leaf("title", section.title.clone()))
        .child(XmlElement::leaf("summary", section.summary.clone()));

    if !section.key_terms.is_empty() {
        element.push(XmlElement::list("key_terms", "term", section.key_terms.iter().cloned()));
    }
    if !section.guiding_questions.is_empty() {
        element.push(XmlElement::list(
            "guiding_questions",
            "question",
            section.guiding_questions.iter().cloned(),
        ));
    }
    if !section.insights.is_empty() {
        let mut insights = XmlElement::new("insights");
        for insight in &section.insights {
            let mut entry = XmlElement::new("insight")
                .child(XmlElement::leaf("title", insight.title.clone()))
                .child(XmlElement::leaf("evidence", insight.evidence.clone()));
            if let Some(implications) = &insight.implications {
                entry.push(XmlElement::leaf("implications", implications.clone()));
            }
            if !insight.citation_refs.is_empty() {
                entry.push(XmlElement::list("citations", "ref", insight.citation_refs.iter().cloned()));
            }
            insights.push(entry);
        }
        element.push(insights);
    }
    element
}

fn citation_element(citation: &Citation) -> XmlElement {
    let mut element = XmlElement::new("citation")
        .attr("id", citation.id.clone())
        .child(XmlElement::leaf("title", citation.title.clone()))
        .child(XmlElement::leaf("url", citation.url.clone()));
    if let Some(publisher) = &citation.publisher {
        element.push(XmlElement::leaf("publisher", publisher.clone()));
    }
    if let Some(published_at) = &citation.published_at {
        element.push(XmlElement::leaf("published_at", published_at.clone()));
    }
    if let Some(summary) = &citation.summary {
        element.push(XmlElement::leaf("summary", summary.clone()));
    }
    element
}

fn trace_element(event: &TraceEvent) -> XmlElement {
    let mut element = XmlElement::new("trace_event")
        .attr("id", event.id.clone())
        .attr("type", event.event_type.clone())
        .attr("status", event.status.clone());
    if !event.action.is_empty() {
        element.push(XmlElement::leaf(
            "action",
            Value::Object(event.action.clone()).to_string(),
        ));
    }
    if let Some(result) = &event.result {
        element.push(XmlElement::leaf("result", result.to_string()));
    }
    element
}

fn sections_from_element(root: &XmlElement) -> Result<SectionCompendium, KnowledgeError> {
    let mut sections = Vec::new();
    if let Some(list) = root.first("sections") {
        for element in list.all("section") {
            sections.push(section_from_element(element)?);
        }
    }

    let citations = root
        .first("citations")
        .map(|list| {
            list.all("citation")
                .map(citation_from_element)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    let trace = root
        .first("research_trace")
        .map(|list| {
            list.all("trace_event")
                .map(trace_from_element)
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?
        .unwrap_or_default();

    Ok(SectionCompendium {
        topic: required_attr(root, "topic")?.to_string(),
        overview: root.child_text("overview").unwrap_or_default().to_string(),
        methodology: root.child_list("methodology", "step"),
        sections,
        citations,
        open_questions: root.child_list("open_questions", "question"),
        trace,
        generated_at: parse_timestamp(root.get_attr("generated_at"))?,
    })
}

fn section_from_element(element: &XmlElement) -> Result<Section, KnowledgeError> {
    let insights = element
        .first("insights")
        .map(|list| {
            list.all("insight")
                .map(|insight| Insight {
                    title: insight.child_text("title").unwrap_or_default().to_string(),
                    evidence: insight.child_text("evidence").unwrap_or_default().to_string(),
                    implications: insight.child_text("implications").map(str::to_string),
                    citation_refs: insight.child_list("citations", "ref"),
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Section {
        id: required_attr(element, "id")?.to_string(),
        title: element.child_text("title").unwrap_or_default().to_string(),
        summary: element.child_text("summary").unwrap_or_default().to_string(),
        key_terms: element.child_list("key_terms", "term"),
        guiding_questions: element.child_list("guiding_questions", "question"),
        insights,
    })
}

fn citation_from_element(element: &XmlElement) -> Result<Citation, KnowledgeError> {
    Ok(Citation {
        id: required_attr(element, "id")?.to_string(),
        title: element.child_text("title").unwrap_or_default().to_string(),
        url: element.child_text("url").unwrap_or_default().to_string(),
        publisher: element.child_text("publisher").map(str::to_string),
        published_at: element.child_text("published_at").map(str::to_string),
        summary: element.child_text("summary").map(str::to_string),
    })
}

fn trace_from_element(element: &XmlElement) -> Result<TraceEvent, KnowledgeError> {
    let action = match element.child_text("action") {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(KnowledgeError::markup("trace `action` must be a JSON object")),
            Err(e) => return Err(KnowledgeError::markup(format!("invalid trace `action`: {}", e))),
        },
        None => Map::new(),
    };
    let result = element
        .child_text("result")
        .map(serde_json::from_str::<Value>)
        .transpose()
        .map_err(|e| KnowledgeError::markup(format!("invalid trace `result`: {}", e)))?;

    Ok(TraceEvent {
        id: required_attr(element, "id")?.to_string(),
        event_type: required_attr(element, "type")?.to_string(),
        status: required_attr(element, "status")?.to_string(),
        action,
        result,
    })
}
