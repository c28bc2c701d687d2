//! 知识树：Domain / Topic / Relation / Compendium
//!
//! 树结构只能通过本模块提供的方法修改，所有容器字段均为私有。

use std::ops::Deref;

use chrono::{DateTime, FixedOffset, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::address::{Address, build_address, slugify};
use super::error::KnowledgeError;

/// 知识树中的领域节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Domain {
    id: String,
    name: String,
    summary: Option<String>,
    topics: Vec<Topic>,
    subdomains: Vec<Domain>,
}

impl Domain {
    /// 以名称推导id创建领域
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            summary: None,
            topics: Vec::new(),
            subdomains: Vec::new(),
        }
    }

    /// 以显式id创建领域
    pub fn with_id(id: impl Into<String>, name: impl Into<String>) -> Result<Self, KnowledgeError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self {
            id,
            name: name.into(),
            summary: None,
            topics: Vec::new(),
            subdomains: Vec::new(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    pub fn subdomains(&self) -> &[Domain] {
        &self.subdomains
    }

    pub fn topic(&self, id: &str) -> Option<&Topic> {
        self.topics.iter().find(|topic| topic.id == id)
    }

    pub fn subdomain(&self, id: &str) -> Option<&Domain> {
        self.subdomains.iter().find(|domain| domain.id == id)
    }

    pub(crate) fn subdomain_mut(&mut self, id: &str) -> Option<&mut Domain> {
        self.subdomains.iter_mut().find(|domain| domain.id == id)
    }

    /// 直接子节点（主题与子领域）中是否已存在该id
    pub fn has_child(&self, id: &str) -> bool {
        self.topic(id).is_some() || self.subdomain(id).is_some()
    }

    /// 追加主题，id冲突时不做任何修改
    pub fn add_topic(&mut self, topic: Topic) -> Result<(), KnowledgeError> {
        self.ensure_free(&topic.id)?;
        self.topics.push(topic);
        Ok(())
    }

    /// 追加子领域，id冲突时不做任何修改
    pub fn add_subdomain(&mut self, child: Domain) -> Result<(), KnowledgeError> {
        self.ensure_free(&child.id)?;
        self.subdomains.push(child);
        Ok(())
    }

    fn ensure_free(&self, id: &str) -> Result<(), KnowledgeError> {
        if self.has_child(id) {
            return Err(KnowledgeError::DuplicateId {
                id: id.to_string(),
                parent: self.id.clone(),
            });
        }
        Ok(())
    }

    /// 写入领域摘要，只允许写一次
    pub fn set_summary(&mut self, summary: impl Into<String>) -> Result<(), KnowledgeError> {
        if self.summary.is_some() {
            return Err(KnowledgeError::SummaryAlreadySet {
                id: self.id.clone(),
            });
        }
        let summary = summary.into().trim().to_string();
        if summary.is_empty() {
            return Err(KnowledgeError::EmptyContent {
                id: self.id.clone(),
            });
        }
        self.summary = Some(summary);
        Ok(())
    }

    /// 用生成结果填充占位主题
    pub fn finalize_topic(&mut self, topic_id: &str, body: TopicBody) -> Result<(), KnowledgeError> {
        let parent = self.id.clone();
        let topic = self
            .topics
            .iter_mut()
            .find(|topic| topic.id == topic_id)
            .ok_or_else(|| KnowledgeError::UnknownChild {
                id: topic_id.to_string(),
                parent,
            })?;
        topic.finalize(body)
    }

    /// 深度优先先序收集所有主题及其地址，`base` 为本领域自身的地址
    pub fn collect_topics<'a>(&'a self, base: &Address) -> Vec<(Address, &'a Topic)> {
        let mut collected = Vec::new();
        self.collect_topics_into(base, &mut collected);
        collected
    }

    fn collect_topics_into<'a>(&'a self, base: &Address, out: &mut Vec<(Address, &'a Topic)>) {
        for topic in &self.topics {
            out.push((base.child(&topic.id), topic));
        }
        for child in &self.subdomains {
            child.collect_topics_into(&base.child(&child.id), out);
        }
    }

    /// 已完成主题的数量（含子领域）
    pub fn finalized_topic_count(&self) -> usize {
        self.topics.iter().filter(|topic| topic.is_finalized()).count()
            + self
                .subdomains
                .iter()
                .map(Domain::finalized_topic_count)
                .sum::<usize>()
    }
}

/// 可检索的知识单元
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    id: String,
    name: String,
    content: Option<String>,
    keywords: Vec<String>,
    questions: Vec<String>,
    relations: Vec<Relation>,
}

impl Topic {
    /// 尚未生成内容的占位主题
    pub fn placeholder(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: slugify(&name),
            name,
            content: None,
            keywords: Vec::new(),
            questions: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn placeholder_with_id(
        id: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, KnowledgeError> {
        let id = id.into();
        validate_id(&id)?;
        Ok(Self {
            id,
            name: name.into(),
            content: None,
            keywords: Vec::new(),
            questions: Vec::new(),
            relations: Vec::new(),
        })
    }

    /// 直接构造已完成的主题
    pub fn finalized(name: impl Into<String>, body: TopicBody) -> Result<Self, KnowledgeError> {
        let mut topic = Self::placeholder(name);
        topic.finalize(body)?;
        Ok(topic)
    }

    pub fn finalized_with_id(
        id: impl Into<String>,
        name: impl Into<String>,
        body: TopicBody,
    ) -> Result<Self, KnowledgeError> {
        let mut topic = Self::placeholder_with_id(id, name)?;
        topic.finalize(body)?;
        Ok(topic)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn is_finalized(&self) -> bool {
        self.content.is_some()
    }

    fn finalize(&mut self, body: TopicBody) -> Result<(), KnowledgeError> {
        if self.is_finalized() {
            return Err(KnowledgeError::AlreadyFinalized {
                id: self.id.clone(),
            });
        }
        let content = body.content.trim();
        if content.is_empty() {
            return Err(KnowledgeError::EmptyContent {
                id: self.id.clone(),
            });
        }

        self.content = Some(content.to_string());
        self.keywords = dedup_preserving_order(body.keywords);
        self.questions = body
            .questions
            .into_iter()
            .map(|question| question.trim().to_string())
            .filter(|question| !question.is_empty())
            .collect();
        self.relations = body.relations;
        Ok(())
    }
}

/// 填充主题所需的全部内容
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicBody {
    pub content: String,
    pub keywords: Vec<String>,
    pub questions: Vec<String>,
    pub relations: Vec<Relation>,
}

/// 关系类型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelationKind {
    Prerequisite,
    /// 任意类型标签的相关关系
    Related(String),
}

/// 指向另一节点的关系记录
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: Address,
}

impl Relation {
    pub fn prerequisite(target: Address) -> Self {
        Self {
            kind: RelationKind::Prerequisite,
            target,
        }
    }

    pub fn related(label: impl Into<String>, target: Address) -> Self {
        Self {
            kind: RelationKind::Related(label.into()),
            target,
        }
    }
}

/// 一次生成运行的完整知识库：根领域加运行元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compendium {
    root: Domain,
    description: String,
    generated_at: DateTime<FixedOffset>,
}

impl Compendium {
    pub fn new(root: Domain, description: impl Into<String>) -> Self {
        Self::with_generated_at(root, description, Utc::now().fixed_offset())
    }

    /// 时间戳只保留到秒，与序列化精度一致
    pub fn with_generated_at(
        root: Domain,
        description: impl Into<String>,
        generated_at: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            root,
            description: description.into(),
            generated_at: generated_at.trunc_subsecs(0),
        }
    }

    pub fn root(&self) -> &Domain {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Domain {
        &mut self.root
    }

    pub fn into_root(self) -> Domain {
        self.root
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn generated_at(&self) -> DateTime<FixedOffset> {
        self.generated_at
    }

    /// 根节点自身的地址
    pub fn address(&self) -> Address {
        build_address(&[self.root.id()])
    }
}

impl Deref for Compendium {
    type Target = Domain;

    fn deref(&self) -> &Self::Target {
        &self.root
    }
}

/// id 不能为空，不能包含路径分隔符或空白
pub fn validate_id(id: &str) -> Result<(), KnowledgeError> {
    let reason = if id.is_empty() {
        Some("id must not be empty")
    } else if id.contains('/') {
        Some("id must not contain `/`")
    } else if id.chars().any(char::is_whitespace) {
        Some("id must not contain whitespace")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(KnowledgeError::InvalidId {
            id: id.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && seen.insert(item.clone()))
        .collect()
}
