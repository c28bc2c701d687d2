//! 知识树生成的阶段状态机
//!
//! 每一步推进一个阶段，`(state, 中间结果)` 在任意阶段失败后都可以检查。
//! 领域与问题、问题与回答、主题之间相互独立，可以并发；合并只在协调方单线程进行。

use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::compendium::address::normalize_name;
use crate::compendium::{
    Address, Compendium, Domain, KnowledgeError, Relation, Topic, TopicBody, attach_at,
    build_address, resolve, slugify,
};
use crate::generator::context::{CallError, GeneratorContext};
use crate::generator::findings::{ResearchArea, record_answer, render_corpus, start_area};
use crate::generator::parsing::{TopicPayload, parse_string_list, parse_text, parse_topic_payload};
use crate::generator::prompts;
use crate::generator::workflow::TimingScope;
use crate::llm::{InvokeRequest, ResearchTool};
use crate::utils::threads::do_parallel_with_limit;

/// 阶段，只能前进
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PipelineState {
    Init,
    DomainEnhanced,
    AreasEnumerated,
    FindingsCollected,
    TopicsPlanned,
    TopicsGenerated,
    SummaryGenerated,
    Attached,
    Done,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Init => "init",
            PipelineState::DomainEnhanced => "domain_enhanced",
            PipelineState::AreasEnumerated => "areas_enumerated",
            PipelineState::FindingsCollected => "findings_collected",
            PipelineState::TopicsPlanned => "topics_planned",
            PipelineState::TopicsGenerated => "topics_generated",
            PipelineState::SummaryGenerated => "summary_generated",
            PipelineState::Attached => "attached",
            PipelineState::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// 单个问题或主题的失败，记录为缺口后继续
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    pub stage: PipelineState,
    pub unit: String,
    pub reason: String,
}

impl std::fmt::Display for UnitFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.stage, self.unit, self.reason)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    CompletedWithGaps,
    /// 预算耗尽，结果为截至当时已完成的部分
    BudgetExceeded,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("stage `{stage}` failed: {reason}")]
    StageFatal {
        stage: PipelineState,
        reason: String,
        partial: Box<Compendium>,
    },

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),
}

pub enum StudyMode {
    FromScratch,
    /// 在已有知识树的 `parent`（或其子领域 `under`）下研究新的子领域
    DeeperStudy {
        existing: Compendium,
        parent: Address,
        under: Option<String>,
    },
}

#[derive(Debug)]
pub struct RunOutcome {
    pub compendium: Compendium,
    pub status: RunStatus,
    pub gaps: Vec<UnitFailure>,
    /// 深入研究时新子树的地址
    pub attached_at: Option<Address>,
    pub tool_calls: u32,
    pub timing_report: String,
}

/// 一次知识树生成运行
pub struct StudyRun {
    context: GeneratorContext,
    domain: String,
    mode: StudyMode,
    state: PipelineState,
    enhanced: Option<String>,
    areas: Vec<String>,
    findings: Vec<ResearchArea>,
    subtree: Domain,
    /// 深入研究时可作为前置知识的祖先主题（地址, 名称）
    ancestor_topics: Vec<(Address, String)>,
    parent_context: Option<String>,
    gaps: Vec<UnitFailure>,
    budget_exceeded: bool,
    attached_at: Option<Address>,
    timing: TimingScope,
}

impl StudyRun {
    pub fn from_scratch(context: GeneratorContext, domain: impl Into<String>) -> Self {
        Self::build(context, domain.into(), StudyMode::FromScratch, Vec::new(), None)
    }

    /// 深入研究。父领域地址与挂载位置在任何调用之前校验。
    pub fn deeper_study(
        context: GeneratorContext,
        domain: impl Into<String>,
        existing: Compendium,
        parent: Address,
        under: Option<String>,
    ) -> Result<Self, PipelineError> {
        let domain = domain.into();
        let subtree_id = slugify(&domain);

        let target_address = match &under {
            Some(child_id) => parent.child(child_id),
            None => parent.clone(),
        };
        let target = resolve(&target_address, existing.root())?
            .as_domain()
            .ok_or_else(|| KnowledgeError::UnresolvedAddress {
                address: target_address.to_string(),
                root: existing.id().to_string(),
            })?;
        if target.has_child(&subtree_id) {
            return Err(KnowledgeError::DuplicateId {
                id: subtree_id,
                parent: target.id().to_string(),
            }
            .into());
        }

        let parent_context = describe_domain(target);
        let ancestor_topics = ancestor_topics(&existing, &target_address);
        let mode = StudyMode::DeeperStudy {
            existing,
            parent,
            under,
        };
        Ok(Self::build(
            context,
            domain,
            mode,
            ancestor_topics,
            Some(parent_context),
        ))
    }

    fn build(
        context: GeneratorContext,
        domain: String,
        mode: StudyMode,
        ancestor_topics: Vec<(Address, String)>,
        parent_context: Option<String>,
    ) -> Self {
        let subtree = Domain::new(domain.clone());
        Self {
            context,
            domain,
            mode,
            state: PipelineState::Init,
            enhanced: None,
            areas: Vec::new(),
            findings: Vec::new(),
            subtree,
            ancestor_topics,
            parent_context,
            gaps: Vec::new(),
            budget_exceeded: false,
            attached_at: None,
            timing: TimingScope::new(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// 正在构建的子树
    pub fn subtree(&self) -> &Domain {
        &self.subtree
    }

    pub fn enhanced_description(&self) -> Option<&str> {
        self.enhanced.as_deref()
    }

    pub fn areas(&self) -> &[String] {
        &self.areas
    }

    pub fn findings(&self) -> &[ResearchArea] {
        &self.findings
    }

    pub fn gaps(&self) -> &[UnitFailure] {
        &self.gaps
    }

    pub fn is_budget_exceeded(&self) -> bool {
        self.budget_exceeded
    }

    fn described_domain(&self) -> &str {
        self.enhanced.as_deref().unwrap_or(&self.domain)
    }

    fn is_deeper_study(&self) -> bool {
        matches!(self.mode, StudyMode::DeeperStudy { .. })
    }

    /// 推进一个阶段，返回新的状态
    pub async fn step(&mut self) -> Result<PipelineState, PipelineError> {
        if self.state == PipelineState::Done {
            return Ok(self.state);
        }

        let next = if self.budget_exceeded && self.state < PipelineState::SummaryGenerated {
            // 预算耗尽后不再发出调用，直接收尾
            if self.is_deeper_study() {
                self.attach()?;
                PipelineState::Attached
            } else {
                PipelineState::Done
            }
        } else {
            let current = self.state;
            let phase = current.to_string();
            self.timing.start_phase(&phase);
            let next = match current {
                PipelineState::Init => {
                    self.enhance_domain().await;
                    PipelineState::DomainEnhanced
                }
                PipelineState::DomainEnhanced => {
                    self.enumerate_areas().await?;
                    PipelineState::AreasEnumerated
                }
                PipelineState::AreasEnumerated => {
                    self.collect_findings().await;
                    PipelineState::FindingsCollected
                }
                PipelineState::FindingsCollected => {
                    self.plan_topics().await?;
                    PipelineState::TopicsPlanned
                }
                PipelineState::TopicsPlanned => {
                    self.generate_topics().await;
                    PipelineState::TopicsGenerated
                }
                PipelineState::TopicsGenerated => {
                    self.generate_summary().await;
                    PipelineState::SummaryGenerated
                }
                PipelineState::SummaryGenerated if self.is_deeper_study() => {
                    self.attach()?;
                    PipelineState::Attached
                }
                PipelineState::SummaryGenerated | PipelineState::Attached | PipelineState::Done => {
                    PipelineState::Done
                }
            };
            self.timing.end_phase(&phase);
            next
        };

        self.state = next;
        Ok(next)
    }

    pub async fn run_to_completion(mut self) -> Result<RunOutcome, PipelineError> {
        while self.state != PipelineState::Done {
            self.step().await?;
        }

        let status = if self.budget_exceeded {
            RunStatus::BudgetExceeded
        } else if !self.gaps.is_empty() {
            RunStatus::CompletedWithGaps
        } else {
            RunStatus::Completed
        };
        let tool_calls = self.context.budget().used();
        let timing_report = self.timing.generate_timing_report();
        let compendium = match self.mode {
            StudyMode::DeeperStudy { existing, .. } => existing,
            StudyMode::FromScratch => Compendium::new(self.subtree, self.domain),
        };

        Ok(RunOutcome {
            compendium,
            status,
            gaps: self.gaps,
            attached_at: self.attached_at,
            tool_calls,
            timing_report,
        })
    }

    fn record_gap(&mut self, stage: PipelineState, unit: &str, error: &CallError) {
        if error.is_budget() {
            self.budget_exceeded = true;
            return;
        }
        warn!("⚠️ [{}] {} 失败，已跳过: {}", stage, unit, error);
        self.gaps.push(UnitFailure {
            stage,
            unit: unit.to_string(),
            reason: error.to_string(),
        });
    }

    fn fatal(&self, stage: PipelineState, reason: impl Into<String>) -> PipelineError {
        let partial = match &self.mode {
            StudyMode::DeeperStudy { existing, .. } => existing.clone(),
            StudyMode::FromScratch => Compendium::new(self.subtree.clone(), self.domain.clone()),
        };
        PipelineError::StageFatal {
            stage,
            reason: reason.into(),
            partial: Box::new(partial),
        }
    }

    fn request(&self, label: &str, prompt: String) -> InvokeRequest {
        InvokeRequest::new(label, prompts::RESEARCHER_SYSTEM_PROMPT, prompt)
    }

    /// 扩写失败时沿用原描述
    async fn enhance_domain(&mut self) {
        info!("🔎 正在扩写领域描述: {}", self.domain);
        let language = &self.context.config.target_language;
        let request = self.request("enhance_domain", prompts::enhance_domain(&self.domain, language));

        match self.context.call(request, parse_text).await {
            Ok(enhanced) => {
                info!("✅ 领域描述: {}", enhanced);
                self.enhanced = Some(enhanced);
            }
            Err(e) => {
                let domain = self.domain.clone();
                self.record_gap(PipelineState::DomainEnhanced, &domain, &e);
            }
        }
    }

    async fn enumerate_areas(&mut self) -> Result<(), PipelineError> {
        let language = &self.context.config.target_language;
        let prompt = prompts::research_areas(
            self.described_domain(),
            self.parent_context.as_deref(),
            language,
        );
        let request = self.request("research_areas", prompt);

        match self.context.call(request, parse_string_list).await {
            Ok(areas) if areas.is_empty() => Err(self.fatal(
                PipelineState::AreasEnumerated,
                "no research areas were returned",
            )),
            Ok(areas) => {
                info!("📋 发现{}个研究领域：{}", areas.len(), areas.join("、"));
                self.areas = areas;
                Ok(())
            }
            Err(e) if e.is_budget() => {
                self.budget_exceeded = true;
                Ok(())
            }
            Err(e) => Err(self.fatal(PipelineState::AreasEnumerated, e.to_string())),
        }
    }

    async fn collect_findings(&mut self) {
        let max_parallels = self.context.config.llm.max_parallels;
        info!(
            "🚀 开始收集{}个研究领域的资料，最大并发数：{}",
            self.areas.len(),
            max_parallels
        );

        let domain = self.described_domain().to_string();
        let context = &self.context;
        let area_futures: Vec<_> = self
            .areas
            .iter()
            .map(|area| research_area(context, &domain, area))
            .collect();
        let outcomes = do_parallel_with_limit(area_futures, max_parallels).await;

        for (area, failures) in outcomes {
            for (unit, error) in failures {
                self.record_gap(PipelineState::FindingsCollected, &unit, &error);
            }
            info!(
                "✅ 研究领域：{} 收集到{}条问答",
                area.name(),
                area.findings().len()
            );
            self.findings.push(area);
        }
    }

    async fn plan_topics(&mut self) -> Result<(), PipelineError> {
        let corpus = render_corpus(&self.findings);
        let language = &self.context.config.target_language;
        let request = self
            .request(
                "plan_topics",
                prompts::plan_topics(self.described_domain(), &corpus, language),
            )
            .powerful();

        let names = match self.context.call(request, parse_string_list).await {
            Ok(names) if names.is_empty() => {
                return Err(self.fatal(PipelineState::TopicsPlanned, "no topics were planned"));
            }
            Ok(names) => names,
            Err(e) if e.is_budget() => {
                self.budget_exceeded = true;
                return Ok(());
            }
            Err(e) => return Err(self.fatal(PipelineState::TopicsPlanned, e.to_string())),
        };

        for name in names {
            if let Err(e) = self.subtree.add_topic(Topic::placeholder(name.clone())) {
                warn!("⚠️ 主题 {} 重复，已跳过: {}", name, e);
                self.gaps.push(UnitFailure {
                    stage: PipelineState::TopicsPlanned,
                    unit: name,
                    reason: e.to_string(),
                });
            }
        }
        info!("📋 规划了{}个主题", self.subtree.topics().len());
        Ok(())
    }

    async fn generate_topics(&mut self) {
        let corpus = render_corpus(&self.findings);
        let domain = self.described_domain().to_string();
        let max_parallels = self.context.config.llm.max_parallels;
        let placeholders: Vec<(String, String)> = self
            .subtree
            .topics()
            .iter()
            .map(|topic| (topic.id().to_string(), topic.name().to_string()))
            .collect();
        let names: Vec<String> = placeholders.iter().map(|(_, name)| name.clone()).collect();

        let context = &self.context;
        let topic_futures: Vec<_> = placeholders
            .iter()
            .map(|(_, name)| {
                let siblings: Vec<String> = names
                    .iter()
                    .filter(|other| *other != name)
                    .cloned()
                    .collect();
                let prompt = prompts::generate_topic(
                    &domain,
                    name,
                    &corpus,
                    &siblings,
                    &context.config.target_language,
                );
                let request =
                    InvokeRequest::new("generate_topic", prompts::RESEARCHER_SYSTEM_PROMPT, prompt)
                        .powerful();
                async move { context.call(request, parse_topic_payload).await }
            })
            .collect();
        let results = do_parallel_with_limit(topic_futures, max_parallels).await;

        for ((id, name), result) in placeholders.into_iter().zip(results) {
            let payload = match result {
                Ok(payload) => payload,
                Err(e) => {
                    self.record_gap(PipelineState::TopicsGenerated, &name, &e);
                    continue;
                }
            };
            let body = self.topic_body(&id, payload);
            if let Err(e) = self.subtree.finalize_topic(&id, body) {
                warn!("⚠️ 主题 {} 无法写入: {}", name, e);
                self.gaps.push(UnitFailure {
                    stage: PipelineState::TopicsGenerated,
                    unit: name,
                    reason: e.to_string(),
                });
            } else {
                info!("✅ 主题：{} 生成完成", name);
            }
        }
    }

    /// 前置主题按规范化名称匹配兄弟主题或祖先主题，匹配不到的丢弃
    fn topic_body(&self, topic_id: &str, payload: TopicPayload) -> TopicBody {
        let mut relations: Vec<Relation> = Vec::new();
        let mut seen = HashSet::new();

        for prerequisite in &payload.prerequisites {
            let wanted = normalize_name(prerequisite);
            let sibling = self
                .subtree
                .topics()
                .iter()
                .find(|topic| topic.id() != topic_id && normalize_name(topic.name()) == wanted)
                .map(|topic| build_address(&[self.subtree.id(), topic.id()]));
            let target = sibling.or_else(|| {
                self.ancestor_topics
                    .iter()
                    .find(|(_, name)| normalize_name(name) == wanted)
                    .map(|(address, _)| address.clone())
            });

            match target {
                Some(target) if seen.insert(target.clone()) => {
                    relations.push(Relation::prerequisite(target));
                }
                Some(_) => {}
                None => debug!("🔗 未匹配的前置主题已丢弃: {}", prerequisite),
            }
        }

        TopicBody {
            content: payload.content,
            keywords: payload.keywords,
            questions: payload.questions,
            relations,
        }
    }

    /// 只在全部主题完成后执行，输入为已完成主题的正文
    async fn generate_summary(&mut self) {
        let contents: Vec<String> = self
            .subtree
            .topics()
            .iter()
            .filter_map(|topic| {
                topic
                    .content()
                    .map(|content| format!("## {}\n{}", topic.name(), content))
            })
            .collect();
        let domain = self.domain.clone();
        if contents.is_empty() {
            warn!("⚠️ 没有已完成的主题，跳过领域摘要");
            self.gaps.push(UnitFailure {
                stage: PipelineState::SummaryGenerated,
                unit: domain,
                reason: "no finalized topics to summarize".to_string(),
            });
            return;
        }

        let language = &self.context.config.target_language;
        let request = self.request(
            "domain_summary",
            prompts::domain_summary(self.described_domain(), &contents.join("\n\n"), language),
        );
        match self.context.call(request, parse_text).await {
            Ok(summary) => {
                if let Err(e) = self.subtree.set_summary(summary) {
                    warn!("⚠️ 领域摘要无法写入: {}", e);
                    self.gaps.push(UnitFailure {
                        stage: PipelineState::SummaryGenerated,
                        unit: domain,
                        reason: e.to_string(),
                    });
                } else {
                    info!("✅ 领域摘要生成完成");
                }
            }
            Err(e) => self.record_gap(PipelineState::SummaryGenerated, &domain, &e),
        }
    }

    fn attach(&mut self) -> Result<(), PipelineError> {
        if let StudyMode::DeeperStudy {
            existing,
            parent,
            under,
        } = &mut self.mode
        {
            let address = attach_at(existing, parent, self.subtree.clone(), under.as_deref())?;
            info!("🔗 新子领域已挂载到 {}", address);
            self.attached_at = Some(address);
        }
        Ok(())
    }
}

/// 一个研究领域：生成问题后逐个联网回答，返回资料与失败的单元
async fn research_area(
    context: &GeneratorContext,
    domain: &str,
    area_name: &str,
) -> (ResearchArea, Vec<(String, CallError)>) {
    let mut area = start_area(area_name);
    let mut failures = Vec::new();
    let language = &context.config.target_language;

    let request = InvokeRequest::new(
        "research_questions",
        prompts::RESEARCHER_SYSTEM_PROMPT,
        prompts::research_questions(
            domain,
            area_name,
            context.config.research.questions_per_area,
            language,
        ),
    );
    let questions = match context.call(request, parse_string_list).await {
        Ok(questions) => questions,
        Err(e) => {
            failures.push((area_name.to_string(), e));
            return (area, failures);
        }
    };

    let answer_futures: Vec<_> = questions
        .iter()
        .map(|question| {
            let request = InvokeRequest::new(
                "answer_question",
                prompts::ONLINE_RESEARCHER_SYSTEM_PROMPT,
                prompts::answer_question(question, language),
            )
            .with_tools(&[ResearchTool::WebSearch]);
            async move { context.call(request, parse_text).await }
        })
        .collect();
    let answers = do_parallel_with_limit(answer_futures, context.config.llm.max_parallels).await;

    for (question, answer) in questions.into_iter().zip(answers) {
        match answer {
            Ok(answer) => record_answer(&mut area, question, answer),
            Err(e) => failures.push((question, e)),
        }
    }
    (area, failures)
}

/// 父领域已有的知识，作为深入研究的上下文
fn describe_domain(domain: &Domain) -> String {
    let mut text = format!("# {}\n", domain.name());
    if let Some(summary) = domain.summary() {
        text.push_str(&format!("\n{}\n", summary));
    }
    for topic in domain.topics() {
        if let Some(content) = topic.content() {
            text.push_str(&format!("\n## {}\n{}\n", topic.name(), content));
        }
    }
    text
}

/// 从根到 `target` 路径上每个领域的直接主题
fn ancestor_topics(existing: &Compendium, target: &Address) -> Vec<(Address, String)> {
    let mut collected = Vec::new();
    let mut domain = existing.root();
    let mut address = existing.address();
    let segments = target.segments();

    for segment in segments.iter().skip(1).map(Some).chain(std::iter::once(None)) {
        for topic in domain.topics() {
            collected.push((address.child(topic.id()), topic.name().to_string()));
        }
        let Some(segment) = segment else { break };
        match domain.subdomain(segment) {
            Some(child) => {
                domain = child;
                address = address.child(segment);
            }
            None => break,
        }
    }
    collected
}
