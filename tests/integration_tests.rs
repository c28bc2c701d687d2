use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use compendium_scribe::compendium::{
    Compendium, CompendiumPayload, Domain, KnowledgeError, SectionCompendium, build_address,
    parse_address, read_document, resolve,
};
use compendium_scribe::config::Config;
use compendium_scribe::generator::context::GeneratorContext;
use compendium_scribe::generator::executor::{PipelineError, PipelineState, RunStatus, StudyRun};
use compendium_scribe::llm::{InvokeError, InvokeRequest, InvokeResponse, ResearchBackend};

/// 按调用点名称返回预设结果的后端；`generate_topic` 可按主题名单独设置
#[derive(Default)]
struct ScriptedBackend {
    by_label: HashMap<&'static str, Result<String, InvokeError>>,
    by_topic: HashMap<&'static str, Result<String, InvokeError>>,
    calls: AtomicUsize,
    labels: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    fn respond(mut self, label: &'static str, text: &str) -> Self {
        self.by_label.insert(label, Ok(text.to_string()));
        self
    }

    fn fail(mut self, label: &'static str) -> Self {
        self.by_label
            .insert(label, Err(InvokeError::UpstreamError(format!("{} is down", label))));
        self
    }

    fn topic(mut self, name: &'static str, result: Result<String, InvokeError>) -> Self {
        self.by_topic.insert(name, result);
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self, label: &str) -> usize {
        self.labels
            .lock()
            .unwrap()
            .iter()
            .filter(|called| called.as_str() == label)
            .count()
    }
}

#[async_trait]
impl ResearchBackend for ScriptedBackend {
    async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.labels.lock().unwrap().push(request.label.clone());

        if request.label == "generate_topic" {
            for (name, result) in &self.by_topic {
                if request.prompt.contains(&format!("\"{}\"", name)) {
                    return result.clone().map(InvokeResponse::text);
                }
            }
        }
        self.by_label
            .get(request.label.as_str())
            .cloned()
            .unwrap_or_else(|| Err(InvokeError::UpstreamError(format!("unscripted {}", request.label))))
            .map(InvokeResponse::text)
    }
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.cache.enabled = false;
    config.llm.retry_attempts = 2;
    config.llm.retry_delay_ms = 0;
    config.research.questions_per_area = 1;
    config
}

fn flutes_backend() -> ScriptedBackend {
    ScriptedBackend::default()
        .respond("enhance_domain", "Flutes as musical instruments across history")
        .respond("research_areas", r#"["History", "Construction"]"#)
        .respond("research_questions", r#"[{"number": 1, "question": "What matters most?"}]"#)
        .respond("answer_question", "A detailed answer.")
        .respond("plan_topics", r#"["History of Flutes"]"#)
        .respond(
            "generate_topic",
            r#"{"content": "Flutes are among the oldest instruments.", "keywords": ["bone flute", "aerophone"], "questions": ["How old are flutes?"], "prerequisites": []}"#,
        )
        .respond("domain_summary", "A compendium about flutes.")
}

#[tokio::test]
async fn test_flutes_scenario() {
    let backend = Arc::new(flutes_backend());
    let context = GeneratorContext::with_backend(test_config(), backend.clone());

    let outcome = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::Completed);
    assert!(outcome.gaps.is_empty());
    let compendium = &outcome.compendium;
    assert_eq!(compendium.id(), "Flutes");
    assert_eq!(compendium.topics().len(), 1);
    let topic = compendium.topic("HistoryOfFlutes").unwrap();
    assert_eq!(topic.name(), "History of Flutes");
    assert!(!topic.content().unwrap().is_empty());
    assert_eq!(topic.keywords(), ["bone flute", "aerophone"]);
    assert!(topic.relations().is_empty());
    assert_eq!(compendium.summary(), Some("A compendium about flutes."));

    // 两个领域各一个问题
    assert_eq!(backend.count("answer_question"), 2);
    // 摘要在主题完成之后
    let labels = backend.labels.lock().unwrap().clone();
    let summary_at = labels.iter().position(|l| l == "domain_summary").unwrap();
    let topic_at = labels.iter().rposition(|l| l == "generate_topic").unwrap();
    assert!(topic_at < summary_at);
    assert_eq!(outcome.tool_calls as usize, backend.calls());
}

#[tokio::test]
async fn test_one_failed_topic_leaves_n_minus_one() {
    let backend = Arc::new(
        flutes_backend()
            .respond("plan_topics", r#"["Bone Flutes", "Transverse Flutes", "Pan Flutes"]"#)
            .topic(
                "Transverse Flutes",
                Err(InvokeError::UpstreamError("overloaded".into())),
            ),
    );
    let context = GeneratorContext::with_backend(test_config(), backend.clone());

    let outcome = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::CompletedWithGaps);
    assert_eq!(outcome.compendium.topics().len(), 3);
    assert_eq!(outcome.compendium.finalized_topic_count(), 2);
    assert!(!outcome
        .compendium
        .topic("TransverseFlutes")
        .unwrap()
        .is_finalized());
    assert_eq!(outcome.gaps.len(), 1);
    assert_eq!(outcome.gaps[0].stage, PipelineState::TopicsGenerated);
    assert_eq!(outcome.gaps[0].unit, "Transverse Flutes");
    // 失败的主题按重试次数重试
    assert_eq!(backend.count("generate_topic"), 4);
}

#[tokio::test]
async fn test_failed_answer_is_a_gap() {
    let backend = Arc::new(flutes_backend().fail("answer_question"));
    let context = GeneratorContext::with_backend(test_config(), backend);

    let outcome = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::CompletedWithGaps);
    assert_eq!(outcome.gaps.len(), 2);
    assert!(outcome
        .gaps
        .iter()
        .all(|gap| gap.stage == PipelineState::FindingsCollected));
    assert_eq!(outcome.compendium.finalized_topic_count(), 1);
}

#[tokio::test]
async fn test_budget_of_one_call() {
    let backend = Arc::new(flutes_backend());
    let mut config = test_config();
    config.research.max_tool_calls = Some(1);
    let context = GeneratorContext::with_backend(config, backend.clone());

    let outcome = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await
        .unwrap();

    assert_eq!(outcome.status, RunStatus::BudgetExceeded);
    assert_eq!(backend.calls(), 1);
    assert_eq!(outcome.tool_calls, 1);
    assert_eq!(outcome.compendium.id(), "Flutes");
    assert!(outcome.compendium.topics().is_empty());
    assert!(outcome.compendium.summary().is_none());
}

#[tokio::test]
async fn test_area_failure_is_stage_fatal() {
    let backend = Arc::new(flutes_backend().fail("research_areas"));
    let context = GeneratorContext::with_backend(test_config(), backend.clone());

    let result = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await;

    match result {
        Err(PipelineError::StageFatal { stage, partial, .. }) => {
            assert_eq!(stage, PipelineState::AreasEnumerated);
            assert_eq!(partial.id(), "Flutes");
        }
        Err(other) => panic!("unexpected error: {}", other),
        Ok(outcome) => panic!("unexpected success: {:?}", outcome.status),
    }
    // 固定次数的重试，之后不再调用
    assert_eq!(backend.count("research_areas"), 2);
    assert_eq!(backend.count("research_questions"), 0);
}

#[tokio::test]
async fn test_unparsable_area_list_is_stage_fatal() {
    let backend = Arc::new(flutes_backend().respond("research_areas", "History, Construction"));
    let context = GeneratorContext::with_backend(test_config(), backend);

    let result = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await;
    assert!(matches!(
        result,
        Err(PipelineError::StageFatal {
            stage: PipelineState::AreasEnumerated,
            ..
        })
    ));
}

#[tokio::test]
async fn test_deeper_study_attaches_beside_sibling() {
    let mut root = Domain::new("Cell Biology");
    root.add_subdomain(Domain::new("Cell Structure")).unwrap();
    let existing = Compendium::new(root, "Cell Biology");

    let backend = Arc::new(
        flutes_backend()
            .respond("plan_topics", r#"["ATP Production"]"#)
            .respond("generate_topic", r#"{"content": "Mitochondria produce ATP."}"#),
    );
    let context = GeneratorContext::with_backend(test_config(), backend);
    let run = StudyRun::deeper_study(
        context.clone(),
        "Mitochondria",
        existing,
        build_address(&["CellBiology"]),
        None,
    )
    .unwrap();
    let outcome = run.run_to_completion().await.unwrap();

    let ids: Vec<&str> = outcome
        .compendium
        .subdomains()
        .iter()
        .map(|domain| domain.id())
        .collect();
    assert_eq!(ids, vec!["CellStructure", "Mitochondria"]);
    let attached = outcome.attached_at.clone().unwrap();
    let node = resolve(&attached, outcome.compendium.root()).unwrap();
    assert_eq!(node.name(), "Mitochondria");

    // 同名子树再次深入研究会被拒绝
    let again = StudyRun::deeper_study(
        context,
        "Mitochondria",
        outcome.compendium,
        build_address(&["CellBiology"]),
        None,
    );
    assert!(matches!(
        again,
        Err(PipelineError::Knowledge(KnowledgeError::DuplicateId { .. }))
    ));
}

#[tokio::test]
async fn test_generated_tree_round_trips() {
    let backend = Arc::new(
        flutes_backend()
            .respond("plan_topics", r#"["Bone Flutes", "Flute Acoustics"]"#)
            .topic(
                "Bone Flutes",
                Ok(r#"{"content": "Carved <bone> & ivory.", "keywords": ["bone"], "prerequisites": ["Flute Acoustics"]}"#.to_string()),
            ),
    );
    let context = GeneratorContext::with_backend(test_config(), backend);
    let outcome = StudyRun::from_scratch(context, "Flutes")
        .run_to_completion()
        .await
        .unwrap();

    let markup = outcome.compendium.to_markup_string();
    assert_eq!(markup, outcome.compendium.to_markup_string());

    let reread = Compendium::from_markup_str(&markup).unwrap();
    assert_eq!(reread.to_markup_string(), markup);
    assert_eq!(reread, outcome.compendium);
    let bone = reread.topic("BoneFlutes").unwrap();
    assert_eq!(
        bone.relations()[0].target,
        build_address(&["Flutes", "FluteAcoustics"])
    );
}

#[test]
fn test_section_document_round_trips_and_folds() {
    let payload: CompendiumPayload = serde_json::from_str(
        r#"{
            "topic_overview": "Flutes span 40,000 years.",
            "methodology": ["Read museum catalogues"],
            "sections": [{
                "title": "Origins",
                "summary": "The earliest flutes.",
                "key_terms": ["bone flute"],
                "insights": [{"title": "Oldest find", "evidence": "Divje Babe", "citations": ["C01"]}]
            }],
            "citations": [{"title": "Ancient Music", "url": "https://example.org/a", "publisher": "Museum"}],
            "open_questions": ["Was it a flute?"]
        }"#,
    )
    .unwrap();
    let document = SectionCompendium::from_payload("Flutes", payload, None);

    let markup = document.to_markup_string();
    let reread = SectionCompendium::from_markup_str(&markup).unwrap();
    assert_eq!(reread.to_markup_string(), markup);

    let tree = read_document(&markup).unwrap().into_tree().unwrap();
    let origins = tree.topic("Origins").unwrap();
    assert!(origins.content().unwrap().contains("Divje Babe"));
    assert!(origins.content().unwrap().contains("[C01] Ancient Music"));
    assert_eq!(origins.keywords(), ["bone flute"]);
    assert_eq!(tree.summary(), Some("Flutes span 40,000 years."));
}

#[test]
fn test_address_round_trip() {
    let cases: Vec<Vec<&str>> = vec![
        vec!["Flutes"],
        vec!["Flutes", "HistoryOfFlutes"],
        vec!["CellBiology", "CellStructure", "Mitochondria", "AtpProduction"],
        vec!["Ünïcödé", "日本語"],
    ];
    for segments in cases {
        let address = build_address(&segments);
        assert_eq!(parse_address(address.as_str()).unwrap(), segments);
    }
}
