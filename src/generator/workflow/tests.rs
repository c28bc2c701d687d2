#[cfg(test)]
mod tests {
    use crate::compendium::{Compendium, Domain, Topic, TopicBody, read_document};
    use crate::config::Config;
    use crate::generator::context::GeneratorContext;
    use crate::generator::workflow::{Job, TimingScope, execute, resolve_in_file};
    use crate::llm::{InvokeError, InvokeRequest, InvokeResponse, ResearchBackend};
    use async_trait::async_trait;
    use std::sync::Arc;
    use tempfile::TempDir;

    struct FlutesBackend {
        plan: &'static str,
    }

    #[async_trait]
    impl ResearchBackend for FlutesBackend {
        async fn invoke(&self, request: &InvokeRequest) -> Result<InvokeResponse, InvokeError> {
            let text = match request.label.as_str() {
                "research_areas" => r#"["History"]"#,
                "research_questions" => r#"["How old are flutes?"]"#,
                "plan_topics" => self.plan,
                "generate_topic" => r#"{"content": "Flutes are ancient."}"#,
                _ => "Plain text.",
            };
            Ok(InvokeResponse::text(text))
        }
    }

    fn create_test_context(temp_dir: &TempDir, plan: &'static str) -> GeneratorContext {
        let mut config = Config::default();
        config.output_path = Some(temp_dir.path().join("flutes.xml"));
        config.cache.enabled = false;
        config.llm.retry_delay_ms = 0;
        GeneratorContext::with_backend(config, Arc::new(FlutesBackend { plan }))
    }

    #[test]
    fn test_timing_scope_keeps_phase_order() {
        let mut timing = TimingScope::new();
        timing.start_phase("b");
        timing.end_phase("b");
        timing.start_phase("a");
        timing.end_phase("a");

        let phases: Vec<&str> = timing
            .get_phase_durations()
            .iter()
            .map(|(name, _)| name.as_str())
            .collect();
        assert_eq!(phases, vec!["b", "a"]);
        assert!(timing.end_phase("missing").is_none());
        assert!(timing.generate_timing_report().contains("- a:"));
    }

    #[tokio::test]
    async fn test_execute_create_writes_tree() {
        let temp_dir = TempDir::new().unwrap();
        let context = create_test_context(&temp_dir, r#"["History of Flutes"]"#);

        let path = execute(
            Job::Create {
                domain: "Flutes".to_string(),
            },
            context,
        )
        .await
        .unwrap();

        assert_eq!(path, temp_dir.path().join("flutes.xml"));
        let markup = std::fs::read_to_string(&path).unwrap();
        let compendium = read_document(&markup).unwrap().into_tree().unwrap();
        assert_eq!(compendium.id(), "Flutes");
        assert!(compendium.topic("HistoryOfFlutes").unwrap().is_finalized());
    }

    #[tokio::test]
    async fn test_execute_fatal_writes_partial() {
        let temp_dir = TempDir::new().unwrap();
        let context = create_test_context(&temp_dir, "not a list");

        let result = execute(
            Job::Create {
                domain: "Flutes".to_string(),
            },
            context,
        )
        .await;

        assert!(result.is_err());
        assert!(temp_dir.path().join("flutes.partial.xml").exists());
        assert!(!temp_dir.path().join("flutes.xml").exists());
    }

    #[tokio::test]
    async fn test_resolve_in_file() {
        let temp_dir = TempDir::new().unwrap();
        let mut root = Domain::new("Flutes");
        root.add_topic(
            Topic::finalized(
                "History of Flutes",
                TopicBody {
                    content: "Old.".to_string(),
                    ..TopicBody::default()
                },
            )
            .unwrap(),
        )
        .unwrap();
        let path = temp_dir.path().join("flutes.xml");
        std::fs::write(&path, Compendium::new(root, "Flutes").to_markup_string()).unwrap();

        let found = resolve_in_file(&path, "compendium://Flutes/HistoryOfFlutes")
            .await
            .unwrap();
        assert!(found.starts_with("topic History of Flutes"));

        let root = resolve_in_file(&path, "compendium://Flutes").await.unwrap();
        assert!(root.starts_with("domain Flutes"));

        assert!(resolve_in_file(&path, "compendium://Flutes/Missing").await.is_err());
        assert!(resolve_in_file(&path, "Flutes/HistoryOfFlutes").await.is_err());
    }
}
