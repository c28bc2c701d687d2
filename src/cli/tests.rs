#[cfg(test)]
mod tests {
    use crate::cli::{Args, Command};
    use crate::config::LLMProvider;
    use crate::generator::workflow::Job;
    use crate::i18n::TargetLanguage;
    use clap::Parser;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_args_requires_subcommand() {
        assert!(Args::try_parse_from(["compendium-scribe"]).is_err());
    }

    #[test]
    fn test_args_create() {
        let args = Args::try_parse_from(["compendium-scribe", "create", "Flutes"]).unwrap();

        assert_eq!(
            args.command,
            Command::Create {
                domain: "Flutes".to_string()
            }
        );
        assert!(!args.verbose);
        assert!(!args.no_cache);
        assert!(args.output.is_none());
    }

    #[test]
    fn test_args_deepen() {
        let args = Args::try_parse_from([
            "compendium-scribe",
            "deepen",
            "Mitochondria",
            "-i",
            "cells.xml",
            "--parent",
            "compendium://CellBiology",
            "--under",
            "CellStructure",
        ])
        .unwrap();

        assert_eq!(
            args.job(),
            Job::Deepen {
                domain: "Mitochondria".to_string(),
                input: PathBuf::from("cells.xml"),
                parent: Some("compendium://CellBiology".to_string()),
                under: Some("CellStructure".to_string()),
            }
        );
    }

    #[test]
    fn test_args_deep_research_and_resolve() {
        let args =
            Args::try_parse_from(["compendium-scribe", "deep-research", "Flutes", "--as-tree"])
                .unwrap();
        assert_eq!(
            args.job(),
            Job::DeepResearch {
                topic: "Flutes".to_string(),
                as_tree: true
            }
        );

        let args = Args::try_parse_from([
            "compendium-scribe",
            "resolve",
            "flutes.xml",
            "compendium://Flutes/HistoryOfFlutes",
        ])
        .unwrap();
        assert_eq!(
            args.job(),
            Job::Resolve {
                input: PathBuf::from("flutes.xml"),
                address: "compendium://Flutes/HistoryOfFlutes".to_string()
            }
        );
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "compendium-scribe",
            "create",
            "Flutes",
            "-v",
            "-o",
            "/tmp/flutes.xml",
            "--llm-provider",
            "anthropic",
            "--model-efficient",
            "small",
            "--model-powerful",
            "large",
            "--model-online",
            "search",
            "--max-tool-calls",
            "12",
            "--max-parallels",
            "5",
            "--target-language",
            "ja",
            "--no-cache",
        ])
        .unwrap();

        let (config, _) = args.resolve_config().unwrap();
        assert!(config.verbose);
        assert_eq!(config.output_path, Some(PathBuf::from("/tmp/flutes.xml")));
        assert_eq!(config.llm.provider, LLMProvider::Anthropic);
        assert_eq!(config.llm.model_efficient, "small");
        assert_eq!(config.llm.model_powerful, "large");
        assert_eq!(config.llm.model_online, "search");
        assert_eq!(config.research.max_tool_calls, Some(12));
        assert_eq!(config.llm.max_parallels, 5);
        assert_eq!(config.target_language, TargetLanguage::Japanese);
        assert!(!config.cache.enabled);
    }

    #[test]
    fn test_unknown_values_keep_defaults() {
        let args = Args::try_parse_from([
            "compendium-scribe",
            "create",
            "Flutes",
            "--llm-provider",
            "invalid",
            "--target-language",
            "klingon",
        ])
        .unwrap();

        let (config, notices) = args.resolve_config().unwrap();
        assert_eq!(config.llm.provider, LLMProvider::OpenAI);
        assert_eq!(config.target_language, TargetLanguage::English);
        assert_eq!(notices.len(), 2);
        assert!(notices[0].contains("invalid"));
        assert!(notices[1].contains("klingon"));
    }

    #[test]
    fn test_verbose_from_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("verbose.toml");
        fs::write(&config_path, "verbose = true\n").unwrap();

        let args = Args::try_parse_from([
            "compendium-scribe",
            "-c",
            config_path.to_str().unwrap(),
            "create",
            "Flutes",
        ])
        .unwrap();

        let (config, notices) = args.resolve_config().unwrap();
        assert!(config.verbose);
        assert!(notices.is_empty());
    }

    #[test]
    fn test_cli_overrides_config_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(
            &config_path,
            "[llm]\nmodel_powerful = \"from-file\"\nmax_parallels = 9\n",
        )
        .unwrap();

        let args = Args::try_parse_from([
            "compendium-scribe",
            "-c",
            config_path.to_str().unwrap(),
            "create",
            "Flutes",
            "--max-parallels",
            "2",
        ])
        .unwrap();

        let (config, _) = args.resolve_config().unwrap();
        assert_eq!(config.llm.model_powerful, "from-file");
        assert_eq!(config.llm.max_parallels, 2);
    }

    #[test]
    fn test_missing_config_file_is_an_error() {
        let args = Args::try_parse_from([
            "compendium-scribe",
            "--config",
            "/definitely/missing/compendium.toml",
            "create",
            "Flutes",
        ])
        .unwrap();

        assert!(args.resolve_config().is_err());
    }
}
