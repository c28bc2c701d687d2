#[cfg(test)]
mod tests {
    use crate::config::{CacheConfig, Config, LLMConfig, LLMProvider, ResearchConfig};
    use crate::i18n::TargetLanguage;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.output_path.is_none());
        assert_eq!(config.target_language, TargetLanguage::English);
        assert!(!config.verbose);
    }

    #[test]
    fn test_llm_provider_default() {
        let provider = LLMProvider::default();
        assert_eq!(provider, LLMProvider::OpenAI);
    }

    #[test]
    fn test_llm_provider_from_str() {
        assert_eq!(
            "openai".parse::<LLMProvider>().unwrap(),
            LLMProvider::OpenAI
        );
        assert_eq!(
            "Anthropic".parse::<LLMProvider>().unwrap(),
            LLMProvider::Anthropic
        );
        assert_eq!(
            "ollama".parse::<LLMProvider>().unwrap(),
            LLMProvider::Ollama
        );

        assert!("invalid".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_llm_provider_display() {
        assert_eq!(LLMProvider::OpenAI.to_string(), "openai");
        assert_eq!(LLMProvider::Anthropic.to_string(), "anthropic");
        assert_eq!(LLMProvider::Ollama.to_string(), "ollama");
    }

    #[test]
    fn test_llm_config_default() {
        let config = LLMConfig::default();

        assert_eq!(config.provider, LLMProvider::OpenAI);
        // api_key may be empty if env var is not set
        assert!(!config.api_base_url.is_empty());
        assert!(!config.model_efficient.is_empty());
        assert!(!config.model_powerful.is_empty());
        assert!(!config.model_online.is_empty());
        assert_eq!(config.online_api_base_url, "https://api.perplexity.ai");
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.max_parallels, 3);
    }

    #[test]
    fn test_research_config_default() {
        let config = ResearchConfig::default();

        assert_eq!(config.questions_per_area, 10);
        assert!(config.max_tool_calls.is_none());
        assert!(config.use_prompt_refinement);
        assert!(config.use_web_search);
    }

    #[test]
    fn test_cache_config_default() {
        let config = CacheConfig::default();

        assert!(config.enabled);
        assert_eq!(config.cache_dir, PathBuf::from(".compendium/cache"));
        assert_eq!(config.expire_hours, 8760); // 1 year
    }

    #[test]
    fn test_config_from_partial_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("compendium.toml");
        fs::write(
            &config_path,
            r#"
target_language = "de"

[llm]
provider = "anthropic"
model_powerful = "claude-large"
max_parallels = 8

[research]
max_tool_calls = 40
questions_per_area = 4
"#,
        )
        .unwrap();

        let config = Config::from_file(&config_path).unwrap();

        assert_eq!(config.target_language, TargetLanguage::German);
        assert_eq!(config.llm.provider, LLMProvider::Anthropic);
        assert_eq!(config.llm.model_powerful, "claude-large");
        assert_eq!(config.llm.max_parallels, 8);
        // 未出现的字段使用默认值
        assert_eq!(config.llm.retry_attempts, 3);
        assert_eq!(config.research.max_tool_calls, Some(40));
        assert_eq!(config.research.questions_per_area, 4);
        assert!(config.cache.enabled);
    }

    #[test]
    fn test_config_from_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::from_file(&temp_dir.path().join("missing.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_invalid_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.toml");
        fs::write(&config_path, "[llm\nprovider = ").unwrap();

        assert!(Config::from_file(&config_path).is_err());
    }

    #[test]
    fn test_load_explicit_path() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("custom.toml");
        fs::write(&config_path, "verbose = true\n").unwrap();

        let config = Config::load(Some(&config_path)).unwrap();
        assert!(config.verbose);
    }
}
