use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::i18n::TargetLanguage;

/// 未指定时尝试加载的配置文件
pub const DEFAULT_CONFIG_FILE: &str = "compendium.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 输出文件路径，未指定时按主题名与时间生成
    pub output_path: Option<PathBuf>,

    /// 生成内容的目标语言
    pub target_language: TargetLanguage,

    /// 是否启用详细日志
    pub verbose: bool,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 研究流程配置
    pub research: ResearchConfig,

    /// 缓存配置
    pub cache: CacheConfig,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，用于领域扩写、研究领域与问题生成、摘要
    pub model_efficient: String,

    /// 高质量模型，用于主题规划、主题生成与深度研究
    pub model_powerful: String,

    /// 联网检索服务的API KEY
    pub online_api_key: String,

    /// 联网检索服务的基地址（OpenAI兼容）
    pub online_api_base_url: String,

    /// 回答研究问题的联网模型
    pub model_online: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 每个调用点的最大尝试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,

    /// 单次调用超时时间（秒）
    pub timeout_seconds: u64,

    /// 同时进行中的外部调用上限
    pub max_parallels: usize,
}

/// 研究流程配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 每个研究领域生成的问题数量
    pub questions_per_area: usize,

    /// 整次运行的工具调用预算，未设置时不限制
    pub max_tool_calls: Option<u32>,

    /// 深度研究前是否先生成研究蓝图
    pub use_prompt_refinement: bool,

    /// 深度研究是否携带联网检索工具
    pub use_web_search: bool,

    /// 深度研究是否携带代码解释器工具
    pub enable_code_interpreter: bool,

    /// 深度研究是否以后台任务方式运行
    pub background: bool,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    /// 缓存目录
    pub cache_dir: PathBuf,

    /// 缓存过期时间（小时）
    pub expire_hours: u64,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 显式路径优先，其次当前目录下的默认配置文件，都没有时使用默认值
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        let default_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            Self::from_file(&default_path)
        } else {
            Ok(Config::default())
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: None,
            target_language: TargetLanguage::default(),
            verbose: false,
            llm: LLMConfig::default(),
            research: ResearchConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model_efficient: String::from("gpt-4o-mini"),
            model_powerful: String::from("gpt-4o"),
            online_api_key: std::env::var("PERPLEXITY_API_KEY").unwrap_or_default(),
            online_api_base_url: String::from("https://api.perplexity.ai"),
            model_online: String::from("sonar-pro"),
            max_tokens: 4096,
            temperature: 0.7,
            retry_attempts: 3,
            retry_delay_ms: 2000,
            timeout_seconds: 300,
            max_parallels: 3,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            questions_per_area: 10,
            max_tool_calls: None,
            use_prompt_refinement: true,
            use_web_search: true,
            enable_code_interpreter: true,
            background: true,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_dir: PathBuf::from(".compendium/cache"),
            expire_hours: 8760,
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
