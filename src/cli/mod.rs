use crate::config::{Config, LLMProvider};
use crate::generator::workflow::Job;
use crate::i18n::TargetLanguage;
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Compendium Scribe - 由LLM驱动的可检索知识库生成引擎
#[derive(Parser, Debug)]
#[command(name = "compendium-scribe")]
#[command(
    about = "Builds retrieval-oriented knowledge compendiums about a subject through a multi-stage research pipeline, and writes them as addressable Domain/Topic documents."
)]
#[command(version)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// 配置文件路径
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// 输出文件路径
    #[arg(short, long, global = true)]
    pub output: Option<PathBuf>,

    /// 目标语言 (en, zh, ja, ko, de, fr, ru)
    #[arg(long, global = true)]
    pub target_language: Option<String>,

    /// LLM Provider (openai, anthropic, ollama)
    #[arg(long, global = true)]
    pub llm_provider: Option<String>,

    /// LLM API KEY
    #[arg(long, global = true)]
    pub llm_api_key: Option<String>,

    /// LLM API基地址
    #[arg(long, global = true)]
    pub llm_api_base_url: Option<String>,

    /// 高能效模型，用于常规推理
    #[arg(long, global = true)]
    pub model_efficient: Option<String>,

    /// 高质量模型，用于主题规划、主题生成与深度研究
    #[arg(long, global = true)]
    pub model_powerful: Option<String>,

    /// 联网检索模型，用于回答研究问题
    #[arg(long, global = true)]
    pub model_online: Option<String>,

    /// 整次运行的工具调用预算
    #[arg(long, global = true)]
    pub max_tool_calls: Option<u32>,

    /// 同时进行中的外部调用上限
    #[arg(long, global = true)]
    pub max_parallels: Option<usize>,

    /// 是否禁用缓存
    #[arg(long, global = true)]
    pub no_cache: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 从零生成一个领域的知识树
    Create {
        /// 领域描述
        domain: String,
    },
    /// 在已有知识树的领域下深入研究一个子领域
    Deepen {
        /// 子领域描述
        domain: String,
        /// 已有的知识树文档
        #[arg(short, long)]
        input: PathBuf,
        /// 父领域地址，默认为根领域
        #[arg(short, long)]
        parent: Option<String>,
        /// 挂载到父领域下的这个子领域
        #[arg(short, long)]
        under: Option<String>,
    },
    /// 一次深度研究调用，生成带引用的章节文档
    DeepResearch {
        /// 研究主题
        topic: String,
        /// 折叠为知识树后输出
        #[arg(long)]
        as_tree: bool,
    },
    /// 在已有文档中解析地址
    Resolve {
        /// 知识树文档
        input: PathBuf,
        /// 形如 compendium://Root/Topic 的地址
        address: String,
    },
}

impl Args {
    /// 将CLI参数转换为配置，命令行参数覆盖配置文件。
    ///
    /// 无法识别的参数值保留原配置，并作为提示返回，由调用方在日志初始化之后输出。
    pub fn resolve_config(&self) -> Result<(Config, Vec<String>)> {
        let mut config = Config::load(self.config.as_deref())?;
        let mut notices = Vec::new();

        if let Some(output) = &self.output {
            config.output_path = Some(output.clone());
        }

        // 覆盖LLM配置
        if let Some(provider_str) = &self.llm_provider {
            match provider_str.parse::<LLMProvider>() {
                Ok(provider) => config.llm.provider = provider,
                Err(_) => notices.push(format!(
                    "⚠️ 警告: 未知的provider: {}，使用{}",
                    provider_str, config.llm.provider
                )),
            }
        }
        if let Some(llm_api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url.clone();
        }
        if let Some(llm_api_key) = &self.llm_api_key {
            config.llm.api_key = llm_api_key.clone();
        }
        if let Some(model_efficient) = &self.model_efficient {
            config.llm.model_efficient = model_efficient.clone();
        }
        if let Some(model_powerful) = &self.model_powerful {
            config.llm.model_powerful = model_powerful.clone();
        }
        if let Some(model_online) = &self.model_online {
            config.llm.model_online = model_online.clone();
        }
        if let Some(max_parallels) = self.max_parallels {
            config.llm.max_parallels = max_parallels;
        }
        if let Some(max_tool_calls) = self.max_tool_calls {
            config.research.max_tool_calls = Some(max_tool_calls);
        }

        // 目标语言配置
        if let Some(target_language_str) = &self.target_language {
            match target_language_str.parse::<TargetLanguage>() {
                Ok(target_language) => config.target_language = target_language,
                Err(_) => notices.push(format!(
                    "⚠️ 警告: 未知的目标语言: {}，使用{}",
                    target_language_str,
                    config.target_language.display_name()
                )),
            }
        }

        // 缓存配置
        if self.no_cache {
            config.cache.enabled = false;
        }
        if self.verbose {
            config.verbose = true;
        }

        Ok((config, notices))
    }

    pub fn job(&self) -> Job {
        match self.command.clone() {
            Command::Create { domain } => Job::Create { domain },
            Command::Deepen {
                domain,
                input,
                parent,
                under,
            } => Job::Deepen {
                domain,
                input,
                parent,
                under,
            },
            Command::DeepResearch { topic, as_tree } => Job::DeepResearch { topic, as_tree },
            Command::Resolve { input, address } => Job::Resolve { input, address },
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
