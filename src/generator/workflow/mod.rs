use crate::compendium::{Address, Compendium, Document, NodeRef, read_document, resolve};
use crate::config::Config;
use crate::generator::context::GeneratorContext;
use crate::generator::deep_research::run_deep_research;
use crate::generator::executor::{PipelineError, RunOutcome, RunStatus, StudyRun};
use crate::generator::outlet::{DiskOutlet, Outlet, default_output_path, partial_output_path};
use crate::llm::LLMClient;

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use uuid::Uuid;

/// 时间跟踪作用域，阶段按开始顺序报告
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: Vec<(String, Instant)>,
    phase_durations: Vec<(String, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: Vec::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .push((phase_name.to_string(), Instant::now()));
    }

    /// 结束一个阶段的计时
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let index = self
            .phase_start_times
            .iter()
            .position(|(name, _)| name == phase_name)?;
        let (name, start_time) = self.phase_start_times.remove(index);
        let duration = start_time.elapsed();
        self.phase_durations.push((name, duration));
        Some(duration)
    }

    /// 获取总执行时间
    pub fn get_total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 获取所有阶段的执行时间
    pub fn get_phase_durations(&self) -> &[(String, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.get_total_duration().as_secs_f64()
        );

        if !self.phase_durations.is_empty() {
            report.push_str("\n各阶段执行时间:\n");
            for (phase, duration) in &self.phase_durations {
                report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
            }
        }

        report
    }
}

/// 一次命令行请求
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// 从零生成知识树
    Create { domain: String },
    /// 在已有知识树的某个领域下深入研究
    Deepen {
        domain: String,
        input: PathBuf,
        parent: Option<String>,
        under: Option<String>,
    },
    /// 深度研究，输出章节文档或折叠后的知识树
    DeepResearch { topic: String, as_tree: bool },
    /// 在已有文档中解析地址
    Resolve { input: PathBuf, address: String },
}

/// 启动一次请求
pub async fn launch(job: Job, config: &Config) -> Result<()> {
    if let Job::Resolve { input, address } = &job {
        let description = resolve_in_file(input, address).await?;
        println!("{}", description);
        return Ok(());
    }

    let client = LLMClient::new(&config.llm)?;
    // 启动时检查模型连接
    client.check_connection().await?;

    let context = GeneratorContext::with_backend(config.clone(), Arc::new(client));
    execute(job, context).await.map(|_| ())
}

/// 执行生成类请求，返回输出文件路径
pub async fn execute(job: Job, context: GeneratorContext) -> Result<PathBuf> {
    let run_id = Uuid::new_v4();
    info!("🚀 运行开始 run_id={}", run_id);
    let mut timing = TimingScope::new();

    let (document, name) = match job {
        Job::Create { domain } => {
            let run = StudyRun::from_scratch(context.clone(), domain.clone());
            let compendium = finish_study(run.run_to_completion().await, &context, &domain).await?;
            (Document::Tree(compendium), domain)
        }
        Job::Deepen {
            domain,
            input,
            parent,
            under,
        } => {
            let existing = load_tree(&input).await?;
            let parent = match parent {
                Some(parent) => parent.parse::<Address>()?,
                None => existing.address(),
            };
            let name = existing.name().to_string();
            let run = StudyRun::deeper_study(context.clone(), domain, existing, parent, under)?;
            let compendium = finish_study(run.run_to_completion().await, &context, &name).await?;
            (Document::Tree(compendium), name)
        }
        Job::DeepResearch { topic, as_tree } => {
            let sections = run_deep_research(&context, &topic).await?;
            let document = if as_tree {
                Document::Tree(sections.fold_into_compendium()?)
            } else {
                Document::Sections(sections)
            };
            (document, topic)
        }
        Job::Resolve { .. } => return Err(anyhow!("resolve does not produce a document")),
    };

    timing.start_phase("output");
    let path = output_path(&context.config, &name);
    let saved = DiskOutlet::new(path).save(&document).await?;
    timing.end_phase("output");

    info!(
        "🎉 运行完成 run_id={}，共{}次外部调用\n{}",
        run_id,
        context.budget().used(),
        timing.generate_timing_report()
    );
    Ok(saved)
}

fn output_path(config: &Config, name: &str) -> PathBuf {
    config
        .output_path
        .clone()
        .unwrap_or_else(|| default_output_path(name, Local::now()))
}

/// 汇报运行结果；致命失败时先写出部分结果再返回错误
async fn finish_study(
    result: Result<RunOutcome, PipelineError>,
    context: &GeneratorContext,
    name: &str,
) -> Result<Compendium> {
    match result {
        Ok(outcome) => {
            report_outcome(&outcome);
            Ok(outcome.compendium)
        }
        Err(PipelineError::StageFatal {
            stage,
            reason,
            partial,
        }) => {
            let path = partial_output_path(&output_path(&context.config, name));
            DiskOutlet::new(&path)
                .save(&Document::Tree(*partial))
                .await?;
            Err(anyhow!(
                "stage `{}` failed: {} (partial result written to {})",
                stage,
                reason,
                path.display()
            ))
        }
        Err(e) => Err(e.into()),
    }
}

fn report_outcome(outcome: &RunOutcome) {
    match outcome.status {
        RunStatus::Completed => info!("✅ 全部阶段完成"),
        RunStatus::CompletedWithGaps => {
            warn!("⚠️ 运行完成，但有{}处缺口:", outcome.gaps.len());
            for gap in &outcome.gaps {
                warn!("   - {}", gap);
            }
        }
        RunStatus::BudgetExceeded => {
            warn!(
                "⚠️ 工具调用预算已用尽，输出为部分结果（已完成{}个主题）",
                outcome.compendium.finalized_topic_count()
            );
        }
    }
    if let Some(address) = &outcome.attached_at {
        info!("🔗 新子领域地址: {}", address);
    }
    info!("⏱️ 阶段耗时\n{}", outcome.timing_report);
}

async fn load_tree(path: &Path) -> Result<Compendium> {
    let markup = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let document = read_document(&markup).with_context(|| format!("Failed to parse {:?}", path))?;
    Ok(document.into_tree()?)
}

/// 在文档中解析地址，返回节点类型与名称
pub async fn resolve_in_file(path: &Path, address: &str) -> Result<String> {
    let compendium = load_tree(path).await?;
    let address: Address = address.parse()?;
    let node = resolve(&address, compendium.root())?;
    let kind = match node {
        NodeRef::Domain(_) => "domain",
        NodeRef::Topic(_) => "topic",
    };
    Ok(format!("{} {} ({})", kind, node.name(), address))
}

#[cfg(test)]
mod tests;
