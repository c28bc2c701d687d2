use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compendium::{Document, slugify};

/// 输出文档
pub trait Outlet {
    async fn save(&self, document: &Document) -> Result<PathBuf>;
}

/// 未指定输出路径时的文件名：`<slug>_<YYYYmmdd_HHMMSS>.xml`
pub fn default_output_path(name: &str, now: DateTime<Local>) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}.xml",
        slugify(name),
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// 致命失败时部分结果的写入位置：`<output>.partial.xml`
pub fn partial_output_path(path: &Path) -> PathBuf {
    path.with_extension("partial.xml")
}

pub fn render_document(document: &Document) -> String {
    match document {
        Document::Tree(compendium) => compendium.to_markup_string(),
        Document::Sections(sections) => sections.to_markup_string(),
    }
}

pub struct DiskOutlet {
    path: PathBuf,
}

impl DiskOutlet {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Outlet for DiskOutlet {
    async fn save(&self, document: &Document) -> Result<PathBuf> {
        info!("🖊️ 文档存储中...");
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        tokio::fs::write(&self.path, render_document(document))
            .await
            .with_context(|| format!("Failed to write {:?}", self.path))?;

        info!("💾 已保存: {}", self.path.display());
        Ok(self.path.clone())
    }
}
