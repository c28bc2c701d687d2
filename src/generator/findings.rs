//! 研究发现汇总：按研究领域累积问答对

use serde::{Deserialize, Serialize};

/// 一个研究领域及其问答记录，只追加不去重
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchArea {
    name: String,
    findings: Vec<(String, String)>,
}

impl ResearchArea {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn findings(&self) -> &[(String, String)] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }
}

/// 创建空的研究领域
pub fn start_area(name: impl Into<String>) -> ResearchArea {
    ResearchArea {
        name: name.into(),
        findings: Vec::new(),
    }
}

/// 追加一条问答，重复的问题原样保留
pub fn record_answer(area: &mut ResearchArea, question: impl Into<String>, answer: impl Into<String>) {
    area.findings.push((question.into(), answer.into()));
}

/// 按记录顺序把问答渲染成文本块，作为主题规划的输入
pub fn render_findings_block(area: &ResearchArea) -> String {
    let mut block = format!("## Research Area: {}\n", area.name);
    for (index, (question, answer)) in area.findings.iter().enumerate() {
        block.push_str(&format!(
            "\n### Question {}\n{}\n\n### Answer\n{}\n",
            index + 1,
            question.trim(),
            answer.trim()
        ));
    }
    block
}

/// 拼接多个领域的文本块
pub fn render_corpus(areas: &[ResearchArea]) -> String {
    areas
        .iter()
        .map(render_findings_block)
        .collect::<Vec<_>>()
        .join("\n")
}
