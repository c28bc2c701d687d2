//! 外部调用结果的严格校验
//!
//! 每个调用点都把原始文本解析成确定的结构，形状不符时返回
//! [`StructuredResponseParseError`]，不对缺失字段做任何补造。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::compendium::CompendiumPayload;

/// 响应不满足约定的结构
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuredResponseParseError {
    #[error("response is empty")]
    Empty,

    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("unexpected response shape: {0}")]
    WrongShape(String),

    #[error("required field `{0}` is missing or empty")]
    MissingField(&'static str),
}

/// 主题生成的返回结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TopicPayload {
    /// 约一段的正文
    pub content: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub questions: Vec<String>,
    /// 前置主题的名称，稍后解析为地址
    #[serde(default)]
    pub prerequisites: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BlueprintSection {
    pub title: String,
    #[serde(default)]
    pub focus: String,
}

/// 深度研究前的研究蓝图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchBlueprint {
    pub primary_objective: String,
    #[serde(default)]
    pub audience: String,
    #[serde(default)]
    pub key_sections: Vec<BlueprintSection>,
    #[serde(default)]
    pub research_questions: Vec<String>,
    #[serde(default)]
    pub methodology_preferences: Vec<String>,
}

impl ResearchBlueprint {
    /// 蓝图生成失败时使用的固定蓝图
    pub fn default_for(topic: &str) -> Self {
        let section = |title: &str, focus: &str| BlueprintSection {
            title: title.to_string(),
            focus: focus.to_string(),
        };
        Self {
            primary_objective: format!("Compile a multi-layered compendium covering {}", topic),
            audience: "Practitioners and researchers seeking a strategic overview".to_string(),
            key_sections: vec![
                section("Foundations", "Core concepts, definitions, and history"),
                section(
                    "Current Landscape",
                    "Recent developments, stakeholders, and adoption",
                ),
                section(
                    "Opportunities and Risks",
                    "Emerging trends, challenges, and future outlook",
                ),
            ],
            research_questions: vec![
                "What are the most influential recent discoveries or events?".to_string(),
                "Which organizations or individuals are shaping the field?".to_string(),
                "What controversies or open debates remain unresolved?".to_string(),
            ],
            methodology_preferences: vec![
                "Prioritize primary sources published within the last five years".to_string(),
                "Cross-validate critical facts across multiple reputable outlets".to_string(),
                "Highlight quantitative evidence and concrete metrics when available".to_string(),
            ],
        }
    }
}

/// 去掉包裹的 ``` 代码块标记
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    // 代码块首行可能是语言标记
    let rest = rest.trim_start();
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    rest.trim()
}

/// 解析JSON，容忍代码块和前后说明文字
pub fn decode_json_value(text: &str) -> Result<Value, StructuredResponseParseError> {
    let candidate = strip_code_fences(text);
    if candidate.is_empty() {
        return Err(StructuredResponseParseError::Empty);
    }
    if let Ok(value) = serde_json::from_str::<Value>(candidate) {
        return Ok(value);
    }

    let start = candidate.find(['{', '[']);
    let end = candidate.rfind(['}', ']']);
    match (start, end) {
        (Some(start), Some(end)) if start < end => {
            serde_json::from_str::<Value>(&candidate[start..=end])
                .map_err(|e| StructuredResponseParseError::NotJson(e.to_string()))
        }
        _ => Err(StructuredResponseParseError::NotJson(
            "no JSON object or array found".to_string(),
        )),
    }
}

/// 名称列表：字符串数组，或带 `question`/`name`/`title` 字段的对象数组
pub fn parse_string_list(text: &str) -> Result<Vec<String>, StructuredResponseParseError> {
    let value = decode_json_value(text)?;
    let Value::Array(items) = value else {
        return Err(StructuredResponseParseError::WrongShape(
            "expected a JSON array".to_string(),
        ));
    };

    let mut names = Vec::with_capacity(items.len());
    for item in items {
        let name = match &item {
            Value::String(name) => name.clone(),
            Value::Object(map) => ["question", "name", "title"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .ok_or_else(|| {
                    StructuredResponseParseError::WrongShape(format!(
                        "list item has no text field: {}",
                        item
                    ))
                })?,
            other => {
                return Err(StructuredResponseParseError::WrongShape(format!(
                    "list item is not a string: {}",
                    other
                )));
            }
        };
        let name = name.trim();
        if !name.is_empty() {
            names.push(name.to_string());
        }
    }
    Ok(names)
}

/// 非空纯文本
pub fn parse_text(text: &str) -> Result<String, StructuredResponseParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(StructuredResponseParseError::Empty);
    }
    Ok(trimmed.to_string())
}

fn parse_object<T: DeserializeOwned>(text: &str) -> Result<T, StructuredResponseParseError> {
    let value = decode_json_value(text)?;
    if !value.is_object() {
        return Err(StructuredResponseParseError::WrongShape(
            "expected a JSON object".to_string(),
        ));
    }
    serde_json::from_value(value).map_err(|e| StructuredResponseParseError::WrongShape(e.to_string()))
}

pub fn parse_topic_payload(text: &str) -> Result<TopicPayload, StructuredResponseParseError> {
    let value = decode_json_value(text)?;
    if value.get("content").and_then(Value::as_str).is_none_or(|c| c.trim().is_empty()) {
        return Err(StructuredResponseParseError::MissingField("content"));
    }
    let payload: TopicPayload = serde_json::from_value(value)
        .map_err(|e| StructuredResponseParseError::WrongShape(e.to_string()))?;
    Ok(payload)
}

pub fn parse_blueprint(text: &str) -> Result<ResearchBlueprint, StructuredResponseParseError> {
    let blueprint: ResearchBlueprint = parse_object(text)?;
    if blueprint.primary_objective.trim().is_empty() {
        return Err(StructuredResponseParseError::MissingField("primary_objective"));
    }
    Ok(blueprint)
}

pub fn parse_compendium_payload(
    text: &str,
) -> Result<CompendiumPayload, StructuredResponseParseError> {
    parse_object(text)
}

#[cfg(test)]
mod tests;
