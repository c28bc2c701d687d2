//! 层级引用地址：`compendium://Domain/Subdomain/Topic`
//!
//! 地址的第一段是解析时给定根节点自身的id，之后的每一段依次向下匹配子节点。
//! 地址不保证在当前知识库内可解析，跨知识库引用只在调用方提供正确的根节点时才能解析。

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::KnowledgeError;
use super::model::{Domain, Topic};

pub const ADDRESS_SCHEME: &str = "compendium";

const SCHEME_SEPARATOR: &str = "://";

static WORD_SPLITTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static regex"));

/// 已构造的引用地址
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 地址的各段id
    pub fn segments(&self) -> Vec<String> {
        // 构造时已校验，此处不会失败
        parse_address(&self.0).unwrap_or_default()
    }

    /// 在当前地址下追加一段
    pub fn child(&self, id: &str) -> Address {
        Address(format!("{}/{}", self.0, id))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = KnowledgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s)?;
        Ok(Address(s.to_string()))
    }
}

impl TryFrom<String> for Address {
    type Error = KnowledgeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_address(&value)?;
        Ok(Address(value))
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

/// 用固定scheme拼接各段id
pub fn build_address<S: AsRef<str>>(segments: &[S]) -> Address {
    let path = segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join("/");
    Address(format!("{}{}{}", ADDRESS_SCHEME, SCHEME_SEPARATOR, path))
}

/// 解析地址为有序的id序列
pub fn parse_address(s: &str) -> Result<Vec<String>, KnowledgeError> {
    let prefix = format!("{}{}", ADDRESS_SCHEME, SCHEME_SEPARATOR);
    let Some(path) = s.strip_prefix(&prefix) else {
        return Err(KnowledgeError::malformed(
            s,
            format!("missing `{}` prefix", prefix),
        ));
    };

    let segments: Vec<String> = path.split('/').map(str::to_string).collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(KnowledgeError::malformed(s, "empty path segment"));
    }
    Ok(segments)
}

/// 地址解析的结果
#[derive(Debug, Clone, Copy)]
pub enum NodeRef<'a> {
    Domain(&'a Domain),
    Topic(&'a Topic),
}

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> &'a str {
        match self {
            NodeRef::Domain(domain) => domain.id(),
            NodeRef::Topic(topic) => topic.id(),
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            NodeRef::Domain(domain) => domain.name(),
            NodeRef::Topic(topic) => topic.name(),
        }
    }

    pub fn as_domain(&self) -> Option<&'a Domain> {
        match self {
            NodeRef::Domain(domain) => Some(domain),
            NodeRef::Topic(_) => None,
        }
    }

    pub fn as_topic(&self) -> Option<&'a Topic> {
        match self {
            NodeRef::Topic(topic) => Some(topic),
            NodeRef::Domain(_) => None,
        }
    }
}

/// 从给定根节点出发解析地址。中间段只匹配子领域，最后一段先匹配子领域再匹配主题。
pub fn resolve<'a>(address: &Address, root: &'a Domain) -> Result<NodeRef<'a>, KnowledgeError> {
    let segments = parse_address(address.as_str())?;
    let unresolved = || KnowledgeError::UnresolvedAddress {
        address: address.to_string(),
        root: root.id().to_string(),
    };

    let (first, rest) = segments.split_first().ok_or_else(unresolved)?;
    if first != root.id() {
        return Err(unresolved());
    }

    let mut current = root;
    for (index, segment) in rest.iter().enumerate() {
        let is_last = index + 1 == rest.len();
        if let Some(child) = current.subdomain(segment) {
            current = child;
            continue;
        }
        if is_last {
            if let Some(topic) = current.topic(segment) {
                return Ok(NodeRef::Topic(topic));
            }
        }
        return Err(unresolved());
    }

    Ok(NodeRef::Domain(current))
}

/// 解析出可变的领域节点，供挂载使用
pub fn resolve_domain_mut<'a>(
    address: &Address,
    root: &'a mut Domain,
) -> Result<&'a mut Domain, KnowledgeError> {
    let segments = parse_address(address.as_str())?;
    let unresolved = KnowledgeError::UnresolvedAddress {
        address: address.to_string(),
        root: root.id().to_string(),
    };

    let Some((first, rest)) = segments.split_first() else {
        return Err(unresolved);
    };
    if first != root.id() {
        return Err(unresolved);
    }

    let mut current = root;
    for segment in rest {
        current = match current.subdomain_mut(segment) {
            Some(child) => child,
            None => return Err(unresolved),
        };
    }
    Ok(current)
}

/// 从名称生成稳定的id：按非字母数字切词，每个词首字母大写后拼接
pub fn slugify(name: &str) -> String {
    let slug: String = WORD_SPLITTER
        .split(name)
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect();

    if slug.is_empty() {
        "Untitled".to_string()
    } else {
        slug
    }
}

/// 名称比较时使用的规范化形式
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests;
