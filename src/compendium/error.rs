use thiserror::Error;

/// 知识模型相关错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KnowledgeError {
    #[error("malformed address `{address}`: {reason}")]
    MalformedAddress { address: String, reason: String },

    #[error("address `{address}` does not resolve from root `{root}`")]
    UnresolvedAddress { address: String, root: String },

    /// 同一父节点下的直接子节点id冲突
    #[error("id `{id}` already exists under `{parent}`")]
    DuplicateId { id: String, parent: String },

    #[error("`{parent}` has no child with id `{id}`")]
    UnknownChild { id: String, parent: String },

    #[error("invalid id `{id}`: {reason}")]
    InvalidId { id: String, reason: String },

    #[error("`{id}` cannot be finalized with empty content")]
    EmptyContent { id: String },

    #[error("topic `{id}` is already finalized")]
    AlreadyFinalized { id: String },

    #[error("summary of domain `{id}` is already set")]
    SummaryAlreadySet { id: String },

    /// 文档无法解析回模型
    #[error("markup error: {0}")]
    Markup(String),
}

impl KnowledgeError {
    pub fn malformed(address: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAddress {
            address: address.into(),
            reason: reason.into(),
        }
    }

    pub fn markup(message: impl Into<String>) -> Self {
        Self::Markup(message.into())
    }
}
