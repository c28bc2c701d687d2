//! 外部LLM协作方：调用契约与基于rig的实现

pub mod backend;
pub mod client;

pub use backend::{
    InvokeError, InvokeRequest, InvokeResponse, ModelTier, ResearchBackend, ResearchTool,
};
pub use client::LLMClient;
