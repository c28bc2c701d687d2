pub mod budget;
pub mod context;
pub mod deep_research;
pub mod executor;
pub mod findings;
pub mod outlet;
pub mod parsing;
pub mod prompts;
pub mod workflow;
