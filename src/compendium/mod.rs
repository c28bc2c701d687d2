//! 知识库的数据模型：地址、知识树、章节形态、序列化与挂载

pub mod address;
pub mod error;
pub mod markup;
pub mod merge;
pub mod model;
pub mod sections;

pub use address::{Address, NodeRef, build_address, parse_address, resolve, slugify};
pub use error::KnowledgeError;
pub use markup::{Document, read_document};
pub use merge::{attach, attach_at};
pub use model::{Compendium, Domain, Relation, RelationKind, Topic, TopicBody};
pub use sections::{Citation, CompendiumPayload, Insight, Section, SectionCompendium, TraceEvent};
