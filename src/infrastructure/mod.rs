//! 基础设施层：外部能力的窄接口

pub mod generator;
pub mod vector_store;

pub use generator::{PromptChunk, PromptContext, QuestionGenerator};
pub use vector_store::VectorStore;
