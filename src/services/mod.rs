pub mod batcher;
pub mod chunker;
pub mod context_retriever;
pub mod llm_service;
pub mod prompt;
pub mod quiz_writer;
pub mod validator;

pub use batcher::Batcher;
pub use chunker::Chunker;
pub use context_retriever::ContextRetriever;
pub use llm_service::LlmService;
pub use prompt::PromptTemplate;
pub use quiz_writer::QuizWriter;
pub use validator::validate_payload;
