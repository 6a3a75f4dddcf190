pub mod chunk;
pub mod loaders;
pub mod outcome;
pub mod question;
pub mod quiz;
pub mod request;

pub use chunk::{Batch, Chunk, ContextBundle};
pub use loaders::load_quiz_request;
pub use outcome::{BatchStatus, GenerationOutcome};
pub use question::{CandidateQuestion, Question};
pub use quiz::{GenerationConfig, Quiz, QuizMetadata};
pub use request::{QuizRequest, QuizSettings};
