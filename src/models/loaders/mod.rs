pub mod toml_loader;

pub use toml_loader::{load_markdown_to_quiz_request, load_quiz_request, load_toml_to_quiz_request};
