//! Answer generation: Ollama client, prompt templates and fragment streaming

pub mod ollama;
pub mod prompt;
pub mod stream;

pub use ollama::OllamaClient;
pub use prompt::{PromptBuilder, SYSTEM_PROMPT};
pub use stream::{generate, GENERATION_APOLOGY};
