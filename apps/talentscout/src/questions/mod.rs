// Technical questions: model, LLM generation with fallback, answer scoring.
// All LLM calls go through llm_client::TextCompletion.

pub mod fallback;
pub mod generator;
pub mod models;
pub mod prompts;
pub mod scoring;
