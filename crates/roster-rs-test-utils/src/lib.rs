//! Test helpers shared across Roster crates.

pub mod fixtures;
pub mod llm;
pub mod store;

pub use fixtures::{doc, sample_employees};
pub use llm::{FailingLLM, FixedChatResponse, FixedLLM, ScriptedLLM, SlowLLM};
pub use store::UnavailableStore;
