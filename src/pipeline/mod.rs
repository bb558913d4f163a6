pub mod intake; // Free-text case validation and cleanup
pub mod authorization; // LLM-backed decisions and justification review
