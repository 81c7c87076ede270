// IMDS Decision Engine
//
// Template/tool matching, recommendation composition and the advisory pipeline

pub mod advisor;
pub mod composer;
pub mod engine;
pub mod prompts;
pub mod validators;

pub use advisor::*;
pub use composer::*;
pub use engine::*;
pub use prompts::{Explainer, DECISION_RULES_PROMPT};
pub use validators::*;
