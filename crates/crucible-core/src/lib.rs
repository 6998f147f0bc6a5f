//! # crucible-core
//!
//! Deterministic building blocks for Crucible, an AI-output quality harness.
//!
//! This crate answers:
//! - Which criteria does a suite evaluate, and in what order?
//! - What prompt does each criterion send?
//! - What state is each test case in, and what did it score?
//!
//! ## Key Guarantees
//!
//! 1. **No I/O**: nothing here calls an LLM or touches the network
//! 2. **Deterministic order**: criteria are evaluated in mapping insertion order
//! 3. **Monotonic cases**: `Queued -> Running -> {Completed | Failed}`
//!
//! ## Example
//!
//! ```rust
//! use crucible_core::{fill, Placeholder, Substitutions};
//!
//! let subs = Substitutions::new().with(Placeholder::Question, "What is the refund window?");
//! let prompt = fill("Q: {question}\nKB: {knowledgeBase}", &subs);
//! assert_eq!(prompt, "Q: What is the refund window?\nKB: {knowledgeBase}");
//! ```

pub mod case;
pub mod criteria;
pub mod prompts;
pub mod template;

pub use case::{
    pass_score, CaseInput, CaseStatus, EvaluationResult, EvaluationStatus, Run, TestCase,
    TransitionError,
};
pub use criteria::{Category, Criterion, CriterionError, SuiteKind};
pub use prompts::{
    default_evaluation_template, default_generation_template, validate_generation_template,
    EvaluationPrompts, PromptError,
};
pub use template::{
    fill, placeholders, recognized_placeholders, Placeholder, Substitutions, TemplateError,
};
