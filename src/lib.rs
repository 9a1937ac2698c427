//! # errslice: error analysis queries over model predictions
//!
//! errslice evaluates a small query language over a dataset of annotated
//! instances and their model predictions, so that failures can be sliced
//! into named attributes and groups.
//!
//! ## Query Processing Pipeline
//!
//! ```text
//! Command → Preprocessor → Tokenizer → Parser → OpNode tree → Evaluator
//! ```
//!
//! ### Stage 1: Normalization
//!
//! The [`preprocessor`] folds typographic quotes and collapses whitespace.
//!
//! ### Stage 2: Tokenization
//!
//! The [`tokenizer`] module turns the command into keyword, symbol,
//! literal and identifier tokens with nom.
//!
//! ### Stage 3: Parsing
//!
//! The [`analyzer`] module is a token-level parser combinator library that
//! builds the operator tree described in [`ast`]. Precedence, lowest first:
//! `or`, `and`, `not`, comparisons, `+ -`, `* / %`, unary signs.
//!
//! ### Stage 4: Evaluation
//!
//! The [`eval`] module walks the tree against one instance group. Calls are
//! resolved through the [`function_registry`], which auto-binds entry
//! parameters (`question`, `context`, ...) from the live instance. Every
//! result carries the instance keys that produced it.
//!
//! ## Built Blocks
//!
//! [`builts`] stores the memoized results of evaluating a command over a
//! dataset sample: [`builts::Attribute`]s hold one value per instance and
//! [`builts::Group`]s hold the instances a predicate accepts. Both can be
//! referenced from later commands as `attr:name` and `group:name`.
//!
//! ## Registries
//!
//! Functions, built blocks and the ambient model and rewrite selection live
//! in a [`registry_context::RegistryContext`] passed to every evaluation.

pub mod analyzer;
pub mod ast;
pub mod builts;
pub mod config;
pub mod error;
pub mod eval;
pub mod function_registry;
pub mod instance;
pub mod preprocessor;
pub mod registry_context;
pub mod tokenizer;

// Re-exports
pub use analyzer::{parse_cmd, try_parse_cmd};
pub use ast::{CompiledExpression, OpNode};
pub use builts::{Attribute, CreateOptions, Group};
pub use error::*;
pub use eval::{Value, ValueTag};
pub use registry_context::RegistryContext;

#[cfg(test)]
mod tests {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    #[ctor::ctor]
    fn init_tests() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
