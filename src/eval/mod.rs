//! Expression evaluation: runtime values, operator dispatch, the node
//! evaluator and the batch driver.

pub mod batch;
pub mod context;
pub mod dispatch;
pub mod evaluator;
pub mod value;

pub use batch::{test_instances, test_one, BatchOutcome};
pub use context::EvalContext;
pub use evaluator::{evaluate, ExpressionEvaluator};
pub use value::{Handle, OpNodeReturn, OrderedValue, Value, ValueTag};
