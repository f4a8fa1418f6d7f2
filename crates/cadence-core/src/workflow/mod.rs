//! Multi-step workflows.

pub mod interpreter;

pub use interpreter::{
    DEFAULT_MAX_STEP_VISITS, InterpreterError, RunOutcome, RunTrigger, WorkflowInterpreter,
};
