// printflow/src/pipeline/mod.rs

//! A small async step runner. Order intake and webhook processing are both
//! expressed as a fixed sequence of named steps over a shared context.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use definition::{Handler, Pipeline, SkipCondition, StepDef};
