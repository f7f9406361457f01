//! The durable program representation: step lists, the run state, and its
//! on-disk persistence.

pub mod persistence;
pub mod run_state;
pub mod step_list;

pub use run_state::{RunState, UnfinishedDetails};
pub use step_list::{StepList, StepListBuilder, WrapOptions};
