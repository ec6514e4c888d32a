//! Custom Resource Definitions for the Greeter operator.
//!
//! - [`Greeter`]: desired greeting (spec) and computed greeting (status)
//! - [`Condition`]: type-keyed status conditions
//! - [`Scheme`]: the registry of kinds this operator serves

mod condition;
mod greeter;
pub mod registry;

pub use condition::{
    CONDITION_READY, Condition, ConditionStatus, find_condition, is_condition_true,
    remove_condition, set_condition,
};
pub use greeter::{Greeter, GreeterSpec, GreeterStatus};
pub use registry::{KindDescriptor, Scheme, SchemeBuilder};
