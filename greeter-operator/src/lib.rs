//! Greeter Kubernetes Operator
//!
//! This crate provides a Kubernetes operator that turns Greeter resources
//! into personalized greetings written back to each resource's status.
//!
//! # Custom Resource Definitions
//!
//! - **Greeter**: names someone to greet and optionally a greeting prefix
//!
//! # Example
//!
//! ```yaml
//! apiVersion: hello.sklrsn.in/v1
//! kind: Greeter
//! metadata:
//!   name: ada
//!   namespace: default
//! spec:
//!   name: Ada
//!   message: Hi
//! ```
//!
//! Once reconciled, `status.message` reads
//! `Hi, Ada! Welcome to Kubernetes Operators!`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod testing;

pub use crd::{Greeter, GreeterSpec, GreeterStatus};
pub use error::{OperatorError, OperatorResult};
