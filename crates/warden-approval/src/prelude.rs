//! Prelude module - commonly used types for convenient import.
//!
//! Use `use warden_approval::prelude::*;` to import all essential types.

pub use crate::{ApprovalError, ApprovalGate, ApprovalMemory, ApprovalResult, Resolution};
