//! Config composition: sources merged under a fixed precedence.

pub mod merge_policy;
pub mod service;
