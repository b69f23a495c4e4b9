//! Verification pipeline: discovery, fragments, sessions, includes, compilation, reporting.

pub mod compile;
pub mod discover;
pub mod fragments;
pub mod includes;
pub mod report;
pub mod sessions;
pub mod verify;
pub mod workspace;

#[cfg(test)]
pub(crate) mod fixtures;
