//! Domain types shared by every pipeline stage.

pub mod errors;
pub mod model;
