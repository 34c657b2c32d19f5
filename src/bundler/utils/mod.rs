//! Low-level helpers shared by the pipeline stages.

pub mod fs;
pub mod http;
pub mod process;
