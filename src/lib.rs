//! Live print-CSS preview with remote multi-tool PDF conversion.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
mod util;
