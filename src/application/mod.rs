//! Application services: sources, preview, conversion and the session tying them together.

pub mod compose;
pub mod conversion;
pub mod error;
pub mod preview;
pub mod remote;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod stream;
pub mod templates;
pub mod tools;
