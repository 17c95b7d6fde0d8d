//! Error handling using `thiserror` and `anyhow`.
//!
//! Domain errors describe precisely what went wrong inside the library
//! engine; the operational helpers add context and centralize reporting for
//! the binary.

pub mod domain;
pub mod operational;

pub use {
    domain::LibraryError,
    operational::{ErrorReporter, ResultExt},
};
