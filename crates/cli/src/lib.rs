//! Dirwatch CLI library
//!
//! Configuration, logging setup and the event streaming loop behind the
//! `dirwatch` binary.

pub mod config;
pub mod daemon;
pub mod logging;
pub mod util;
