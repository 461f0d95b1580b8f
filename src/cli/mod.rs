//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Defines the command line, loads the configuration for it and dispatches to
//! the station loop, schema bootstrap or a one-off forecast poll.

mod commands;

pub use commands::*;
