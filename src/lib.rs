//! expert-mode asks a remote chat model a question through one of a fixed set
//! of expert personas and prints the answer.
//!
//! The crate is organized around a small set of layers:
//! - [`core`] owns the answer pipeline: credential lookup, the expert table,
//!   prompt construction, the chat client adapter, and response normalization.
//! - [`api`] defines the chat-completions payloads sent over the wire.
//! - [`cli`] is the command-line front end: the interactive form, `ask`,
//!   `status`, and credential management.
//!
//! The binary (`src/main.rs`) routes straight into [`cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod utils;
