//! Undertow Web - JSON API and file streaming over a torrent pool
//!
//! Thin HTTP surface: every handler resolves to a registry call or a file
//! lookup, and streamed bodies read straight from the engine session.

pub mod handlers;
pub mod server;

pub use server::{AppState, ServerError, router, run_server};
