//! `formkeeper` - a local form-collection service.
//!
//! This library provides the pieces of a small pipeline: an HTTP front end
//! that serves static pages and forwards form submissions over a loopback
//! UDP channel, a relay listener that receives them, and a JSON-backed
//! store that records each submission under its timestamp.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod form;
pub mod http;
pub mod logging;
pub mod relay;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};
pub use http::HttpServer;
pub use logging::init_logging;
pub use relay::RelayListener;
pub use store::JsonStore;
