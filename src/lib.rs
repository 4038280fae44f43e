#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod cli;
pub mod config;
pub mod conversation;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod protocol;
pub mod provider;
pub mod server;

pub use error::{Error, Result};
