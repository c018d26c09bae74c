//! Core domain + application logic for the broadcast composer bot.
//!
//! This crate is intentionally framework-agnostic. Telegram lives behind the
//! delivery port (trait) implemented in the adapter crate.

pub mod composer;
pub mod config;
pub mod controller;
pub mod domain;
pub mod draft;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod rates;
pub mod store;

pub use errors::{Error, Result};
