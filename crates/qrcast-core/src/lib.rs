//! Core logic for the qrcast bot: user registry, admin session state,
//! broadcast fan-out and update dispatching.
//!
//! This crate is framework-agnostic. Telegram and the QR image library live
//! behind ports (traits) so the dispatcher can be driven by test doubles.

pub mod broadcast;
pub mod config;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod qr;
pub mod registry;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use errors::{Error, Result};
