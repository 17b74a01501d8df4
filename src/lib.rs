//! Party lifecycle and points economy.
//!
//! Commands in [`commands`] orchestrate a user's points balance, image storage and the
//! party repository through the traits in [`ports`].

pub mod adapters;
pub mod app;
pub mod commands;
pub mod config;
pub mod domain;
pub mod ports;
