//! LoL Account Launcher
//!
//! Logs a saved account into the Riot Client by typing its credentials into
//! the client's login form.
//!
//! ## How it works
//! - Passwords live in the OS credential store, one secret per account
//! - The Riot Client is found (or started) and its main window located
//! - Keystrokes are injected with SendInput; the pointer is put back after the
//!   focus click
//!
//! ## Architecture
//! - `vault` - credential store access
//! - `accounts` - saved accounts and their display order
//! - `locator` - process discovery, launch and window lookup
//! - `input_injector` - SendInput keyboard and mouse driver
//! - `orchestrator` - the login state machine
//! - `launcher` - vault lookup, login and notification in one call

pub mod accounts;
pub mod config;
pub mod error;
pub mod input_injector;
pub mod launcher;
pub mod locator;
pub mod notifier;
pub mod orchestrator;
pub mod timings;
pub mod vault;

#[cfg(test)]
mod testing;

pub use error::{LauncherError, Result};
