//! # Configuration
//!
//! This module contains the configuration structures and loading rules
//! for the chat client.

pub mod client;

pub use client::ClientConfig;
