pub mod chat;
pub mod completion;
pub mod config;
pub mod connection;
pub mod session;
