// Public API for integration tests and potential library usage

pub mod auth;
pub mod broadcast;
pub mod config;
pub mod cooldown;
pub mod error;
pub mod notify;
pub mod protocol;
pub mod settings;
pub mod state;
pub mod types;
pub mod words;
pub mod ws;
