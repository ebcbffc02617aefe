// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod config;
pub mod feed;
pub mod ledger;
pub mod poller;
pub mod protocol;
pub mod state;
pub mod toi;
pub mod types;
pub mod ws;
