pub mod api;
pub mod clock;
pub mod config;
pub mod query;
pub mod server;
pub mod snapshot;
pub mod state;
pub mod storage;
pub mod store;
