pub mod config;
pub mod credential_store;
pub mod error;
pub mod session_cache;
pub mod storage;
pub mod toggl_client;
