pub mod config;
pub mod my_sessions;
pub mod store_adapter;
