pub mod client;
pub mod commands;
pub mod guard;
pub mod host;
pub mod notify;
pub mod poll;
pub mod store;
