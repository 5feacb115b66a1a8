pub mod client;
pub mod config;
pub mod protocol;
pub mod schema;
pub mod server;
pub mod vfs;
