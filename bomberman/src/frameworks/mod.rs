// Frameworks: runtime bootstrap, configuration and asset loading.

pub mod assets;
pub mod client;
pub mod config;
pub mod server;
