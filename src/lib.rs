mod config;
mod error;
pub mod providers;
pub mod resources;
mod server;
mod session;
#[cfg(test)]
mod tests;
mod types;

pub use config::{Config, DEFAULT_ANKI_URL, DEFAULT_API_VERSION};
pub use error::{Error, Result};
pub use server::{SERVER_NAME, Server};
pub use session::Session;
pub use types::*;
