pub mod client;
pub mod error;
pub mod types;

pub use client::EnimeClient;
pub use error::EnimeError;
