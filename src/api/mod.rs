pub mod client;
pub mod error;
pub mod models;

pub use client::{ApiClient, Instance};
pub use error::GatewayError;
