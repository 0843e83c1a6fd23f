//! Core of a single-contact GREEN-API chat client: gateway calls, persisted
//! credentials, the login flow and the notification poller.

pub mod api;
pub mod chat;
pub mod config;
pub mod login;
pub mod poller;
pub mod storage;
pub mod utils;

pub use api::{ApiClient, GatewayError, Instance};
pub use chat::{ChatSession, Direction, Draft, Transcript};
pub use config::{Contact, CredentialStore, Credentials, Settings};
pub use login::{LoginError, LoginFlow, LoginForm, LoginState};
pub use poller::{PollEvent, PollHandle, Poller};
