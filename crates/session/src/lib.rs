//! # stride-session
//!
//! Authenticated-session coordination for the Stride client: bearer
//! credential storage, identity verification, request dispatch with
//! single-replay 401 recovery, de-duplicated token refresh, and the
//! session state machine consumed by route guards.
//!
//! The entry point is [`Session`]. A typical consumer builds one from a
//! [`SessionConfig`], calls [`Session::initialize`] at startup, and sends
//! every protected request through [`Session::dispatcher`]. Route-level
//! access checks read [`Session::state`] through a [`guard::RouteGuard`].

pub mod config;
pub mod credential;
pub mod dispatch;
pub mod error;
pub mod guard;
pub mod identity;
mod refresh;
pub mod session;
pub mod store;

pub use config::SessionConfig;
pub use credential::{Credential, TokenGrant, parse_redirect_fragment};
pub use dispatch::{ApiRequest, RequestDispatcher};
pub use error::SessionError;
pub use guard::{GuardDecision, Route, RouteGuard};
pub use identity::{Identity, IdentityPatch};
pub use session::{Session, SessionState};
pub use store::CredentialStore;
