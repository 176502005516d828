//! The authentication broker: a relying-party backend that fronts an
//! identity provider's password, FIDO2 and SCIM services for a browser.
//!
//! The broker exposes five operations to whatever routing layer wraps it
//! (see [`Broker`]): password login, session status, FIDO2 ceremony
//! proxying, FIDO2 login completion, and credential deletion. Internally
//! each operation is a linear pipeline of guard -> token -> upstream call
//! -> normalize, with no retries and no hidden state beyond the
//! caller-owned [`SessionState`] and the shared [`TokenCache`].
//!
//! Routing, session storage, TLS and process bootstrap are deliberately
//! out of scope; the broker only ever sees one request's body and session
//! at a time.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::await_holding_lock)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

#[macro_use]
extern crate tracing;

mod config;
mod facade;
mod guard;
mod normalize;
mod session;
mod token;
mod upstream;

pub use crate::config::{BrokerConfig, ConfigError, PasswordKickoff};
pub use crate::facade::{Broker, CeremonyPath};
pub use crate::guard::authorize;
pub use crate::session::SessionState;
pub use crate::token::TokenCache;
pub use crate::upstream::{PasswordVerdict, UpstreamError, UpstreamErrorBody};
