//! Wire types shared between the authentication broker, the routing layer
//! that fronts it, and the identity provider services it calls. Everything
//! here is plain serde data - no IO, no crypto.

#![deny(warnings)]
#![warn(unused_extern_crates)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::panic)]
#![deny(clippy::unreachable)]
#![deny(clippy::needless_pass_by_value)]
#![deny(clippy::trivially_copy_pass_by_ref)]

pub mod oauth2;
pub mod scim_v1;
pub mod v1;
