//! Authentication session client for the FitMatch API.
//!
//! This crate provides:
//! - Login, signup, logout, refresh, and profile operations against
//!   the identity server
//! - An in-memory access credential with computed expiry, plus a
//!   persisted refresh credential (via `session-storage`)
//! - Transparent refresh-and-retry for authenticated calls
//!   ([`SessionClient::with_auth`])
//! - Auth-expired notifications for UI layers

mod clock;
mod error;
mod session;
mod wire;

pub use clock::{Clock, SystemClock};
pub use error::{AuthError, AuthResult};
pub use session::{
    ListenerId, LoginIdentifier, SessionClient, SessionStatus, SignupRequest, UserProfile,
    UserRole,
};
