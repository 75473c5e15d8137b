//! Sign-in and session subsystem.
//!
//! # Data Flow
//! ```text
//! POST /api/auth/login
//!     → account.rs (account ID format)
//!     → signature.rs (NEP-413 signature over message, nonce, recipient)
//!     → nonce.rs (optional replay check)
//!     → users.rs (account → user ID)
//!     → session.rs (signed credential, set as cookie)
//!
//! Every later request:
//!     → session.rs (verify, rotate past half-life)
//! ```

pub mod account;
pub mod nonce;
pub mod session;
pub mod signature;
pub mod users;

pub use nonce::NonceRegistry;
pub use session::{Credential, SessionCodec};
pub use users::{InMemoryUserDirectory, UserDirectory};
