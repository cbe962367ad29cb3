//! Account signing keys
//!
//! Decrypted keys live only inside [`ScopedSigner`] and only for the call
//! that needs them.

mod signer;

pub use signer::{signature_hex, ScopedSigner};
