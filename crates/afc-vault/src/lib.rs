//! Secret resolution and the decryption gate for the knowledge file.
//! AES-GCM with keys sourced from a secrets file, the OS keyring, or the
//! environment (in-memory doubles for tests).

pub mod blob;
pub mod cache;
pub mod gate;
pub mod sources;
