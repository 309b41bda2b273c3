//! Cryptography for the credential vault.
//!
//! Provides AES-256-CBC encryption with an scrypt-derived key.

pub mod encryption;

pub use encryption::Encryptor;
