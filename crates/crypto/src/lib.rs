//! # pogchat-crypto
//!
//! Asymmetrische Primitiven und Identitaetsmaterial fuer pogchat.
//!
//! ## Module
//! - `primitives` - `Cryptor`/`Signer`-Traits, RSA-OAEP und PKCS#1 v1.5
//! - `keypair` - Schluessel-Paare (DER im Speicher, PEM auf Platte)
//! - `types` - Hash-/Algorithmus-Kennungen, `SecretBytes`
//! - `error` - Fehlertypen

pub mod error;
pub mod keypair;
pub mod primitives;
pub mod types;

// Bequeme Re-Exports
pub use error::{CryptoError, CryptoResult, KeyError, KeyResult};
pub use keypair::{KeyPair, DEFAULT_BIT_SIZE};
pub use pogchat_core::AuthError;
pub use primitives::{Cryptor, KryptoConfig, KryptoDienste, RsaCryptor, RsaSigner, Signer};
pub use types::{HashAlgorithm, KeyAlgorithm, KeyKind, SecretBytes};
