// model = "claude-opus-4-5"
// created = "2026-01-30"
// modified = "2026-10-15"
// driver = "Isaac Clayton"

//! Replica identities.
//!
//! Every replica of a shared document writes under an ed25519 public key.
//! The key is hashed down to a compact `ClientId` for use inside structs,
//! and the same hash feeds stable per-user colours for attribution.
//! Nothing is signed yet, so the secret half is discarded after generation.

use blake3::Hasher;
use ed25519_dalek::SigningKey;
use rand_core::OsRng;

/// A public key, 32 bytes on the ed25519 curve.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPub(pub [u8; 32]);

/// A blake3 hash, 32 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Hash(pub [u8; 32]);

/// Hash a message using blake3.
pub fn hash(message: &[u8]) -> Hash {
    let mut hasher = Hasher::new();
    hasher.update(message);
    let result = hasher.finalize();
    return Hash(*result.as_bytes());
}

impl KeyPub {
    /// The public half of a freshly generated ed25519 keypair.
    pub fn generate() -> KeyPub {
        let signing = SigningKey::generate(&mut OsRng);
        return KeyPub(signing.verifying_key().to_bytes());
    }
}

fn hex(bytes: &[u8]) -> String {
    return bytes.iter().map(|b| format!("{:02x}", b)).collect();
}

impl std::fmt::Debug for KeyPub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "KeyPub({})", hex(&self.0));
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "Hash({})", hex(&self.0));
    }
}
