//! Content fingerprints.
//!
//! A blake3 digest of anything that implements `Hash`. Containers hash
//! exactly their field tuple, so two containers with equal fingerprints hold
//! identical backing arrays.

use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

/// A blake3 digest, 32 bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; 32]);

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "Fingerprint({})", self);
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        return Ok(());
    }
}

/// Feeds `Hash` output into blake3.
struct Blake3Hasher(blake3::Hasher);

impl Hasher for Blake3Hasher {
    fn write(&mut self, bytes: &[u8]) {
        self.0.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.0.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[..8]);
        return u64::from_le_bytes(head);
    }
}

/// Fingerprint a value through its `Hash` impl.
pub fn fingerprint<H: Hash + ?Sized>(value: &H) -> Fingerprint {
    let mut hasher = Blake3Hasher(blake3::Hasher::new());
    value.hash(&mut hasher);
    return Fingerprint(*hasher.0.finalize().as_bytes());
}
