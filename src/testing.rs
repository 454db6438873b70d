//! Hasher builders shared by the unit and property tests.

use core::hash::BuildHasher;
use core::hash::Hasher;

use rand::TryRngCore;
use rand::rngs::OsRng;
use siphasher::sip::SipHasher;

/// SipHash with keys drawn from the OS on construction.
#[derive(Clone)]
pub(crate) struct SipHashBuilder {
    k1: u64,
    k2: u64,
}

impl BuildHasher for SipHashBuilder {
    type Hasher = SipHasher;

    fn build_hasher(&self) -> Self::Hasher {
        SipHasher::new_with_keys(self.k1, self.k2)
    }
}

impl Default for SipHashBuilder {
    fn default() -> Self {
        let mut rng = OsRng;
        Self {
            k1: rng.try_next_u64().unwrap_or(0),
            k2: rng.try_next_u64().unwrap_or(0),
        }
    }
}

/// Sends every key to the same bucket.
#[derive(Clone, Default)]
pub(crate) struct ConstBuildHasher;

pub(crate) struct ConstHasher;

impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;

    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}

impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}

    fn finish(&self) -> u64 {
        0
    }
}

/// Keeps only the low bits of the key, so small key ranges collide in
/// predictable groups.
#[derive(Clone, Default)]
pub(crate) struct LowBitsBuildHasher;

pub(crate) struct LowBitsHasher(u64);

impl BuildHasher for LowBitsBuildHasher {
    type Hasher = LowBitsHasher;

    fn build_hasher(&self) -> Self::Hasher {
        LowBitsHasher(0)
    }
}

impl Hasher for LowBitsHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 = (self.0 << 8) | b as u64;
        }
    }

    fn write_u64(&mut self, n: u64) {
        self.0 = n;
    }

    fn finish(&self) -> u64 {
        self.0 & 0x3
    }
}
