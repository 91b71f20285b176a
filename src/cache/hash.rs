//! Key Hashing Module
//!
//! Seeded key hashing for shard selection, and the per-instance seed source.

use tracing::warn;

// == djb33 ==
/// djb2-style rolling hash (`d * 33 ^ byte`) seeded per cache instance.
///
/// The key is consumed in 4-byte chunks with a 0-3 byte tail, and the
/// high half is folded into the low half so `% n` sees well mixed bits.
pub fn djb33(seed: u32, key: &str) -> u32 {
    let bytes = key.as_bytes();
    let mut d = 5381u32
        .wrapping_add(seed)
        .wrapping_add(bytes.len() as u32);

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        d = d.wrapping_mul(33) ^ u32::from(chunk[0]);
        d = d.wrapping_mul(33) ^ u32::from(chunk[1]);
        d = d.wrapping_mul(33) ^ u32::from(chunk[2]);
        d = d.wrapping_mul(33) ^ u32::from(chunk[3]);
    }
    for &b in chunks.remainder() {
        d = d.wrapping_mul(33) ^ u32::from(b);
    }

    d ^ (d >> 16)
}

// == Seed Source ==
/// Where the router's hash seed came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOrigin {
    /// Read from the operating system CSPRNG
    Secure,
    /// The secure source failed; a non-cryptographic generator was used
    Insecure,
}

/// Source of cryptographically secure seed material.
pub trait SeedSource {
    fn secure_seed(&self) -> Result<u32, getrandom::Error>;
}

/// Reads the seed from the OS random number generator.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSeedSource;

impl SeedSource for OsSeedSource {
    fn secure_seed(&self) -> Result<u32, getrandom::Error> {
        let mut buf = [0u8; 4];
        getrandom::getrandom(&mut buf)?;
        Ok(u32::from_ne_bytes(buf))
    }
}

/// Draws a seed from `source`, falling back to a weak seed with a warning.
pub fn generate_seed(source: &dyn SeedSource) -> (u32, SeedOrigin) {
    match source.secure_seed() {
        Ok(seed) => (seed, SeedOrigin::Secure),
        Err(e) => {
            warn!(
                "Failed to read from the system CSPRNG ({}); your system's security may be \
                 compromised. Continuing with an insecure hash seed.",
                e
            );
            (rand::random::<u32>(), SeedOrigin::Insecure)
        }
    }
}
