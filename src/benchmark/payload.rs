use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Immutable blob shared by every writer in a run.
pub type Payload = Arc<[u8]>;

/// Fill `size` random bytes; a seed makes the payload reproducible across runs.
#[must_use]
pub fn generate_payload(size: usize, seed: Option<u64>) -> Payload {
    let mut data = vec![0_u8; size];
    match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed).fill_bytes(&mut data),
        None => rand::rng().fill_bytes(&mut data),
    }
    Arc::from(data)
}
