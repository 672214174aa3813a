//! Short paste identifier generation.
//!
//! Identifiers are fixed-length strings drawn uniformly from the
//! alphanumeric alphabet. Uniqueness is best-effort here: after a bounded
//! number of collisions against the existence predicate the generator
//! degrades to a suffixed code with no final guarantee, and the store's
//! insert-time conflict check is the real backstop.

use std::future::Future;

use rand::distributions::Distribution;
use rand::Rng;

use pastegate_common::SHORT_ID_LENGTH;

use crate::store::StoreError;

const ALPHABET: &[u8; 62] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Attempts against the existence predicate before degrading.
const MAX_ATTEMPTS: usize = 10;

/// Samples identifier characters uniformly from [`ALPHABET`].
pub struct Generator;

impl Distribution<char> for Generator {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> char {
        ALPHABET[rng.gen_range(0..ALPHABET.len())] as char
    }
}

/// Produces one fixed-length identifier.
pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHORT_ID_LENGTH).map(|_| Generator.sample(rng)).collect()
}

/// Produces an identifier the existence predicate does not know yet, or,
/// after [`MAX_ATTEMPTS`] collisions, a fresh code with one random decimal
/// digit appended and no uniqueness guarantee.
pub async fn generate_unique<R, F, Fut>(rng: &mut R, exists: F) -> Result<String, StoreError>
where
    R: Rng + ?Sized,
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<bool, StoreError>>,
{
    for _ in 0..MAX_ATTEMPTS {
        let id = generate(rng);
        if !exists(id.clone()).await? {
            return Ok(id);
        }
    }

    let mut id = generate(rng);
    id.push(char::from(b'0' + rng.gen_range(0..10_u8)));
    Ok(id)
}
