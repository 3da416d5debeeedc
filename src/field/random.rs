//! field::random — reproducible random fields.
//!
//! Every random draw in the crate goes through an explicit [`IftRng`]; there
//! is no global generator. Sample `i` of a run seeded with `seed` uses
//! [`rng_for`]`(seed, i)`, a ChaCha8 stream that depends on nothing else, so
//! a draw can be reproduced in isolation and on any worker.
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::{domain::DomainRef, field::Field};

/// Generator used for all sampling.
pub type IftRng = ChaCha8Rng;

/// Independent generator for stream `stream` of run `seed`.
pub fn rng_for(seed: u64, stream: u64) -> IftRng {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    rng.set_stream(stream);
    rng
}

impl Field {
    /// Field of independent standard-normal values.
    pub fn standard_normal(domain: DomainRef, rng: &mut IftRng) -> Field {
        Field::from_fn(domain, |_| rng.sample::<f64, _>(StandardNormal))
    }

    /// Field of independent values uniform on `[low, high)`.
    pub fn uniform(domain: DomainRef, low: f64, high: f64, rng: &mut IftRng) -> Field {
        Field::from_fn(domain, |_| low + (high - low) * rng.random::<f64>())
    }
}
