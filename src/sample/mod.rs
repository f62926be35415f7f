//! Random document sampling.

use rand::{rngs::StdRng, RngExt, SeedableRng};

use crate::error::SpeakleashError;

/// Draws `n` items uniformly at random from `items` in a single pass.
///
/// Uses reservoir sampling, so the source is never held in memory beyond
/// the `n` kept items. Results keep their stream order. If the source holds
/// fewer than `n` items, all of them are returned.
pub fn sample_documents<I, T>(items: I, n: usize, seed: Option<u64>) -> Result<Vec<T>, SpeakleashError>
where
    I: IntoIterator<Item = T>,
{
    if n == 0 {
        return Err(SpeakleashError::InvalidSampleParams {
            message: "-n must be greater than 0".to_string(),
        });
    }

    let picked = if let Some(seed) = seed {
        let mut rng = StdRng::seed_from_u64(seed);
        reservoir(items, n, &mut rng)
    } else {
        let mut rng = rand::rng();
        reservoir(items, n, &mut rng)
    };

    Ok(picked)
}

fn reservoir<I, T, R>(items: I, n: usize, rng: &mut R) -> Vec<T>
where
    I: IntoIterator<Item = T>,
    R: RngExt + ?Sized,
{
    let mut kept: Vec<(usize, T)> = Vec::with_capacity(n);
    for (index, item) in items.into_iter().enumerate() {
        if kept.len() < n {
            kept.push((index, item));
            continue;
        }
        let slot = rng.random_range(0..=index);
        if slot < n {
            kept[slot] = (index, item);
        }
    }

    kept.sort_by_key(|(index, _)| *index);
    kept.into_iter().map(|(_, item)| item).collect()
}
