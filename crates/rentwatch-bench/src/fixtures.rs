//! Test data generation for benchmarks.
//!
//! Generators are seeded so that every run sees the same listings.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rentwatch_core::{ListingsStore, Record, Value};

const SEED: u64 = 12345;

/// Scale factor for benchmark data generation.
#[derive(Clone, Copy, Debug, Default)]
pub enum Scale {
    /// 100 listings, for quick iteration.
    Small,
    /// 10,000 listings.
    #[default]
    Medium,
    /// 100,000 listings.
    Large,
}

impl Scale {
    /// Number of listings at this scale.
    pub fn count(&self) -> usize {
        match self {
            Scale::Small => 100,
            Scale::Medium => 10_000,
            Scale::Large => 100_000,
        }
    }
}

/// Generate listings with URLs `https://listings.example/{offset + i}`.
pub fn generate_listings(count: usize, offset: usize) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(SEED.wrapping_add(offset as u64));
    let streets = ["Main St", "Elm St", "Oak Ave", "Lake Rd", "Hill Ln", "Park Pl"];
    let periods = ["unlimited", "12 months", "6 months"];

    (0..count)
        .map(|i| {
            let id = offset + i;
            let rent = 500 + (rng.gen::<u32>() % 3_000) as i64;
            let area = 20.0 + (rng.gen::<u32>() % 1_200) as f64 / 10.0;
            let street = streets[i % streets.len()];

            Record::new()
                .with("listing_url", format!("https://listings.example/{}", id))
                .with("rent", rent)
                .with("deposit", if i % 7 == 0 { Value::Null } else { Value::Int64(rent * 3) })
                .with("area", area)
                .with("address", format!("{} {}", street, 1 + i % 200))
                .with("rental_period", periods[i % periods.len()])
                .with("rooms", 1 + (i % 5) as i64)
        })
        .collect()
}

/// A memory-only store holding `scale.count()` listings.
pub fn populated_store(scale: Scale) -> ListingsStore {
    let mut store = ListingsStore::in_memory();
    let listings = generate_listings(scale.count(), 0);
    // Generated keys are unique, so the batch cannot be rejected.
    if let Err(e) = store.create_many(listings, true) {
        panic!("failed to populate benchmark store: {}", e);
    }
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(generate_listings(10, 0), generate_listings(10, 0));
        assert_ne!(generate_listings(10, 0), generate_listings(10, 5));
    }

    #[test]
    fn test_populated_store() {
        let store = populated_store(Scale::Small);
        assert_eq!(store.len(), Scale::Small.count());
    }
}
