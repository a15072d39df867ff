//! Seeded pseudo-random generation for synthetic stream content.
//!
//! The seed is owned by the caller and advanced in place, so a chain of
//! modules randomized from the same seed sequence always reproduces the same
//! content sequence.

/// Advance the seed and return the next pseudo-random value.
pub fn next_u32(seed: &mut u32) -> u32 {
    *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
    let mut x = *seed;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^ (x >> 16)
}

/// Next value in `[0, 1)`.
pub fn next_unit(seed: &mut u32) -> f64 {
    next_u32(seed) as f64 / (u32::MAX as f64 + 1.0)
}

/// Next value in `[min, max)`.
pub fn next_range(seed: &mut u32, min: f64, max: f64) -> f64 {
    min + (max - min) * next_unit(seed)
}

/// Next value in `0..bound` (returns 0 when `bound` is 0).
pub fn next_below(seed: &mut u32, bound: u32) -> u32 {
    if bound == 0 {
        return 0;
    }
    next_u32(seed) % bound
}

/// Next boolean.
pub fn next_bool(seed: &mut u32) -> bool {
    next_u32(seed) & 1 == 1
}
