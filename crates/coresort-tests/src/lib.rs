//! Shared inputs and ground truth for the coresort end-to-end tests.

/// Deterministic pseudo-random values from a linear congruential generator.
///
/// `modulus` bounds the magnitude so that small moduli produce many
/// duplicate keys, which is what the stability checks need.
pub fn lcg_values(n: usize, seed: i64, modulus: i64) -> Vec<i64> {
    let mut rng = seed;
    (0..n)
        .map(|_| {
            rng = rng.wrapping_mul(1103515245).wrapping_add(12345);
            (rng >> 16) % modulus
        })
        .collect()
}

/// Identity permutation `[0, n)`.
pub fn identity(n: usize) -> Vec<usize> {
    (0..n).collect()
}

/// Expected index order: a stable sort of positions by value.
pub fn reference_order(values: &[i64]) -> Vec<usize> {
    let mut order = identity(values.len());
    order.sort_by_key(|&i| values[i]);
    order
}

/// True if `indices` orders `values` ascending.
pub fn is_ordered<T: PartialOrd>(indices: &[usize], values: &[T]) -> bool {
    indices
        .windows(2)
        .all(|pair| values[pair[0]] <= values[pair[1]])
}
