use crate::config::Number;
use wide::f32x8;

/// Dot product and squared magnitudes of two equal-length vectors, using SIMD lanes.
fn dot_and_magnitudes_simd(a: &[Number], b: &[Number]) -> (Number, Number, Number) {
    let mut dot_product = f32x8::splat(0.0);
    let mut mag_a = f32x8::splat(0.0);
    let mut mag_b = f32x8::splat(0.0);

    let len = a.len();
    let simd_len = len - (len % 8);

    // SIMD loop
    for i in (0..simd_len).step_by(8) {
        let va = f32x8::new([
            a[i],
            a[i + 1],
            a[i + 2],
            a[i + 3],
            a[i + 4],
            a[i + 5],
            a[i + 6],
            a[i + 7],
        ]);
        let vb = f32x8::new([
            b[i],
            b[i + 1],
            b[i + 2],
            b[i + 3],
            b[i + 4],
            b[i + 5],
            b[i + 6],
            b[i + 7],
        ]);
        dot_product += va * vb;
        mag_a += va * va;
        mag_b += vb * vb;
    }

    let mut scalar_dot_product = dot_product.reduce_add();
    let mut scalar_mag_a = mag_a.reduce_add();
    let mut scalar_mag_b = mag_b.reduce_add();

    // Handle remaining elements
    for i in simd_len..len {
        scalar_dot_product += a[i] * b[i];
        scalar_mag_a += a[i] * a[i];
        scalar_mag_b += b[i] * b[i];
    }

    (scalar_dot_product, scalar_mag_a, scalar_mag_b)
}

/// Cosine similarity in [-1, 1].
///
/// `None` when the lengths differ or when either vector has zero magnitude,
/// where the similarity is undefined. Each magnitude is checked on its own so
/// that short but non-zero vectors keep their direction.
pub fn compute_cosine_similarity_simd(a: &[Number], b: &[Number]) -> Option<Number> {
    if a.len() != b.len() {
        return None;
    }
    let (dot_product, mag_a, mag_b) = dot_and_magnitudes_simd(a, b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return None;
    }
    let denominator = f64::from(mag_a).sqrt() * f64::from(mag_b).sqrt();
    let similarity = f64::from(dot_product) / denominator;
    Some(similarity.clamp(-1.0, 1.0) as Number)
}

/// Cosine distance `1 - similarity`, in [0, 2].
///
/// Identical vectors are at distance exactly 0, and so is any pair involving
/// a zero vector. `None` only when the lengths differ.
pub fn cosine_distance(a: &[Number], b: &[Number]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }
    if a == b {
        return Some(0.0);
    }
    Some(match compute_cosine_similarity_simd(a, b) {
        Some(similarity) => 1.0 - f64::from(similarity),
        None => 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;
    use rand_distr::{Distribution, Normal};

    #[test]
    fn orthogonal_vectors_are_at_distance_one() {
        assert_eq!(cosine_distance(&[1.0, 0.0], &[0.0, 1.0]), Some(1.0));
    }

    #[test]
    fn opposite_vectors_are_at_distance_two() {
        let d = cosine_distance(&[1.0, 2.0, 3.0], &[-1.0, -2.0, -3.0]).unwrap();
        assert_abs_diff_eq!(d, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn identical_vectors_are_at_distance_zero() {
        let v = [0.3, -0.7, 0.1, 0.9, 0.2, 0.4, -0.5, 0.8, 0.6];
        assert_eq!(cosine_distance(&v, &v), Some(0.0));
    }

    #[test]
    fn zero_vector_has_distance_zero() {
        assert_eq!(cosine_distance(&[0.0; 16], &[1.0; 16]), Some(0.0));
        assert_eq!(compute_cosine_similarity_simd(&[0.0; 4], &[1.0; 4]), None);
    }

    #[test]
    fn length_mismatch_is_rejected() {
        assert_eq!(cosine_distance(&[1.0, 0.0], &[1.0, 0.0, 0.0]), None);
    }

    #[test]
    fn scale_invariant() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let b: Vec<Number> = a.iter().rev().copied().collect();
        let scaled: Vec<Number> = a.iter().map(|x| x * 3.5).collect();
        assert_abs_diff_eq!(
            cosine_distance(&a, &b).unwrap(),
            cosine_distance(&scaled, &b).unwrap(),
            epsilon = 1e-6
        );

        let tiny: Vec<Number> = a.iter().map(|x| x * 1e-4).collect();
        assert_abs_diff_eq!(
            cosine_distance(&a, &b).unwrap(),
            cosine_distance(&tiny, &b).unwrap(),
            epsilon = 1e-6
        );
    }

    #[test]
    fn short_vectors_keep_their_direction() {
        assert_eq!(cosine_distance(&[1e-4, 0.0], &[0.0, 1e-4]), Some(1.0));
        let d = cosine_distance(&[1e-4, 2e-4], &[-1e-4, -2e-4]).unwrap();
        assert_abs_diff_eq!(d, 2.0, epsilon = 1e-6);
        assert!(compute_cosine_similarity_simd(&[1e-4, 0.0], &[1e-4, 1e-4]).is_some());
    }

    #[test]
    fn random_pairs_are_symmetric_and_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        let normal = Normal::new(0.0, 1.0).unwrap();
        for dim in [3usize, 8, 17, 1024] {
            for _ in 0..20 {
                let a: Vec<Number> = normal.sample_iter(&mut rng).take(dim).collect();
                let b: Vec<Number> = normal.sample_iter(&mut rng).take(dim).collect();
                let ab = cosine_distance(&a, &b).unwrap();
                let ba = cosine_distance(&b, &a).unwrap();
                assert_abs_diff_eq!(ab, ba, epsilon = 1e-6);
                assert!((0.0..=2.0).contains(&ab));
            }
        }
    }
}
