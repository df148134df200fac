use proptest::prelude::*;

use contextdb_embed::cosine_similarity;

fn vector(len: usize) -> impl Strategy<Value = Vec<f32>> {
    prop::collection::vec(-100.0f32..100.0, len)
}

proptest! {
    #[test]
    fn similarity_is_symmetric((a, b) in (1usize..64).prop_flat_map(|n| (vector(n), vector(n)))) {
        prop_assert_eq!(cosine_similarity(&a, &b), cosine_similarity(&b, &a));
    }

    #[test]
    fn similarity_stays_in_range((a, b) in (1usize..64).prop_flat_map(|n| (vector(n), vector(n)))) {
        let s = cosine_similarity(&a, &b);
        prop_assert!((-1.0..=1.0).contains(&s));
    }

    #[test]
    fn self_similarity_is_one(a in vector(32)) {
        prop_assume!(a.iter().any(|x| x.abs() > 1e-3));
        let s = cosine_similarity(&a, &a);
        prop_assert!((s - 1.0).abs() < 1e-5, "self similarity was {}", s);
    }

    #[test]
    fn zero_vector_is_never_similar(a in vector(16)) {
        prop_assert_eq!(cosine_similarity(&a, &[0.0; 16]), 0.0);
    }
}
