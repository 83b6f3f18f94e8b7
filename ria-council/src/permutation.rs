use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use ria_contracts::AssessmentId;

/// Deterministic permutation of `0..n` seeded by `(assessment_id, iteration)`
/// so repeated runs over the same assessment reproduce identical bootstrap
/// orderings (spec §4.7 Stage 2 step 2).
pub fn permutation(assessment_id: AssessmentId, iteration: u32, n: usize) -> Vec<usize> {
    let mut hasher = DefaultHasher::new();
    assessment_id.0.hash(&mut hasher);
    iteration.hash(&mut hasher);
    let seed = hasher.finish();

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_assessment_and_iteration_yields_same_permutation() {
        let id = AssessmentId::new();
        let a = permutation(id, 0, 5);
        let b = permutation(id, 0, 5);
        assert_eq!(a, b);
    }

    #[test]
    fn different_iterations_usually_differ() {
        let id = AssessmentId::new();
        let a = permutation(id, 0, 8);
        let b = permutation(id, 1, 8);
        assert_ne!(a, b);
    }
}
