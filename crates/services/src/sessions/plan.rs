use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng, rng};

use quiz_core::model::{QuestionId, QuestionOrder, SelectionCriteria, SelectionError};

/// Pick the ordered list of question IDs to present.
///
/// - `matching_ids` must already reflect the sheet and category filter.
/// - IDs are deduplicated and sorted ascending first, so the output only depends
///   on the set of IDs and the random source.
/// - `Random` order shuffles the whole set (Fisher–Yates) before truncating to
///   `limit`, so every matching ID is equally likely to appear.
///
/// An empty `matching_ids` yields an empty list; callers decide whether that is an error.
///
/// # Errors
///
/// Returns `SelectionError::InvalidLimit` when `criteria.limit == 0`.
pub fn select_question_ids<R: Rng + ?Sized>(
    criteria: &SelectionCriteria,
    matching_ids: &[QuestionId],
    rng: &mut R,
) -> Result<Vec<QuestionId>, SelectionError> {
    if criteria.limit == 0 {
        return Err(SelectionError::InvalidLimit);
    }
    if matching_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids = matching_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    if criteria.order == QuestionOrder::Random {
        ids.as_mut_slice().shuffle(rng);
    }

    let limit = usize::try_from(criteria.limit).unwrap_or(usize::MAX);
    ids.truncate(limit);
    Ok(ids)
}

/// Source of randomness used when selecting questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionPolicy {
    seed: Option<u64>,
}

impl SelectionPolicy {
    /// Shuffle with the thread-local generator.
    #[must_use]
    pub fn from_entropy() -> Self {
        Self { seed: None }
    }

    /// Shuffle with a generator seeded from `seed`; identical inputs give identical output.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    #[must_use]
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Select question IDs using this policy's random source.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::InvalidLimit` when `criteria.limit == 0`.
    pub fn select(
        &self,
        criteria: &SelectionCriteria,
        matching_ids: &[QuestionId],
    ) -> Result<Vec<QuestionId>, SelectionError> {
        match self.seed {
            Some(seed) => {
                select_question_ids(criteria, matching_ids, &mut StdRng::seed_from_u64(seed))
            }
            None => select_question_ids(criteria, matching_ids, &mut rng()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn ids(values: &[u64]) -> Vec<QuestionId> {
        values.iter().copied().map(QuestionId::new).collect()
    }

    fn criteria(limit: u32, order: QuestionOrder) -> SelectionCriteria {
        SelectionCriteria::new("sheet", limit, order)
    }

    #[test]
    fn sequential_sorts_ascending() {
        let selected = SelectionPolicy::from_entropy()
            .select(&criteria(10, QuestionOrder::Sequential), &ids(&[3, 1, 4, 2]))
            .unwrap();
        assert_eq!(selected, ids(&[1, 2, 3, 4]));
    }

    #[test]
    fn sequential_truncates_after_sorting() {
        let selected = SelectionPolicy::from_entropy()
            .select(&criteria(2, QuestionOrder::Sequential), &ids(&[3, 1, 4, 2]))
            .unwrap();
        assert_eq!(selected, ids(&[1, 2]));
    }

    #[test]
    fn sequential_is_idempotent() {
        let policy = SelectionPolicy::from_entropy();
        let c = criteria(3, QuestionOrder::Sequential);
        let first = policy.select(&c, &ids(&[9, 5, 7, 1])).unwrap();
        let second = policy.select(&c, &first).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, ids(&[1, 5, 7]));
    }

    #[test]
    fn zero_limit_fails_fast() {
        let err = SelectionPolicy::seeded(1)
            .select(&criteria(0, QuestionOrder::Random), &ids(&[1, 2]))
            .unwrap_err();
        assert_eq!(err, SelectionError::InvalidLimit);
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let selected = SelectionPolicy::seeded(1)
            .select(&criteria(5, QuestionOrder::Random), &[])
            .unwrap();
        assert!(selected.is_empty());
    }

    #[test]
    fn length_is_min_of_limit_and_available() {
        let policy = SelectionPolicy::seeded(11);
        let available = ids(&[10, 20, 30, 40, 50]);
        for limit in 1..=8_u32 {
            for order in [QuestionOrder::Sequential, QuestionOrder::Random] {
                let selected = policy.select(&criteria(limit, order), &available).unwrap();
                assert_eq!(selected.len(), (limit as usize).min(available.len()));
            }
        }
    }

    #[test]
    fn random_is_deterministic_per_seed() {
        let c = criteria(4, QuestionOrder::Random);
        let available = ids(&[1, 2, 3, 4, 5, 6, 7, 8]);
        let a = SelectionPolicy::seeded(42).select(&c, &available).unwrap();
        let b = SelectionPolicy::seeded(42).select(&c, &available).unwrap();
        assert_eq!(a, b);

        // input order does not leak into the output
        let mut reversed = available.clone();
        reversed.reverse();
        let c2 = SelectionPolicy::seeded(42).select(&c, &reversed).unwrap();
        assert_eq!(a, c2);
    }

    #[test]
    fn random_selects_distinct_members() {
        let available = ids(&[1, 2, 3, 4, 5, 6]);
        let selected = SelectionPolicy::seeded(7)
            .select(&criteria(6, QuestionOrder::Random), &available)
            .unwrap();
        let unique: HashSet<_> = selected.iter().copied().collect();
        assert_eq!(unique.len(), 6);
        assert!(selected.iter().all(|id| available.contains(id)));
    }

    #[test]
    fn random_truncation_is_uniform_across_seeds() {
        const RUNS: u64 = 2_000;
        let available = ids(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        let c = criteria(3, QuestionOrder::Random);

        let mut counts: HashMap<QuestionId, u32> = HashMap::new();
        for seed in 0..RUNS {
            let mut rng = StdRng::seed_from_u64(seed);
            for id in select_question_ids(&c, &available, &mut rng).unwrap() {
                *counts.entry(id).or_default() += 1;
            }
        }

        // expected 600 each (3/10 of 2000)
        for id in &available {
            let count = counts.get(id).copied().unwrap_or(0);
            assert!((500..=700).contains(&count), "{id} appeared {count} times");
        }
    }
}
