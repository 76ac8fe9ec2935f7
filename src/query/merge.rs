//! Set operations over sorted id lists.
//!
//! Every input must already be sorted ascending; nothing here checks.

use super::planner::{QueryPlan, SubQueryRole};
use crate::library_store::SongId;
use std::cmp::Ordering;

/// Ids present in both `a` and `b`.
pub fn intersect_sorted_ids(a: &[SongId], b: &[SongId]) -> Vec<SongId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

/// Ids present in `a` but not in `b`.
pub fn subtract_sorted_ids(a: &[SongId], b: &[SongId]) -> Vec<SongId> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &id in a {
        while j < b.len() && b[j] < id {
            j += 1;
        }
        if j < b.len() && b[j] == id {
            continue;
        }
        out.push(id);
    }
    out
}

/// Combines executed sub-query results: the first positive result is
/// intersected with the remaining positives, then every negative result is
/// subtracted. `results` must line up with `plan.sub_queries`.
pub fn merge_results(plan: &QueryPlan, results: Vec<Vec<SongId>>) -> Vec<SongId> {
    let mut merged: Option<Vec<SongId>> = None;
    let mut negatives = Vec::new();

    for (sub_query, ids) in plan.sub_queries.iter().zip(results) {
        match sub_query.role {
            SubQueryRole::Positive => {
                merged = Some(match merged {
                    None => ids,
                    Some(current) => intersect_sorted_ids(&current, &ids),
                });
            }
            SubQueryRole::Negative => negatives.push(ids),
            SubQueryRole::Base => {}
        }
    }

    let mut merged = merged.unwrap_or_default();
    for ids in negatives {
        merged = subtract_sorted_ids(&merged, &ids);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library_store::{EqualityFilter, FilterQuery, RangeFilter};
    use crate::query::planner::SubQuery;

    #[test]
    fn test_intersect() {
        assert_eq!(intersect_sorted_ids(&[1, 3, 5, 7], &[3, 7, 9]), vec![3, 7]);
        assert_eq!(intersect_sorted_ids(&[], &[3, 7, 9]), Vec::<SongId>::new());
        assert_eq!(intersect_sorted_ids(&[1, 2], &[3, 4]), Vec::<SongId>::new());
    }

    #[test]
    fn test_subtract() {
        assert_eq!(subtract_sorted_ids(&[1, 3, 5, 7], &[3, 7, 9]), vec![1, 5]);
        assert_eq!(subtract_sorted_ids(&[1, 3], &[]), vec![1, 3]);
        assert_eq!(subtract_sorted_ids(&[], &[1]), Vec::<SongId>::new());
    }

    #[test]
    fn test_set_laws() {
        let a = vec![1, 2, 4, 8, 16, 32];
        let b = vec![2, 3, 4, 5, 16, 64];
        assert_eq!(intersect_sorted_ids(&a, &b), intersect_sorted_ids(&b, &a));
        assert_eq!(intersect_sorted_ids(&a, &a), a);
        assert!(subtract_sorted_ids(&a, &a).is_empty());

        // a = (a - b) + (a & b), disjointly.
        let mut rebuilt = subtract_sorted_ids(&a, &b);
        rebuilt.extend(intersect_sorted_ids(&a, &b));
        rebuilt.sort();
        assert_eq!(rebuilt, a);
    }

    #[test]
    fn test_merge_results_intersects_then_subtracts() {
        let base = FilterQuery::default();
        let sub = |role, filter| SubQuery { role, filter };
        let plan = QueryPlan {
            base: base.clone(),
            sub_queries: vec![
                sub(SubQueryRole::Positive, base.with_range(RangeFilter::MinRating(3))),
                sub(SubQueryRole::Positive, base.with_range(RangeFilter::MaxPlays(5))),
                sub(
                    SubQueryRole::Negative,
                    base.with_equality(EqualityFilter::Tag("live".to_string())),
                ),
            ],
        };
        let merged = merge_results(
            &plan,
            vec![vec![1, 2, 3, 4, 5], vec![2, 3, 5, 8], vec![3, 9]],
        );
        assert_eq!(merged, vec![2, 5]);
    }
}
