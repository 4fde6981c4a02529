//! Deterministic stratified sampling for judge-based evaluation.
//!
//! Judge calls are expensive, so only a representative subset of queries is
//! evaluated qualitatively: one query per user profile, with profiles chosen
//! by sorting their stable hashes and taking the first `sample_size`. No RNG
//! anywhere — the same query set and sample size select the same queries on
//! every run and on every machine.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::record::QueryRecord;

/// Selects one query per profile for up to `sample_size` distinct profiles.
///
/// Profiles are ordered by their stable hash ([`QueryRecord::profile_key`]);
/// within a profile the first query in original order wins. When fewer
/// distinct profiles exist than `sample_size`, all of them are selected.
pub fn sample_queries(queries: &[QueryRecord], sample_size: usize) -> Vec<QueryRecord> {
    if sample_size == 0 || queries.is_empty() {
        return Vec::new();
    }

    // BTreeMap iteration order IS the hash order; first insertion per
    // profile pins the representative query.
    let mut by_profile: BTreeMap<String, usize> = BTreeMap::new();
    for (idx, query) in queries.iter().enumerate() {
        by_profile.entry(query.profile_key()).or_insert(idx);
    }

    debug!(
        "sampling {} of {} distinct profiles ({} queries total)",
        sample_size.min(by_profile.len()),
        by_profile.len(),
        queries.len()
    );

    let selected: Vec<QueryRecord> = by_profile
        .into_values()
        .take(sample_size)
        .map(|idx| queries[idx].clone())
        .collect();

    info!("selected {} queries for qualitative evaluation", selected.len());
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(id: &str, profile: &str) -> QueryRecord {
        QueryRecord {
            query_id: id.into(),
            text: format!("query {id}"),
            profile: json!({ "major": profile }),
            ground_truth: vec![],
        }
    }

    fn fixture() -> Vec<QueryRecord> {
        vec![
            query("1", "A"),
            query("2", "B"),
            query("3", "A"),
            query("4", "C"),
            query("5", "D"),
            query("6", "B"),
        ]
    }

    #[test]
    fn selection_is_identical_across_repeated_invocations() {
        let queries = fixture();
        let first = sample_queries(&queries, 3);
        assert_eq!(first.len(), 3);
        for _ in 0..100 {
            let again = sample_queries(&queries, 3);
            let ids: Vec<&str> = again.iter().map(|q| q.query_id.as_str()).collect();
            let first_ids: Vec<&str> = first.iter().map(|q| q.query_id.as_str()).collect();
            assert_eq!(ids, first_ids);
        }
    }

    #[test]
    fn one_query_per_profile_first_in_original_order() {
        let selected = sample_queries(&fixture(), 4);
        assert_eq!(selected.len(), 4);
        // Every profile appears once, and the representative is the first
        // query encountered for it ("3" and "6" never win over "1" and "2").
        let ids: Vec<&str> = selected.iter().map(|q| q.query_id.as_str()).collect();
        assert!(ids.contains(&"1"));
        assert!(ids.contains(&"2"));
        assert!(ids.contains(&"4"));
        assert!(ids.contains(&"5"));
    }

    #[test]
    fn fewer_profiles_than_sample_size_selects_all() {
        let selected = sample_queries(&fixture(), 10);
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn zero_sample_size_selects_nothing() {
        assert!(sample_queries(&fixture(), 0).is_empty());
    }

    #[test]
    fn selection_ignores_query_ids_and_text() {
        // Same profiles under different ids/text pick the same profile set.
        let a = sample_queries(&fixture(), 3);
        let renamed: Vec<QueryRecord> = fixture()
            .into_iter()
            .map(|mut q| {
                q.text = format!("rephrased {}", q.text);
                q
            })
            .collect();
        let b = sample_queries(&renamed, 3);
        let profiles_a: Vec<String> = a.iter().map(|q| q.profile_key()).collect();
        let profiles_b: Vec<String> = b.iter().map(|q| q.profile_key()).collect();
        assert_eq!(profiles_a, profiles_b);
    }
}
