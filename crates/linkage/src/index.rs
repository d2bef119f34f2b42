use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::{IndexingConfig, IndexingMethod};
use crate::error::LinkageError;
use crate::model::{CandidatePair, Dataset, IndexKey, IndexStats};
use crate::observer::LinkageObserver;

/// Candidate pairs in ascending `(left, right)` order, plus reduction stats.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateSet {
    pub pairs: Vec<CandidatePair>,
    pub stats: IndexStats,
}

/// Candidate pairs across two datasets.
pub fn index_linkage(
    left: &Dataset,
    right: &Dataset,
    config: &IndexingConfig,
    job: &str,
    observer: &dyn LinkageObserver,
) -> Result<CandidateSet, LinkageError> {
    let total_possible = left.len() as u64 * right.len() as u64;

    let pairs = match &config.method {
        IndexingMethod::Block { key } => {
            let left_keys = keys_for(left, key)?;
            let right_keys = keys_for(right, key)?;
            block_linkage(&left_keys, &right_keys)
        }
        IndexingMethod::SortedNeighbourhood { key, window } => {
            let left_keys = keys_for(left, key)?;
            let right_keys = keys_for(right, key)?;
            sorted_neighbourhood_linkage(&left_keys, &right_keys, *window)
        }
        IndexingMethod::Full => {
            check_full(total_possible, config, job, observer)?;
            (0..left.len())
                .flat_map(|i| (0..right.len()).map(move |j| CandidatePair::new(i, j)))
                .collect()
        }
    };

    finish(pairs, total_possible, config)
}

/// Candidate pairs within one dataset, `left < right`.
pub fn index_dedup(
    data: &Dataset,
    config: &IndexingConfig,
    job: &str,
    observer: &dyn LinkageObserver,
) -> Result<CandidateSet, LinkageError> {
    let n = data.len() as u64;
    let total_possible = n * n.saturating_sub(1) / 2;

    let pairs = match &config.method {
        IndexingMethod::Block { key } => block_dedup(&keys_for(data, key)?),
        IndexingMethod::SortedNeighbourhood { key, window } => {
            sorted_neighbourhood_dedup(&keys_for(data, key)?, *window)
        }
        IndexingMethod::Full => {
            check_full(total_possible, config, job, observer)?;
            let len = data.len();
            (0..len)
                .flat_map(|i| (i + 1..len).map(move |j| CandidatePair::new(i, j)))
                .collect()
        }
    };

    finish(pairs, total_possible, config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn keys_for(data: &Dataset, key: &str) -> Result<Vec<Option<IndexKey>>, LinkageError> {
    let col = data
        .column_index(key)
        .ok_or_else(|| LinkageError::schema(&data.name, key))?;
    Ok((0..data.len()).map(|row| data.value(row, col).index_key()).collect())
}

fn check_full(
    pairs: u64,
    config: &IndexingConfig,
    job: &str,
    observer: &dyn LinkageObserver,
) -> Result<(), LinkageError> {
    if let Some(limit) = config.max_candidate_pairs {
        if pairs > limit {
            return Err(LinkageError::CandidateLimit { pairs, limit });
        }
    }
    if pairs > config.full_warning_pairs {
        observer.full_index_warning(job, pairs, config.full_warning_pairs);
    }
    Ok(())
}

fn finish(
    mut pairs: Vec<CandidatePair>,
    total_possible: u64,
    config: &IndexingConfig,
) -> Result<CandidateSet, LinkageError> {
    let count = pairs.len() as u64;
    if let Some(limit) = config.max_candidate_pairs {
        if count > limit {
            return Err(LinkageError::CandidateLimit { pairs: count, limit });
        }
    }
    pairs.sort_unstable();
    Ok(CandidateSet {
        pairs,
        stats: IndexStats::new(count, total_possible),
    })
}

fn group_by_key(keys: &[Option<IndexKey>]) -> HashMap<&IndexKey, Vec<usize>> {
    let mut groups: HashMap<&IndexKey, Vec<usize>> = HashMap::new();
    for (row, key) in keys.iter().enumerate() {
        if let Some(k) = key {
            groups.entry(k).or_default().push(row);
        }
    }
    groups
}

fn block_linkage(left: &[Option<IndexKey>], right: &[Option<IndexKey>]) -> Vec<CandidatePair> {
    let right_groups = group_by_key(right);
    let mut pairs = Vec::new();
    for (i, key) in left.iter().enumerate() {
        let Some(k) = key else { continue };
        if let Some(rows) = right_groups.get(k) {
            pairs.extend(rows.iter().map(|&j| CandidatePair::new(i, j)));
        }
    }
    pairs
}

fn block_dedup(keys: &[Option<IndexKey>]) -> Vec<CandidatePair> {
    let mut pairs = Vec::new();
    for rows in group_by_key(keys).values() {
        for (a, &i) in rows.iter().enumerate() {
            pairs.extend(rows[a + 1..].iter().map(|&j| CandidatePair::new(i, j)));
        }
    }
    pairs
}

/// Rank of each distinct key in the sorted union of all key sets.
fn key_ranks<'a>(sets: &[&'a [Option<IndexKey>]]) -> BTreeMap<&'a IndexKey, usize> {
    let distinct: BTreeSet<&IndexKey> = sets
        .iter()
        .copied()
        .flat_map(|keys| keys.iter().flatten())
        .collect();
    distinct.into_iter().enumerate().map(|(rank, k)| (k, rank)).collect()
}

fn rows_by_rank(
    keys: &[Option<IndexKey>],
    ranks: &BTreeMap<&IndexKey, usize>,
) -> (Vec<Option<usize>>, Vec<Vec<usize>>) {
    let mut buckets = vec![Vec::new(); ranks.len()];
    let row_ranks: Vec<Option<usize>> = keys
        .iter()
        .map(|k| k.as_ref().and_then(|k| ranks.get(k).copied()))
        .collect();
    for (row, rank) in row_ranks.iter().enumerate() {
        if let Some(r) = rank {
            buckets[*r].push(row);
        }
    }
    (row_ranks, buckets)
}

fn sorted_neighbourhood_linkage(
    left: &[Option<IndexKey>],
    right: &[Option<IndexKey>],
    window: usize,
) -> Vec<CandidatePair> {
    let ranks = key_ranks(&[left, right]);
    if ranks.is_empty() {
        return Vec::new();
    }
    let half = window / 2;
    let last = ranks.len() - 1;
    let (left_ranks, _) = rows_by_rank(left, &ranks);
    let (_, right_buckets) = rows_by_rank(right, &ranks);

    let mut pairs = Vec::new();
    for (i, rank) in left_ranks.iter().enumerate() {
        let Some(r) = *rank else { continue };
        for bucket in &right_buckets[r.saturating_sub(half)..=(r + half).min(last)] {
            pairs.extend(bucket.iter().map(|&j| CandidatePair::new(i, j)));
        }
    }
    pairs
}

fn sorted_neighbourhood_dedup(keys: &[Option<IndexKey>], window: usize) -> Vec<CandidatePair> {
    let ranks = key_ranks(&[keys]);
    if ranks.is_empty() {
        return Vec::new();
    }
    let half = window / 2;
    let last = ranks.len() - 1;
    let (row_ranks, buckets) = rows_by_rank(keys, &ranks);

    let mut pairs = Vec::new();
    for (i, rank) in row_ranks.iter().enumerate() {
        let Some(r) = *rank else { continue };
        for bucket in &buckets[r.saturating_sub(half)..=(r + half).min(last)] {
            pairs.extend(bucket.iter().filter(|&&j| j > i).map(|&j| CandidatePair::new(i, j)));
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::sync::Mutex;

    fn people(name: &str, cities: &[&str]) -> Dataset {
        Dataset::from_rows(name, &["city"], cities.iter().map(|c| vec![*c]))
    }

    fn block(key: &str) -> IndexingConfig {
        IndexingConfig::new(IndexingMethod::Block { key: key.into() })
    }

    fn snh(key: &str, window: usize) -> IndexingConfig {
        IndexingConfig::new(IndexingMethod::SortedNeighbourhood { key: key.into(), window })
    }

    fn as_tuples(set: &CandidateSet) -> Vec<(usize, usize)> {
        set.pairs.iter().map(|p| (p.left, p.right)).collect()
    }

    #[test]
    fn block_linkage_pairs_equal_keys() {
        let a = people("a", &["Oslo", "Bergen", "", "Oslo"]);
        let b = people("b", &["Bergen", "Oslo", "Oslo"]);
        let set = index_linkage(&a, &b, &block("city"), "a_b", &NoopObserver).unwrap();
        assert_eq!(as_tuples(&set), vec![(0, 1), (0, 2), (1, 0), (3, 1), (3, 2)]);
        assert_eq!(set.stats.candidates, 5);
        assert_eq!(set.stats.total_possible, 12);
    }

    #[test]
    fn block_dedup_within_groups() {
        let a = people("a", &["x", "y", "x", "x", ""]);
        let set = index_dedup(&a, &block("city"), "a_dedup", &NoopObserver).unwrap();
        assert_eq!(as_tuples(&set), vec![(0, 2), (0, 3), (2, 3)]);
        assert_eq!(set.stats.total_possible, 10);
    }

    #[test]
    fn missing_key_is_schema_error() {
        let a = people("a", &["x"]);
        let err = index_dedup(&a, &block("surname"), "a_dedup", &NoopObserver).unwrap_err();
        assert!(matches!(err, LinkageError::Schema { ref column, .. } if column == "surname"));
    }

    #[test]
    fn sorted_neighbourhood_window_one_is_blocking() {
        let a = people("a", &["b", "a", "c"]);
        let b = people("b", &["a", "c", "d"]);
        let snh_set = index_linkage(&a, &b, &snh("city", 1), "j", &NoopObserver).unwrap();
        let block_set = index_linkage(&a, &b, &block("city"), "j", &NoopObserver).unwrap();
        assert_eq!(snh_set.pairs, block_set.pairs);
    }

    #[test]
    fn sorted_neighbourhood_adjacent_ranks() {
        // union ranks: a=0 b=1 c=2 d=3
        let a = people("a", &["a", "c"]);
        let b = people("b", &["b", "d", "a"]);
        let set = index_linkage(&a, &b, &snh("city", 3), "j", &NoopObserver).unwrap();
        // a(0) -> ranks 0..=1 -> b rows 2 (a), 0 (b); c(2) -> ranks 1..=3 -> rows 0 (b), 1 (d)
        assert_eq!(as_tuples(&set), vec![(0, 0), (0, 2), (1, 0), (1, 1)]);
    }

    #[test]
    fn sorted_neighbourhood_dedup_only_forward() {
        let a = people("a", &["b", "a", "b", "z"]);
        let set = index_dedup(&a, &snh("city", 3), "j", &NoopObserver).unwrap();
        // ranks a=0 b=1 z=2; a and z are two ranks apart
        assert_eq!(
            as_tuples(&set),
            vec![(0, 1), (0, 2), (0, 3), (1, 2), (2, 3)]
        );
        assert!(set.pairs.iter().all(|p| p.left < p.right));
    }

    #[test]
    fn full_counts_and_warns() {
        struct Capture(Mutex<Vec<(u64, u64)>>);
        impl LinkageObserver for Capture {
            fn full_index_warning(&self, _job: &str, pairs: u64, limit: u64) {
                self.0.lock().unwrap().push((pairs, limit));
            }
        }

        let a = people("a", &["1", "2", "3"]);
        let b = people("b", &["1", "2"]);
        let mut cfg = IndexingConfig::new(IndexingMethod::Full);
        cfg.full_warning_pairs = 5;
        let obs = Capture(Mutex::new(Vec::new()));

        let set = index_linkage(&a, &b, &cfg, "j", &obs).unwrap();
        assert_eq!(set.pairs.len(), 6);
        assert_eq!(set.stats.reduction_ratio, 0.0);
        assert_eq!(obs.0.lock().unwrap().as_slice(), &[(6, 5)]);

        let dedup = index_dedup(&a, &cfg, "j", &obs).unwrap();
        assert_eq!(as_tuples(&dedup), vec![(0, 1), (0, 2), (1, 2)]);
        assert_eq!(obs.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn candidate_limit() {
        let a = people("a", &["x", "x", "x"]);
        let mut cfg = block("city");
        cfg.max_candidate_pairs = Some(2);
        let err = index_dedup(&a, &cfg, "j", &NoopObserver).unwrap_err();
        assert!(matches!(err, LinkageError::CandidateLimit { pairs: 3, limit: 2 }));

        let mut full = IndexingConfig::new(IndexingMethod::Full);
        full.max_candidate_pairs = Some(5);
        let err = index_linkage(&a, &a, &full, "j", &NoopObserver).unwrap_err();
        assert!(matches!(err, LinkageError::CandidateLimit { pairs: 9, limit: 5 }));
    }

    #[test]
    fn empty_inputs() {
        let a = people("a", &[]);
        let b = people("b", &["x"]);
        let set = index_linkage(&a, &b, &snh("city", 3), "j", &NoopObserver).unwrap();
        assert!(set.pairs.is_empty());
        assert_eq!(set.stats.total_possible, 0);
        assert_eq!(set.stats.reduction_ratio, 0.0);
    }
}
