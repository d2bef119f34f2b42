use proptest::prelude::*;

use reclink_linkage::config::{
    ClassificationConfig, ComparisonMethod, ComparisonRule, IndexingConfig, IndexingMethod,
    LinkageSettings, StringAlgorithm,
};
use reclink_linkage::index::{index_dedup, index_linkage};
use reclink_linkage::model::{Dataset, Quality};
use reclink_linkage::{run_dedup, run_linkage, NoopObserver};

fn people(name: &str, rows: &[(String, String, String)]) -> Dataset {
    Dataset::from_rows(
        name,
        &["name", "city", "age"],
        rows.iter()
            .map(|(n, c, a)| vec![n.as_str(), c.as_str(), a.as_str()]),
    )
}

fn row_strategy() -> impl Strategy<Value = (String, String, String)> {
    (
        prop::sample::select(vec!["ann", "anne", "bob", "rob", "eve", ""]),
        prop::sample::select(vec!["oslo", "bergen", "molde", ""]),
        prop::sample::select(vec!["30", "31", "35", "x", ""]),
    )
        .prop_map(|(n, c, a)| (n.to_string(), c.to_string(), a.to_string()))
}

fn rows_strategy() -> impl Strategy<Value = Vec<(String, String, String)>> {
    prop::collection::vec(row_strategy(), 0..12)
}

fn indexing_strategy() -> impl Strategy<Value = IndexingMethod> {
    prop_oneof![
        Just(IndexingMethod::Full),
        Just(IndexingMethod::Block { key: "city".into() }),
        (0usize..3).prop_map(|w| IndexingMethod::SortedNeighbourhood {
            key: "name".into(),
            window: 2 * w + 1,
        }),
    ]
}

fn settings(indexing: IndexingMethod, threshold: f64) -> LinkageSettings {
    LinkageSettings::new(
        IndexingConfig::new(indexing),
        vec![
            ComparisonRule::exact("city"),
            ComparisonRule::new(
                "name",
                ComparisonMethod::String {
                    algorithm: StringAlgorithm::JaroWinkler,
                    threshold: None,
                    case_sensitive: true,
                },
            ),
            ComparisonRule::numeric("age", 5.0),
        ],
        ClassificationConfig::threshold(threshold),
    )
}

proptest! {
    #[test]
    fn prop_dedup_pairs_ordered_and_unique(rows in rows_strategy(), method in indexing_strategy()) {
        let d = people("p", &rows);
        let set = index_dedup(&d, &IndexingConfig::new(method), "p", &NoopObserver).unwrap();
        for p in &set.pairs {
            prop_assert!(p.left < p.right);
            prop_assert!(p.right < d.len());
        }
        for w in set.pairs.windows(2) {
            prop_assert!(w[0] < w[1], "pairs must be strictly ascending");
        }
        prop_assert!(set.stats.candidates <= set.stats.total_possible);
    }

    #[test]
    fn prop_block_pairs_share_key(a in rows_strategy(), b in rows_strategy()) {
        let (da, db) = (people("a", &a), people("b", &b));
        let cfg = IndexingConfig::new(IndexingMethod::Block { key: "city".into() });
        let set = index_linkage(&da, &db, &cfg, "a_b", &NoopObserver).unwrap();
        for p in &set.pairs {
            prop_assert!(!a[p.left].1.is_empty());
            prop_assert_eq!(&a[p.left].1, &b[p.right].1);
        }
        let expected = a.iter()
            .filter(|r| !r.1.is_empty())
            .map(|r| b.iter().filter(|s| s.1 == r.1).count())
            .sum::<usize>();
        prop_assert_eq!(set.pairs.len(), expected);
    }

    #[test]
    fn prop_window_one_equals_blocking(a in rows_strategy(), b in rows_strategy()) {
        let (da, db) = (people("a", &a), people("b", &b));
        let snh = IndexingConfig::new(IndexingMethod::SortedNeighbourhood { key: "city".into(), window: 1 });
        let block = IndexingConfig::new(IndexingMethod::Block { key: "city".into() });
        let x = index_linkage(&da, &db, &snh, "j", &NoopObserver).unwrap();
        let y = index_linkage(&da, &db, &block, "j", &NoopObserver).unwrap();
        prop_assert_eq!(x.pairs, y.pairs);
    }

    #[test]
    fn prop_wider_window_is_superset(rows in rows_strategy()) {
        let d = people("p", &rows);
        let narrow = IndexingConfig::new(IndexingMethod::SortedNeighbourhood { key: "name".into(), window: 1 });
        let wide = IndexingConfig::new(IndexingMethod::SortedNeighbourhood { key: "name".into(), window: 5 });
        let n = index_dedup(&d, &narrow, "p", &NoopObserver).unwrap();
        let w = index_dedup(&d, &wide, "p", &NoopObserver).unwrap();
        for p in &n.pairs {
            prop_assert!(w.pairs.binary_search(p).is_ok());
        }
    }

    #[test]
    fn prop_match_scores_bounded_and_sorted(
        a in rows_strategy(),
        b in rows_strategy(),
        method in indexing_strategy(),
        threshold in 0.0f64..=1.0,
    ) {
        let s = settings(method, threshold);
        let result = run_linkage(&people("a", &a), &people("b", &b), &s, &NoopObserver).unwrap();
        for m in &result.matches {
            prop_assert_eq!(m.max_possible_score, 3);
            prop_assert!(m.total_score >= 0.0 && m.total_score <= 3.0 + 1e-9);
            prop_assert!(m.features.iter().all(|f| (0.0..=1.0).contains(f)));
            prop_assert!((m.score_ratio - m.total_score / 3.0).abs() < 1e-12);
            prop_assert_eq!(m.quality, Quality::from_ratio(m.score_ratio));
            prop_assert!(m.total_score >= threshold * 3.0);
        }
        for w in result.matches.windows(2) {
            prop_assert!(w[0].total_score >= w[1].total_score);
        }
        prop_assert_eq!(result.table.len(), result.matches.len());
    }

    #[test]
    fn prop_dedup_repeatable(rows in rows_strategy(), method in indexing_strategy()) {
        let d = people("p", &rows);
        let s = settings(method, 0.5);
        let first = run_dedup(&d, &s, &NoopObserver).unwrap();
        let second = run_dedup(&d, &s, &NoopObserver).unwrap();
        prop_assert_eq!(first, second);
    }
}
