use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use crate::config::{ComparisonMethod, ComparisonRule, StringAlgorithm};
use crate::error::LinkageError;
use crate::model::{CandidatePair, Dataset, FeatureMatrix, Value};
use crate::observer::LinkageObserver;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y", "%d/%m/%Y", "%Y%m%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Score every candidate pair across two datasets.
pub fn compare_linkage(
    left: &Dataset,
    right: &Dataset,
    pairs: &[CandidatePair],
    rules: &[ComparisonRule],
    job: &str,
    observer: &dyn LinkageObserver,
) -> Result<FeatureMatrix, LinkageError> {
    let usable = usable_rules(rules, job, observer)?;

    let mut columns = Vec::with_capacity(usable.len());
    for rule in &usable {
        let l = prepare(left, rule)?;
        let r = prepare(right, rule)?;
        columns.push((*rule, l, r));
    }

    let rows = pairs
        .iter()
        .map(|p| {
            columns
                .iter()
                .map(|(rule, l, r)| score(&rule.method, l, p.left, r, p.right))
                .collect()
        })
        .collect();

    Ok(FeatureMatrix {
        labels: usable.iter().map(|r| r.label.clone()).collect(),
        exact: usable
            .iter()
            .map(|r| matches!(r.method, ComparisonMethod::Exact { .. }))
            .collect(),
        pairs: pairs.to_vec(),
        rows,
    })
}

/// Score every candidate pair within one dataset.
pub fn compare_dedup(
    data: &Dataset,
    pairs: &[CandidatePair],
    rules: &[ComparisonRule],
    job: &str,
    observer: &dyn LinkageObserver,
) -> Result<FeatureMatrix, LinkageError> {
    compare_linkage(data, data, pairs, rules, job, observer)
}

fn usable_rules<'a>(
    rules: &'a [ComparisonRule],
    job: &str,
    observer: &dyn LinkageObserver,
) -> Result<Vec<&'a ComparisonRule>, LinkageError> {
    if rules.is_empty() {
        return Err(LinkageError::config("comparison rule list is empty"));
    }
    let mut usable = Vec::with_capacity(rules.len());
    for rule in rules {
        match &rule.method {
            ComparisonMethod::Unsupported { name } => observer.rule_skipped(job, &rule.field, name),
            _ => usable.push(rule),
        }
    }
    if usable.is_empty() {
        return Err(LinkageError::config("no usable comparison rules"));
    }
    Ok(usable)
}

// ---------------------------------------------------------------------------
// Column preparation
// ---------------------------------------------------------------------------

/// One rule's field, normalized once per dataset.
enum Prepared {
    Text(Vec<Option<String>>),
    Number(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

fn prepare(data: &Dataset, rule: &ComparisonRule) -> Result<Prepared, LinkageError> {
    let col = data
        .column_index(&rule.field)
        .ok_or_else(|| LinkageError::schema(&data.name, &rule.field))?;
    let values = (0..data.len()).map(|row| data.value(row, col));

    Ok(match &rule.method {
        ComparisonMethod::Exact { case_sensitive }
        | ComparisonMethod::String { case_sensitive, .. } => Prepared::Text(
            values.map(|v| text_of(v, *case_sensitive)).collect(),
        ),
        ComparisonMethod::Numeric { .. } => Prepared::Number(values.map(Value::as_number).collect()),
        ComparisonMethod::Date { .. } => Prepared::Date(values.map(parse_date).collect()),
        ComparisonMethod::Unsupported { .. } => Prepared::Text(Vec::new()),
    })
}

fn text_of(v: &Value, case_sensitive: bool) -> Option<String> {
    if v.is_null() {
        return None;
    }
    let s = v.to_string();
    Some(if case_sensitive { s } else { s.to_lowercase() })
}

/// Parse a cell as a calendar date. Datetimes keep their date part.
pub fn parse_date(v: &Value) -> Option<NaiveDate> {
    let text = match v {
        Value::Date(d) => return Some(*d),
        Value::Null => return None,
        other => other.to_string(),
    };
    let s = text.trim();
    if s.is_empty() {
        return None;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive())
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

fn score(method: &ComparisonMethod, l: &Prepared, i: usize, r: &Prepared, j: usize) -> f64 {
    match (method, l, r) {
        (ComparisonMethod::Exact { .. }, Prepared::Text(a), Prepared::Text(b)) => {
            match (&a[i], &b[j]) {
                (Some(x), Some(y)) if x == y => 1.0,
                _ => 0.0,
            }
        }
        (
            ComparisonMethod::String { algorithm, threshold, .. },
            Prepared::Text(a),
            Prepared::Text(b),
        ) => match (&a[i], &b[j]) {
            (Some(x), Some(y)) => {
                let sim = string_similarity(*algorithm, x, y);
                match threshold {
                    Some(t) if sim >= *t => 1.0,
                    Some(_) => 0.0,
                    None => sim,
                }
            }
            _ => 0.0,
        },
        (ComparisonMethod::Numeric { offset }, Prepared::Number(a), Prepared::Number(b)) => {
            match (a[i], b[j]) {
                (Some(x), Some(y)) => linear_decay((x - y).abs(), *offset),
                _ => 0.0,
            }
        }
        (
            ComparisonMethod::Date { offset_days, swap_month_day },
            Prepared::Date(a),
            Prepared::Date(b),
        ) => match (a[i], b[j]) {
            (Some(x), Some(y)) => date_score(x, y, *offset_days, *swap_month_day),
            _ => 0.0,
        },
        _ => 0.0,
    }
}

/// Similarity in [0, 1] for two present strings.
pub fn string_similarity(algorithm: StringAlgorithm, a: &str, b: &str) -> f64 {
    let sim = match algorithm {
        StringAlgorithm::Jaro => strsim::jaro(a, b),
        StringAlgorithm::JaroWinkler => strsim::jaro_winkler(a, b),
        StringAlgorithm::Levenshtein => strsim::normalized_levenshtein(a, b),
        StringAlgorithm::DamerauLevenshtein => strsim::normalized_damerau_levenshtein(a, b),
        StringAlgorithm::Qgram => strsim::sorensen_dice(a, b),
    };
    sim.clamp(0.0, 1.0)
}

fn linear_decay(distance: f64, offset: f64) -> f64 {
    (1.0 - distance / offset).max(0.0)
}

fn date_score(a: NaiveDate, b: NaiveDate, offset_days: f64, swap_month_day: bool) -> f64 {
    let days = (a - b).num_days().unsigned_abs() as f64;
    let base = linear_decay(days, offset_days);
    if swap_month_day && base < 0.5 {
        let swapped = NaiveDate::from_ymd_opt(a.year(), a.day(), a.month());
        if swapped == Some(b) {
            return 0.5;
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use std::sync::Mutex;

    fn pair(l: usize, r: usize) -> CandidatePair {
        CandidatePair::new(l, r)
    }

    fn one_pair(left: &str, right: &str, rule: ComparisonRule) -> f64 {
        let a = Dataset::from_rows("a", &[rule.field.as_str()], vec![vec![left]]);
        let b = Dataset::from_rows("b", &[rule.field.as_str()], vec![vec![right]]);
        let m = compare_linkage(&a, &b, &[pair(0, 0)], &[rule], "a_b", &NoopObserver).unwrap();
        m.rows[0][0]
    }

    #[test]
    fn exact_scores() {
        assert_eq!(one_pair("Oslo", "Oslo", ComparisonRule::exact("city")), 1.0);
        assert_eq!(one_pair("Oslo", "oslo", ComparisonRule::exact("city")), 0.0);
        assert_eq!(one_pair("", "", ComparisonRule::exact("city")), 0.0);

        let insensitive = ComparisonRule::new(
            "city",
            ComparisonMethod::Exact { case_sensitive: false },
        );
        assert_eq!(one_pair("Oslo", "OSLO", insensitive), 1.0);
    }

    #[test]
    fn exact_matches_number_and_text_forms() {
        let a = Dataset::from_rows("a", &["zip"], vec![vec![Value::Number(5003.0)]]);
        let b = Dataset::from_rows("b", &["zip"], vec![vec!["5003"]]);
        let m = compare_linkage(
            &a,
            &b,
            &[pair(0, 0)],
            &[ComparisonRule::exact("zip")],
            "a_b",
            &NoopObserver,
        )
        .unwrap();
        assert_eq!(m.rows[0][0], 1.0);
    }

    #[test]
    fn string_threshold_binarizes() {
        // jaro-winkler("martha", "marhta") ~ 0.961
        assert_eq!(one_pair("martha", "marhta", ComparisonRule::string("name", None)), 1.0);
        assert_eq!(
            one_pair("martha", "marhta", ComparisonRule::string("name", Some(0.99))),
            0.0
        );
        assert_eq!(one_pair("martha", "", ComparisonRule::string("name", None)), 0.0);
    }

    #[test]
    fn string_continuous_keeps_similarity() {
        let rule = ComparisonRule::new(
            "name",
            ComparisonMethod::String {
                algorithm: StringAlgorithm::Levenshtein,
                threshold: None,
                case_sensitive: true,
            },
        );
        let s = one_pair("kitten", "sitting", rule);
        // 3 edits over 7 chars
        assert!((s - (1.0 - 3.0 / 7.0)).abs() < 1e-9);
    }

    #[test]
    fn string_algorithms_in_unit_range() {
        for algo in [
            StringAlgorithm::Jaro,
            StringAlgorithm::JaroWinkler,
            StringAlgorithm::Levenshtein,
            StringAlgorithm::DamerauLevenshtein,
            StringAlgorithm::Qgram,
        ] {
            assert_eq!(string_similarity(algo, "smith", "smith"), 1.0);
            let s = string_similarity(algo, "smith", "smyth");
            assert!((0.0..1.0).contains(&s), "{algo:?} gave {s}");
        }
    }

    #[test]
    fn numeric_linear_decay() {
        assert_eq!(one_pair("30", "30", ComparisonRule::numeric("age", 5.0)), 1.0);
        assert!((one_pair("30", "32", ComparisonRule::numeric("age", 5.0)) - 0.6).abs() < 1e-12);
        assert_eq!(one_pair("30", "40", ComparisonRule::numeric("age", 5.0)), 0.0);
        assert_eq!(one_pair("30", "n/a", ComparisonRule::numeric("age", 5.0)), 0.0);
        // default offset of 1 means any difference >= 1 scores 0
        assert_eq!(one_pair("30", "31", ComparisonRule::numeric("age", 1.0)), 0.0);
    }

    #[test]
    fn date_scores() {
        assert_eq!(
            one_pair("1980-03-04", "04.03.1980", ComparisonRule::date("dob", 365.0)),
            1.0
        );
        let near = one_pair("1980-03-04", "1980-03-14", ComparisonRule::date("dob", 100.0));
        assert!((near - 0.9).abs() < 1e-12);
        assert_eq!(one_pair("1980-03-04", "garbage", ComparisonRule::date("dob", 365.0)), 0.0);

        let swap = ComparisonRule::new(
            "dob",
            ComparisonMethod::Date { offset_days: 10.0, swap_month_day: true },
        );
        // 1980-03-04 swapped is 1980-04-03
        assert_eq!(one_pair("1980-03-04", "1980-04-03", swap.clone()), 0.5);
        assert_eq!(one_pair("1980-03-04", "1980-03-04", swap), 1.0);
    }

    #[test]
    fn parse_date_formats() {
        let d = NaiveDate::from_ymd_opt(2021, 7, 9).unwrap();
        for s in [
            "2021-07-09",
            "2021/07/09",
            "09.07.2021",
            "09/07/2021",
            "20210709",
            "2021-07-09 13:45:00",
            "2021-07-09T13:45:00+02:00",
        ] {
            assert_eq!(parse_date(&Value::from(s)), Some(d), "{s}");
        }
        assert_eq!(parse_date(&Value::Number(20210709.0)), Some(d));
        assert_eq!(parse_date(&Value::Null), None);
    }

    #[test]
    fn unsupported_rules_are_skipped_with_warning() {
        struct Capture(Mutex<Vec<String>>);
        impl LinkageObserver for Capture {
            fn rule_skipped(&self, _job: &str, field: &str, method: &str) {
                self.0.lock().unwrap().push(format!("{field}:{method}"));
            }
        }

        let a = Dataset::from_rows("a", &["name"], vec![vec!["x"], vec!["x"]]);
        let rules = vec![
            ComparisonRule::exact("name"),
            ComparisonRule::new("geo", ComparisonMethod::Unsupported { name: "geographic".into() }),
        ];
        let obs = Capture(Mutex::new(Vec::new()));
        let m = compare_dedup(&a, &[pair(0, 1)], &rules, "a_dedup", &obs).unwrap();
        assert_eq!(m.labels, vec!["name_exact"]);
        assert_eq!(m.rows, vec![vec![1.0]]);
        assert_eq!(obs.0.lock().unwrap().as_slice(), &["geo:geographic".to_string()]);
    }

    #[test]
    fn rule_list_errors() {
        let a = Dataset::from_rows("a", &["name"], vec![vec!["x"]]);
        let err = compare_dedup(&a, &[], &[], "j", &NoopObserver).unwrap_err();
        assert!(matches!(err, LinkageError::Configuration(_)));

        let only_unsupported =
            vec![ComparisonRule::new("name", ComparisonMethod::Unsupported { name: "x".into() })];
        let err = compare_dedup(&a, &[], &only_unsupported, "j", &NoopObserver).unwrap_err();
        assert!(err.to_string().contains("no usable"));
    }

    #[test]
    fn missing_field_is_schema_error() {
        let a = Dataset::from_rows("a", &["name"], vec![vec!["x"]]);
        let b = Dataset::from_rows("b", &["surname"], vec![vec!["x"]]);
        let err = compare_linkage(
            &a,
            &b,
            &[pair(0, 0)],
            &[ComparisonRule::exact("name")],
            "a_b",
            &NoopObserver,
        )
        .unwrap_err();
        assert!(matches!(err, LinkageError::Schema { ref dataset, .. } if dataset == "b"));
    }

    #[test]
    fn matrix_aligned_with_candidates() {
        let a = Dataset::from_rows("a", &["name"], vec![vec!["ann"], vec!["bob"]]);
        let b = Dataset::from_rows("b", &["name"], vec![vec!["bob"], vec!["ann"]]);
        let pairs = vec![pair(0, 0), pair(0, 1), pair(1, 0)];
        let m = compare_linkage(&a, &b, &pairs, &[ComparisonRule::exact("name")], "j", &NoopObserver)
            .unwrap();
        assert_eq!(m.pairs, pairs);
        assert_eq!(m.rows, vec![vec![0.0], vec![1.0], vec![1.0]]);
        assert_eq!(m.width(), 1);
    }

    #[test]
    fn exact_columns_follow_rule_kind() {
        let a = Dataset::from_rows("a", &["email", "exactaddr"], vec![vec!["x@y.no", "storgata 1"]]);
        let mut eq = ComparisonRule::exact("email");
        eq.label = "email_eq".into();
        let rules = vec![eq, ComparisonRule::string("exactaddr", Some(0.85))];
        let m = compare_linkage(&a, &a, &[pair(0, 0)], &rules, "a_a", &NoopObserver).unwrap();
        assert_eq!(m.labels, vec!["email_eq", "exactaddr_string"]);
        assert_eq!(m.exact, vec![true, false]);
    }
}
