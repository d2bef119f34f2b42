use crate::error::LinkageError;
use crate::model::{
    Confidence, Dataset, FeatureMatrix, IndexStats, LinkageResult, Match, MatchTable, Quality, Value,
};

/// Turn classifier output into scored matches, best first.
///
/// Ties keep candidate order.
pub fn build_matches(
    features: &FeatureMatrix,
    predictions: &[bool],
) -> Result<Vec<Match>, LinkageError> {
    if predictions.len() != features.len() {
        return Err(LinkageError::State(format!(
            "{} predictions for {} feature rows",
            predictions.len(),
            features.len()
        )));
    }

    let width = features.width();
    let mut matches: Vec<Match> = features
        .rows
        .iter()
        .zip(&features.pairs)
        .zip(predictions)
        .filter(|(_, &hit)| hit)
        .map(|((row, pair), _)| {
            let total_score: f64 = row.iter().sum();
            let score_ratio = if width == 0 {
                0.0
            } else {
                total_score / width as f64
            };
            Match {
                pair: *pair,
                total_score,
                max_possible_score: width,
                score_ratio,
                features: row.clone(),
                quality: Quality::from_ratio(score_ratio),
                confidence: Confidence::from_features(&features.exact, row),
            }
        })
        .collect();

    matches.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
    Ok(matches)
}

/// Matches across two datasets, `source_*` / `target_*` columns.
pub fn assemble_linkage(
    left: &Dataset,
    right: &Dataset,
    features: &FeatureMatrix,
    predictions: &[bool],
    index_stats: Option<IndexStats>,
) -> Result<LinkageResult, LinkageError> {
    let matches = build_matches(features, predictions)?;
    let layout = Layout {
        left_id: "source_id".into(),
        right_id: "target_id".into(),
        left_prefix: "source_".into(),
        right_prefix: "target_".into(),
    };
    let table = layout.table(left, right, &features.labels, &matches);
    Ok(LinkageResult {
        index_stats,
        labels: features.labels.clone(),
        matches,
        table,
    })
}

/// Matches within one dataset, `{name}_1_*` / `{name}_2_*` columns.
pub fn assemble_dedup(
    data: &Dataset,
    features: &FeatureMatrix,
    predictions: &[bool],
    index_stats: Option<IndexStats>,
) -> Result<LinkageResult, LinkageError> {
    let matches = build_matches(features, predictions)?;
    let name = &data.name;
    let layout = Layout {
        left_id: format!("{name}_id_1"),
        right_id: format!("{name}_id_2"),
        left_prefix: format!("{name}_1_"),
        right_prefix: format!("{name}_2_"),
    };
    let table = layout.table(data, data, &features.labels, &matches);
    Ok(LinkageResult {
        index_stats,
        labels: features.labels.clone(),
        matches,
        table,
    })
}

struct Layout {
    left_id: String,
    right_id: String,
    left_prefix: String,
    right_prefix: String,
}

impl Layout {
    /// Dataset columns to carry, minus any that would repeat an id column.
    fn carried(&self, data: &Dataset, prefix: &str, id: &str) -> Vec<(usize, String)> {
        data.columns
            .iter()
            .enumerate()
            .map(|(i, c)| (i, format!("{prefix}{c}")))
            .filter(|(_, name)| name != id)
            .collect()
    }

    fn table(&self, left: &Dataset, right: &Dataset, labels: &[String], matches: &[Match]) -> MatchTable {
        let left_cols = self.carried(left, &self.left_prefix, &self.left_id);
        let right_cols = self.carried(right, &self.right_prefix, &self.right_id);

        let mut columns = vec![
            self.left_id.clone(),
            self.right_id.clone(),
            "total_score".to_string(),
            "max_possible_score".to_string(),
            "score_ratio".to_string(),
        ];
        columns.extend(left_cols.iter().map(|(_, name)| name.clone()));
        columns.extend(right_cols.iter().map(|(_, name)| name.clone()));
        columns.extend(labels.iter().map(|l| format!("feature_{l}")));
        columns.push("match_quality".into());
        columns.push("confidence".into());

        let rows = matches
            .iter()
            .map(|m| {
                let (i, j) = (m.pair.left, m.pair.right);
                let mut row = Vec::with_capacity(columns.len());
                row.push(left.record_id(i));
                row.push(right.record_id(j));
                row.push(Value::Number(m.total_score));
                row.push(Value::Number(m.max_possible_score as f64));
                row.push(Value::Number(m.score_ratio));
                row.extend(left_cols.iter().map(|(c, _)| left.value(i, *c).clone()));
                row.extend(right_cols.iter().map(|(c, _)| right.value(j, *c).clone()));
                row.extend(m.features.iter().map(|f| Value::Number(*f)));
                row.push(Value::Text(m.quality.to_string()));
                row.push(Value::Text(m.confidence.to_string()));
                row
            })
            .collect();

        MatchTable { columns, rows }
    }
}
