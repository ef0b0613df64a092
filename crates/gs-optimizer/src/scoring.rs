//! Model scoring seam and the built-in cross-validated scorer.

use std::collections::HashMap;

use gs_types::{Dataset, GsResult, ModelConfig, ScoringError};

/// Trains and cross-validates a model on a dataset, returning a quality
/// score where higher is better.
pub trait Scorer: Send + Sync {
    fn score(&self, dataset: &Dataset, folds: u32, model: &ModelConfig) -> GsResult<f64>;

    /// Human-readable scorer name.
    fn name(&self) -> &str;
}

/// Nearest-centroid classifier evaluated by k-fold ROC AUC.
///
/// Features are z-scored with statistics from the training folds; each
/// held-out row scores `d(neg)^2 - d(pos)^2`, its squared distance to the
/// negative class centroid minus that to the positive centroid. The AUC is
/// computed once over all out-of-fold scores. With
/// [`ModelConfig::cross_patient_kfold`] every patient lands in exactly one
/// fold (patients are sorted by id and dealt round-robin); otherwise rows are
/// dealt round-robin.
#[derive(Debug, Clone, Copy, Default)]
pub struct CentroidScorer;

impl CentroidScorer {
    pub fn new() -> Self {
        Self
    }
}

impl Scorer for CentroidScorer {
    fn score(&self, dataset: &Dataset, folds: u32, model: &ModelConfig) -> GsResult<f64> {
        if dataset.is_empty() {
            return Err(ScoringError::EmptyDataset.into());
        }
        let (negatives, positives) = dataset.label_counts();
        if negatives == 0 || positives == 0 {
            return Err(ScoringError::DegenerateLabels {
                message: format!("{negatives} negative and {positives} positive rows"),
            }
            .into());
        }

        let assignment = fold_assignment(dataset, folds, model.cross_patient_kfold)?;
        let width = dataset.width();
        let mut predictions: Vec<(f64, u8)> = Vec::with_capacity(dataset.len());

        for fold in 0..folds as usize {
            let train: Vec<&[f64]> = dataset
                .rows
                .iter()
                .zip(&assignment)
                .filter(|(_, f)| **f != fold)
                .map(|(r, _)| r.values.as_slice())
                .collect();
            let standardizer = Standardizer::fit(&train, width);

            let mut sums = [vec![0.0; width], vec![0.0; width]];
            let mut counts = [0usize; 2];
            for (row, f) in dataset.rows.iter().zip(&assignment) {
                if *f == fold {
                    continue;
                }
                let class = row.label as usize;
                counts[class] += 1;
                for (acc, z) in sums[class].iter_mut().zip(standardizer.transform(&row.values)) {
                    *acc += z;
                }
            }
            if counts[0] == 0 || counts[1] == 0 {
                return Err(ScoringError::DegenerateLabels {
                    message: format!("training split for fold {fold} has a single class"),
                }
                .into());
            }
            let centroids: Vec<Vec<f64>> = sums
                .iter()
                .zip(counts)
                .map(|(sum, n)| sum.iter().map(|s| s / n as f64).collect())
                .collect();

            for (row, f) in dataset.rows.iter().zip(&assignment) {
                if *f != fold {
                    continue;
                }
                let z = standardizer.transform(&row.values);
                let score = squared_distance(&z, &centroids[0]) - squared_distance(&z, &centroids[1]);
                predictions.push((score, row.label));
            }
        }

        roc_auc(&predictions)
    }

    fn name(&self) -> &str {
        "nearest-centroid"
    }
}

/// Fold index for every row of `dataset`.
fn fold_assignment(dataset: &Dataset, folds: u32, cross_patient: bool) -> GsResult<Vec<usize>> {
    if folds < 2 {
        return Err(ScoringError::InvalidFolds { folds }.into());
    }
    let k = folds as usize;

    if cross_patient {
        let mut patients = dataset.patients();
        if patients.len() < k {
            return Err(ScoringError::InsufficientGroups {
                folds,
                groups: patients.len(),
            }
            .into());
        }
        patients.sort_unstable();
        let fold_of: HashMap<&str, usize> = patients
            .into_iter()
            .enumerate()
            .map(|(i, p)| (p, i % k))
            .collect();
        Ok(dataset
            .rows
            .iter()
            .map(|r| fold_of[r.patient.as_str()])
            .collect())
    } else {
        if dataset.len() < k {
            return Err(ScoringError::InsufficientGroups {
                folds,
                groups: dataset.len(),
            }
            .into());
        }
        Ok((0..dataset.len()).map(|i| i % k).collect())
    }
}

struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    fn fit(rows: &[&[f64]], width: usize) -> Self {
        let n = rows.len().max(1) as f64;
        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, v) in mean.iter_mut().zip(row.iter()) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut var = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in var.iter_mut().zip(row.iter()).zip(&mean) {
                *s += (v - m).powi(2);
            }
        }
        // Constant columns keep unit scale.
        let scale = var
            .into_iter()
            .map(|s| {
                let sd = (s / n).sqrt();
                if sd > f64::EPSILON {
                    sd
                } else {
                    1.0
                }
            })
            .collect();

        Self { mean, scale }
    }

    fn transform(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((v, m), s)| (v - m) / s)
            .collect()
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Area under the ROC curve for `(score, label)` pairs, label 1 positive.
///
/// Uses the rank-sum formulation with tied scores sharing their mean rank.
pub fn roc_auc(predictions: &[(f64, u8)]) -> GsResult<f64> {
    let positives = predictions.iter().filter(|(_, l)| *l == 1).count();
    let negatives = predictions.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(ScoringError::DegenerateLabels {
            message: "ROC AUC needs both classes among predictions".to_string(),
        }
        .into());
    }

    let mut order: Vec<usize> = (0..predictions.len()).collect();
    order.sort_by(|a, b| predictions[*a].0.total_cmp(&predictions[*b].0));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && predictions[order[j + 1]].0 == predictions[order[i]].0 {
            j += 1;
        }
        // Ranks are 1-based; ties get the mean of ranks i+1..=j+1.
        let mean_rank = (i + j) as f64 / 2.0 + 1.0;
        for idx in &order[i..=j] {
            if predictions[*idx].1 == 1 {
                positive_rank_sum += mean_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Ok((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gs_types::{GsError, Observation};

    fn separable(patients: usize, rows_per_patient: usize) -> Dataset {
        let mut dataset = Dataset::new(vec!["TVi".into(), "PEEP".into()]);
        for p in 0..patients {
            let label = (p % 2) as u8;
            for r in 0..rows_per_patient {
                let base = if label == 1 { 10.0 } else { 0.0 };
                dataset
                    .push(Observation::new(
                        format!("p{p:02}"),
                        label,
                        vec![base + r as f64 * 0.01, 5.0],
                    ))
                    .unwrap();
            }
        }
        dataset
    }

    #[test]
    fn roc_auc_matches_known_values() {
        let predictions = [(0.1, 0), (0.4, 0), (0.35, 1), (0.8, 1)];
        assert!((roc_auc(&predictions).unwrap() - 0.75).abs() < 1e-12);

        let tied = [(0.5, 0), (0.5, 1), (0.5, 0), (0.5, 1)];
        assert!((roc_auc(&tied).unwrap() - 0.5).abs() < 1e-12);

        assert!(roc_auc(&[(0.3, 1), (0.2, 1)]).is_err());
    }

    #[test]
    fn separable_data_scores_perfectly() {
        let dataset = separable(10, 3);
        let scorer = CentroidScorer::new();
        for folds in [5, 10] {
            let auc = scorer.score(&dataset, folds, &ModelConfig::default()).unwrap();
            assert!((auc - 1.0).abs() < 1e-12, "folds={folds} auc={auc}");
        }
    }

    #[test]
    fn scoring_is_deterministic() {
        let mut dataset = separable(12, 2);
        // Blur the classes so the score is not trivially 1.0.
        dataset.rows[0].values[0] = 12.0;
        dataset.rows[3].values[0] = -1.0;

        let scorer = CentroidScorer::new();
        let model = ModelConfig {
            cross_patient_kfold: false,
            ..ModelConfig::default()
        };
        let first = scorer.score(&dataset, 5, &model).unwrap();
        let second = scorer.score(&dataset, 5, &model).unwrap();
        assert_eq!(first, second);
        assert!(first < 1.0);
    }

    #[test]
    fn too_few_patients_for_folds() {
        let dataset = separable(4, 5);
        let result = CentroidScorer::new().score(&dataset, 5, &ModelConfig::default());
        assert!(matches!(
            result,
            Err(GsError::Scoring(ScoringError::InsufficientGroups { folds: 5, groups: 4 }))
        ));
    }

    #[test]
    fn single_class_is_degenerate() {
        let mut dataset = Dataset::new(vec!["iTime".into()]);
        for p in 0..6 {
            dataset
                .push(Observation::new(format!("p{p}"), 1, vec![p as f64]))
                .unwrap();
        }
        let result = CentroidScorer::new().score(&dataset, 5, &ModelConfig::default());
        assert!(matches!(
            result,
            Err(GsError::Scoring(ScoringError::DegenerateLabels { .. }))
        ));
    }

    #[test]
    fn cross_patient_folds_keep_patients_together() {
        let dataset = separable(6, 4);
        let assignment = fold_assignment(&dataset, 3, true).unwrap();
        for (row, fold) in dataset.rows.iter().zip(&assignment) {
            let same_patient = dataset
                .rows
                .iter()
                .zip(&assignment)
                .filter(|(r, _)| r.patient == row.patient);
            for (_, other) in same_patient {
                assert_eq!(other, fold);
            }
        }
        assert!(fold_assignment(&dataset, 1, true).is_err());
    }
}
