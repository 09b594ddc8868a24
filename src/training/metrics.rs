//! Binary classification metrics and the training report

use crate::error::{Result, RiskError};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Confusion counts for the positive class `1`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Self {
        let mut cm = Self::default();
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            match (*t > 0.5, *p > 0.5) {
                (true, true) => cm.tp += 1,
                (false, true) => cm.fp += 1,
                (false, false) => cm.tn += 1,
                (true, false) => cm.fn_ += 1,
            }
        }
        cm
    }

    /// Rows are true labels, columns predicted labels: `[[tn, fp], [fn, tp]]`
    pub fn to_nested(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }
}

/// Held-out scores for one fitted classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub roc_auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub confusion: ConfusionMatrix,
}

impl ClassificationMetrics {
    /// Score probabilities against labels, thresholding at `threshold`.
    ///
    /// Fails when `y_true` holds a single class, since ROC-AUC is undefined.
    pub fn compute(y_true: &Array1<f64>, y_prob: &Array1<f64>, threshold: f64) -> Result<Self> {
        if y_true.len() != y_prob.len() {
            return Err(RiskError::ShapeError {
                expected: format!("{} scores", y_true.len()),
                actual: format!("{} scores", y_prob.len()),
            });
        }
        if y_true.is_empty() {
            return Err(RiskError::TrainingError("empty evaluation split".to_string()));
        }

        let y_pred = y_prob.mapv(|p| if p >= threshold { 1.0 } else { 0.0 });
        let confusion = ConfusionMatrix::compute(y_true, &y_pred);
        let (tp, fp, fn_) = (confusion.tp as f64, confusion.fp as f64, confusion.fn_ as f64);

        let precision = if tp + fp > 0.0 { tp / (tp + fp) } else { 0.0 };
        let recall = if tp + fn_ > 0.0 { tp / (tp + fn_) } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Ok(Self {
            accuracy: (confusion.tp + confusion.tn) as f64 / confusion.total() as f64,
            roc_auc: roc_auc(y_true, y_prob)?,
            precision,
            recall,
            f1,
            confusion,
        })
    }
}

/// Area under the ROC curve via the rank-sum (Mann-Whitney U) statistic.
/// Tied scores share their average rank.
pub fn roc_auc(y_true: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    let n_pos = y_true.iter().filter(|&&t| t > 0.5).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Err(RiskError::TrainingError(
            "ROC-AUC is undefined when only one class is present".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = y_true
        .iter()
        .zip(ranks.iter())
        .filter(|(t, _)| **t > 0.5)
        .map(|(_, r)| r)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaselineReport {
    pub accuracy: f64,
    pub roc_auc: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChampionReport {
    pub accuracy: f64,
    pub roc_auc: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Document written to `metrics.json` after each training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub baseline: BaselineReport,
    pub champion: ChampionReport,
    pub confusion_matrix: [[usize; 2]; 2],
}

impl MetricsReport {
    pub fn new(baseline: &ClassificationMetrics, champion: &ClassificationMetrics) -> Self {
        Self {
            baseline: BaselineReport {
                accuracy: baseline.accuracy,
                roc_auc: baseline.roc_auc,
            },
            champion: ChampionReport {
                accuracy: champion.accuracy,
                roc_auc: champion.roc_auc,
                precision: champion.precision,
                recall: champion.recall,
                f1: champion.f1,
            },
            confusion_matrix: champion.confusion.to_nested(),
        }
    }

    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_classification_metrics() {
        let y_true = array![1.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 0.0];
        let y_prob = array![0.9, 0.2, 0.8, 0.3, 0.1, 0.7, 0.6, 0.4];

        let m = ClassificationMetrics::compute(&y_true, &y_prob, 0.5).unwrap();
        assert_eq!(m.confusion, ConfusionMatrix { tn: 3, fp: 1, fn_: 1, tp: 3 });
        assert!((m.accuracy - 0.75).abs() < 1e-12);
        assert!((m.precision - 0.75).abs() < 1e-12);
        assert!((m.recall - 0.75).abs() < 1e-12);
        assert!((m.f1 - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_extremes() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&y, &array![0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_eq!(roc_auc(&y, &array![0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
        assert_eq!(roc_auc(&y, &array![0.5, 0.5, 0.5, 0.5]).unwrap(), 0.5);
    }

    #[test]
    fn test_roc_auc_partial_ties() {
        // one positive tied with one negative: (1 + 1 + 1 + 0.5) / 4
        let y = array![0.0, 0.0, 1.0, 1.0];
        let auc = roc_auc(&y, &array![0.1, 0.5, 0.5, 0.9]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_roc_auc_single_class_fails() {
        assert!(roc_auc(&array![1.0, 1.0], &array![0.2, 0.9]).is_err());
    }

    #[test]
    fn test_report_layout() {
        let y_true = array![1.0, 0.0, 1.0, 0.0];
        let m = ClassificationMetrics::compute(&y_true, &array![0.9, 0.1, 0.4, 0.6], 0.5).unwrap();
        let report = MetricsReport::new(&m, &m);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["baseline"]["roc_auc"].is_number());
        assert!(json["baseline"].get("precision").is_none());
        assert!(json["champion"]["f1"].is_number());
        assert_eq!(json["confusion_matrix"], serde_json::json!([[1, 1], [1, 1]]));
    }
}
