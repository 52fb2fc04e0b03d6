//! Classification metrics over label pairs.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Number of confidence bins used for calibration error.
pub const ECE_BINS: usize = 10;

/// Square confusion matrix; rows are true labels, columns predicted labels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub classes: Vec<String>,
    pub matrix: Vec<Vec<u64>>,
}

impl ConfusionMatrix {
    pub fn new(classes: Vec<String>) -> Self {
        let n = classes.len();
        Self {
            classes,
            matrix: vec![vec![0; n]; n],
        }
    }

    /// Count `(true, predicted)` pairs whose labels both belong to `classes`.
    pub fn from_labels(true_labels: &[String], pred_labels: &[String], classes: Vec<String>) -> Self {
        let mut cm = Self::new(classes);
        let index: BTreeMap<&str, usize> = cm
            .classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        let cells: Vec<(usize, usize)> = true_labels
            .iter()
            .zip(pred_labels)
            .filter_map(|(t, p)| Some((*index.get(t.as_str())?, *index.get(p.as_str())?)))
            .collect();
        for (t, p) in cells {
            cm.matrix[t][p] += 1;
        }
        cm
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn get(&self, true_label: &str, pred_label: &str) -> u64 {
        let t = self.classes.iter().position(|c| c == true_label);
        let p = self.classes.iter().position(|c| c == pred_label);
        match (t, p) {
            (Some(t), Some(p)) => self.matrix[t][p],
            _ => 0,
        }
    }

    /// Markdown table, true labels down the side.
    pub fn render_md(&self) -> String {
        if self.is_empty() {
            return "_Empty confusion matrix_\n".to_string();
        }
        let mut out = String::from("| True \\ Pred |");
        for c in &self.classes {
            out.push_str(&format!(" {c} |"));
        }
        out.push_str("\n|---|");
        out.push_str(&"---|".repeat(self.classes.len()));
        out.push('\n');
        for (class, row) in self.classes.iter().zip(&self.matrix) {
            out.push_str(&format!("| {class} |"));
            for n in row {
                out.push_str(&format!(" {n} |"));
            }
            out.push('\n');
        }
        out
    }
}

/// Aggregate metrics for one evaluation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub accuracy: f64,
    pub precision_macro: f64,
    pub recall_macro: f64,
    pub f1_macro: f64,
    pub accuracy_by_class: BTreeMap<String, f64>,
    /// Expected calibration error of the predicted confidences.
    pub ece_confidence: f64,
    pub confusion: ConfusionMatrix,
}

impl EvalMetrics {
    /// Compute every metric from aligned label and confidence vectors.
    pub fn compute(true_labels: &[String], pred_labels: &[String], confidences: &[f64]) -> Self {
        let (precision_macro, recall_macro, f1_macro) = macro_precision_recall_f1(true_labels, pred_labels);
        let top = top_classes(true_labels, 5);
        Self {
            accuracy: accuracy(true_labels, pred_labels),
            precision_macro,
            recall_macro,
            f1_macro,
            accuracy_by_class: per_class_accuracy(true_labels, pred_labels),
            ece_confidence: expected_calibration_error(true_labels, pred_labels, confidences, ECE_BINS),
            confusion: ConfusionMatrix::from_labels(true_labels, pred_labels, top),
        }
    }
}

/// Fraction of positions where the labels agree; 0 for no samples.
pub fn accuracy(true_labels: &[String], pred_labels: &[String]) -> f64 {
    if true_labels.is_empty() {
        return 0.0;
    }
    let correct = true_labels
        .iter()
        .zip(pred_labels)
        .filter(|(t, p)| t == p)
        .count();
    correct as f64 / true_labels.len() as f64
}

/// Accuracy restricted to samples of each true class.
pub fn per_class_accuracy(true_labels: &[String], pred_labels: &[String]) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for (t, p) in true_labels.iter().zip(pred_labels) {
        let entry = totals.entry(t.as_str()).or_default();
        entry.1 += 1;
        if t == p {
            entry.0 += 1;
        }
    }
    totals
        .into_iter()
        .map(|(class, (correct, total))| (class.to_string(), correct as f64 / total as f64))
        .collect()
}

/// Macro-averaged precision, recall and F1 over every label seen on either side.
pub fn macro_precision_recall_f1(true_labels: &[String], pred_labels: &[String]) -> (f64, f64, f64) {
    let classes: BTreeSet<&str> = true_labels
        .iter()
        .chain(pred_labels)
        .map(String::as_str)
        .collect();
    if classes.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };
    let (mut p_sum, mut r_sum, mut f_sum) = (0.0, 0.0, 0.0);
    for class in &classes {
        let mut tp = 0;
        let mut fp = 0;
        let mut fneg = 0;
        for (t, p) in true_labels.iter().zip(pred_labels) {
            match (t == class, p == class) {
                (true, true) => tp += 1,
                (false, true) => fp += 1,
                (true, false) => fneg += 1,
                (false, false) => {}
            }
        }
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fneg);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        p_sum += precision;
        r_sum += recall;
        f_sum += f1;
    }
    let n = classes.len() as f64;
    (p_sum / n, r_sum / n, f_sum / n)
}

/// Up to `k` most frequent labels, ties broken alphabetically.
pub fn top_classes(labels: &[String], k: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label.as_str()).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.into_iter().take(k).map(|(l, _)| l.to_string()).collect()
}

/// Expected calibration error with `bins` equal-width bins over `(lower, upper]`.
///
/// Confidence exactly 0 falls in no bin. Mismatched lengths yield 0.
pub fn expected_calibration_error(
    true_labels: &[String],
    pred_labels: &[String],
    confidences: &[f64],
    bins: usize,
) -> f64 {
    let n = true_labels.len();
    if n == 0 || bins == 0 || confidences.len() != n || pred_labels.len() != n {
        return 0.0;
    }

    let mut ece = 0.0;
    for b in 0..bins {
        let lower = b as f64 / bins as f64;
        let upper = (b + 1) as f64 / bins as f64;
        let in_bin: Vec<usize> = (0..n)
            .filter(|&i| confidences[i] > lower && confidences[i] <= upper)
            .collect();
        if in_bin.is_empty() {
            continue;
        }
        let count = in_bin.len() as f64;
        let correct = in_bin
            .iter()
            .filter(|&&i| true_labels[i] == pred_labels[i])
            .count() as f64;
        let avg_conf = in_bin.iter().map(|&i| confidences[i]).sum::<f64>() / count;
        ece += count / n as f64 * (avg_conf - correct / count).abs();
    }
    ece
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(xs: &[&str]) -> Vec<String> {
        xs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn accuracy_counts_matches() {
        let t = labels(&["Honda", "Ford", "BMW", "Ford"]);
        let p = labels(&["Honda", "Ford", "Ford", "BMW"]);
        assert_eq!(accuracy(&t, &p), 0.5);
        assert_eq!(accuracy(&[], &[]), 0.0);
    }

    #[test]
    fn per_class() {
        let t = labels(&["Honda", "Honda", "Ford"]);
        let p = labels(&["Honda", "Ford", "Ford"]);
        let acc = per_class_accuracy(&t, &p);
        assert_eq!(acc["Honda"], 0.5);
        assert_eq!(acc["Ford"], 1.0);
        assert!(!acc.contains_key("BMW"));
    }

    #[test]
    fn macro_scores_perfect_and_disjoint() {
        let t = labels(&["A", "B", "C"]);
        assert_eq!(macro_precision_recall_f1(&t, &t), (1.0, 1.0, 1.0));
        let p = labels(&["B", "C", "A"]);
        assert_eq!(macro_precision_recall_f1(&t, &p), (0.0, 0.0, 0.0));
    }

    #[test]
    fn macro_scores_mixed() {
        // A: tp=1 fp=1 fn=0 -> p=.5 r=1; B: tp=0 fp=0 fn=1 -> p=0 r=0
        let t = labels(&["A", "B"]);
        let p = labels(&["A", "A"]);
        let (precision, recall, f1) = macro_precision_recall_f1(&t, &p);
        assert!((precision - 0.25).abs() < 1e-12);
        assert!((recall - 0.5).abs() < 1e-12);
        assert!((f1 - (2.0 / 3.0) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn top_classes_by_frequency() {
        let t = labels(&["C", "A", "B", "A", "C", "D", "E", "F", "A"]);
        assert_eq!(top_classes(&t, 3), labels(&["A", "C", "B"]));
        assert_eq!(top_classes(&t, 10).len(), 6);
    }

    #[test]
    fn confusion_ignores_unknown_labels() {
        let t = labels(&["A", "A", "B", "Z"]);
        let p = labels(&["A", "B", "B", "A"]);
        let cm = ConfusionMatrix::from_labels(&t, &p, labels(&["A", "B"]));
        assert_eq!(cm.get("A", "A"), 1);
        assert_eq!(cm.get("A", "B"), 1);
        assert_eq!(cm.get("B", "B"), 1);
        assert_eq!(cm.matrix.iter().flatten().sum::<u64>(), 3);
    }

    #[test]
    fn confusion_markdown() {
        let cm = ConfusionMatrix::from_labels(&labels(&["A"]), &labels(&["A"]), labels(&["A", "B"]));
        assert_eq!(
            cm.render_md(),
            "| True \\ Pred | A | B |\n|---|---|---|\n| A | 1 | 0 |\n| B | 0 | 0 |\n"
        );
    }

    #[test]
    fn ece_perfectly_calibrated_is_zero() {
        let t = labels(&["A", "A"]);
        assert_eq!(expected_calibration_error(&t, &t, &[1.0, 1.0], 10), 0.0);
    }

    #[test]
    fn ece_overconfident() {
        // both in the (0.8, 0.9] bin; one correct -> |0.9 - 0.5| = 0.4
        let t = labels(&["A", "B"]);
        let p = labels(&["A", "A"]);
        let ece = expected_calibration_error(&t, &p, &[0.9, 0.9], 10);
        assert!((ece - 0.4).abs() < 1e-12);
    }

    #[test]
    fn ece_zero_confidence_in_no_bin() {
        let t = labels(&["A"]);
        let p = labels(&["B"]);
        assert_eq!(expected_calibration_error(&t, &p, &[0.0], 10), 0.0);
    }

    #[test]
    fn ece_mismatched_lengths() {
        let t = labels(&["A", "B"]);
        assert_eq!(expected_calibration_error(&t, &t, &[0.5], 10), 0.0);
    }
}
