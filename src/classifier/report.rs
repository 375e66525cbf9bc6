use super::Label;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Precision, recall and F1 for one label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMetrics {
    pub label: Label,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Result of scoring the classifier against labelled samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub per_label: Vec<LabelMetrics>,
}

impl Evaluation {
    pub(crate) fn compute(expected: &[Label], predicted: &[Label]) -> Self {
        let correct = expected.iter().zip(predicted).filter(|(e, p)| e == p).count();
        let accuracy = correct as f64 / expected.len().max(1) as f64;

        let labels: BTreeSet<&Label> = expected.iter().chain(predicted).collect();
        let per_label = labels
            .into_iter()
            .map(|label| {
                let pairs = expected.iter().zip(predicted);
                let tp = pairs.clone().filter(|(e, p)| *e == label && *p == label).count();
                let fp = pairs.clone().filter(|(e, p)| *e != label && *p == label).count();
                let support = expected.iter().filter(|e| *e == label).count();

                let precision = ratio(tp, tp + fp);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                LabelMetrics {
                    label: label.clone(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        Self {
            accuracy,
            per_label,
        }
    }

    /// Unweighted mean of (precision, recall, f1) across labels.
    pub fn macro_average(&self) -> (f64, f64, f64) {
        let n = self.per_label.len().max(1) as f64;
        let sum = |f: fn(&LabelMetrics) -> f64| self.per_label.iter().map(f).sum::<f64>() / n;
        (sum(|m| m.precision), sum(|m| m.recall), sum(|m| m.f1))
    }

    pub fn support(&self) -> usize {
        self.per_label.iter().map(|m| m.support).sum()
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .per_label
            .iter()
            .map(|m| m.label.as_str().len())
            .chain(["macro avg".len()])
            .max()
            .unwrap_or(0);

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for m in &self.per_label {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label.as_str(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "{:>width$} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, self.support())?;
        let (p, r, f1) = self.macro_average();
        write!(f, "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}", "macro avg", p, r, f1, self.support())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<Label> {
        names.iter().map(|n| Label::from(*n)).collect()
    }

    #[test]
    fn computes_per_label_metrics() {
        let expected = labels(&["spam", "spam", "personal", "urgent"]);
        let predicted = labels(&["spam", "personal", "personal", "urgent"]);

        let eval = Evaluation::compute(&expected, &predicted);

        assert!((eval.accuracy - 0.75).abs() < 1e-9);
        let personal = eval.per_label.iter().find(|m| m.label.as_str() == "personal").unwrap();
        assert!((personal.precision - 0.5).abs() < 1e-9);
        assert!((personal.recall - 1.0).abs() < 1e-9);
        let spam = eval.per_label.iter().find(|m| m.label.as_str() == "spam").unwrap();
        assert!((spam.recall - 0.5).abs() < 1e-9);
        assert_eq!(spam.support, 2);
        assert_eq!(eval.support(), 4);
    }

    #[test]
    fn report_lists_every_label() {
        let eval = Evaluation::compute(&labels(&["spam", "general"]), &labels(&["spam", "spam"]));
        let text = eval.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("general"));
        assert!(text.contains("macro avg"));
    }
}
