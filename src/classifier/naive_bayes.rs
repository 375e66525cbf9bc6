use super::Label;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Multinomial naive Bayes over TF-IDF rows, with Laplace smoothing and
/// empirical class priors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct MultinomialNb {
    classes: Vec<Label>,
    class_log_prior: Vec<f64>,
    feature_log_prob: Vec<Vec<f64>>,
}

const ALPHA: f64 = 1.0;

impl MultinomialNb {
    pub(crate) fn fit(rows: &[BTreeMap<usize, f64>], labels: &[Label], n_features: usize) -> Self {
        let classes: Vec<Label> = labels.iter().cloned().collect::<BTreeSet<_>>().into_iter().collect();
        let mut class_count = vec![0usize; classes.len()];
        let mut feature_count = vec![vec![0.0f64; n_features]; classes.len()];

        for (row, label) in rows.iter().zip(labels) {
            // `classes` is sorted and contains every label.
            let Ok(c) = classes.binary_search(label) else {
                continue;
            };
            class_count[c] += 1;
            for (&feature, &value) in row {
                feature_count[c][feature] += value;
            }
        }

        let total = rows.len() as f64;
        let class_log_prior = class_count
            .iter()
            .map(|&count| (count as f64 / total).ln())
            .collect();

        let feature_log_prob = feature_count
            .iter()
            .map(|counts| {
                let denominator = counts.iter().sum::<f64>() + ALPHA * n_features as f64;
                counts
                    .iter()
                    .map(|&count| ((count + ALPHA) / denominator).ln())
                    .collect()
            })
            .collect();

        Self {
            classes,
            class_log_prior,
            feature_log_prob,
        }
    }

    /// The most likely class; ties go to the first class in sorted order.
    pub(crate) fn predict(&self, row: &BTreeMap<usize, f64>) -> Option<&Label> {
        let mut best: Option<(usize, f64)> = None;
        for (c, prior) in self.class_log_prior.iter().enumerate() {
            let score = prior
                + row
                    .iter()
                    .map(|(&feature, &value)| value * self.feature_log_prob[c][feature])
                    .sum::<f64>();
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((c, score));
            }
        }
        best.map(|(c, _)| &self.classes[c])
    }

    pub(crate) fn classes(&self) -> &[Label] {
        &self.classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(usize, f64)]) -> BTreeMap<usize, f64> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn picks_class_owning_the_features() {
        let rows = vec![row(&[(0, 1.0)]), row(&[(1, 1.0)])];
        let labels = vec![Label::from("ham"), Label::from("spam")];
        let model = MultinomialNb::fit(&rows, &labels, 2);

        assert_eq!(model.predict(&row(&[(1, 1.0)])), Some(&Label::from("spam")));
        assert_eq!(model.predict(&row(&[(0, 1.0)])), Some(&Label::from("ham")));
    }

    #[test]
    fn empty_row_falls_back_to_prior() {
        let rows = vec![row(&[(0, 1.0)]), row(&[(1, 1.0)]), row(&[(1, 1.0)])];
        let labels = vec![Label::from("ham"), Label::from("spam"), Label::from("spam")];
        let model = MultinomialNb::fit(&rows, &labels, 2);

        assert_eq!(model.predict(&BTreeMap::new()), Some(&Label::from("spam")));
    }

    #[test]
    fn ties_go_to_the_first_label() {
        let rows = vec![row(&[(0, 1.0)]), row(&[(1, 1.0)])];
        let labels = vec![Label::from("beta"), Label::from("alpha")];
        let model = MultinomialNb::fit(&rows, &labels, 2);

        assert_eq!(model.predict(&BTreeMap::new()), Some(&Label::from("alpha")));
        assert_eq!(model.classes().len(), 2);
    }
}
