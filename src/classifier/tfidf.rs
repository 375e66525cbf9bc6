use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

lazy_static! {
    // Runs of two or more word characters.
    static ref TOKEN: Regex = Regex::new(r"\b\w\w+\b").expect("token pattern is valid");
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// TF-IDF vectorizer with smoothed idf and L2-normalized rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub(crate) struct TfidfVectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub(crate) fn fit<S: AsRef<str>>(documents: &[S]) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let terms: BTreeSet<&str> = tokenized.iter().flatten().map(String::as_str).collect();
        let vocabulary: BTreeMap<String, usize> = terms
            .into_iter()
            .enumerate()
            .map(|(index, term)| (term.to_string(), index))
            .collect();

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let unique: BTreeSet<&String> = tokens.iter().collect();
            for term in unique {
                document_frequency[vocabulary[term]] += 1;
            }
        }

        let n = documents.len() as f64;
        let idf = document_frequency
            .into_iter()
            .map(|df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        Self { vocabulary, idf }
    }

    pub(crate) fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    /// Sparse TF-IDF row for `text`; terms outside the vocabulary are ignored.
    pub(crate) fn transform(&self, text: &str) -> BTreeMap<usize, f64> {
        let mut row: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokenize(text) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *row.entry(index).or_insert(0.0) += 1.0;
            }
        }
        for (index, value) in row.iter_mut() {
            *value *= self.idf[*index];
        }

        let norm = row.values().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for value in row.values_mut() {
                *value /= norm;
            }
        }
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_skips_single_characters() {
        assert_eq!(tokenize("A quick B2 test, ok?"), vec!["quick", "b2", "test", "ok"]);
    }

    #[test]
    fn rare_terms_weigh_more() {
        let vectorizer = TfidfVectorizer::fit(&["shared rare", "shared common", "shared common"]);
        let row = vectorizer.transform("rare common");
        let rare = row[&vectorizer.vocabulary["rare"]];
        let common = row[&vectorizer.vocabulary["common"]];
        assert!(rare > common);
    }

    #[test]
    fn rows_are_unit_length() {
        let vectorizer = TfidfVectorizer::fit(&["alpha beta gamma", "beta delta"]);
        let row = vectorizer.transform("alpha beta beta delta");
        let norm: f64 = row.values().map(|v| v * v).sum();
        assert!((norm - 1.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_terms_give_an_empty_row() {
        let vectorizer = TfidfVectorizer::fit(&["alpha beta"]);
        assert!(vectorizer.transform("zeta").is_empty());
    }
}
