// Training samples and the CSV format operators upload them in.

use super::{ClassifierError, Label};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One labelled example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub text: String,
    pub label: Label,
}

impl TrainingSample {
    pub fn new(text: impl Into<String>, label: impl Into<Label>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }
}

/// A full training set. Each retrain consumes one wholesale.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    samples: Vec<TrainingSample>,
}

impl TrainingSet {
    pub fn new(samples: Vec<TrainingSample>) -> Self {
        Self { samples }
    }

    /// The built-in starter set used until an operator uploads real data.
    pub fn seed() -> Self {
        Self::new(vec![
            TrainingSample::new("urgent meeting tomorrow", "urgent"),
            TrainingSample::new("hi friend how are you", "personal"),
            TrainingSample::new("free money click here", "spam"),
            TrainingSample::new("project status update", "general"),
        ])
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TrainingSample] {
        &self.samples
    }

    /// Applies `f` to every text, e.g. to normalize before training.
    pub fn map_texts<F: Fn(&str) -> String>(&self, f: F) -> Self {
        Self::new(
            self.samples
                .iter()
                .map(|s| TrainingSample::new(f(&s.text), s.label.clone()))
                .collect(),
        )
    }

    /// Texts and labels as parallel vectors.
    pub fn split(&self) -> (Vec<String>, Vec<Label>) {
        self.samples
            .iter()
            .map(|s| (s.text.clone(), s.label.clone()))
            .unzip()
    }

    /// Parses CSV with a header row naming a `text` and a `label` column
    /// (any order, case-insensitive). Fields may be double-quoted with `""`
    /// escapes and embedded newlines. Rows with an empty label are skipped.
    pub fn from_csv(content: &str) -> Result<Self, ClassifierError> {
        let mut records = parse_csv(content).into_iter();
        let header = records
            .next()
            .ok_or_else(|| ClassifierError::InvalidTrainingData("empty file".to_string()))?;

        let column = |name: &str| {
            header
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| ClassifierError::InvalidTrainingData(format!("missing `{name}` column")))
        };
        let text_col = column("text")?;
        let label_col = column("label")?;

        let samples = records
            .filter(|record| !(record.len() == 1 && record[0].trim().is_empty()))
            .filter_map(|record| {
                let text = record.get(text_col)?;
                let label = record.get(label_col)?.trim();
                (!label.is_empty()).then(|| TrainingSample::new(text.clone(), label))
            })
            .collect::<Vec<_>>();

        if samples.is_empty() {
            return Err(ClassifierError::InvalidTrainingData("no labelled rows".to_string()));
        }
        Ok(Self::new(samples))
    }

    pub async fn load_csv(path: &Path) -> Result<Self, ClassifierError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_csv(&content)
    }
}

fn parse_csv(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => record.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            (c, _) => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn parses_quoted_fields() {
        let csv = "label,text\r\nspam,\"Win \"\"big\"\", now\"\npersonal,\"line one\nline two\"\n";
        let set = TrainingSet::from_csv(csv).unwrap();

        assert_eq!(set.len(), 2);
        assert_eq!(set.samples()[0].text, "Win \"big\", now");
        assert_eq!(set.samples()[0].label.as_str(), "spam");
        assert_eq!(set.samples()[1].text, "line one\nline two");
    }

    #[test]
    fn skips_blank_and_unlabelled_rows() {
        let csv = "Text,Label\nhello there,personal\n\norphan,\n";
        let set = TrainingSet::from_csv(csv).unwrap();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn requires_both_columns() {
        let err = TrainingSet::from_csv("body,label\nhi,personal\n").unwrap_err();
        assert!(matches!(err, ClassifierError::InvalidTrainingData(_)));
        assert!(TrainingSet::from_csv("").is_err());
    }

    #[test]
    fn split_keeps_order() {
        let (texts, labels) = TrainingSet::seed().split();
        assert_eq!(texts.len(), 4);
        assert_eq!(texts[2], "free money click here");
        assert_eq!(labels[2].as_str(), "spam");
    }

    #[tokio::test]
    async fn loads_from_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("samples.csv");
        tokio::fs::write(&path, "text,label\nproject update,general\n").await.unwrap();

        let set = TrainingSet::load_csv(&path).await.unwrap();
        assert_eq!(set.samples()[0], TrainingSample::new("project update", "general"));
    }
}
