//! Email classification with an open label set.
//!
//! [`EmailClassifier`] is either untrained or trained. Training fits a TF-IDF
//! vectorizer and a multinomial naive Bayes model on the whole sample set,
//! replacing whatever was learned before, and persists the result as JSON.
//! A persisted model is picked up again at construction.

mod naive_bayes;
mod report;
mod tfidf;
mod training;

pub use report::{Evaluation, LabelMetrics};
pub use training::{TrainingSample, TrainingSet};

use crate::normalizer::normalize;
use naive_bayes::MultinomialNb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tfidf::TfidfVectorizer;
use thiserror::Error;
use tracing::{info, warn};

/// A classification outcome. The set of labels is whatever the training data
/// says it is.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Label(String);

impl Label {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_spam(&self) -> bool {
        self.0.trim().eq_ignore_ascii_case("spam")
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Label {
    fn from(value: &str) -> Self {
        Label(value.to_string())
    }
}

impl From<String> for Label {
    fn from(value: String) -> Self {
        Label(value)
    }
}

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("The classifier has not been trained")]
    NotTrained,
    #[error("Got {texts} texts but {labels} labels")]
    LengthMismatch { texts: usize, labels: usize },
    #[error("Cannot train or evaluate on an empty sample set")]
    EmptySampleSet,
    #[error("Invalid training data: {0}")]
    InvalidTrainingData(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct TrainedModel {
    vectorizer: TfidfVectorizer,
    classifier: MultinomialNb,
}

impl TrainedModel {
    fn predict(&self, text: &str) -> Option<Label> {
        self.classifier
            .predict(&self.vectorizer.transform(text))
            .cloned()
    }
}

pub struct EmailClassifier {
    model_path: PathBuf,
    model: Option<TrainedModel>,
}

impl EmailClassifier {
    /// Loads the persisted model at `model_path`, or starts untrained when
    /// there is none or it cannot be read.
    pub async fn load_or_new(model_path: impl Into<PathBuf>) -> Self {
        let model_path = model_path.into();
        let model = match Self::load(&model_path).await {
            Ok(Some(model)) => {
                info!(path = %model_path.display(), labels = model.classifier.classes().len(), "Loaded existing classifier");
                Some(model)
            }
            Ok(None) => {
                info!(path = %model_path.display(), "No classifier found, starting untrained");
                None
            }
            Err(e) => {
                warn!(path = %model_path.display(), error = %e, "Failed to load classifier, starting untrained");
                None
            }
        };
        Self { model_path, model }
    }

    /// Like [`load_or_new`](Self::load_or_new), but an untrained classifier
    /// is trained straight away on the CSV at `training_data`, or on the
    /// built-in seed set when that file is missing or unusable.
    pub async fn load_or_seed(
        model_path: impl Into<PathBuf>,
        training_data: &Path,
    ) -> Result<Self, ClassifierError> {
        let mut classifier = Self::load_or_new(model_path).await;
        if classifier.is_trained() {
            return Ok(classifier);
        }

        let set = match TrainingSet::load_csv(training_data).await {
            Ok(set) => {
                info!(path = %training_data.display(), samples = set.len(), "Training on uploaded data");
                set
            }
            Err(e) => {
                info!(path = %training_data.display(), reason = %e, "Training on the built-in seed set");
                TrainingSet::seed()
            }
        };
        classifier.train_on(&set.map_texts(normalize)).await?;
        Ok(classifier)
    }

    async fn load(path: &Path) -> Result<Option<TrainedModel>, ClassifierError> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Labels seen during the last training.
    pub fn labels(&self) -> &[Label] {
        self.model
            .as_ref()
            .map(|m| m.classifier.classes())
            .unwrap_or_default()
    }

    /// Refits on `texts`/`labels` and persists the model. Persistence
    /// failures are logged; the freshly trained model is used regardless.
    pub async fn train<S: AsRef<str>>(&mut self, texts: &[S], labels: &[Label]) -> Result<(), ClassifierError> {
        check_lengths(texts.len(), labels.len())?;

        info!(samples = texts.len(), "Training classifier");
        let vectorizer = TfidfVectorizer::fit(texts);
        let rows: Vec<_> = texts.iter().map(|t| vectorizer.transform(t.as_ref())).collect();
        let classifier = MultinomialNb::fit(&rows, labels, vectorizer.vocabulary_len());
        let model = TrainedModel {
            vectorizer,
            classifier,
        };

        match self.save(&model).await {
            Ok(()) => info!(path = %self.model_path.display(), "Classifier trained and saved"),
            Err(e) => warn!(path = %self.model_path.display(), error = %e, "Classifier trained but could not be saved"),
        }
        self.model = Some(model);
        Ok(())
    }

    pub async fn train_on(&mut self, set: &TrainingSet) -> Result<(), ClassifierError> {
        let (texts, labels) = set.split();
        self.train(&texts, &labels).await
    }

    async fn save(&self, model: &TrainedModel) -> Result<(), ClassifierError> {
        if let Some(parent) = self.model_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.model_path, serde_json::to_vec_pretty(model)?).await?;
        Ok(())
    }

    pub fn predict(&self, text: &str) -> Result<Label, ClassifierError> {
        let model = self.model.as_ref().ok_or(ClassifierError::NotTrained)?;
        model.predict(text).ok_or(ClassifierError::NotTrained)
    }

    /// Scores the model against labelled samples without changing it.
    pub fn evaluate<S: AsRef<str>>(&self, texts: &[S], labels: &[Label]) -> Result<Evaluation, ClassifierError> {
        check_lengths(texts.len(), labels.len())?;
        let model = self.model.as_ref().ok_or(ClassifierError::NotTrained)?;

        let predicted = texts
            .iter()
            .map(|t| model.predict(t.as_ref()).ok_or(ClassifierError::NotTrained))
            .collect::<Result<Vec<_>, _>>()?;

        let evaluation = Evaluation::compute(labels, &predicted);
        info!(accuracy = evaluation.accuracy, "Classifier evaluated");
        Ok(evaluation)
    }
}

fn check_lengths(texts: usize, labels: usize) -> Result<(), ClassifierError> {
    if texts != labels {
        return Err(ClassifierError::LengthMismatch { texts, labels });
    }
    if texts == 0 {
        return Err(ClassifierError::EmptySampleSet);
    }
    Ok(())
}
