// Classifier - pre-trained model adapter for feature vectors
//
// This module wraps the two externally trained artifacts (a feature scaler
// and a classifier) behind traits so the pipeline only ever sees
// `FeatureVector -> ClassLabel`. Concrete artifact formats live in
// `analysis::artifacts`; anything implementing the traits can be plugged in.
//
// The adapter is the guard between feature extraction and the model: NaN or
// infinite features never reach `transform` or `predict`.

use std::path::Path;

use crate::analysis::artifacts;
use crate::analysis::features::FeatureVector;
use crate::error::{log_startup_error, PipelineError, StartupError};

/// Discrete class produced by the classifier (0 relaxed, 1 attentive, 2 blink
/// for the bundled bindings)
pub type ClassLabel = i64;

/// Affine feature normalization fitted at training time
pub trait Scaler: Send {
    /// Map raw features to the space the classifier was trained in
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, PipelineError>;

    /// Short artifact kind for diagnostics
    fn kind(&self) -> &'static str;
}

/// Trained classifier over scaled features
pub trait Classifier: Send {
    fn predict(&self, scaled: &[f64]) -> Result<ClassLabel, PipelineError>;

    /// Every label `predict` can return
    fn labels(&self) -> Vec<ClassLabel>;

    /// Short artifact kind for diagnostics
    fn kind(&self) -> &'static str;
}

/// Scaler + classifier pair applied to one feature vector at a time
pub struct ClassifierAdapter {
    scaler: Box<dyn Scaler>,
    classifier: Box<dyn Classifier>,
}

impl ClassifierAdapter {
    pub fn new(scaler: Box<dyn Scaler>, classifier: Box<dyn Classifier>) -> Self {
        Self { scaler, classifier }
    }

    /// Load both artifacts from disk
    ///
    /// # Errors
    /// * `ArtifactMissing` - a path does not exist
    /// * `ArtifactCorrupt` - unreadable, not valid JSON, or inconsistent shapes
    pub fn load(scaler_path: &Path, classifier_path: &Path) -> Result<Self, StartupError> {
        let scaler = artifacts::load_scaler(scaler_path)
            .inspect_err(|err| log_startup_error(err, "ClassifierAdapter::load"))?;
        let classifier = artifacts::load_classifier(classifier_path)
            .inspect_err(|err| log_startup_error(err, "ClassifierAdapter::load"))?;
        tracing::info!(
            "[Classifier] Loaded {} scaler from {} and {} classifier from {} (labels {:?})",
            scaler.kind(),
            scaler_path.display(),
            classifier.kind(),
            classifier_path.display(),
            classifier.labels()
        );
        Ok(Self::new(scaler, classifier))
    }

    /// Classify one feature vector
    ///
    /// Rejects non-finite input before scaling and non-finite scaled values
    /// before prediction.
    pub fn classify(&self, features: &FeatureVector) -> Result<ClassLabel, PipelineError> {
        if let Some((name, value)) = features.first_non_finite() {
            return Err(PipelineError::NonFiniteFeature {
                name: name.to_string(),
                value,
            });
        }

        let scaled = self.scaler.transform(&features.to_array())?;
        if let Some((index, value)) = scaled
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(PipelineError::NonFiniteFeature {
                name: format!("scaled[{index}]"),
                value: *value,
            });
        }

        self.classifier.predict(&scaled)
    }

    pub fn labels(&self) -> Vec<ClassLabel> {
        self.classifier.labels()
    }

    pub fn scaler_kind(&self) -> &'static str {
        self.scaler.kind()
    }

    pub fn classifier_kind(&self) -> &'static str {
        self.classifier.kind()
    }
}

#[cfg(test)]
#[path = "classifier_tests.rs"]
mod tests;
