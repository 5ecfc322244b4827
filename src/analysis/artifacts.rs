//! JSON artifact formats for the scaler and classifier.
//!
//! Artifacts are exported from the training environment as `kind`-tagged
//! JSON documents and validated once at load time, so prediction never has
//! to re-check shapes. Supported kinds:
//!
//! * scaler `standard` - per-feature mean/scale, `(x - mean) / scale`
//! * scaler `identity` - pass-through
//! * classifier `linear` - one-vs-rest linear scores (or a single binary row)
//! * classifier `forest` - averaged decision trees in flat array form

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::analysis::classifier::{ClassLabel, Classifier, Scaler};
use crate::analysis::features::{FEATURE_COUNT, FEATURE_NAMES};
use crate::error::{PipelineError, StartupError};

/// Scaler document as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScalerArtifact {
    Standard {
        mean: Vec<f64>,
        scale: Vec<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        feature_names: Option<Vec<String>>,
    },
    Identity,
}

/// Classifier document as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    Linear {
        classes: Vec<ClassLabel>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    },
    Forest {
        classes: Vec<ClassLabel>,
        trees: Vec<TreeArtifact>,
    },
}

/// One decision tree in flat array form
///
/// Node `i` is a leaf when `children_left[i] == -1`. Internal nodes send a
/// sample left when `x[feature[i]] <= threshold[i]`. `value[i]` holds the
/// per-class weight at node `i`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeArtifact {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

const LEAF: i64 = -1;

/// Load and validate a scaler artifact
pub fn load_scaler(path: &Path) -> Result<Box<dyn Scaler>, StartupError> {
    let artifact: ScalerArtifact = read_artifact(path)?;
    build_scaler(artifact).map_err(|reason| corrupt(path, reason))
}

/// Load and validate a classifier artifact
pub fn load_classifier(path: &Path) -> Result<Box<dyn Classifier>, StartupError> {
    let artifact: ClassifierArtifact = read_artifact(path)?;
    build_classifier(artifact).map_err(|reason| corrupt(path, reason))
}

fn read_artifact<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, StartupError> {
    if !path.exists() {
        return Err(StartupError::ArtifactMissing {
            path: path.to_path_buf(),
        });
    }
    let contents = fs::read_to_string(path).map_err(|err| corrupt(path, err.to_string()))?;
    serde_json::from_str(&contents).map_err(|err| corrupt(path, err.to_string()))
}

fn corrupt(path: &Path, reason: impl Into<String>) -> StartupError {
    StartupError::ArtifactCorrupt {
        path: PathBuf::from(path),
        reason: reason.into(),
    }
}

/// Validate a scaler document and turn it into a runtime scaler
pub fn build_scaler(artifact: ScalerArtifact) -> Result<Box<dyn Scaler>, String> {
    match artifact {
        ScalerArtifact::Identity => Ok(Box::new(IdentityScaler)),
        ScalerArtifact::Standard {
            mean,
            scale,
            feature_names,
        } => {
            if let Some(names) = feature_names {
                if names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
                    return Err(format!(
                        "feature_names {:?} do not match {:?}",
                        names, FEATURE_NAMES
                    ));
                }
            }
            Ok(Box::new(StandardScaler::new(mean, scale)?))
        }
    }
}

/// Validate a classifier document and turn it into a runtime classifier
pub fn build_classifier(artifact: ClassifierArtifact) -> Result<Box<dyn Classifier>, String> {
    match artifact {
        ClassifierArtifact::Linear {
            classes,
            coef,
            intercept,
        } => Ok(Box::new(LinearClassifier::new(classes, coef, intercept)?)),
        ClassifierArtifact::Forest { classes, trees } => {
            Ok(Box::new(ForestClassifier::new(classes, trees)?))
        }
    }
}

fn check_input_len(values: &[f64]) -> Result<(), PipelineError> {
    if values.len() != FEATURE_COUNT {
        return Err(PipelineError::PredictionFailed {
            reason: format!("expected {} features, got {}", FEATURE_COUNT, values.len()),
        });
    }
    Ok(())
}

fn check_classes(classes: &[ClassLabel]) -> Result<(), String> {
    if classes.is_empty() {
        return Err("classes must not be empty".to_string());
    }
    let unique: HashSet<_> = classes.iter().collect();
    if unique.len() != classes.len() {
        return Err(format!("classes contain duplicates: {:?}", classes));
    }
    Ok(())
}

fn check_finite(what: &str, values: &[f64]) -> Result<(), String> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(format!("{what} contains non-finite values"));
    }
    Ok(())
}

/// Index of the first maximum
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate() {
        if value > values[best] {
            best = i;
        }
    }
    best
}

/// Pass-through scaler for models trained on raw features
pub struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, PipelineError> {
        check_input_len(features)?;
        Ok(features.to_vec())
    }

    fn kind(&self) -> &'static str {
        "identity"
    }
}

/// `(x - mean) / scale` per feature
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Zero scale entries (constant training features) are treated as 1
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, String> {
        if mean.len() != FEATURE_COUNT || scale.len() != FEATURE_COUNT {
            return Err(format!(
                "expected {} means and scales, got {} and {}",
                FEATURE_COUNT,
                mean.len(),
                scale.len()
            ));
        }
        check_finite("mean", &mean)?;
        check_finite("scale", &scale)?;

        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();
        Ok(Self { mean, scale })
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>, PipelineError> {
        check_input_len(features)?;
        Ok(features
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect())
    }

    fn kind(&self) -> &'static str {
        "standard"
    }
}

/// Linear decision function `coef · x + intercept`
///
/// A single coefficient row is a binary model: a positive score selects
/// `classes[1]`, anything else `classes[0]`. With one row per class the
/// highest score wins.
pub struct LinearClassifier {
    classes: Vec<ClassLabel>,
    coef: Vec<Vec<f64>>,
    intercept: Vec<f64>,
}

impl LinearClassifier {
    pub fn new(
        classes: Vec<ClassLabel>,
        coef: Vec<Vec<f64>>,
        intercept: Vec<f64>,
    ) -> Result<Self, String> {
        check_classes(&classes)?;
        if coef.is_empty() {
            return Err("coef must have at least one row".to_string());
        }
        for (i, row) in coef.iter().enumerate() {
            if row.len() != FEATURE_COUNT {
                return Err(format!(
                    "coef row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    FEATURE_COUNT
                ));
            }
            check_finite("coef", row)?;
        }
        check_finite("intercept", &intercept)?;
        if intercept.len() != coef.len() {
            return Err(format!(
                "{} intercepts for {} coefficient rows",
                intercept.len(),
                coef.len()
            ));
        }

        let binary = coef.len() == 1;
        if binary && classes.len() != 2 {
            return Err(format!(
                "a single coefficient row needs exactly 2 classes, got {}",
                classes.len()
            ));
        }
        if !binary && coef.len() != classes.len() {
            return Err(format!(
                "{} coefficient rows for {} classes",
                coef.len(),
                classes.len()
            ));
        }

        Ok(Self {
            classes,
            coef,
            intercept,
        })
    }

    fn scores(&self, x: &[f64]) -> Vec<f64> {
        self.coef
            .iter()
            .zip(&self.intercept)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect()
    }
}

impl Classifier for LinearClassifier {
    fn predict(&self, scaled: &[f64]) -> Result<ClassLabel, PipelineError> {
        check_input_len(scaled)?;
        let scores = self.scores(scaled);
        if scores.len() == 1 {
            let index = if scores[0] > 0.0 { 1 } else { 0 };
            return Ok(self.classes[index]);
        }
        Ok(self.classes[argmax(&scores)])
    }

    fn labels(&self) -> Vec<ClassLabel> {
        self.classes.clone()
    }

    fn kind(&self) -> &'static str {
        "linear"
    }
}

/// Validated decision tree
struct DecisionTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    /// Per-class probabilities at each node (rows normalized to sum 1)
    proba: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn new(tree: TreeArtifact, n_classes: usize) -> Result<Self, String> {
        let nodes = tree.children_left.len();
        if nodes == 0 {
            return Err("tree has no nodes".to_string());
        }
        if tree.children_right.len() != nodes
            || tree.feature.len() != nodes
            || tree.threshold.len() != nodes
            || tree.value.len() != nodes
        {
            return Err("tree arrays differ in length".to_string());
        }

        let mut feature = Vec::with_capacity(nodes);
        for i in 0..nodes {
            let left = tree.children_left[i];
            let right = tree.children_right[i];
            if left == LEAF || right == LEAF {
                if left != right {
                    return Err(format!("node {i} has exactly one child"));
                }
                feature.push(0);
                continue;
            }

            // Children always come after their parent, which also rules out cycles
            for child in [left, right] {
                if child <= i as i64 || child >= nodes as i64 {
                    return Err(format!("node {i} points to invalid child {child}"));
                }
            }
            let index = tree.feature[i];
            if index < 0 || index >= FEATURE_COUNT as i64 {
                return Err(format!("node {i} splits on unknown feature {index}"));
            }
            if !tree.threshold[i].is_finite() {
                return Err(format!("node {i} has a non-finite threshold"));
            }
            feature.push(index as usize);
        }

        let mut proba = Vec::with_capacity(nodes);
        for (i, row) in tree.value.into_iter().enumerate() {
            if row.len() != n_classes {
                return Err(format!(
                    "node {i} has {} class weights, expected {n_classes}",
                    row.len()
                ));
            }
            check_finite("value", &row)?;
            let total: f64 = row.iter().sum();
            proba.push(if total > 0.0 {
                row.iter().map(|v| v / total).collect()
            } else {
                vec![0.0; n_classes]
            });
        }

        Ok(Self {
            children_left: tree.children_left,
            children_right: tree.children_right,
            feature,
            threshold: tree.threshold,
            proba,
        })
    }

    fn leaf_proba(&self, x: &[f64]) -> &[f64] {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            node = if x[self.feature[node]] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        &self.proba[node]
    }
}

/// Random-forest style ensemble: averaged leaf probabilities, argmax class
pub struct ForestClassifier {
    classes: Vec<ClassLabel>,
    trees: Vec<DecisionTree>,
}

impl ForestClassifier {
    pub fn new(classes: Vec<ClassLabel>, trees: Vec<TreeArtifact>) -> Result<Self, String> {
        check_classes(&classes)?;
        if trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        let trees = trees
            .into_iter()
            .enumerate()
            .map(|(i, tree)| {
                DecisionTree::new(tree, classes.len()).map_err(|reason| format!("tree {i}: {reason}"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { classes, trees })
    }

    /// Class probabilities averaged over all trees
    pub fn predict_proba(&self, scaled: &[f64]) -> Result<Vec<f64>, PipelineError> {
        check_input_len(scaled)?;
        let mut total = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (sum, p) in total.iter_mut().zip(tree.leaf_proba(scaled)) {
                *sum += p;
            }
        }
        let count = self.trees.len() as f64;
        Ok(total.into_iter().map(|p| p / count).collect())
    }
}

impl Classifier for ForestClassifier {
    fn predict(&self, scaled: &[f64]) -> Result<ClassLabel, PipelineError> {
        let proba = self.predict_proba(scaled)?;
        Ok(self.classes[argmax(&proba)])
    }

    fn labels(&self) -> Vec<ClassLabel> {
        self.classes.clone()
    }

    fn kind(&self) -> &'static str {
        "forest"
    }
}
