// Copyright 2026 Quiver Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cost model for execution-time prediction
//!
//! The default model is a small linear regressor trained by gradient
//! descent over min-max-normalized features. It needs no external ML
//! runtime, refits in microseconds at the sample counts we see, and is
//! fully deterministic: zero-initialized weights, fixed epoch count,
//! fixed seed data.

use std::time::Duration;

use crate::core::{Error, Result};

use super::features::{QueryFeatures, FEATURE_COUNT};

/// Gradient-descent epochs per refit
const FIT_EPOCHS: usize = 800;

/// Gradient-descent learning rate (features and labels are normalized)
const FIT_LEARNING_RATE: f64 = 0.3;

/// Confidence penalty applied when a feature falls outside the trained range
const EXTRAPOLATION_PENALTY: f64 = 0.5;

/// A predicted execution time with the model's self-assessed reliability
#[derive(Debug, Clone, PartialEq)]
pub struct PerformancePrediction {
    /// Estimated wall-clock execution time
    pub estimated_execution_time: Duration,
    /// Reliability in [0, 1]; 1.0 means measured, not estimated
    pub confidence: f64,
}

/// One (features, measured time) training observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSample {
    pub features: QueryFeatures,
    pub execution_time_ms: f64,
}

impl TrainingSample {
    /// Create a sample
    pub fn new(features: QueryFeatures, execution_time_ms: f64) -> Self {
        Self {
            features,
            execution_time_ms,
        }
    }
}

/// Regression model over query features
///
/// `fit` is a full refit over the cumulative sample set; implementations
/// must be deterministic for a given sample set so refits are
/// reproducible. `boxed_clone` exists so the trainer can refit a snapshot
/// off to the side and swap it in atomically.
pub trait CostModel: Send + Sync {
    /// Estimate execution time for a feature vector
    fn predict(&self, features: &QueryFeatures) -> Result<PerformancePrediction>;

    /// Refit the model over a cumulative sample set
    fn fit(&mut self, samples: &[TrainingSample]) -> Result<()>;

    /// Clone into a new boxed model
    fn boxed_clone(&self) -> Box<dyn CostModel>;
}

/// The fixed seed dataset the model bootstraps from
///
/// Inference is never attempted against an untrained model; these
/// observations anchor it until real fallback measurements arrive.
pub fn bootstrap_samples() -> Vec<TrainingSample> {
    fn sample(
        table_count: u32,
        join_count: u32,
        filter_count: u32,
        query_length: u32,
        ms: f64,
    ) -> TrainingSample {
        TrainingSample::new(
            QueryFeatures {
                table_count,
                join_count,
                filter_count,
                query_length,
                ..QueryFeatures::default()
            },
            ms,
        )
    }

    vec![
        sample(1, 0, 0, 100, 10.0),
        sample(1, 0, 1, 150, 12.0),
        sample(2, 1, 0, 200, 20.0),
        sample(3, 2, 1, 400, 45.0),
    ]
}

/// Linear regression over normalized features
#[derive(Debug, Clone)]
pub struct LinearModel {
    /// Feature weights plus bias in the last slot
    weights: [f64; FEATURE_COUNT + 1],
    /// Per-feature minimum seen during fit
    feature_min: [f64; FEATURE_COUNT],
    /// Per-feature maximum seen during fit
    feature_max: [f64; FEATURE_COUNT],
    /// Label scale used to normalize execution times
    label_scale: f64,
    /// Mean label of the training set, in milliseconds
    label_mean: f64,
    /// Root-mean-square training error, in milliseconds
    fit_rmse: f64,
    trained: bool,
}

impl Default for LinearModel {
    fn default() -> Self {
        Self::untrained()
    }
}

impl LinearModel {
    /// Create an untrained model
    pub fn untrained() -> Self {
        Self {
            weights: [0.0; FEATURE_COUNT + 1],
            feature_min: [0.0; FEATURE_COUNT],
            feature_max: [1.0; FEATURE_COUNT],
            label_scale: 1.0,
            label_mean: 0.0,
            fit_rmse: 0.0,
            trained: false,
        }
    }

    /// Create a model already fitted on the bootstrap seed dataset
    pub fn bootstrapped() -> Self {
        let mut model = Self::untrained();
        model.fit_inner(&bootstrap_samples());
        model
    }

    /// Normalize one feature vector with the stored fit ranges
    fn normalize(&self, vector: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            let range = self.feature_max[i] - self.feature_min[i];
            out[i] = if range > 0.0 {
                (vector[i] - self.feature_min[i]) / range
            } else {
                0.0
            };
        }
        out
    }

    fn raw_estimate(&self, normalized: &[f64; FEATURE_COUNT]) -> f64 {
        let mut acc = self.weights[FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            acc += self.weights[i] * normalized[i];
        }
        acc * self.label_scale
    }

    /// Fit over a non-empty sample set
    fn fit_inner(&mut self, samples: &[TrainingSample]) {
        let vectors: Vec<[f64; FEATURE_COUNT]> =
            samples.iter().map(|s| s.features.to_vector()).collect();
        let labels: Vec<f64> = samples.iter().map(|s| s.execution_time_ms).collect();

        self.feature_min = [f64::INFINITY; FEATURE_COUNT];
        self.feature_max = [f64::NEG_INFINITY; FEATURE_COUNT];
        for v in &vectors {
            for i in 0..FEATURE_COUNT {
                self.feature_min[i] = self.feature_min[i].min(v[i]);
                self.feature_max[i] = self.feature_max[i].max(v[i]);
            }
        }

        self.label_scale = labels.iter().cloned().fold(1.0f64, f64::max);
        self.label_mean = labels.iter().sum::<f64>() / labels.len() as f64;

        let normalized: Vec<[f64; FEATURE_COUNT]> =
            vectors.iter().map(|v| self.normalize(v)).collect();
        let targets: Vec<f64> = labels.iter().map(|l| l / self.label_scale).collect();

        // Plain batch gradient descent; deterministic for a given set
        self.weights = [0.0; FEATURE_COUNT + 1];
        let n = samples.len() as f64;
        for _ in 0..FIT_EPOCHS {
            let mut gradients = [0.0; FEATURE_COUNT + 1];
            for (x, y) in normalized.iter().zip(&targets) {
                let mut pred = self.weights[FEATURE_COUNT];
                for i in 0..FEATURE_COUNT {
                    pred += self.weights[i] * x[i];
                }
                let err = pred - y;
                for i in 0..FEATURE_COUNT {
                    gradients[i] += err * x[i];
                }
                gradients[FEATURE_COUNT] += err;
            }
            for i in 0..=FEATURE_COUNT {
                self.weights[i] -= FIT_LEARNING_RATE * gradients[i] / n;
            }
        }

        let mut squared_error = 0.0;
        for (x, label) in normalized.iter().zip(&labels) {
            let estimate = self.raw_estimate(x);
            squared_error += (estimate - label) * (estimate - label);
        }
        self.fit_rmse = (squared_error / labels.len() as f64).sqrt();
        self.trained = true;
    }
}

impl CostModel for LinearModel {
    fn predict(&self, features: &QueryFeatures) -> Result<PerformancePrediction> {
        if !self.trained {
            return Err(Error::model("model has not been trained"));
        }

        let vector = features.to_vector();
        let normalized = self.normalize(&vector);
        let estimate_ms = self.raw_estimate(&normalized).max(0.1);

        // Confidence: training fit quality, discounted when the feature
        // vector lies outside the range the model has seen
        let relative_error = self.fit_rmse / self.label_mean.max(1.0);
        let mut confidence = 1.0 / (1.0 + relative_error);
        let extrapolating = normalized.iter().any(|&v| !(-1e-9..=1.0 + 1e-9).contains(&v));
        if extrapolating {
            confidence *= EXTRAPOLATION_PENALTY;
        }

        Ok(PerformancePrediction {
            estimated_execution_time: Duration::from_secs_f64(estimate_ms / 1000.0),
            confidence: confidence.clamp(0.0, 1.0),
        })
    }

    fn fit(&mut self, samples: &[TrainingSample]) -> Result<()> {
        if samples.is_empty() {
            return Err(Error::model("cannot fit on an empty sample set"));
        }
        self.fit_inner(samples);
        Ok(())
    }

    fn boxed_clone(&self) -> Box<dyn CostModel> {
        Box::new(self.clone())
    }
}
