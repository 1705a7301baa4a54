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

//! Performance prediction with measured fallback
//!
//! Each prediction request runs a fixed sequence: signature-cache lookup,
//! feature extraction, model inference, and, only when the model's
//! confidence is below the threshold, a real measured execution whose
//! timing replaces the estimate and feeds the training queue.
//!
//! Retraining runs on a dedicated background thread. The thread drains
//! every queued sample, refits a snapshot of the model off to the side
//! and swaps it in under a brief write lock, so prediction callers never
//! block on training and never observe a partially refit model.

pub mod features;
pub mod model;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossbeam::channel::{unbounded, Sender};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::backend::QueryExecutor;
use crate::core::Result;
use crate::query::{canonical, Query};

pub use features::{QueryFeatures, FEATURE_COUNT};
pub use model::{
    bootstrap_samples, CostModel, LinearModel, PerformancePrediction, TrainingSample,
};

type SharedModel = Arc<RwLock<Box<dyn CostModel>>>;

/// Execution-cost predictor with signature memoization and online learning
pub struct PerformancePredictor {
    model: SharedModel,
    prediction_cache: DashMap<String, PerformancePrediction>,
    confidence_threshold: f64,
    sample_tx: Option<Sender<TrainingSample>>,
    trainer: Option<thread::JoinHandle<()>>,
    /// Fallback samples enqueued so far
    recorded_samples: AtomicUsize,
    /// Size of the sample set the current model was fitted over
    training_set_size: Arc<AtomicUsize>,
}

impl PerformancePredictor {
    /// Create a predictor with the default linear model, bootstrapped on
    /// the fixed seed dataset
    pub fn new(confidence_threshold: f64) -> Self {
        Self::with_model(Box::new(LinearModel::bootstrapped()), confidence_threshold)
    }

    /// Create a predictor around a caller-supplied model
    pub fn with_model(model: Box<dyn CostModel>, confidence_threshold: f64) -> Self {
        let model: SharedModel = Arc::new(RwLock::new(model));
        let training_set_size = Arc::new(AtomicUsize::new(bootstrap_samples().len()));
        let (sample_tx, sample_rx) = unbounded::<TrainingSample>();

        let trainer_model = Arc::clone(&model);
        let trainer_set_size = Arc::clone(&training_set_size);
        let trainer = thread::Builder::new()
            .name("quiver-trainer".to_string())
            .spawn(move || {
                let mut samples = bootstrap_samples();
                while let Ok(sample) = sample_rx.recv() {
                    samples.push(sample);
                    // Drain the burst: one refit absorbs everything queued
                    while let Ok(more) = sample_rx.try_recv() {
                        samples.push(more);
                    }

                    let mut snapshot = trainer_model.read().boxed_clone();
                    match snapshot.fit(&samples) {
                        Ok(()) => {
                            *trainer_model.write() = snapshot;
                            trainer_set_size.store(samples.len(), Ordering::Release);
                            debug!(samples = samples.len(), "cost model refit");
                        }
                        Err(e) => warn!("cost model refit failed: {}", e),
                    }
                }
            })
            .ok();
        if trainer.is_none() {
            warn!("failed to spawn trainer thread; fallback samples will be dropped");
        }

        Self {
            model,
            prediction_cache: DashMap::new(),
            confidence_threshold,
            sample_tx: Some(sample_tx),
            trainer,
            recorded_samples: AtomicUsize::new(0),
            training_set_size,
        }
    }

    /// Predict execution cost for a query
    ///
    /// Low-confidence estimates are replaced by a measured execution
    /// through the executor's streaming-discard mode; the measurement is
    /// queued for retraining and returned with confidence 1.0.
    pub fn predict(
        &self,
        query: &Query,
        executor: &dyn QueryExecutor,
    ) -> Result<PerformancePrediction> {
        let signature = canonical::query_text(query);
        if let Some(hit) = self.prediction_cache.get(&signature) {
            return Ok(hit.clone());
        }

        let features = QueryFeatures::extract(&signature);
        let mut prediction = self.model.read().predict(&features)?;

        if prediction.confidence < self.confidence_threshold {
            let started = Instant::now();
            executor.load(query)?;
            let measured = started.elapsed();
            debug!(
                query = %signature,
                measured_ms = measured.as_secs_f64() * 1000.0,
                model_confidence = prediction.confidence,
                "low-confidence prediction replaced by measurement"
            );
            prediction = PerformancePrediction {
                estimated_execution_time: measured,
                confidence: 1.0,
            };

            let sample = TrainingSample::new(features, measured.as_secs_f64() * 1000.0);
            match &self.sample_tx {
                Some(tx) if tx.send(sample).is_ok() => {
                    self.recorded_samples.fetch_add(1, Ordering::Relaxed);
                }
                _ => warn!("training queue unavailable; measurement dropped"),
            }
        }

        self.prediction_cache.insert(signature, prediction.clone());
        Ok(prediction)
    }

    /// Number of memoized predictions
    pub fn cached_predictions(&self) -> usize {
        self.prediction_cache.len()
    }

    /// Drop all memoized predictions
    pub fn clear_cache(&self) {
        self.prediction_cache.clear();
    }

    /// Fallback samples recorded so far
    pub fn recorded_samples(&self) -> usize {
        self.recorded_samples.load(Ordering::Relaxed)
    }

    /// Size of the sample set behind the current model
    pub fn training_set_size(&self) -> usize {
        self.training_set_size.load(Ordering::Acquire)
    }
}

impl Drop for PerformancePredictor {
    fn drop(&mut self) {
        // Closing the channel stops the trainer; join for a clean teardown
        self.sample_tx.take();
        if let Some(handle) = self.trainer.take() {
            let _ = handle.join();
        }
    }
}
