// ============ Shared batching ============

pub(crate) mod encoding;

// ============ Model implementations ============

pub(crate) mod bert;
pub(crate) mod distilbert;
pub(crate) mod modernbert;

use crate::error::Result;
use candle_core::Tensor;
use encoding::BatchTensors;

/// A transformer with a sequence-classification head.
pub(crate) trait SequenceClassifier: Send + Sync {
    /// Class probabilities, `(batch, num_labels)`, each row summing to 1.
    fn probabilities(&self, batch: &BatchTensors) -> Result<Tensor>;
}
