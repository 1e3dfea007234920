//! Text classification pipeline.
//!
//! Runs any Hub sequence-classification model (DistilBERT, BERT or ModernBERT)
//! and returns the top label with its softmax score.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hub_pipelines::text_classification::TextClassificationPipelineBuilder;
//!
//! # fn main() -> hub_pipelines::error::Result<()> {
//! let pipeline =
//!     TextClassificationPipelineBuilder::new("tabularisai/multilingual-sentiment-analysis")
//!         .build()?;
//!
//! let output = pipeline.run("角田クビ")?;
//! println!("{} ({:.2})", output.prediction.label, output.prediction.score);
//! println!("{}", output.prediction.sentiment()?);
//! # Ok(())
//! # }
//! ```
//!
//! # Batch Inference
//!
//! ```rust,no_run
//! # use hub_pipelines::text_classification::TextClassificationPipelineBuilder;
//! # fn main() -> hub_pipelines::error::Result<()> {
//! # let model_id = "tabularisai/multilingual-sentiment-analysis";
//! # let pipeline = TextClassificationPipelineBuilder::new(model_id).build()?;
//! let output = pipeline.run(&["Best purchase ever!", "Terrible quality."])?;
//!
//! for r in output.results {
//!     let p = r.prediction?;
//!     println!("{}: {} ({:.2})", r.text, p.label, p.score);
//! }
//! # Ok(())
//! # }
//! ```

// ============ Internal API ============

pub(crate) mod builder;
pub(crate) mod model;
pub(crate) mod pipeline;
pub(crate) mod sentiment;

// ============ Public API ============

pub use crate::pipelines::stats::PipelineStats;
pub use builder::TextClassificationPipelineBuilder;
pub use model::SUPPORTED_MODEL_TYPES;
pub use pipeline::{BatchOutput, BatchResult, Output, Prediction, TextClassificationPipeline};
pub use sentiment::Sentiment;

#[doc(hidden)]
pub use pipeline::ClassificationInput;
