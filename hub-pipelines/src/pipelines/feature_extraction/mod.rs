//! Feature extraction (sentence embeddings) pipeline.
//!
//! Encodes text with a BERT model and pools the last hidden state into one
//! vector per input. Works on Hub repos and on directories written by
//! [`ExportableModel::save_pretrained`](crate::export::ExportableModel::save_pretrained).
//!
//! ```rust,no_run
//! use hub_pipelines::feature_extraction::FeatureExtractionPipelineBuilder;
//!
//! # fn main() -> hub_pipelines::error::Result<()> {
//! let pipeline = FeatureExtractionPipelineBuilder::new("tohoku-nlp/bert-base-japanese").build()?;
//! let output = pipeline.run("今日はいい天気です")?;
//! assert_eq!(output.embedding.len(), pipeline.dimension());
//! # Ok(())
//! # }
//! ```

pub(crate) mod builder;
pub(crate) mod model;
pub(crate) mod pipeline;

pub use crate::pipelines::stats::PipelineStats;
pub use builder::FeatureExtractionPipelineBuilder;
pub use model::Pooling;
pub use pipeline::{BatchOutput, BatchResult, FeatureExtractionPipeline, Output};

#[doc(hidden)]
pub use pipeline::FeatureInput;
