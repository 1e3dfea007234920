//! Hugging Face Hub pipelines for sentiment classification and BERT export in Rust.
//!
//! Powered by [Candle](https://github.com/huggingface/candle), with an API inspired by
//! Python's [Transformers](https://huggingface.co/docs/transformers).
//! Includes a text-classification pipeline, a feature-extraction pipeline and an
//! exporter that turns BERT checkpoints into self-contained safetensors bundles.

#![deny(missing_docs)]

// ============ Internal API ============

pub(crate) mod loaders;
pub(crate) mod models;
pub(crate) mod pipelines;

// ============ Public API ============

pub mod error;
pub mod export;

pub use loaders::{HubOptions, ModelSource, WeightFormat};
pub use pipelines::{feature_extraction, text_classification};
