use std::sync::Arc;

use tokenizers::Tokenizer;

use super::model::{FeatureExtractionModel, Pooling};
use crate::error::{PipelineError, Result};
use crate::pipelines::stats::PipelineStats;

/// Single-text output from `run()`.
#[derive(Debug)]
pub struct Output {
    /// Pooled embedding, `hidden_size` long.
    pub embedding: Vec<f32>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

/// Single result in batch output.
#[derive(Debug)]
pub struct BatchResult {
    /// Input text.
    pub text: String,
    /// Embedding or error for this input.
    pub embedding: Result<Vec<f32>>,
}

/// Batch output from `run()`.
#[derive(Debug)]
pub struct BatchOutput {
    /// Results for each input, in input order.
    pub results: Vec<BatchResult>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

#[doc(hidden)]
pub trait FeatureInput<'a> {
    /// Output type for `.run()`.
    type Output;

    #[doc(hidden)]
    fn into_texts(self) -> Vec<&'a str>;
    #[doc(hidden)]
    fn convert_output(
        texts: Vec<&'a str>,
        embeddings: Vec<Result<Vec<f32>>>,
        stats: PipelineStats,
    ) -> Result<Self::Output>;
}

impl<'a> FeatureInput<'a> for &'a str {
    type Output = Output;

    fn into_texts(self) -> Vec<&'a str> {
        vec![self]
    }

    fn convert_output(
        _texts: Vec<&'a str>,
        mut embeddings: Vec<Result<Vec<f32>>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        let embedding = embeddings
            .pop()
            .ok_or_else(|| PipelineError::Unexpected("No embedding returned".into()))??;
        Ok(Output { embedding, stats })
    }
}

impl<'a> FeatureInput<'a> for &'a [&'a str] {
    type Output = BatchOutput;

    fn into_texts(self) -> Vec<&'a str> {
        self.to_vec()
    }

    fn convert_output(
        texts: Vec<&'a str>,
        embeddings: Vec<Result<Vec<f32>>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        let results = texts
            .into_iter()
            .zip(embeddings)
            .map(|(text, embedding)| BatchResult {
                text: text.to_string(),
                embedding,
            })
            .collect();
        Ok(BatchOutput { results, stats })
    }
}

impl<'a, const N: usize> FeatureInput<'a> for &'a [&'a str; N] {
    type Output = BatchOutput;

    fn into_texts(self) -> Vec<&'a str> {
        self.as_slice().to_vec()
    }

    fn convert_output(
        texts: Vec<&'a str>,
        embeddings: Vec<Result<Vec<f32>>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        <&'a [&'a str]>::convert_output(texts, embeddings, stats)
    }
}

/// Produces sentence embeddings from a BERT encoder.
///
/// Construct with [`FeatureExtractionPipelineBuilder`](super::FeatureExtractionPipelineBuilder).
pub struct FeatureExtractionPipeline {
    pub(crate) model: Arc<FeatureExtractionModel>,
    pub(crate) tokenizer: Tokenizer,
    pub(crate) pooling: Pooling,
    pub(crate) normalize: bool,
}

impl FeatureExtractionPipeline {
    /// Embed text. Single input → [`Output`], batch → [`BatchOutput`].
    pub fn run<'a, I: FeatureInput<'a>>(&self, input: I) -> Result<I::Output> {
        let stats_builder = PipelineStats::start();
        let texts = input.into_texts();
        let item_count = texts.len();

        let embeddings =
            self.model
                .embed_batch(&self.tokenizer, &texts, self.pooling, self.normalize)?;

        I::convert_output(texts, embeddings, stats_builder.finish(item_count))
    }

    /// Length of every embedding this pipeline returns.
    pub fn dimension(&self) -> usize {
        self.model.hidden_size()
    }

    /// Returns the device (CPU/GPU) the model is running on.
    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}
