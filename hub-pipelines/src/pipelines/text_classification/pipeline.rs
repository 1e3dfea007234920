use std::sync::Arc;

use serde::Serialize;
use tokenizers::Tokenizer;

use super::model::TextClassificationModel;
use super::sentiment::Sentiment;
use crate::error::{PipelineError, Result};
use crate::pipelines::stats::PipelineStats;

// ============ Output types ============

/// A predicted label with its confidence score.
///
/// Serializes as `{"label": ..., "score": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// The predicted class, as named by the model's `id2label`.
    pub label: String,
    /// Softmax probability of the predicted class (0.0 to 1.0).
    pub score: f32,
}

impl Prediction {
    /// Interprets the label as a five-point sentiment.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Unsupported`] if the label isn't a sentiment name.
    pub fn sentiment(&self) -> Result<Sentiment> {
        self.label.parse()
    }
}

/// Single-text output from `run()`.
#[derive(Debug)]
pub struct Output {
    /// The top prediction.
    pub prediction: Prediction,
    /// Execution statistics.
    pub stats: PipelineStats,
}

/// Single result in batch output.
#[derive(Debug)]
pub struct BatchResult {
    /// Input text.
    pub text: String,
    /// Prediction or error for this input.
    pub prediction: Result<Prediction>,
}

/// Batch output from `run()`.
#[derive(Debug)]
pub struct BatchOutput {
    /// Results for each input, in input order.
    pub results: Vec<BatchResult>,
    /// Execution statistics.
    pub stats: PipelineStats,
}

// ============ Input trait for type-based dispatch ============

#[doc(hidden)]
pub trait ClassificationInput<'a> {
    /// Output type for `.run()`.
    type Output;

    #[doc(hidden)]
    fn into_texts(self) -> Vec<&'a str>;
    #[doc(hidden)]
    fn convert_output(
        texts: Vec<&'a str>,
        predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output>;
}

impl<'a> ClassificationInput<'a> for &'a str {
    type Output = Output;

    fn into_texts(self) -> Vec<&'a str> {
        vec![self]
    }

    fn convert_output(
        _texts: Vec<&'a str>,
        mut predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        let prediction = predictions
            .pop()
            .ok_or_else(|| PipelineError::Unexpected("No predictions returned".into()))??;
        Ok(Output { prediction, stats })
    }
}

impl<'a> ClassificationInput<'a> for &'a [&'a str] {
    type Output = BatchOutput;

    fn into_texts(self) -> Vec<&'a str> {
        self.to_vec()
    }

    fn convert_output(
        texts: Vec<&'a str>,
        predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        let results = texts
            .into_iter()
            .zip(predictions)
            .map(|(text, prediction)| BatchResult {
                text: text.to_string(),
                prediction,
            })
            .collect();
        Ok(BatchOutput { results, stats })
    }
}

impl<'a, const N: usize> ClassificationInput<'a> for &'a [&'a str; N] {
    type Output = BatchOutput;

    fn into_texts(self) -> Vec<&'a str> {
        self.as_slice().to_vec()
    }

    fn convert_output(
        texts: Vec<&'a str>,
        predictions: Vec<Result<Prediction>>,
        stats: PipelineStats,
    ) -> Result<Self::Output> {
        <&'a [&'a str]>::convert_output(texts, predictions, stats)
    }
}

// ============ Pipeline ============

/// Classifies text with a sequence-classification model from the Hub.
///
/// Construct with [`TextClassificationPipelineBuilder`](super::TextClassificationPipelineBuilder).
///
/// # Examples
///
/// ```rust,no_run
/// # use hub_pipelines::text_classification::TextClassificationPipelineBuilder;
/// # fn main() -> hub_pipelines::error::Result<()> {
/// let pipeline =
///     TextClassificationPipelineBuilder::new("tabularisai/multilingual-sentiment-analysis")
///         .build()?;
///
/// // Single text - direct access
/// let output = pipeline.run("I love this product!")?;
/// println!("{}: {:.2}", output.prediction.label, output.prediction.score);
///
/// // Batch - results include input text
/// let output = pipeline.run(&["Great!", "Terrible."])?;
/// for r in output.results {
///     println!("{} → {}", r.text, r.prediction?.label);
/// }
/// # Ok(())
/// # }
/// ```
pub struct TextClassificationPipeline {
    pub(crate) model: Arc<TextClassificationModel>,
    pub(crate) tokenizer: Tokenizer,
}

impl TextClassificationPipeline {
    /// Classify text. Blocks until inference completes.
    ///
    /// Single input → [`Output`], batch → [`BatchOutput`].
    pub fn run<'a, I: ClassificationInput<'a>>(&self, input: I) -> Result<I::Output> {
        let stats_builder = PipelineStats::start();
        let texts = input.into_texts();
        let item_count = texts.len();

        let predictions = self.model.classify_batch(&self.tokenizer, &texts)?;

        I::convert_output(texts, predictions, stats_builder.finish(item_count))
    }

    /// The model's label set, indexed by class id.
    pub fn labels(&self) -> &[String] {
        self.model.labels()
    }

    /// Returns the device (CPU/GPU) the model is running on.
    pub fn device(&self) -> &candle_core::Device {
        self.model.device()
    }
}
