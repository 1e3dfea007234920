use std::path::Path;
use std::sync::Arc;

use candle_core::Device;
use tokenizers::Tokenizer;

use super::model::TextClassificationModel;
use super::pipeline::TextClassificationPipeline;
use crate::error::Result;
use crate::loaders::{ModelConfig, ModelFiles, ModelSource};
use crate::pipelines::utils::{BasePipelineBuilder, StandardPipelineBuilder};

crate::pipelines::utils::impl_builder_methods!(TextClassificationPipelineBuilder);

/// Builder for creating [`TextClassificationPipeline`] instances.
///
/// # Examples
///
/// ```rust,no_run
/// # use hub_pipelines::text_classification::TextClassificationPipelineBuilder;
/// # fn main() -> hub_pipelines::error::Result<()> {
/// let model_id = "tabularisai/multilingual-sentiment-analysis";
/// let pipeline = TextClassificationPipelineBuilder::new(model_id)
///     .cuda(0)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct TextClassificationPipelineBuilder {
    base: StandardPipelineBuilder,
}

impl TextClassificationPipelineBuilder {
    /// Creates a builder for a Hub model id.
    pub fn new(model_id: &str) -> Self {
        Self::from_source(ModelSource::hub(model_id))
    }

    /// Creates a builder for a model directory on disk.
    pub fn local(path: impl AsRef<Path>) -> Self {
        Self::from_source(ModelSource::local(path.as_ref()))
    }

    /// Creates a builder for any [`ModelSource`].
    pub fn from_source(source: ModelSource) -> Self {
        Self {
            base: StandardPipelineBuilder::new(source),
        }
    }

    /// Builds the pipeline with configured settings.
    ///
    /// May download and cache model files. Blocks until the model is loaded.
    ///
    /// # Errors
    ///
    /// - [`Download`](crate::error::PipelineError::Download) if the model can't be fetched.
    /// - [`Unsupported`](crate::error::PipelineError::Unsupported) if it isn't a
    ///   sequence classifier of a supported architecture.
    pub fn build(self) -> Result<TextClassificationPipeline> {
        BasePipelineBuilder::build(self)
    }
}

impl BasePipelineBuilder for TextClassificationPipelineBuilder {
    type Model = TextClassificationModel;
    type Pipeline = TextClassificationPipeline;

    fn base(&self) -> &StandardPipelineBuilder {
        &self.base
    }

    fn create_model(
        config: &ModelConfig,
        files: &ModelFiles,
        device: Device,
    ) -> Result<Self::Model> {
        TextClassificationModel::load(config, files, device)
    }

    fn construct_pipeline(
        self,
        model: Arc<Self::Model>,
        tokenizer: Tokenizer,
    ) -> Result<Self::Pipeline> {
        Ok(TextClassificationPipeline { model, tokenizer })
    }
}
