use std::path::Path;
use std::sync::Arc;

use candle_core::Device;
use tokenizers::Tokenizer;

use super::model::{FeatureExtractionModel, Pooling};
use super::pipeline::FeatureExtractionPipeline;
use crate::error::Result;
use crate::loaders::{ModelConfig, ModelFiles, ModelSource};
use crate::pipelines::utils::{BasePipelineBuilder, StandardPipelineBuilder};

crate::pipelines::utils::impl_builder_methods!(FeatureExtractionPipelineBuilder);

/// Builder for creating [`FeatureExtractionPipeline`] instances.
///
/// # Examples
///
/// ```rust,no_run
/// # use hub_pipelines::feature_extraction::{FeatureExtractionPipelineBuilder, Pooling};
/// # fn main() -> hub_pipelines::error::Result<()> {
/// let pipeline = FeatureExtractionPipelineBuilder::local("dist/bert-base-japanese-onnx")
///     .pooling(Pooling::Cls)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct FeatureExtractionPipelineBuilder {
    base: StandardPipelineBuilder,
    pooling: Pooling,
    normalize: bool,
}

impl FeatureExtractionPipelineBuilder {
    /// Creates a builder for a Hub model id.
    pub fn new(model_id: &str) -> Self {
        Self::from_source(ModelSource::hub(model_id))
    }

    /// Creates a builder for a model directory on disk, such as an export.
    pub fn local(path: impl AsRef<Path>) -> Self {
        Self::from_source(ModelSource::local(path.as_ref()))
    }

    /// Creates a builder for any [`ModelSource`].
    pub fn from_source(source: ModelSource) -> Self {
        Self {
            base: StandardPipelineBuilder::new(source),
            pooling: Pooling::default(),
            normalize: true,
        }
    }

    /// Set how token states are pooled (default: [`Pooling::Mean`]).
    pub fn pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }

    /// L2-normalize embeddings (default: true).
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Builds the pipeline with configured settings.
    ///
    /// # Errors
    ///
    /// Returns an error if model loading or device initialization fails, or
    /// [`Unsupported`](crate::error::PipelineError::Unsupported) for a non-BERT model.
    pub fn build(self) -> Result<FeatureExtractionPipeline> {
        BasePipelineBuilder::build(self)
    }
}

impl BasePipelineBuilder for FeatureExtractionPipelineBuilder {
    type Model = FeatureExtractionModel;
    type Pipeline = FeatureExtractionPipeline;

    fn base(&self) -> &StandardPipelineBuilder {
        &self.base
    }

    fn create_model(
        config: &ModelConfig,
        files: &ModelFiles,
        device: Device,
    ) -> Result<Self::Model> {
        FeatureExtractionModel::load(config, files, device)
    }

    fn construct_pipeline(
        self,
        model: Arc<Self::Model>,
        tokenizer: Tokenizer,
    ) -> Result<Self::Pipeline> {
        Ok(FeatureExtractionPipeline {
            model,
            tokenizer,
            pooling: self.pooling,
            normalize: self.normalize,
        })
    }
}
