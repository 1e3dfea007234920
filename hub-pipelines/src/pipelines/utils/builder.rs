use std::sync::Arc;

use candle_core::Device;
use tokenizers::Tokenizer;

use super::{build_cache_key, DeviceRequest};
use crate::error::Result;
use crate::loaders::{load_config, load_tokenizer, HubOptions, ModelConfig, ModelFiles, ModelSource};
use crate::pipelines::cache::global_cache;

pub(crate) trait BasePipelineBuilder: Sized {
    type Model: Send + Sync + 'static;
    type Pipeline;

    fn base(&self) -> &StandardPipelineBuilder;

    fn create_model(
        config: &ModelConfig,
        files: &ModelFiles,
        device: Device,
    ) -> Result<Self::Model>;

    fn construct_pipeline(
        self,
        model: Arc<Self::Model>,
        tokenizer: Tokenizer,
    ) -> Result<Self::Pipeline>;

    fn build(self) -> Result<Self::Pipeline> {
        let base = self.base();
        let device = base.device_request.clone().resolve()?;

        let files = base.source.open(&base.hub)?;
        let config = load_config(&files)?;

        let key = build_cache_key(&base.source, &device);
        tracing::info!(model = %base.source, device = ?device.location(), "building pipeline");

        let model = global_cache().get_or_create(&key, || {
            Self::create_model(&config, &files, device.clone())
        })?;

        let tokenizer = load_tokenizer(&files, config.info.max_position_embeddings)?;

        self.construct_pipeline(model, tokenizer)
    }
}

pub(crate) struct StandardPipelineBuilder {
    pub(crate) source: ModelSource,
    pub(crate) hub: HubOptions,
    pub(crate) device_request: DeviceRequest,
}

impl StandardPipelineBuilder {
    pub fn new(source: ModelSource) -> Self {
        Self {
            source,
            hub: HubOptions::default(),
            device_request: DeviceRequest::Cpu,
        }
    }
}
