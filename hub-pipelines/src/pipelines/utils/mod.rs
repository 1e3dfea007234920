use super::cache::ModelOptions;
use crate::error::{PipelineError, Result};
use candle_core::Device;

pub(crate) mod builder;
pub(crate) use builder::{BasePipelineBuilder, StandardPipelineBuilder};

#[derive(Debug, Clone, Default)]
pub enum DeviceRequest {
    #[default]
    Cpu,
    Cuda(usize),
}

impl DeviceRequest {
    pub fn resolve(self) -> Result<Device> {
        match self {
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => Device::new_cuda(i).map_err(|e| {
                PipelineError::Device(format!(
                    "Failed to init CUDA device {i}: {e}. Try CPU as fallback."
                ))
            }),
        }
    }
}

/// Shared builder setters. The builder must hold its [`StandardPipelineBuilder`] in `base`.
macro_rules! impl_builder_methods {
    ($builder:ident) => {
        impl $builder {
            /// Use CPU for inference (default).
            pub fn cpu(mut self) -> Self {
                self.base.device_request = crate::pipelines::utils::DeviceRequest::Cpu;
                self
            }

            /// Use a specific CUDA GPU for inference.
            pub fn cuda(mut self, index: usize) -> Self {
                self.base.device_request = crate::pipelines::utils::DeviceRequest::Cuda(index);
                self
            }

            /// Pin the Hub revision (branch, tag or commit). Ignored for local models.
            pub fn revision(mut self, revision: &str) -> Self {
                self.base.source = self.base.source.clone().with_revision(revision);
                self
            }

            /// Override cache dir, endpoint, token or progress display for Hub downloads.
            pub fn hub_options(mut self, hub: crate::loaders::HubOptions) -> Self {
                self.base.hub = hub;
                self
            }
        }
    };
}

pub(crate) use impl_builder_methods;

pub fn build_cache_key<O: ModelOptions>(options: &O, device: &Device) -> String {
    format!("{}-{:?}", options.cache_key(), device.location())
}
