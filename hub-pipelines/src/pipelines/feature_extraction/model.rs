use candle_core::{DType, Device, IndexOp, Tensor, D};
use tokenizers::Tokenizer;

use crate::error::{PipelineError, Result};
use crate::loaders::{load_var_builder, ModelConfig, ModelFiles};
use crate::models::bert::BertEncoder;
use crate::models::encoding::{map_batch, pad_token_id};

/// How token states are reduced to one vector per text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Pooling {
    /// Average over non-padding tokens (default).
    #[default]
    Mean,
    /// The first (`[CLS]`) token's state.
    Cls,
}

pub struct FeatureExtractionModel {
    encoder: BertEncoder,
    pad_token_id: u32,
    device: Device,
}

impl FeatureExtractionModel {
    pub(crate) fn load(config: &ModelConfig, files: &ModelFiles, device: Device) -> Result<Self> {
        let model_type = config.info.model_type();
        if model_type != "bert" {
            return Err(PipelineError::Unsupported(format!(
                "Feature extraction supports 'bert' models, got '{model_type}'"
            )));
        }

        let vb = load_var_builder(files, &device)?;
        let encoder = BertEncoder::load(vb, config)?;
        tracing::info!(
            model_type,
            hidden_size = encoder.hidden_size(),
            "loaded feature extractor"
        );

        Ok(Self {
            encoder,
            pad_token_id: config.info.pad_token_id.unwrap_or(0),
            device,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.encoder.hidden_size()
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn embed_batch(
        &self,
        tokenizer: &Tokenizer,
        texts: &[&str],
        pooling: Pooling,
        normalize: bool,
    ) -> Result<Vec<Result<Vec<f32>>>> {
        let pad_id = pad_token_id(tokenizer, self.pad_token_id);

        map_batch(tokenizer, texts, pad_id, &self.device, |batch| {
            let hidden = self.encoder.forward(batch)?;
            let pooled = pool(&hidden, &batch.attention_mask, pooling)?;
            let pooled = if normalize {
                l2_normalize(&pooled)?
            } else {
                pooled
            };
            Ok(pooled.to_vec2::<f32>()?)
        })
    }
}

/// `(batch, seq, hidden)` -> `(batch, hidden)`.
fn pool(hidden: &Tensor, attention_mask: &Tensor, pooling: Pooling) -> Result<Tensor> {
    let pooled = match pooling {
        Pooling::Cls => hidden.i((.., 0))?,
        Pooling::Mean => {
            let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(D::Minus1)?;
            let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
            let counts = mask.sum(1)?.maximum(1e-9)?;
            summed.broadcast_div(&counts)?
        }
    };
    Ok(pooled)
}

fn l2_normalize(x: &Tensor) -> Result<Tensor> {
    let norm = x.sqr()?.sum_keepdim(D::Minus1)?.sqrt()?.maximum(1e-12)?;
    Ok(x.broadcast_div(&norm)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_pooling_ignores_padding() {
        let hidden = Tensor::new(&[[[1f32, 2.], [3., 4.], [100., 100.]]], &Device::Cpu).unwrap();
        let mask = Tensor::new(&[[1u32, 1, 0]], &Device::Cpu).unwrap();

        let pooled = pool(&hidden, &mask, Pooling::Mean).unwrap();
        assert_eq!(pooled.to_vec2::<f32>().unwrap(), vec![vec![2., 3.]]);

        let cls = pool(&hidden, &mask, Pooling::Cls).unwrap();
        assert_eq!(cls.to_vec2::<f32>().unwrap(), vec![vec![1., 2.]]);
    }

    #[test]
    fn normalization_handles_zero_vectors() {
        let x = Tensor::new(&[[3f32, 4.], [0., 0.]], &Device::Cpu).unwrap();
        let normalized = l2_normalize(&x).unwrap().to_vec2::<f32>().unwrap();
        assert!((normalized[0][0] - 0.6).abs() < 1e-6);
        assert!((normalized[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(normalized[1], vec![0., 0.]);
    }
}
