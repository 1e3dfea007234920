use candle_core::{IndexOp, Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use serde::Deserialize;

use super::encoding::BatchTensors;
use super::SequenceClassifier;
use crate::error::Result;
use crate::loaders::ModelConfig;

#[derive(Deserialize)]
struct HeadConfig {
    hidden_size: usize,
}

/// `BertForSequenceClassification`: pooler (dense + tanh over CLS) -> classifier.
pub(crate) struct BertClassifier {
    backbone: BertModel,
    pooler: Linear,
    classifier: Linear,
}

impl BertClassifier {
    pub fn load(vb: VarBuilder, config: &ModelConfig, num_labels: usize) -> Result<Self> {
        let backbone_config: Config = config.parse()?;
        let head: HeadConfig = config.parse()?;

        let backbone = BertModel::load(vb.pp("bert"), &backbone_config)?;
        let pooler = candle_nn::linear(
            head.hidden_size,
            head.hidden_size,
            vb.pp("bert.pooler.dense"),
        )?;
        let classifier = candle_nn::linear(head.hidden_size, num_labels, vb.pp("classifier"))?;

        Ok(Self {
            backbone,
            pooler,
            classifier,
        })
    }
}

impl SequenceClassifier for BertClassifier {
    fn probabilities(&self, batch: &BatchTensors) -> Result<Tensor> {
        let hidden = self.backbone.forward(
            &batch.input_ids,
            &batch.token_type_ids,
            Some(&batch.attention_mask),
        )?;
        let pooled = self.pooler.forward(&hidden.i((.., 0))?)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        Ok(softmax(&logits, D::Minus1)?)
    }
}

/// Bare BERT encoder for feature extraction. Accepts checkpoints with or
/// without the `bert.` prefix.
pub(crate) struct BertEncoder {
    backbone: BertModel,
    hidden_size: usize,
}

impl BertEncoder {
    pub fn load(vb: VarBuilder, config: &ModelConfig) -> Result<Self> {
        let backbone_config: Config = config.parse()?;
        let head: HeadConfig = config.parse()?;
        let backbone = BertModel::load(vb, &backbone_config)?;

        Ok(Self {
            backbone,
            hidden_size: head.hidden_size,
        })
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// Last hidden state, `(batch, seq_len, hidden_size)`.
    pub fn forward(&self, batch: &BatchTensors) -> Result<Tensor> {
        Ok(self.backbone.forward(
            &batch.input_ids,
            &batch.token_type_ids,
            Some(&batch.attention_mask),
        )?)
    }
}
