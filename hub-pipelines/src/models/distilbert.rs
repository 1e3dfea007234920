use candle_core::{IndexOp, Tensor, D};
use candle_nn::ops::softmax;
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::distilbert::{Config, DistilBertModel};
use serde::Deserialize;

use super::encoding::BatchTensors;
use super::SequenceClassifier;
use crate::error::Result;
use crate::loaders::ModelConfig;

#[derive(Deserialize)]
struct HeadConfig {
    dim: usize,
}

/// `DistilBertForSequenceClassification`: CLS state -> pre_classifier -> ReLU -> classifier.
pub(crate) struct DistilBertClassifier {
    backbone: DistilBertModel,
    pre_classifier: Linear,
    classifier: Linear,
}

impl DistilBertClassifier {
    pub fn load(vb: VarBuilder, config: &ModelConfig, num_labels: usize) -> Result<Self> {
        let backbone_config: Config = config.parse()?;
        let head: HeadConfig = config.parse()?;

        let backbone = DistilBertModel::load(vb.pp("distilbert"), &backbone_config)?;
        let pre_classifier = candle_nn::linear(head.dim, head.dim, vb.pp("pre_classifier"))?;
        let classifier = candle_nn::linear(head.dim, num_labels, vb.pp("classifier"))?;

        Ok(Self {
            backbone,
            pre_classifier,
            classifier,
        })
    }
}

impl SequenceClassifier for DistilBertClassifier {
    fn probabilities(&self, batch: &BatchTensors) -> Result<Tensor> {
        // DistilBERT's attention masks positions where the mask is non-zero.
        let mask = batch
            .attention_mask
            .eq(0u32)?
            .unsqueeze(1)?
            .unsqueeze(1)?;
        let hidden = self.backbone.forward(&batch.input_ids, &mask)?;
        let cls = hidden.i((.., 0))?;
        let pooled = self.pre_classifier.forward(&cls)?.relu()?;
        let logits = self.classifier.forward(&pooled)?;
        Ok(softmax(&logits, D::Minus1)?)
    }
}
