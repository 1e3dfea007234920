use std::collections::HashMap;

use candle_core::Tensor;
use candle_nn::VarBuilder;
use candle_transformers::models::modernbert::{
    ClassifierConfig, Config,
    ModernBertForSequenceClassification as CandleModernBertForSequenceClassification,
};

use super::encoding::BatchTensors;
use super::SequenceClassifier;
use crate::error::Result;
use crate::loaders::ModelConfig;

pub(crate) struct ModernBertClassifier {
    model: CandleModernBertForSequenceClassification,
}

impl ModernBertClassifier {
    pub fn load(vb: VarBuilder, config: &ModelConfig, labels: &[String]) -> Result<Self> {
        let mut config: Config = config.parse()?;
        patch_config_labels(&mut config, labels);
        let model = CandleModernBertForSequenceClassification::load(vb, &config)?;
        Ok(Self { model })
    }
}

impl SequenceClassifier for ModernBertClassifier {
    /// Candle's head already ends in a softmax.
    fn probabilities(&self, batch: &BatchTensors) -> Result<Tensor> {
        Ok(self
            .model
            .forward(&batch.input_ids, &batch.attention_mask)?)
    }
}

/// Candle sizes the classifier head from `classifier_config`, which many
/// checkpoints leave out; rebuild it from the top-level `id2label`.
fn patch_config_labels(config: &mut Config, labels: &[String]) {
    let matches = config
        .classifier_config
        .as_ref()
        .is_some_and(|c| c.id2label.len() == labels.len());
    if matches {
        return;
    }

    let id2label: HashMap<String, String> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (i.to_string(), label.clone()))
        .collect();
    let label2id: HashMap<String, String> = id2label
        .iter()
        .map(|(k, v)| (v.clone(), k.clone()))
        .collect();

    let classifier_pooling = config
        .classifier_config
        .as_ref()
        .map(|c| c.classifier_pooling)
        .unwrap_or_default();

    config.classifier_config = Some(ClassifierConfig {
        id2label,
        label2id,
        classifier_pooling,
    });
}
