use candle_core::Device;
use candle_nn::VarBuilder;
use tokenizers::Tokenizer;

use super::pipeline::Prediction;
use crate::error::{PipelineError, Result};
use crate::loaders::{load_var_builder, ModelConfig, ModelFiles};
use crate::models::bert::BertClassifier;
use crate::models::distilbert::DistilBertClassifier;
use crate::models::encoding::{map_batch, pad_token_id};
use crate::models::modernbert::ModernBertClassifier;
use crate::models::SequenceClassifier;

/// Model types with a sequence-classification implementation.
pub const SUPPORTED_MODEL_TYPES: &[&str] = &["distilbert", "bert", "modernbert"];

/// A sequence classifier picked from `config.json`, plus its label names.
pub struct TextClassificationModel {
    classifier: Box<dyn SequenceClassifier>,
    labels: Vec<String>,
    pad_token_id: u32,
    device: Device,
}

/// Checks that `config.json` describes a supported sequence classifier and
/// returns its labels in class-id order.
pub(crate) fn classifier_labels(config: &ModelConfig) -> Result<Vec<String>> {
    let info = &config.info;
    if !info.declares_head("ForSequenceClassification") {
        return Err(PipelineError::Unsupported(format!(
            "Model is not a sequence classifier (architectures: {})",
            info.architectures.as_deref().unwrap_or_default().join(", ")
        )));
    }

    let labels = info.labels()?;
    if labels.is_empty() {
        return Err(PipelineError::Unsupported(
            "Model config has no id2label, predictions can't be named".into(),
        ));
    }

    let model_type = info.model_type();
    if !SUPPORTED_MODEL_TYPES.contains(&model_type) {
        return Err(PipelineError::Unsupported(format!(
            "Text classification doesn't support model type '{model_type}' (supported: {})",
            SUPPORTED_MODEL_TYPES.join(", ")
        )));
    }

    Ok(labels)
}

pub(crate) fn load_classifier(
    vb: VarBuilder,
    config: &ModelConfig,
    labels: &[String],
) -> Result<Box<dyn SequenceClassifier>> {
    let classifier: Box<dyn SequenceClassifier> = match config.info.model_type() {
        "distilbert" => Box::new(DistilBertClassifier::load(vb, config, labels.len())?),
        "bert" => Box::new(BertClassifier::load(vb, config, labels.len())?),
        "modernbert" => Box::new(ModernBertClassifier::load(vb, config, labels)?),
        other => {
            return Err(PipelineError::Unsupported(format!(
                "Text classification doesn't support model type '{other}'"
            )))
        }
    };
    Ok(classifier)
}

impl TextClassificationModel {
    pub(crate) fn load(config: &ModelConfig, files: &ModelFiles, device: Device) -> Result<Self> {
        let labels = classifier_labels(config)?;
        let vb = load_var_builder(files, &device)?;
        let classifier = load_classifier(vb, config, &labels)?;

        tracing::info!(
            model_type = config.info.model_type(),
            labels = ?labels,
            "loaded text classifier"
        );

        Ok(Self {
            classifier,
            labels,
            pad_token_id: config.info.pad_token_id.unwrap_or(0),
            device,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub(crate) fn classify_batch(
        &self,
        tokenizer: &Tokenizer,
        texts: &[&str],
    ) -> Result<Vec<Result<Prediction>>> {
        let pad_id = pad_token_id(tokenizer, self.pad_token_id);

        map_batch(tokenizer, texts, pad_id, &self.device, |batch| {
            let probs = self.classifier.probabilities(batch)?;
            let (_, num_labels) = probs.dims2()?;
            if num_labels != self.labels.len() {
                return Err(PipelineError::Unexpected(format!(
                    "Classifier produced {num_labels} scores for {} labels",
                    self.labels.len()
                )));
            }

            Ok(probs
                .to_vec2::<f32>()?
                .iter()
                .map(|row| top_prediction(&self.labels, row))
                .collect())
        })
    }
}

fn top_prediction(labels: &[String], probs: &[f32]) -> Prediction {
    let (id, score) = probs
        .iter()
        .copied()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0));

    Prediction {
        label: labels[id].clone(),
        score,
    }
}
