//! Tiny random BERT-family checkpoints laid out like Hub repos, for offline tests.

#![allow(dead_code)]

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::{BertModel, Config};
use candle_transformers::models::distilbert::{
    Config as DistilBertConfig, DistilBertModel,
};
use candle_transformers::models::modernbert::{
    Config as ModernBertConfig, ModernBertForSequenceClassification,
};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const HIDDEN_SIZE: usize = 8;

pub const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nhello\nworld\n##s\ngood\nbad\n";

pub const SENTIMENT_LABELS: &[&str] = &[
    "Very Negative",
    "Negative",
    "Neutral",
    "Positive",
    "Very Positive",
];

pub fn bert_config(architectures: &[&str]) -> Value {
    json!({
        "model_type": "bert",
        "architectures": architectures,
        "vocab_size": 10,
        "hidden_size": HIDDEN_SIZE,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.0,
        "max_position_embeddings": 16,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0,
        "position_embedding_type": "absolute",
        "use_cache": true,
        "classifier_dropout": null
    })
}

pub fn write_config(dir: &Path, config: &Value) {
    std::fs::write(
        dir.join("config.json"),
        serde_json::to_string_pretty(config).unwrap(),
    )
    .unwrap();
}

/// Fills every variable with noise so layer norms and heads aren't degenerate.
fn randomize(varmap: &VarMap) {
    for var in varmap.all_vars() {
        let noise = Tensor::randn(0f32, 0.5, var.dims(), &Device::Cpu).unwrap();
        var.set(&noise).unwrap();
    }
}

fn write_weights(dir: &Path, config: &Value, num_labels: Option<usize>) {
    let bert_config: Config = serde_json::from_value(config.clone()).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);

    BertModel::load(vb.pp("bert"), &bert_config).unwrap();
    if let Some(num_labels) = num_labels {
        candle_nn::linear(HIDDEN_SIZE, HIDDEN_SIZE, vb.pp("bert.pooler.dense")).unwrap();
        candle_nn::linear(HIDDEN_SIZE, num_labels, vb.pp("classifier")).unwrap();
    }

    randomize(&varmap);
    varmap.save(dir.join("model.safetensors")).unwrap();
}

/// A bare `BertModel` repo with `vocab.txt` but no `tokenizer.json`, like
/// `tohoku-nlp/bert-base-japanese`.
pub fn bert_encoder() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config = bert_config(&["BertModel"]);
    write_config(dir.path(), &config);
    write_weights(dir.path(), &config, None);
    std::fs::write(dir.path().join("vocab.txt"), VOCAB).unwrap();
    std::fs::write(
        dir.path().join("tokenizer_config.json"),
        r#"{"do_lower_case": true, "model_max_length": 16}"#,
    )
    .unwrap();
    dir
}

fn id2label(labels: &[&str]) -> Value {
    labels
        .iter()
        .enumerate()
        .map(|(id, label)| (id.to_string(), json!(label)))
        .collect::<serde_json::Map<String, Value>>()
        .into()
}

fn label2id(labels: &[&str]) -> Value {
    labels
        .iter()
        .enumerate()
        .map(|(id, label)| (label.to_string(), json!(id.to_string())))
        .collect::<serde_json::Map<String, Value>>()
        .into()
}

/// A `BertForSequenceClassification` repo with the given `id2label`.
pub fn bert_classifier(labels: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let mut config = bert_config(&["BertForSequenceClassification"]);
    config["id2label"] = id2label(labels);

    write_config(dir.path(), &config);
    write_weights(dir.path(), &config, Some(labels.len()));
    std::fs::write(dir.path().join("vocab.txt"), VOCAB).unwrap();
    dir
}

/// A `DistilBertForSequenceClassification` repo, the architecture of
/// `tabularisai/multilingual-sentiment-analysis`.
pub fn distilbert_classifier(labels: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config = json!({
        "model_type": "distilbert",
        "architectures": ["DistilBertForSequenceClassification"],
        "vocab_size": 10,
        "dim": HIDDEN_SIZE,
        "n_layers": 1,
        "n_heads": 2,
        "hidden_dim": 16,
        "activation": "gelu",
        "max_position_embeddings": 16,
        "initializer_range": 0.02,
        "pad_token_id": 0,
        "id2label": id2label(labels),
    });
    write_config(dir.path(), &config);

    let distilbert_config: DistilBertConfig = serde_json::from_value(config).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    DistilBertModel::load(vb.pp("distilbert"), &distilbert_config).unwrap();
    candle_nn::linear(HIDDEN_SIZE, HIDDEN_SIZE, vb.pp("pre_classifier")).unwrap();
    candle_nn::linear(HIDDEN_SIZE, labels.len(), vb.pp("classifier")).unwrap();
    randomize(&varmap);
    varmap.save(dir.path().join("model.safetensors")).unwrap();

    std::fs::write(dir.path().join("vocab.txt"), VOCAB).unwrap();
    dir
}

/// A `ModernBertForSequenceClassification` repo with CLS pooling.
pub fn modernbert_classifier(labels: &[&str]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let config = json!({
        "model_type": "modernbert",
        "architectures": ["ModernBertForSequenceClassification"],
        "vocab_size": 10,
        "hidden_size": HIDDEN_SIZE,
        "num_hidden_layers": 1,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "max_position_embeddings": 16,
        "layer_norm_eps": 1e-5,
        "pad_token_id": 0,
        "global_attn_every_n_layers": 1,
        "global_rope_theta": 160000.0,
        "local_attention": 16,
        "local_rope_theta": 10000.0,
        "classifier_pooling": "cls",
        "id2label": id2label(labels),
        "label2id": label2id(labels),
    });
    write_config(dir.path(), &config);

    let modernbert_config: ModernBertConfig = serde_json::from_value(config).unwrap();
    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    ModernBertForSequenceClassification::load(vb, &modernbert_config).unwrap();
    randomize(&varmap);
    varmap.save(dir.path().join("model.safetensors")).unwrap();

    std::fs::write(dir.path().join("vocab.txt"), VOCAB).unwrap();
    dir
}

pub fn sorted_file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
