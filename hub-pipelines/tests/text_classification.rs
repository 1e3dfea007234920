mod common;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::modernbert::{Config, ModernBertForSequenceClassification};
use common::{
    bert_classifier, bert_config, bert_encoder, distilbert_classifier, modernbert_classifier,
    write_config, SENTIMENT_LABELS,
};
use hub_pipelines::error::{PipelineError, Result};
use hub_pipelines::text_classification::{Sentiment, TextClassificationPipelineBuilder};

#[test]
fn classifies_with_a_label_from_the_model() -> Result<()> {
    let repo = bert_classifier(SENTIMENT_LABELS);
    let pipeline = TextClassificationPipelineBuilder::local(repo.path()).build()?;

    assert_eq!(pipeline.labels(), SENTIMENT_LABELS);

    let output = pipeline.run("good hello")?;
    assert!(SENTIMENT_LABELS.contains(&output.prediction.label.as_str()));
    assert!((0.0..=1.0).contains(&output.prediction.score));
    assert_eq!(output.stats.items_processed, 1);

    let sentiment: Sentiment = output.prediction.sentiment()?;
    assert_eq!(sentiment, output.prediction.label.parse::<Sentiment>()?);
    Ok(())
}

#[test]
fn prints_as_a_single_record_list() -> Result<()> {
    let repo = bert_classifier(&["negative", "neutral", "positive"]);
    let pipeline = TextClassificationPipelineBuilder::local(repo.path()).build()?;

    let output = pipeline.run("bad")?;
    let printed = serde_json::to_string(&[output.prediction])?;
    let parsed: serde_json::Value = serde_json::from_str(&printed)?;

    let records = parsed.as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert!(records[0]["label"].is_string());
    assert!(records[0]["score"].is_number());
    Ok(())
}

#[test]
fn batch_matches_single_runs() -> Result<()> {
    let repo = bert_classifier(&["negative", "neutral", "positive"]);
    let pipeline = TextClassificationPipelineBuilder::local(repo.path()).build()?;

    let texts = ["good", "bad world", "hello worlds hello"];
    let batch = pipeline.run(&texts)?;
    assert_eq!(batch.results.len(), texts.len());

    for (text, result) in texts.iter().zip(batch.results) {
        assert_eq!(result.text, *text);
        let batched = result.prediction?;
        let single = pipeline.run(*text)?.prediction;
        assert_eq!(batched.label, single.label);
        assert!((batched.score - single.score).abs() < 1e-4);
    }
    Ok(())
}

#[test]
fn distilbert_classifies_single_and_batch() -> Result<()> {
    let repo = distilbert_classifier(SENTIMENT_LABELS);
    let pipeline = TextClassificationPipelineBuilder::local(repo.path()).build()?;

    let output = pipeline.run("good hello")?;
    assert!(SENTIMENT_LABELS.contains(&output.prediction.label.as_str()));
    assert!((0.0..=1.0).contains(&output.prediction.score));

    let texts = ["good", "bad world", "hello worlds hello"];
    let batch = pipeline.run(&texts)?;
    for (text, result) in texts.iter().zip(batch.results) {
        let batched = result.prediction?;
        let single = pipeline.run(*text)?.prediction;
        assert_eq!(batched.label, single.label);
        assert!((batched.score - single.score).abs() < 1e-4);
    }
    Ok(())
}

#[test]
fn modernbert_score_is_the_head_probability() -> Result<()> {
    let labels = ["negative", "neutral", "positive"];
    let repo = modernbert_classifier(&labels);
    let pipeline = TextClassificationPipelineBuilder::local(repo.path()).build()?;
    let output = pipeline.run("good")?;

    let config: Config =
        serde_json::from_str(&std::fs::read_to_string(repo.path().join("config.json"))?)?;
    let vb = unsafe {
        VarBuilder::from_mmaped_safetensors(
            &[repo.path().join("model.safetensors")],
            DType::F32,
            &Device::Cpu,
        )?
    };
    let model = ModernBertForSequenceClassification::load(vb, &config)?;
    // [CLS] good [SEP]
    let ids = Tensor::new(&[[2u32, 8, 3]], &Device::Cpu)?;
    let mask = Tensor::new(&[[1u32, 1, 1]], &Device::Cpu)?;
    let probs = model.forward(&ids, &mask)?;
    let best = probs.max(D::Minus1)?.squeeze(0)?.to_scalar::<f32>()?;
    let best_id = probs.argmax(D::Minus1)?.squeeze(0)?.to_scalar::<u32>()?;

    assert_eq!(output.prediction.label, labels[best_id as usize]);
    assert!((output.prediction.score - best).abs() < 1e-5);
    Ok(())
}

#[test]
fn encoder_without_classifier_head_is_unsupported() {
    let repo = bert_encoder();
    let err = TextClassificationPipelineBuilder::local(repo.path())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::Unsupported(_)));
}

#[test]
fn unknown_model_type_is_unsupported() {
    let repo = bert_classifier(&["a", "b"]);
    let mut config = bert_config(&["GPT2ForSequenceClassification"]);
    config["model_type"] = "gpt2".into();
    config["id2label"] = serde_json::json!({"0": "a", "1": "b"});
    write_config(repo.path(), &config);

    let err = TextClassificationPipelineBuilder::local(repo.path())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::Unsupported(_)));
    assert!(err.to_string().contains("gpt2"));
}

#[test]
fn missing_model_directory_is_a_filesystem_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = TextClassificationPipelineBuilder::local(dir.path().join("nope"))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, PipelineError::Filesystem(_)));
}
