use hub_pipelines::error::Result;
use hub_pipelines::text_classification::TextClassificationPipelineBuilder;
use tracing_subscriber::EnvFilter;

const MODEL_ID: &str = "tabularisai/multilingual-sentiment-analysis";
const TEXT: &str = "角田クビ";

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let pipeline = TextClassificationPipelineBuilder::new(MODEL_ID).build()?;
    let output = pipeline.run(TEXT)?;

    tracing::debug!(
        elapsed_ms = output.stats.total_time.as_secs_f64() * 1000.0,
        "classified"
    );
    println!("{}", serde_json::to_string(&[output.prediction])?);

    Ok(())
}
