use hub_pipelines::error::Result;
use hub_pipelines::export::ExportableModel;
use tracing_subscriber::EnvFilter;

const MODEL_ID: &str = "tohoku-nlp/bert-base-japanese";
const DEST: &str = "dist/bert-base-japanese-onnx";

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let model = ExportableModel::from_pretrained(MODEL_ID, true)?;
    model.save_pretrained(DEST)?;

    Ok(())
}
