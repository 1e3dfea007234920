//! Export BERT-family checkpoints into a self-contained safetensors bundle.
//!
//! An export resolves the checkpoint's weights (safetensors or a pickled
//! PyTorch state dict), checks that they instantiate the model for the chosen
//! [`ExportTask`] (a BERT encoder, or a DistilBERT / BERT / ModernBERT
//! sequence classifier), and writes
//! them as `model.safetensors` next to `config.json` and the tokenizer files.
//! Repos that only ship `vocab.txt` also get a synthesized `tokenizer.json`, so
//! the bundle loads without any Python tooling.
//!
//! ```rust,no_run
//! use hub_pipelines::export::ExportableModel;
//!
//! # fn main() -> hub_pipelines::error::Result<()> {
//! let model = ExportableModel::from_pretrained("tohoku-nlp/bert-base-japanese", true)?;
//! model.save_pretrained("dist/bert-base-japanese-onnx")?;
//! # Ok(())
//! # }
//! ```

pub mod tokenizer;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::error::{PipelineError, Result};
use crate::loaders::{
    find_weights, load_config, var_builder_from_file, HubOptions, ModelConfig, ModelFiles,
    ModelSource, WeightFormat, CONFIG_FILE, SAFETENSORS_FILE, SPECIAL_TOKENS_FILE,
    TOKENIZER_CONFIG_FILE, TOKENIZER_FILE, VOCAB_FILE,
};
use crate::models::bert::BertEncoder;
use crate::pipelines::text_classification::model::{classifier_labels, load_classifier};

/// Metadata copied alongside the weights when the source has them.
const METADATA_FILES: &[&str] = &[
    VOCAB_FILE,
    TOKENIZER_FILE,
    TOKENIZER_CONFIG_FILE,
    SPECIAL_TOKENS_FILE,
];

/// The model an export is checked against before anything is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportTask {
    /// A BERT encoder producing hidden states.
    #[default]
    FeatureExtraction,
    /// A sequence classifier with labelled classes.
    TextClassification,
}

impl fmt::Display for ExportTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportTask::FeatureExtraction => write!(f, "feature-extraction"),
            ExportTask::TextClassification => write!(f, "text-classification"),
        }
    }
}

/// How the weights of an [`ExportableModel`] are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Every tensor re-serialized into `model.safetensors`.
    Safetensors,
    /// The checkpoint's own weight file, copied as-is.
    Native,
}

enum Weights {
    Tensors(HashMap<String, Tensor>),
    Native { path: PathBuf, format: WeightFormat },
}

/// A validated checkpoint ready to be written to disk.
pub struct ExportableModel {
    source: ModelSource,
    task: ExportTask,
    format: ExportFormat,
    weights: Weights,
    metadata: Vec<(String, Vec<u8>)>,
}

impl ExportableModel {
    /// Loads a Hub BERT encoder. With `export` set the weights are converted
    /// to safetensors; otherwise the native weight file is kept.
    ///
    /// # Errors
    ///
    /// - [`Download`](PipelineError::Download) if the repo can't be fetched.
    /// - [`Unsupported`](PipelineError::Unsupported) if it isn't a BERT model or
    ///   its weights don't fit the architecture.
    pub fn from_pretrained(model_id: &str, export: bool) -> Result<Self> {
        Self::from_pretrained_with_task(model_id, ExportTask::FeatureExtraction, export)
    }

    /// Like [`from_pretrained`](Self::from_pretrained), validating for `task`.
    pub fn from_pretrained_with_task(
        model_id: &str,
        task: ExportTask,
        export: bool,
    ) -> Result<Self> {
        Self::from_source(
            &ModelSource::hub(model_id),
            task,
            export,
            &HubOptions::default(),
        )
    }

    /// Loads from any [`ModelSource`], including a previous export.
    pub fn from_source(
        source: &ModelSource,
        task: ExportTask,
        export: bool,
        hub: &HubOptions,
    ) -> Result<Self> {
        let files = source.open(hub)?;
        let config = load_config(&files)?;

        match task {
            ExportTask::FeatureExtraction => {
                let model_type = config.info.model_type();
                if model_type != "bert" {
                    return Err(PipelineError::Unsupported(format!(
                        "Feature-extraction export supports BERT encoders only, \
                         '{source}' is '{model_type}'"
                    )));
                }
            }
            ExportTask::TextClassification => {
                classifier_labels(&config)?;
            }
        }

        let (weights_path, weight_format) = find_weights(&files)?;
        tracing::info!(
            model = %source,
            %task,
            weights = weight_format.file_name(),
            export,
            "loading model for export"
        );

        let unreadable = |e: PipelineError| {
            PipelineError::Unsupported(format!(
                "Can't read weights '{}': {e}",
                weights_path.display()
            ))
        };
        let (format, weights) = if export {
            let tensors = read_tensors(&weights_path, weight_format).map_err(unreadable)?;
            let vb = VarBuilder::from_tensors(tensors.clone(), DType::F32, &Device::Cpu);
            validate(vb, &config, task)?;
            (ExportFormat::Safetensors, Weights::Tensors(tensors))
        } else {
            let vb = var_builder_from_file(&weights_path, weight_format, &Device::Cpu)
                .map_err(unreadable)?;
            validate(vb, &config, task)?;
            let weights = Weights::Native {
                path: weights_path.clone(),
                format: weight_format,
            };
            (ExportFormat::Native, weights)
        };

        let metadata = collect_metadata(&files, &config, export)?;

        Ok(Self {
            source: source.clone(),
            task,
            format,
            weights,
            metadata,
        })
    }

    /// Where the model was loaded from.
    pub fn source(&self) -> &ModelSource {
        &self.source
    }

    /// The task the weights were validated for.
    pub fn task(&self) -> ExportTask {
        self.task
    }

    /// How the weights will be written.
    pub fn format(&self) -> ExportFormat {
        self.format
    }

    /// The file names [`save_pretrained`](Self::save_pretrained) writes.
    pub fn file_names(&self) -> Vec<&str> {
        let weights = match &self.weights {
            Weights::Tensors(_) => SAFETENSORS_FILE,
            Weights::Native { format, .. } => format.file_name(),
        };
        std::iter::once(weights)
            .chain(self.metadata.iter().map(|(name, _)| name.as_str()))
            .collect()
    }

    /// Writes the model into `dest`, replacing whatever was there.
    ///
    /// Files are written into a staging directory beside `dest`, which is then
    /// renamed into place. The previous `dest` is moved aside first and put
    /// back if the rename fails, so a failed save leaves it untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Filesystem`](PipelineError::Filesystem) if the destination
    /// can't be created or written.
    pub fn save_pretrained(&self, dest: impl AsRef<Path>) -> Result<()> {
        let dest = dest.as_ref();
        let name = dest.file_name().ok_or_else(|| {
            PipelineError::Filesystem(format!(
                "Export destination '{}' has no directory name",
                dest.display()
            ))
        })?;
        let parent = match dest.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        fs::create_dir_all(&parent).map_err(fs_error("create", &parent))?;

        let staging = parent.join(format!(".{}.export-tmp", name.to_string_lossy()));
        remove_any(&staging)?;
        fs::create_dir(&staging).map_err(fs_error("create", &staging))?;

        let result = self
            .write_into(&staging)
            .and_then(|()| replace_dir(&staging, dest));
        if result.is_err() {
            let _ = fs::remove_dir_all(&staging);
        }
        result?;

        tracing::info!(
            model = %self.source,
            dest = %dest.display(),
            files = self.metadata.len() + 1,
            "saved export"
        );
        Ok(())
    }

    fn write_into(&self, dir: &Path) -> Result<()> {
        match &self.weights {
            Weights::Tensors(tensors) => {
                let path = dir.join(SAFETENSORS_FILE);
                candle_core::safetensors::save(tensors, &path).map_err(|e| {
                    PipelineError::Filesystem(format!(
                        "Failed to write '{}': {e}",
                        path.display()
                    ))
                })?;
            }
            Weights::Native { path, format } => {
                let target = dir.join(format.file_name());
                fs::copy(path, &target).map_err(fs_error("write", &target))?;
            }
        }

        for (name, bytes) in &self.metadata {
            let path = dir.join(name);
            fs::write(&path, bytes).map_err(fs_error("write", &path))?;
        }
        Ok(())
    }
}

fn fs_error<'a>(action: &'a str, path: &'a Path) -> impl FnOnce(io::Error) -> PipelineError + 'a {
    move |e| PipelineError::Filesystem(format!("Failed to {action} '{}': {e}", path.display()))
}

fn replace_dir(staging: &Path, dest: &Path) -> Result<()> {
    let backup = match fs::symlink_metadata(dest) {
        Ok(_) => {
            let backup = sibling(dest, "export-old");
            remove_any(&backup)?;
            fs::rename(dest, &backup).map_err(fs_error("move aside", dest))?;
            Some(backup)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => return Err(fs_error("inspect", dest)(e)),
    };

    if let Err(e) = fs::rename(staging, dest) {
        if let Some(backup) = &backup {
            if let Err(restore) = fs::rename(backup, dest) {
                tracing::error!(
                    backup = %backup.display(),
                    error = %restore,
                    "failed to restore previous export"
                );
            }
        }
        return Err(fs_error("move export into", dest)(e));
    }

    if let Some(backup) = backup {
        remove_any(&backup)?;
    }
    Ok(())
}

/// `.{name}.{suffix}` beside `path`.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{suffix}"))
}

fn remove_any(path: &Path) -> Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path).map_err(fs_error("remove", path)),
        Ok(_) => fs::remove_file(path).map_err(fs_error("remove", path)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(fs_error("inspect", path)(e)),
    }
}

fn read_tensors(path: &Path, format: WeightFormat) -> Result<HashMap<String, Tensor>> {
    let tensors: Vec<(String, Tensor)> = match format {
        WeightFormat::Safetensors => candle_core::safetensors::load(path, &Device::Cpu)?
            .into_iter()
            .collect(),
        WeightFormat::Pickle => candle_core::pickle::read_all(path)?,
    };
    tracing::debug!(tensors = tensors.len(), "read checkpoint");

    Ok(tensors
        .into_iter()
        .map(|(name, tensor)| (normalize_name(name), tensor))
        .collect())
}

/// Renames TF-era `LayerNorm.gamma` / `LayerNorm.beta` to `weight` / `bias`.
fn normalize_name(name: String) -> String {
    if let Some(prefix) = name.strip_suffix(".gamma") {
        format!("{prefix}.weight")
    } else if let Some(prefix) = name.strip_suffix(".beta") {
        format!("{prefix}.bias")
    } else {
        name
    }
}

fn validate(vb: VarBuilder, config: &ModelConfig, task: ExportTask) -> Result<()> {
    let loaded = match task {
        ExportTask::FeatureExtraction => BertEncoder::load(vb, config).map(|_| ()),
        ExportTask::TextClassification => classifier_labels(config)
            .and_then(|labels| load_classifier(vb, config, &labels))
            .map(|_| ()),
    };
    loaded.map_err(|e| {
        PipelineError::Unsupported(format!("Weights don't instantiate a {task} model: {e}"))
    })
}

fn collect_metadata(
    files: &ModelFiles,
    config: &ModelConfig,
    export: bool,
) -> Result<Vec<(String, Vec<u8>)>> {
    let mut metadata = vec![(CONFIG_FILE.to_string(), config.raw.clone().into_bytes())];
    for name in METADATA_FILES {
        if let Some(path) = files.get_optional(name)? {
            metadata.push((name.to_string(), fs::read(&path)?));
        }
    }

    if export && !files.contains(TOKENIZER_FILE) {
        match files.get_optional(VOCAB_FILE)? {
            Some(vocab) => {
                let tokenizer_config = files.get_optional(TOKENIZER_CONFIG_FILE)?;
                let tokenizer =
                    tokenizer::wordpiece_from_vocab(&vocab, tokenizer_config.as_deref())?;
                let json = tokenizer.to_string(false).map_err(|e| {
                    PipelineError::Tokenization(format!("Failed to serialize tokenizer: {e}"))
                })?;
                metadata.push((TOKENIZER_FILE.to_string(), json.into_bytes()));
            }
            None => tracing::warn!("model ships no tokenizer files, exporting weights only"),
        }
    }

    Ok(metadata)
}
