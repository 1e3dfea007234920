use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Cache, Repo, RepoType};
use serde::Deserialize;
use tokenizers::{Tokenizer, TruncationParams};

use crate::error::{PipelineError, Result};
use crate::pipelines::cache::ModelOptions;

pub(crate) const CONFIG_FILE: &str = "config.json";
pub(crate) const TOKENIZER_FILE: &str = "tokenizer.json";
pub(crate) const VOCAB_FILE: &str = "vocab.txt";
pub(crate) const TOKENIZER_CONFIG_FILE: &str = "tokenizer_config.json";
pub(crate) const SPECIAL_TOKENS_FILE: &str = "special_tokens_map.json";
pub(crate) const SAFETENSORS_FILE: &str = "model.safetensors";
pub(crate) const PYTORCH_FILE: &str = "pytorch_model.bin";

/// Files looked up in the local cache when the Hub can't list a repo.
const KNOWN_FILES: &[&str] = &[
    CONFIG_FILE,
    TOKENIZER_FILE,
    VOCAB_FILE,
    TOKENIZER_CONFIG_FILE,
    SPECIAL_TOKENS_FILE,
    SAFETENSORS_FILE,
    PYTORCH_FILE,
];

/// Settings for talking to the Hugging Face Hub.
///
/// Defaults come from the standard environment (`HF_HOME`, `HF_ENDPOINT`, the
/// stored token); the fields override them.
///
/// When the Hub is unreachable, models already in the cache still load.
#[derive(Debug, Clone, Default)]
pub struct HubOptions {
    /// Where downloaded files are cached.
    pub cache_dir: Option<PathBuf>,
    /// Hub base URL, e.g. a mirror.
    pub endpoint: Option<String>,
    /// Access token for gated or private repos.
    pub token: Option<String>,
    /// Show a download progress bar on stderr.
    pub progress: bool,
}

impl HubOptions {
    fn api_repo(&self, repo: Repo) -> Result<ApiRepo> {
        let mut builder = ApiBuilder::from_env().with_progress(self.progress);
        if let Some(dir) = &self.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        if let Some(endpoint) = &self.endpoint {
            builder = builder.with_endpoint(endpoint.clone());
        }
        if let Some(token) = &self.token {
            builder = builder.with_token(Some(token.clone()));
        }
        let api = builder.build().map_err(|e| {
            PipelineError::Download(format!("Failed to initialize HuggingFace API: {e}"))
        })?;

        Ok(api.repo(repo))
    }

    fn cache(&self) -> Cache {
        match &self.cache_dir {
            Some(dir) => Cache::new(dir.clone()),
            None => Cache::from_env(),
        }
    }
}

fn hub_repo(repo: &str, revision: Option<&str>) -> Repo {
    match revision {
        Some(rev) => Repo::with_revision(repo.to_string(), RepoType::Model, rev.to_string()),
        None => Repo::new(repo.to_string(), RepoType::Model),
    }
}

fn fetch(repo: &ApiRepo, repo_id: &str, filename: &str) -> Result<PathBuf> {
    tracing::debug!(repo = repo_id, file = filename, "fetching from hub");
    repo.get(filename).map_err(|e| {
        PipelineError::Download(format!(
            "Failed to download '{filename}' from '{repo_id}': {e}"
        ))
    })
}

/// Where a model's files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A repo on the Hugging Face Hub. `revision` defaults to `main`.
    Hub {
        /// Repo id, e.g. `tohoku-nlp/bert-base-japanese`.
        repo: String,
        /// Branch, tag or commit to pin.
        revision: Option<String>,
    },
    /// A directory on disk laid out like a Hub repo (e.g. an export).
    Local(PathBuf),
}

impl ModelSource {
    /// A Hub repo at its default revision.
    pub fn hub(repo: impl Into<String>) -> Self {
        ModelSource::Hub {
            repo: repo.into(),
            revision: None,
        }
    }

    /// A local model directory.
    pub fn local(path: impl Into<PathBuf>) -> Self {
        ModelSource::Local(path.into())
    }

    /// Pin a Hub revision. No effect on local sources.
    pub fn with_revision(self, revision: impl Into<String>) -> Self {
        match self {
            ModelSource::Hub { repo, .. } => ModelSource::Hub {
                repo,
                revision: Some(revision.into()),
            },
            local => local,
        }
    }

    /// Lists the source's files. For the Hub this is the first network call,
    /// so an unknown repo id fails here. If the Hub can't be reached, a
    /// snapshot already in the cache is used instead.
    pub(crate) fn open(&self, hub: &HubOptions) -> Result<ModelFiles> {
        match self {
            ModelSource::Hub { repo, revision } => {
                let hf_repo = hub_repo(repo, revision.as_deref());
                let api_repo = hub.api_repo(hf_repo.clone())?;
                let available: Vec<String> = match api_repo.info() {
                    Ok(info) => info.siblings.into_iter().map(|s| s.rfilename).collect(),
                    Err(e) => {
                        let cached = hub.cache().repo(hf_repo);
                        let available: Vec<String> = KNOWN_FILES
                            .iter()
                            .filter(|name| cached.get(name).is_some())
                            .map(|name| name.to_string())
                            .collect();
                        if !available.iter().any(|f| f == CONFIG_FILE) {
                            return Err(PipelineError::Download(format!(
                                "Failed to resolve model '{repo}': {e}"
                            )));
                        }
                        tracing::warn!(
                            repo = repo.as_str(),
                            error = %e,
                            "hub unreachable, using cached snapshot"
                        );
                        available
                    }
                };
                tracing::debug!(repo = repo.as_str(), files = available.len(), "resolved hub repo");
                Ok(ModelFiles {
                    location: FileLocation::Hub {
                        repo: api_repo,
                        repo_id: repo.clone(),
                    },
                    available,
                })
            }
            ModelSource::Local(dir) => {
                let entries = std::fs::read_dir(dir).map_err(|e| {
                    PipelineError::Filesystem(format!(
                        "Failed to read model directory '{}': {e}",
                        dir.display()
                    ))
                })?;
                let mut available = Vec::new();
                for entry in entries {
                    let entry = entry?;
                    if entry.file_type()?.is_file() {
                        available.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                Ok(ModelFiles {
                    location: FileLocation::Local(dir.clone()),
                    available,
                })
            }
        }
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelSource::Hub {
                repo,
                revision: Some(rev),
            } => write!(f, "{repo}@{rev}"),
            ModelSource::Hub { repo, .. } => write!(f, "{repo}"),
            ModelSource::Local(dir) => write!(f, "{}", dir.display()),
        }
    }
}

impl ModelOptions for ModelSource {
    fn cache_key(&self) -> String {
        match self {
            ModelSource::Hub { .. } => format!("hub:{self}"),
            ModelSource::Local(_) => format!("local:{self}"),
        }
    }
}

enum FileLocation {
    Hub { repo: ApiRepo, repo_id: String },
    Local(PathBuf),
}

/// An opened [`ModelSource`] that knows which files exist.
pub(crate) struct ModelFiles {
    location: FileLocation,
    available: Vec<String>,
}

impl ModelFiles {
    pub fn contains(&self, filename: &str) -> bool {
        self.available.iter().any(|f| f == filename)
    }

    pub fn get(&self, filename: &str) -> Result<PathBuf> {
        match &self.location {
            FileLocation::Hub { repo, repo_id } => fetch(repo, repo_id, filename),
            FileLocation::Local(dir) => {
                let path = dir.join(filename);
                if path.is_file() {
                    Ok(path)
                } else {
                    Err(PipelineError::Filesystem(format!(
                        "'{filename}' not found in '{}'",
                        dir.display()
                    )))
                }
            }
        }
    }

    /// Fetches `filename` only if the source lists it.
    pub fn get_optional(&self, filename: &str) -> Result<Option<PathBuf>> {
        if self.contains(filename) {
            self.get(filename).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// The parts of `config.json` used to pick an implementation.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ArchitectureInfo {
    #[serde(default)]
    pub model_type: Option<String>,
    #[serde(default)]
    pub architectures: Option<Vec<String>>,
    #[serde(default)]
    pub id2label: HashMap<String, String>,
    #[serde(default)]
    pub max_position_embeddings: Option<usize>,
    #[serde(default)]
    pub pad_token_id: Option<u32>,
}

impl ArchitectureInfo {
    pub fn model_type(&self) -> &str {
        self.model_type.as_deref().unwrap_or("unknown")
    }

    /// True when `architectures` is absent or any entry ends with `suffix`.
    pub fn declares_head(&self, suffix: &str) -> bool {
        match &self.architectures {
            Some(archs) if !archs.is_empty() => archs.iter().any(|a| a.ends_with(suffix)),
            _ => true,
        }
    }

    /// `id2label` as a dense list indexed by class id.
    pub fn labels(&self) -> Result<Vec<String>> {
        let mut pairs = self
            .id2label
            .iter()
            .map(|(id, label)| {
                id.parse::<usize>()
                    .map(|id| (id, label.clone()))
                    .map_err(|_| {
                        PipelineError::Unsupported(format!("Invalid id2label key '{id}'"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        pairs.sort_by_key(|(id, _)| *id);

        for (expected, (id, _)) in pairs.iter().enumerate() {
            if *id != expected {
                return Err(PipelineError::Unsupported(format!(
                    "id2label is not contiguous: missing class {expected}"
                )));
            }
        }
        Ok(pairs.into_iter().map(|(_, label)| label).collect())
    }
}

/// `config.json`: the raw text (for architecture-specific parsing) plus the common fields.
pub(crate) struct ModelConfig {
    pub raw: String,
    pub info: ArchitectureInfo,
}

impl ModelConfig {
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.raw).map_err(|e| {
            PipelineError::Unsupported(format!(
                "config.json doesn't match the '{}' architecture: {e}",
                self.info.model_type()
            ))
        })
    }
}

pub(crate) fn load_config(files: &ModelFiles) -> Result<ModelConfig> {
    let path = files.get(CONFIG_FILE)?;
    let raw = std::fs::read_to_string(&path)?;
    let info: ArchitectureInfo = serde_json::from_str(&raw)?;
    Ok(ModelConfig { raw, info })
}

/// Loads `tokenizer.json`, or builds a WordPiece tokenizer from `vocab.txt`
/// when the repo only ships the latter.
pub(crate) fn load_tokenizer(files: &ModelFiles, max_length: Option<usize>) -> Result<Tokenizer> {
    let mut tokenizer = if let Some(path) = files.get_optional(TOKENIZER_FILE)? {
        Tokenizer::from_file(&path).map_err(|e| {
            PipelineError::Tokenization(format!(
                "Failed to load tokenizer from '{}': {e}",
                path.display()
            ))
        })?
    } else if let Some(vocab) = files.get_optional(VOCAB_FILE)? {
        let tokenizer_config = files.get_optional(TOKENIZER_CONFIG_FILE)?;
        crate::export::tokenizer::wordpiece_from_vocab(&vocab, tokenizer_config.as_deref())?
    } else {
        return Err(PipelineError::Tokenization(
            "Model ships neither tokenizer.json nor vocab.txt".into(),
        ));
    };

    if let Some(max_length) = max_length {
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| PipelineError::Tokenization(format!("Invalid truncation: {e}")))?;
    }

    Ok(tokenizer)
}

/// How a checkpoint's weights are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightFormat {
    /// `model.safetensors`.
    Safetensors,
    /// `pytorch_model.bin`, a pickled state dict.
    Pickle,
}

impl WeightFormat {
    /// The file name the Hub uses for this format.
    pub fn file_name(self) -> &'static str {
        match self {
            WeightFormat::Safetensors => SAFETENSORS_FILE,
            WeightFormat::Pickle => PYTORCH_FILE,
        }
    }
}

/// Prefers safetensors, falls back to the pickle checkpoint.
pub(crate) fn find_weights(files: &ModelFiles) -> Result<(PathBuf, WeightFormat)> {
    for format in [WeightFormat::Safetensors, WeightFormat::Pickle] {
        if files.contains(format.file_name()) {
            return Ok((files.get(format.file_name())?, format));
        }
    }
    Err(PipelineError::Unsupported(format!(
        "No '{SAFETENSORS_FILE}' or '{PYTORCH_FILE}' in model files"
    )))
}

pub(crate) fn load_var_builder(files: &ModelFiles, device: &Device) -> Result<VarBuilder<'static>> {
    let (path, format) = find_weights(files)?;
    var_builder_from_file(&path, format, device)
}

pub(crate) fn var_builder_from_file(
    path: &Path,
    format: WeightFormat,
    device: &Device,
) -> Result<VarBuilder<'static>> {
    let vb = match format {
        WeightFormat::Safetensors => unsafe {
            VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)?
        },
        WeightFormat::Pickle => VarBuilder::from_pth(path, DType::F32, device)?,
    };
    Ok(vb)
}
