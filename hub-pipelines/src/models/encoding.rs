use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

use crate::error::{PipelineError, Result};

/// Padded `(batch, max_len)` u32 tensors for the texts that tokenized.
pub(crate) struct BatchTensors {
    pub input_ids: Tensor,
    pub attention_mask: Tensor,
    pub token_type_ids: Tensor,
}

pub(crate) fn pad_token_id(tokenizer: &Tokenizer, fallback: u32) -> u32 {
    tokenizer
        .get_padding()
        .map(|p| p.pad_id)
        .or_else(|| tokenizer.token_to_id("[PAD]"))
        .or_else(|| tokenizer.token_to_id("<pad>"))
        .unwrap_or(fallback)
}

/// Tokenizes `texts`, runs `forward` once on the padded batch and scatters its
/// per-row outputs back to input order. A text that fails to tokenize gets its
/// own error; the rest of the batch still runs.
pub(crate) fn map_batch<T, F>(
    tokenizer: &Tokenizer,
    texts: &[&str],
    pad_id: u32,
    device: &Device,
    forward: F,
) -> Result<Vec<Result<T>>>
where
    F: FnOnce(&BatchTensors) -> Result<Vec<T>>,
{
    if texts.is_empty() {
        return Ok(vec![]);
    }

    let mut results: Vec<Option<Result<T>>> = (0..texts.len()).map(|_| None).collect();
    let mut rows = Vec::with_capacity(texts.len());
    let mut encodings = Vec::with_capacity(texts.len());

    for (i, text) in texts.iter().enumerate() {
        match tokenizer.encode(*text, true) {
            Ok(encoding) => {
                rows.push(i);
                encodings.push(encoding);
            }
            Err(e) => {
                results[i] = Some(Err(PipelineError::Tokenization(format!(
                    "Tokenization failed on '{}': {}",
                    text.chars().take(50).collect::<String>(),
                    e
                ))));
            }
        }
    }

    if !encodings.is_empty() {
        let max_len = encodings.iter().map(|e| e.len()).max().unwrap_or(0);
        let batch_size = encodings.len();

        let mut all_ids = Vec::with_capacity(batch_size * max_len);
        let mut all_masks = Vec::with_capacity(batch_size * max_len);
        let mut all_type_ids = Vec::with_capacity(batch_size * max_len);

        for encoding in &encodings {
            let pad = max_len - encoding.len();
            all_ids.extend_from_slice(encoding.get_ids());
            all_ids.extend(std::iter::repeat(pad_id).take(pad));
            all_masks.extend_from_slice(encoding.get_attention_mask());
            all_masks.extend(std::iter::repeat(0).take(pad));
            all_type_ids.extend_from_slice(encoding.get_type_ids());
            all_type_ids.extend(std::iter::repeat(0).take(pad));
        }

        let batch = BatchTensors {
            input_ids: Tensor::from_vec(all_ids, (batch_size, max_len), device)?,
            attention_mask: Tensor::from_vec(all_masks, (batch_size, max_len), device)?,
            token_type_ids: Tensor::from_vec(all_type_ids, (batch_size, max_len), device)?,
        };

        let outputs = forward(&batch)?;
        if outputs.len() != rows.len() {
            return Err(PipelineError::Unexpected(format!(
                "Model returned {} outputs for {} inputs",
                outputs.len(),
                rows.len()
            )));
        }
        for (row, output) in rows.into_iter().zip(outputs) {
            results[row] = Some(Ok(output));
        }
    }

    Ok(results
        .into_iter()
        .map(|r| {
            r.unwrap_or_else(|| {
                Err(PipelineError::Unexpected(
                    "Model returned no prediction".to_string(),
                ))
            })
        })
        .collect())
}
