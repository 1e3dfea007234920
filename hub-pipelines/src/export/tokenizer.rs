//! Builds a `tokenizer.json`-compatible tokenizer for BERT checkpoints that only ship `vocab.txt`.

use std::path::Path;

use serde::Deserialize;
use tokenizers::decoders::wordpiece::WordPiece as WordPieceDecoder;
use tokenizers::models::wordpiece::WordPiece;
use tokenizers::normalizers::bert::BertNormalizer;
use tokenizers::normalizers::unicode::NFKC;
use tokenizers::normalizers::utils::Sequence;
use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
use tokenizers::processors::bert::BertProcessing;
use tokenizers::{AddedToken, Model, NormalizerWrapper, Tokenizer};

use crate::error::{PipelineError, Result};

#[derive(Deserialize)]
#[serde(untagged)]
enum TokenSpec {
    Plain(String),
    Added { content: String },
}

impl TokenSpec {
    fn into_content(self) -> String {
        match self {
            TokenSpec::Plain(content) | TokenSpec::Added { content } => content,
        }
    }
}

#[derive(Deserialize)]
struct TokenizerConfig {
    #[serde(default = "default_true")]
    do_lower_case: bool,
    #[serde(default = "default_true")]
    tokenize_chinese_chars: bool,
    #[serde(default)]
    strip_accents: Option<bool>,
    #[serde(default)]
    word_tokenizer_type: Option<String>,
    unk_token: Option<TokenSpec>,
    sep_token: Option<TokenSpec>,
    cls_token: Option<TokenSpec>,
    pad_token: Option<TokenSpec>,
    mask_token: Option<TokenSpec>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            do_lower_case: true,
            tokenize_chinese_chars: true,
            strip_accents: None,
            word_tokenizer_type: None,
            unk_token: None,
            sep_token: None,
            cls_token: None,
            pad_token: None,
            mask_token: None,
        }
    }
}

fn default_true() -> bool {
    true
}

fn token(spec: Option<TokenSpec>, default: &str) -> String {
    spec.map(TokenSpec::into_content)
        .unwrap_or_else(|| default.to_string())
}

/// WordPiece tokenizer with BERT normalization, pre-tokenization and
/// `[CLS] ... [SEP]` post-processing, configured from `tokenizer_config.json`.
///
/// Word segmenters such as MeCab are not available; their input is split on
/// whitespace and punctuation instead. MeCab checkpoints were trained on
/// NFKC-normalized text, so their tokenizers apply NFKC first.
pub fn wordpiece_from_vocab(vocab: &Path, tokenizer_config: Option<&Path>) -> Result<Tokenizer> {
    let config: TokenizerConfig = match tokenizer_config {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => TokenizerConfig::default(),
    };

    let word_tokenizer = config.word_tokenizer_type.as_deref().unwrap_or("basic");
    if word_tokenizer != "basic" {
        tracing::warn!(
            word_tokenizer,
            "word tokenizer not available, falling back to BERT pre-tokenization"
        );
    }

    let bert_normalizer = BertNormalizer::new(
        true,
        config.tokenize_chinese_chars,
        config.strip_accents,
        config.do_lower_case,
    );
    let normalizer: NormalizerWrapper = if word_tokenizer == "mecab" {
        Sequence::new(vec![NFKC.into(), bert_normalizer.into()]).into()
    } else {
        bert_normalizer.into()
    };

    let unk = token(config.unk_token, "[UNK]");
    let sep = token(config.sep_token, "[SEP]");
    let cls = token(config.cls_token, "[CLS]");
    let pad = token(config.pad_token, "[PAD]");
    let mask = token(config.mask_token, "[MASK]");

    let vocab_path = vocab.to_str().ok_or_else(|| {
        PipelineError::Filesystem(format!("Non UTF-8 vocab path '{}'", vocab.display()))
    })?;
    let wordpiece = WordPiece::from_file(vocab_path)
        .unk_token(unk.clone())
        .build()
        .map_err(|e| {
            PipelineError::Tokenization(format!(
                "Failed to read WordPiece vocab '{}': {e}",
                vocab.display()
            ))
        })?;

    let special_id = |name: &str| {
        wordpiece.token_to_id(name).ok_or_else(|| {
            PipelineError::Tokenization(format!("Special token '{name}' missing from vocab"))
        })
    };
    let sep_id = special_id(&sep)?;
    let cls_id = special_id(&cls)?;

    let mut tokenizer = Tokenizer::new(wordpiece);
    tokenizer
        .with_normalizer(Some(normalizer))
        .with_pre_tokenizer(Some(BertPreTokenizer))
        .with_post_processor(Some(BertProcessing::new(
            (sep.clone(), sep_id),
            (cls.clone(), cls_id),
        )))
        .with_decoder(Some(WordPieceDecoder::default()));

    let specials: Vec<AddedToken> = [pad, unk, cls, sep, mask]
        .into_iter()
        .map(|t| AddedToken::from(t, true))
        .collect();
    tokenizer.add_special_tokens(&specials);

    Ok(tokenizer)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOCAB: &str = "[PAD]\n[UNK]\n[CLS]\n[SEP]\n[MASK]\nhello\nworld\n##s\n東\n京\n";

    fn write_vocab(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("vocab.txt");
        std::fs::write(&path, VOCAB).unwrap();
        path
    }

    #[test]
    fn encodes_with_cls_and_sep() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(dir.path());

        let tokenizer = wordpiece_from_vocab(&vocab, None).unwrap();
        let encoding = tokenizer.encode("Hello worlds", true).unwrap();

        assert_eq!(
            encoding.get_tokens(),
            &["[CLS]", "hello", "world", "##s", "[SEP]"]
        );
        assert_eq!(encoding.get_ids(), &[2, 5, 6, 7, 3]);
    }

    #[test]
    fn honours_case_and_cjk_settings() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(dir.path());
        let config = dir.path().join("tokenizer_config.json");
        std::fs::write(
            &config,
            r#"{"do_lower_case": false, "word_tokenizer_type": "mecab",
                "unk_token": {"content": "[UNK]", "lstrip": false}}"#,
        )
        .unwrap();

        let tokenizer = wordpiece_from_vocab(&vocab, Some(&config)).unwrap();

        let cased = tokenizer.encode("Hello", true).unwrap();
        assert_eq!(cased.get_tokens(), &["[CLS]", "[UNK]", "[SEP]"]);

        let kanji = tokenizer.encode("東京", true).unwrap();
        assert_eq!(kanji.get_tokens(), &["[CLS]", "東", "京", "[SEP]"]);
    }

    #[test]
    fn mecab_configs_fold_full_width_forms() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(dir.path());
        let mecab = dir.path().join("mecab_config.json");
        std::fs::write(&mecab, r#"{"word_tokenizer_type": "mecab"}"#).unwrap();
        let basic = dir.path().join("basic_config.json");
        std::fs::write(&basic, r#"{"word_tokenizer_type": "basic"}"#).unwrap();

        let folded = wordpiece_from_vocab(&vocab, Some(&mecab)).unwrap();
        let encoding = folded.encode("ｈｅｌｌｏ", true).unwrap();
        assert_eq!(encoding.get_tokens(), &["[CLS]", "hello", "[SEP]"]);

        let plain = wordpiece_from_vocab(&vocab, Some(&basic)).unwrap();
        let encoding = plain.encode("ｈｅｌｌｏ", true).unwrap();
        assert_eq!(encoding.get_tokens(), &["[CLS]", "[UNK]", "[SEP]"]);
    }

    #[test]
    fn missing_special_tokens_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = dir.path().join("vocab.txt");
        std::fs::write(&vocab, "[UNK]\nhello\n").unwrap();

        let err = wordpiece_from_vocab(&vocab, None).unwrap_err();
        assert!(matches!(err, PipelineError::Tokenization(_)));
    }

    #[test]
    fn survives_json_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = write_vocab(dir.path());
        let tokenizer = wordpiece_from_vocab(&vocab, None).unwrap();

        let path = dir.path().join("tokenizer.json");
        tokenizer.save(&path, false).unwrap();
        let reloaded = Tokenizer::from_file(&path).unwrap();

        assert_eq!(
            reloaded.encode("hello", true).unwrap().get_ids(),
            tokenizer.encode("hello", true).unwrap().get_ids()
        );
    }
}
