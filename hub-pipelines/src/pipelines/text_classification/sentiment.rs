use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PipelineError;

/// Five-point sentiment scale used by multilingual sentiment models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    /// `very_negative`
    VeryNegative,
    /// `negative`
    Negative,
    /// `neutral`
    Neutral,
    /// `positive`
    Positive,
    /// `very_positive`
    VeryPositive,
}

impl Sentiment {
    /// Canonical snake_case name.
    pub fn as_str(self) -> &'static str {
        match self {
            Sentiment::VeryNegative => "very_negative",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
            Sentiment::Positive => "positive",
            Sentiment::VeryPositive => "very_positive",
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts model labels like `"Very Negative"`: spaces become `_`, case is ignored.
impl FromStr for Sentiment {
    type Err = PipelineError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let normalized = label.trim().replace(' ', "_").to_lowercase();
        match normalized.as_str() {
            "very_negative" => Ok(Sentiment::VeryNegative),
            "negative" => Ok(Sentiment::Negative),
            "neutral" => Ok(Sentiment::Neutral),
            "positive" => Ok(Sentiment::Positive),
            "very_positive" => Ok(Sentiment::VeryPositive),
            _ => Err(PipelineError::Unsupported(format!(
                "Unknown sentiment label: {normalized}. Expected one of: \
                 very_negative, negative, neutral, positive, very_positive"
            ))),
        }
    }
}
