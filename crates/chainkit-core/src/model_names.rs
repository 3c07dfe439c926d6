//! Model and language identifiers understood by remote services

use crate::error::{ChainkitError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Chat completion models offered by Mistral AI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MistralAiChatModelName {
    /// aka mistral-tiny-2312
    OpenMistral7b,
    /// aka mistral-small-2312
    OpenMixtral8x7b,
    OpenMixtral8x22b,
    /// aka mistral-small-2402
    MistralSmallLatest,
    /// aka mistral-medium-2312
    MistralMediumLatest,
    /// aka mistral-large-2402
    MistralLargeLatest,
    MistralModerationLatest,
    /// aka open-mistral-nemo-2407
    OpenMistralNemo,
    CodestralLatest,
}

impl MistralAiChatModelName {
    pub const ALL: [MistralAiChatModelName; 9] = [
        Self::OpenMistral7b,
        Self::OpenMixtral8x7b,
        Self::OpenMixtral8x22b,
        Self::MistralSmallLatest,
        Self::MistralMediumLatest,
        Self::MistralLargeLatest,
        Self::MistralModerationLatest,
        Self::OpenMistralNemo,
        Self::CodestralLatest,
    ];

    /// Name sent on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenMistral7b => "open-mistral-7b",
            Self::OpenMixtral8x7b => "open-mixtral-8x7b",
            Self::OpenMixtral8x22b => "open-mixtral-8x22b",
            Self::MistralSmallLatest => "mistral-small-latest",
            Self::MistralMediumLatest => "mistral-medium-latest",
            Self::MistralLargeLatest => "mistral-large-latest",
            Self::MistralModerationLatest => "mistral-moderation-latest",
            Self::OpenMistralNemo => "open-mistral-nemo",
            Self::CodestralLatest => "codestral-latest",
        }
    }
}

impl fmt::Display for MistralAiChatModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MistralAiChatModelName {
    type Err = ChainkitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ChainkitError::UnknownModel(s.to_string()))
    }
}

impl From<MistralAiChatModelName> for String {
    fn from(name: MistralAiChatModelName) -> Self {
        name.as_str().to_string()
    }
}

impl TryFrom<String> for MistralAiChatModelName {
    type Error = ChainkitError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Embedding models offered by Mistral AI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MistralAiEmbeddingModelName {
    MistralEmbed,
}

impl MistralAiEmbeddingModelName {
    pub const ALL: [MistralAiEmbeddingModelName; 1] = [Self::MistralEmbed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MistralEmbed => "mistral-embed",
        }
    }

    /// Length of the vectors the model produces
    pub fn dimension(&self) -> usize {
        match self {
            Self::MistralEmbed => 1024,
        }
    }
}

impl fmt::Display for MistralAiEmbeddingModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MistralAiEmbeddingModelName {
    type Err = ChainkitError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ChainkitError::UnknownModel(s.to_string()))
    }
}

/// Source languages accepted by a Judge0 instance, with their numeric ids
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Judge0Language {
    /// JavaScript (Node.js 12.14.0)
    #[default]
    JavaScript,
    /// Python (3.8.1)
    Python,
}

impl Judge0Language {
    pub fn id(&self) -> u32 {
        match self {
            Self::JavaScript => 93,
            Self::Python => 71,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Python => "python",
        }
    }
}

impl fmt::Display for Judge0Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.id())
    }
}

impl FromStr for Judge0Language {
    type Err = ChainkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "javascript" | "js" => Ok(Self::JavaScript),
            "python" | "py" => Ok(Self::Python),
            _ => Err(ChainkitError::InvalidInput(format!(
                "Unsupported Judge0 language: {}",
                s
            ))),
        }
    }
}
