use std::fmt;
use std::str::FromStr;

use crate::error::{KoyuError, Result};

/// Target languages supported by the terminology table and the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    ChineseTraditional,
    English,
    Japanese,
    German,
}

impl Language {
    /// All supported languages in canonical table order
    pub const ALL: [Language; 4] = [
        Language::ChineseTraditional,
        Language::English,
        Language::Japanese,
        Language::German,
    ];

    /// Locale-qualified language tag, used for terminology sheets and artifact names
    pub fn code(&self) -> &'static str {
        match self {
            Language::ChineseTraditional => "cmn-Hant-TW",
            Language::English => "en-US",
            Language::Japanese => "ja-JP",
            Language::German => "de-DE",
        }
    }

    /// Short alias used by surrounding services
    pub fn short_code(&self) -> &'static str {
        match self {
            Language::ChineseTraditional => "zh",
            Language::English => "en",
            Language::Japanese => "ja",
            Language::German => "de",
        }
    }

    /// Human-readable name, used when prompting generation models
    pub fn english_name(&self) -> &'static str {
        match self {
            Language::ChineseTraditional => "Traditional Chinese",
            Language::English => "English",
            Language::Japanese => "Japanese",
            Language::German => "German",
        }
    }

    /// Slot index into per-language fixed storage
    pub(crate) const fn index(self) -> usize {
        match self {
            Language::ChineseTraditional => 0,
            Language::English => 1,
            Language::Japanese => 2,
            Language::German => 3,
        }
    }
}

impl FromStr for Language {
    type Err = KoyuError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cmn-hant-tw" | "zh" | "zh-tw" => Ok(Language::ChineseTraditional),
            "en-us" | "en" => Ok(Language::English),
            "ja-jp" | "ja" => Ok(Language::Japanese),
            "de-de" | "de" => Ok(Language::German),
            other => Err(KoyuError::UnsupportedLanguage(other.to_string())),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Parse a comma-separated language list such as "cmn-Hant-TW,en-US" or "zh,ja"
pub fn parse_language_list(raw: &str) -> Result<Vec<Language>> {
    let mut languages = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let language: Language = part.parse()?;
        if !languages.contains(&language) {
            languages.push(language);
        }
    }
    if languages.is_empty() {
        return Err(KoyuError::UnsupportedLanguage(format!(
            "no languages in '{}'",
            raw
        )));
    }
    Ok(languages)
}
