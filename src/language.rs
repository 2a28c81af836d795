//! Query language detection

use thiserror::Error;
use whatlang::Lang;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LanguageError {
    #[error("No language detected")]
    NotDetected,

    #[error("Detected language {0} has no ISO-639-1 code")]
    Unmapped(String),
}

/// Maps text to an ISO-639-1 language code
pub trait LanguageDetector: Send + Sync {
    fn detect(&self, text: &str) -> Result<String, LanguageError>;
}

/// Trigram-based detector backed by whatlang
#[derive(Debug, Default, Clone)]
pub struct WhatlangDetector;

impl WhatlangDetector {
    pub fn new() -> Self {
        Self
    }
}

impl LanguageDetector for WhatlangDetector {
    fn detect(&self, text: &str) -> Result<String, LanguageError> {
        let info = whatlang::detect(text).ok_or(LanguageError::NotDetected)?;

        let code = iso_639_1(info.lang())
            .ok_or_else(|| LanguageError::Unmapped(info.lang().code().to_string()))?;

        tracing::info!(
            "Detected language: {} (confidence {:.2})",
            code,
            info.confidence()
        );

        Ok(code.to_string())
    }
}

fn iso_639_1(lang: Lang) -> Option<&'static str> {
    let code = match lang {
        Lang::Eng => "en",
        Lang::Fra => "fr",
        Lang::Spa => "es",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Nld => "nl",
        Lang::Pol => "pl",
        Lang::Rus => "ru",
        Lang::Ukr => "uk",
        Lang::Swe => "sv",
        Lang::Dan => "da",
        Lang::Fin => "fi",
        Lang::Tur => "tr",
        Lang::Ara => "ar",
        Lang::Cmn => "zh",
        Lang::Jpn => "ja",
        Lang::Kor => "ko",
        Lang::Hin => "hi",
        Lang::Ell => "el",
        Lang::Ces => "cs",
        Lang::Ron => "ro",
        Lang::Hun => "hu",
        _ => return None,
    };
    Some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_english_and_french() {
        let detector = WhatlangDetector::new();

        let en = detector
            .detect("How can cities reduce their carbon emissions over the next decade?")
            .unwrap();
        let fr = detector
            .detect("Comment les villes peuvent-elles réduire leurs émissions de carbone ?")
            .unwrap();

        assert_eq!(en, "en");
        assert_eq!(fr, "fr");
    }

    #[test]
    fn test_no_letters_is_not_detected() {
        let detector = WhatlangDetector::new();
        assert_eq!(detector.detect("1234 5678"), Err(LanguageError::NotDetected));
    }
}
