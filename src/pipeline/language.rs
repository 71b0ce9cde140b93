//! Response-language selection for a query.

pub const DEFAULT_CHAT_LANGUAGE: &str = "JAPANESE";

/// Two-letter (plus regional Chinese) codes to the language names used in
/// the prompt.
const CODES_TO_CHAT_LANGUAGE: &[(&str, &str)] = &[
    ("af", "AFRIKAANS"),
    ("ar", "ARABIC"),
    ("bg", "BULGARIAN"),
    ("bn", "BENGALI"),
    ("ca", "CATALAN"),
    ("cs", "CZECH"),
    ("cy", "WELSH"),
    ("da", "DANISH"),
    ("de", "GERMAN"),
    ("el", "GREEK"),
    ("en", "ENGLISH"),
    ("es", "SPANISH"),
    ("et", "ESTONIAN"),
    ("fa", "PERSIAN"),
    ("fi", "FINNISH"),
    ("fr", "FRENCH"),
    ("gu", "GUJARATI"),
    ("he", "HEBREW"),
    ("hi", "HINDI"),
    ("hr", "CROATIAN"),
    ("hu", "HUNGARIAN"),
    ("id", "INDONESIAN"),
    ("it", "ITALIAN"),
    ("ja", "JAPANESE"),
    ("kn", "KANNADA"),
    ("ko", "KOREAN"),
    ("lt", "LITHUANIAN"),
    ("lv", "LATVIAN"),
    ("mk", "MACEDONIAN"),
    ("ml", "MALAYALAM"),
    ("mr", "MARATHI"),
    ("ne", "NEPALI"),
    ("nl", "DUTCH"),
    ("no", "NORWEGIAN"),
    ("pa", "PUNJABI"),
    ("pl", "POLISH"),
    ("pt", "PORTUGUESE"),
    ("ro", "ROMANIAN"),
    ("ru", "RUSSIAN"),
    ("sk", "SLOVAK"),
    ("sl", "SLOVENIAN"),
    ("so", "SOMALI"),
    ("sq", "ALBANIAN"),
    ("sv", "SWEDISH"),
    ("sw", "SWAHILI"),
    ("ta", "TAMIL"),
    ("te", "TELUGU"),
    ("th", "THAI"),
    ("tl", "FILIPINO"),
    ("tr", "TURKISH"),
    ("uk", "UKRAINIAN"),
    ("ur", "URDU"),
    ("vi", "VIETNAMESE"),
    ("zh-cn", "CHINESE (SIMPLIFIED)"),
    ("zh-tw", "CHINESE (TRADITIONAL)"),
];

/// ISO 639-3 codes reported by the detector, mapped onto the table above.
const DETECTOR_CODES: &[(&str, &str)] = &[
    ("afr", "af"),
    ("ara", "ar"),
    ("bul", "bg"),
    ("ben", "bn"),
    ("cat", "ca"),
    ("ces", "cs"),
    ("dan", "da"),
    ("deu", "de"),
    ("ell", "el"),
    ("eng", "en"),
    ("spa", "es"),
    ("est", "et"),
    ("pes", "fa"),
    ("fin", "fi"),
    ("fra", "fr"),
    ("guj", "gu"),
    ("heb", "he"),
    ("hin", "hi"),
    ("hrv", "hr"),
    ("hun", "hu"),
    ("ind", "id"),
    ("ita", "it"),
    ("jpn", "ja"),
    ("kan", "kn"),
    ("kor", "ko"),
    ("lit", "lt"),
    ("lav", "lv"),
    ("mkd", "mk"),
    ("mal", "ml"),
    ("mar", "mr"),
    ("nep", "ne"),
    ("nld", "nl"),
    ("nob", "no"),
    ("pan", "pa"),
    ("pol", "pl"),
    ("por", "pt"),
    ("ron", "ro"),
    ("rus", "ru"),
    ("slk", "sk"),
    ("slv", "sl"),
    ("swe", "sv"),
    ("tam", "ta"),
    ("tel", "te"),
    ("tha", "th"),
    ("tgl", "tl"),
    ("tur", "tr"),
    ("ukr", "uk"),
    ("urd", "ur"),
    ("vie", "vi"),
    ("cmn", "zh-cn"),
];

pub fn language_for_code(code: &str) -> Option<&'static str> {
    CODES_TO_CHAT_LANGUAGE
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Detects the language code of `text`, if the detector recognises it.
pub fn detect_code(text: &str) -> Option<&'static str> {
    let detected = whatlang::detect_lang(text)?.code();
    DETECTOR_CODES
        .iter()
        .find(|(iso3, _)| *iso3 == detected)
        .map(|(_, code)| *code)
}

/// Language name to answer `query` in. Unrecognised input falls back to the
/// default language.
pub fn detect_language(query: &str) -> &'static str {
    detect_code(query)
        .and_then(language_for_code)
        .unwrap_or(DEFAULT_CHAT_LANGUAGE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_detector_code_has_a_language_name() {
        for (_, code) in DETECTOR_CODES {
            assert!(language_for_code(code).is_some(), "missing name for {}", code);
        }
    }

    #[test]
    fn detects_japanese_and_english() {
        assert_eq!(detect_language("返金ポリシーについて教えてください。"), "JAPANESE");
        assert_eq!(
            detect_language(
                "Could you please explain the refund policy for annual subscriptions and how long the process usually takes?"
            ),
            "ENGLISH"
        );
    }

    #[test]
    fn unrecognised_input_falls_back_to_default() {
        assert_eq!(detect_language(""), DEFAULT_CHAT_LANGUAGE);
        assert_eq!(detect_language("12345 !!!"), DEFAULT_CHAT_LANGUAGE);
        assert_eq!(language_for_code("xx"), None);
    }
}
