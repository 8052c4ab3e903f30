/*!
 * Tests for language utility functions
 */

use gapfill::language_utils::{language_from_code, resolve_language_name};

/// Test lookup of ISO 639-1 and ISO 639-2 codes
#[test]
fn test_languageFromCode_withValidCodes_shouldFindLanguage() {
    // ISO 639-1
    assert_eq!(language_from_code("en").map(|l| l.to_name()), Some("English"));
    assert_eq!(language_from_code("ar").map(|l| l.to_name()), Some("Arabic"));

    // ISO 639-2/T
    assert_eq!(language_from_code("fra").map(|l| l.to_name()), Some("French"));

    // ISO 639-2/B
    assert_eq!(language_from_code("ger").map(|l| l.to_name()), Some("German"));
    assert_eq!(language_from_code("per").map(|l| l.to_name()), Some("Persian"));

    // Whitespace and case
    assert_eq!(language_from_code(" EN ").map(|l| l.to_name()), Some("English"));
}

#[test]
fn test_languageFromCode_withInvalidCodes_shouldReturnNone() {
    assert!(language_from_code("e").is_none());
    assert!(language_from_code("123").is_none());
    assert!(language_from_code("English").is_none());
}

/// Codes and names both end up as the English language name used in prompts
#[test]
fn test_resolveLanguageName_shouldAcceptCodesAndNames() {
    assert_eq!(resolve_language_name("en").unwrap(), "English");
    assert_eq!(resolve_language_name("jpn").unwrap(), "Japanese");
    assert_eq!(resolve_language_name("Brazilian Portuguese").unwrap(), "Brazilian Portuguese");
    assert_eq!(resolve_language_name("  English ").unwrap(), "English");
}

#[test]
fn test_resolveLanguageName_withEmptyInput_shouldFail() {
    assert!(resolve_language_name("").is_err());
    assert!(resolve_language_name("   ").is_err());
}
