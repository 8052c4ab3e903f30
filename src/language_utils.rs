use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for target language handling
///
/// The prompt names the target language in English ("Japanese", "French").
/// Users may configure either that name or an ISO 639-1 / 639-2 code; codes
/// are resolved to their English name here.
/// Convert an ISO 639-2/B code to its ISO 639-2/T equivalent
fn bibliographic_to_terminologic(code: &str) -> Option<&'static str> {
    match code {
        "fre" => Some("fra"),
        "ger" => Some("deu"),
        "dut" => Some("nld"),
        "gre" => Some("ell"),
        "chi" => Some("zho"),
        "cze" => Some("ces"),
        "ice" => Some("isl"),
        "alb" => Some("sqi"),
        "arm" => Some("hye"),
        "baq" => Some("eus"),
        "bur" => Some("mya"),
        "per" => Some("fas"),
        "geo" => Some("kat"),
        "may" => Some("msa"),
        "mac" => Some("mkd"),
        "rum" => Some("ron"),
        "slo" => Some("slk"),
        "wel" => Some("cym"),
        _ => None,
    }
}

/// Look up an ISO 639-1 or ISO 639-2 code
pub fn language_from_code(code: &str) -> Option<Language> {
    let normalized_code = code.trim().to_lowercase();

    match normalized_code.len() {
        2 => Language::from_639_1(&normalized_code),
        3 => {
            let part2t = match bibliographic_to_terminologic(&normalized_code) {
                Some(terminologic) => terminologic,
                None => normalized_code.as_str(),
            };
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Resolve the configured target language to the name used in prompts.
///
/// Codes become English names (`ja` -> `Japanese`); anything else is taken as
/// a language name and returned trimmed.
pub fn resolve_language_name(language: &str) -> Result<String> {
    let trimmed = language.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("Target language cannot be empty"));
    }

    if let Some(lang) = language_from_code(trimmed) {
        return Ok(lang.to_name().to_string());
    }

    Ok(trimmed.to_string())
}
