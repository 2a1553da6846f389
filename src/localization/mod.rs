//! Message catalogues, one per language, loaded from TOML at startup.
//!
//! A lookup miss isn't an error: the key is returned verbatim, which is what
//! lets handlers return "opaque" strings that are safely passed through
//! `EngineError::Soft` even when they are not real localization keys.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct Catalogue(HashMap<String, String>);

pub struct Localizer {
    catalogues: HashMap<String, Catalogue>,
}

/// `rw` is the canonical code; `sw` is accepted as an alias the aggregator
/// sometimes sends for the same Kinyarwanda catalogue.
fn canonical_lang(lang: &str) -> &str {
    match lang {
        "sw" => "rw",
        other => other,
    }
}

/// A key is `[A-Za-z0-9_]+`. Used to decide whether a handler-returned
/// string should be translated or passed through verbatim.
pub fn is_key_shaped(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

impl Localizer {
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let mut catalogues = HashMap::new();
        for (code, file) in [("en", "ussd.en.toml"), ("rw", "ussd.sw.toml")] {
            let path = dir.join(file);
            let body = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("reading localization file {}: {e}", path.display()))?;
            let catalogue: Catalogue = toml::from_str(&body)?;
            catalogues.insert(code.to_string(), catalogue);
        }
        Ok(Localizer { catalogues })
    }

    #[cfg(test)]
    fn from_catalogues(pairs: &[(&str, &str, &str)]) -> Self {
        let mut catalogues: HashMap<String, HashMap<String, String>> = HashMap::new();
        for (lang, key, value) in pairs {
            catalogues
                .entry(lang.to_string())
                .or_default()
                .insert(key.to_string(), value.to_string());
        }
        Localizer {
            catalogues: catalogues.into_iter().map(|(k, v)| (k, Catalogue(v))).collect(),
        }
    }

    /// Looks up `key` in `lang`'s catalogue, applying `{{Name}}` substitution
    /// from `params`. Falls back to `key` verbatim on any miss: unknown
    /// language, unknown key.
    pub fn get(&self, lang: &str, key: &str, params: Option<&HashMap<String, String>>) -> String {
        let lang = canonical_lang(lang);
        let template = self
            .catalogues
            .get(lang)
            .and_then(|c| c.0.get(key))
            .cloned()
            .unwrap_or_else(|| {
                tracing::error!(lang, key, "localization key missing, returning verbatim");
                key.to_string()
            });
        match params {
            Some(params) => interpolate(&template, params),
            None => template,
        }
    }
}

fn interpolate(template: &str, params: &HashMap<String, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{{{name}}}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn miss_returns_key_verbatim() {
        let loc = Localizer::from_catalogues(&[("en", "home_ussd", "Welcome")]);
        assert_eq!(loc.get("en", "no_such_key", None), "no_such_key");
    }

    #[test]
    fn sw_is_aliased_to_rw() {
        let loc = Localizer::from_catalogues(&[("rw", "home_ussd", "Murakaza neza")]);
        assert_eq!(loc.get("sw", "home_ussd", None), "Murakaza neza");
    }

    #[test]
    fn named_parameters_are_substituted() {
        let loc = Localizer::from_catalogues(&[(
            "en",
            "confirm_amount",
            "Pay {{Amount}} to {{Name}}?",
        )]);
        let mut params = HashMap::new();
        params.insert("Amount".to_string(), "1500".to_string());
        params.insert("Name".to_string(), "Jane".to_string());
        assert_eq!(
            loc.get("en", "confirm_amount", Some(&params)),
            "Pay 1500 to Jane?"
        );
    }

    #[test]
    fn is_key_shaped_rejects_sentences() {
        assert!(is_key_shaped("invalid_input"));
        assert!(!is_key_shaped("Meter not found, try again"));
    }
}
