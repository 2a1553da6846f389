//! Message pagination and operator-specific response framing.

use crate::error::EngineError;
use crate::localization::Localizer;

const MESSAGE_BUDGET: usize = 160;

/// Splits `text` at the last newline at or before the budget boundary if it
/// exceeds [`MESSAGE_BUDGET`] code points, appending a localized "type n for
/// more" footer to the visible prefix. Returns `(visible_text, remainder)`;
/// `remainder` is empty when no split was needed.
///
/// If the text exceeds the budget but contains no newline to split on, it is
/// sent unsplit rather than truncated — losing content is worse than
/// exceeding the nominal budget by a few characters.
pub fn paginate(text: &str, localizer: &Localizer, lang: &str) -> (String, String) {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= MESSAGE_BUDGET {
        return (text.to_string(), String::new());
    }

    let split_at = chars[..=MESSAGE_BUDGET.min(chars.len() - 1)]
        .iter()
        .rposition(|c| *c == '\n');

    match split_at {
        Some(idx) => {
            let prefix: String = chars[..idx].iter().collect();
            let remainder: String = chars[idx + 1..].iter().collect();
            let footer = localizer.get(lang, "continue_footer", None);
            (format!("{prefix}\n{footer}"), remainder)
        }
        None => (text.to_string(), String::new()),
    }
}

/// Neutral description of a framed response, translated to the wire format
/// by the HTTP gateway layer (axum headers/body construction lives there,
/// keeping this module free of any web-framework dependency).
pub enum Frame {
    /// MTN: the whole response is a JSON object.
    Json { action: &'static str, message: String },
    /// MTN2 / AIRTEL: a `Freeflow` header plus a plain-text body.
    HeaderBody { freeflow: &'static str, body: String },
}

pub fn frame(network_code: &str, message: String, end_session: bool) -> Result<Frame, EngineError> {
    let continue_code = if end_session { "FB" } else { "FC" };
    match network_code {
        "MTN" => Ok(Frame::Json {
            action: if end_session { "FB" } else { "FC" },
            message,
        }),
        "MTN2" | "AIRTEL" => Ok(Frame::HeaderBody {
            freeflow: continue_code,
            body: message,
        }),
        other => Err(EngineError::InvalidNetworkCode(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn localizer() -> Localizer {
        // `Localizer::load` reads files; tests exercise `paginate`'s pure
        // logic against a tiny ad hoc catalogue instead.
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ussd.en.toml"), "continue_footer = \"Type n for more\"\n").unwrap();
        std::fs::write(dir.path().join("ussd.sw.toml"), "continue_footer = \"Andika n\"\n").unwrap();
        Localizer::load(dir.path()).unwrap()
    }

    #[test]
    fn exactly_160_is_unsplit() {
        let loc = localizer();
        let text: String = "a".repeat(160);
        let (visible, remainder) = paginate(&text, &loc, "en");
        assert_eq!(visible, text);
        assert!(remainder.is_empty());
    }

    #[test]
    fn over_budget_with_no_newline_is_sent_unsplit() {
        let loc = localizer();
        let text: String = "a".repeat(161);
        let (visible, remainder) = paginate(&text, &loc, "en");
        assert_eq!(visible, text);
        assert!(remainder.is_empty());
    }

    #[test]
    fn over_budget_with_newline_splits_and_stashes_remainder() {
        let loc = localizer();
        let first = "a".repeat(120);
        let second = "b".repeat(120);
        let text = format!("{first}\n{second}");
        let (visible, remainder) = paginate(&text, &loc, "en");
        assert!(visible.starts_with(&first));
        assert!(visible.contains("Type n for more"));
        assert_eq!(remainder, second);
    }

    #[test]
    fn frame_maps_unknown_network_code_to_error() {
        assert!(frame("ORANGE", "hi".to_string(), false).is_err());
    }

    #[test]
    fn frame_mtn_uses_json_action_codes() {
        match frame("MTN", "hi".to_string(), false).unwrap() {
            Frame::Json { action, .. } => assert_eq!(action, "FC"),
            _ => panic!("expected Json frame"),
        }
        match frame("MTN", "bye".to_string(), true).unwrap() {
            Frame::Json { action, .. } => assert_eq!(action, "FB"),
            _ => panic!("expected Json frame"),
        }
    }

    #[test]
    fn frame_mtn2_and_airtel_use_freeflow_header() {
        for code in ["MTN2", "AIRTEL"] {
            match frame(code, "hi".to_string(), false).unwrap() {
                Frame::HeaderBody { freeflow, .. } => assert_eq!(freeflow, "FC"),
                _ => panic!("expected HeaderBody frame"),
            }
        }
    }
}
