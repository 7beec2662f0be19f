use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TAGGED_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```json\s*").expect("tagged fence regex"));
static BARE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*").expect("bare fence regex"));
static CARDS_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\{[\s\S]*"cards"[\s\S]*\]"#).expect("cards object regex"));
static CARDS_ARRAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""cards"\s*:\s*(\[[\s\S]*?\])"#).expect("cards array regex")
});

/// A single recovery attempt over fence-stripped model output.
pub type Strategy = fn(&str) -> Option<Value>;

/// Tried in order; the first strategy producing JSON wins.
pub const STRATEGIES: &[(&str, Strategy)] = &[
    ("direct", parse_direct),
    ("balanced_object", parse_balanced_object),
    ("cards_array", parse_cards_array),
];

/// Best-effort extraction of the `{"cards": [...]}` payload from free-form model text.
pub fn recover_json(text: &str) -> Option<Value> {
    let cleaned = strip_code_fences(text);
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let value = strategy(&cleaned)?;
        tracing::debug!(strategy = name, "recovered JSON from model output");
        Some(value)
    })
}

/// Removes every ```` ```json ```` and ```` ``` ```` marker, wherever it appears.
pub fn strip_code_fences(text: &str) -> String {
    let without_tagged = TAGGED_FENCE.replace_all(text.trim(), "");
    BARE_FENCE
        .replace_all(&without_tagged, "")
        .trim()
        .to_string()
}

pub fn parse_direct(text: &str) -> Option<Value> {
    serde_json::from_str(text).ok()
}

/// Parses the object opening at the first `{` that precedes a `"cards"` key and a `]`,
/// up to the brace that closes it.
pub fn parse_balanced_object(text: &str) -> Option<Value> {
    let start = CARDS_OBJECT.find(text)?.start();
    let end = balanced_object_end(&text[start..])?;
    serde_json::from_str(&text[start..start + end]).ok()
}

/// Rebuilds a minimal `{"cards": [...]}` object around the first `"cards": [ ... ]` fragment.
/// The array ends at the first `]`, so nested arrays inside entries are not supported.
pub fn parse_cards_array(text: &str) -> Option<Value> {
    let array = CARDS_ARRAY.captures(text)?.get(1)?.as_str();
    serde_json::from_str(&format!("{{\"cards\":{array}}}")).ok()
}

/// Byte length of the object starting at `text[0] == '{'`. Braces inside JSON strings are ignored.
fn balanced_object_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CLEAN: &str = r#"{"cards":[{"card":"A","rate":"5x","reason":"r"}]}"#;

    fn expected() -> Value {
        json!({"cards": [{"card": "A", "rate": "5x", "reason": "r"}]})
    }

    #[test]
    fn clean_input_takes_direct_path() {
        assert_eq!(parse_direct(CLEAN), Some(expected()));
        assert_eq!(recover_json(CLEAN), Some(expected()));
    }

    #[test]
    fn tolerates_tagged_and_bare_fences() {
        let tagged = format!("```json\n{CLEAN}\n```");
        let upper = format!("```JSON\n{CLEAN}\n```\n");
        let bare = format!("```\n{CLEAN}\n```");
        assert_eq!(recover_json(&tagged), Some(expected()));
        assert_eq!(recover_json(&upper), Some(expected()));
        assert_eq!(recover_json(&bare), Some(expected()));
    }

    #[test]
    fn strip_code_fences_removes_markers() {
        assert_eq!(strip_code_fences(&format!("```json\n{CLEAN}\n```")), CLEAN);
    }

    #[test]
    fn balanced_object_ignores_surrounding_prose() {
        let text = format!("Here are the best cards: {CLEAN} Let me know if you need more.");
        assert_eq!(parse_direct(&text), None);
        assert_eq!(parse_balanced_object(&text), Some(expected()));
        assert_eq!(recover_json(&text), Some(expected()));
    }

    #[test]
    fn balanced_object_skips_braces_inside_strings() {
        let text = r#"Answer: {"cards":[{"card":"A","rate":"5x","reason":"uses {curly} text"}]} trailing }"#;
        let value = parse_balanced_object(text).unwrap();
        assert_eq!(value["cards"][0]["reason"], "uses {curly} text");
    }

    #[test]
    fn cards_array_recovers_truncated_object() {
        let text = r#"Sure! {"cards": [{"card":"A","rate":"5x","reason":"r"}], "note": "cut of"#;
        assert_eq!(parse_direct(text), None);
        assert_eq!(parse_balanced_object(text), None);
        assert_eq!(parse_cards_array(text), Some(expected()));
        assert_eq!(recover_json(text), Some(expected()));
    }

    #[test]
    fn cards_array_survives_colons_in_values() {
        let text = r#"note: "cards": [{"card":"A","rate":"5x","reason":"r: with colon"}] end"#;
        let value = parse_cards_array(text).unwrap();
        assert_eq!(value["cards"][0]["reason"], "r: with colon");
    }

    #[test]
    fn gives_up_on_prose() {
        assert_eq!(recover_json("I could not decide, sorry."), None);
        assert_eq!(recover_json(""), None);
        assert_eq!(recover_json(r#"{"cards": [ {"card": "A""#), None);
    }
}
