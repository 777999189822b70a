//! Input sanitizers shared by every executor, grounded on `nebula_mcp/models.py`'s
//! `_strip_control`/`_sanitize_text`/`_sanitize_tags`/`_reject_metadata_keys`/
//! `_sanitize_vault_path` helpers.

use nebula_core::{ExecutorError, NebulaResult};
use serde_json::Value;

/// Unicode bidi/direction-override control points the source strips
/// explicitly, on top of the general `Cc` control category `char::is_control`
/// already covers — these are formatting characters (category `Cf`), which
/// `char::is_control` does not flag.
const BIDI_CONTROLS: &[char] = &[
    '\u{202A}', '\u{202B}', '\u{202C}', '\u{202D}', '\u{202E}', '\u{2066}', '\u{2067}', '\u{2068}',
    '\u{2069}', '\u{200E}', '\u{200F}',
];

const BANNED_METADATA_KEYS: &[&str] = &["__proto__", "prototype", "constructor"];

/// Strips bidi-override/control characters and surrounding whitespace.
pub fn strip_control(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() && !BIDI_CONTROLS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn sanitize_text(text: &str) -> String {
    strip_control(text)
}

/// `_sanitize_tags`: strips each tag, drops empties, rejects the set if it's
/// too large or any single tag is too long.
pub fn sanitize_tags(tags: &[String]) -> NebulaResult<Vec<String>> {
    let cleaned: Vec<String> = tags
        .iter()
        .map(|t| strip_control(t))
        .filter(|t| !t.is_empty())
        .collect();
    if cleaned.len() > nebula_core::MAX_TAGS {
        return Err(ExecutorError::Invalid {
            reason: format!("too many tags (max {})", nebula_core::MAX_TAGS),
        }
        .into());
    }
    if let Some(long) = cleaned.iter().find(|t| t.len() > nebula_core::MAX_TAG_LEN) {
        return Err(ExecutorError::Invalid {
            reason: format!(
                "tag '{long}' exceeds max length of {}",
                nebula_core::MAX_TAG_LEN
            ),
        }
        .into());
    }
    Ok(cleaned)
}

/// `_reject_metadata_keys`: recursively walks objects/arrays rejecting any
/// object key that could be used for prototype pollution in a JS-backed
/// reader of this same data (the source's MCP client is JS-based).
pub fn reject_banned_metadata_keys(value: &Value) -> NebulaResult<()> {
    match value {
        Value::Object(map) => {
            for (key, v) in map {
                if BANNED_METADATA_KEYS.contains(&key.as_str()) {
                    return Err(ExecutorError::Invalid {
                        reason: format!("metadata key '{key}' is not allowed"),
                    }
                    .into());
                }
                reject_banned_metadata_keys(v)?;
            }
            Ok(())
        }
        Value::Array(items) => {
            for item in items {
                reject_banned_metadata_keys(item)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// `_sanitize_metadata`: metadata must be an object (or absent), and none of
/// its keys (at any depth) may be a banned prototype-pollution key.
pub fn sanitize_metadata(metadata: Option<&Value>) -> NebulaResult<Value> {
    let Some(metadata) = metadata else {
        return Ok(Value::Object(Default::default()));
    };
    if !metadata.is_object() {
        return Err(ExecutorError::Invalid {
            reason: "metadata must be a JSON object".to_string(),
        }
        .into());
    }
    reject_banned_metadata_keys(metadata)?;
    Ok(metadata.clone())
}

/// `_sanitize_vault_path`: rejects `~`-relative, absolute, or `..`-traversing
/// paths — vault file paths are joined onto a fixed root elsewhere and must
/// never escape it.
pub fn sanitize_vault_path(path: &str) -> NebulaResult<String> {
    let trimmed = strip_control(path);
    if trimmed.starts_with('~') {
        return Err(ExecutorError::Invalid {
            reason: "vault_file_path must not be home-relative".to_string(),
        }
        .into());
    }
    if trimmed.starts_with('/') {
        return Err(ExecutorError::Invalid {
            reason: "vault_file_path must not be absolute".to_string(),
        }
        .into());
    }
    if trimmed.split('/').any(|segment| segment == "..") {
        return Err(ExecutorError::Invalid {
            reason: "vault_file_path must not contain '..'".to_string(),
        }
        .into());
    }
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strip_control_removes_bidi_override_and_whitespace() {
        let input = "\u{202E}hello\u{202C}  ";
        assert_eq!(strip_control(input), "hello");
    }

    #[test]
    fn sanitize_tags_drops_empty_and_rejects_overlong() {
        let tags = vec!["  ".to_string(), "ok".to_string()];
        assert_eq!(sanitize_tags(&tags).unwrap(), vec!["ok".to_string()]);

        let overlong = vec!["a".repeat(nebula_core::MAX_TAG_LEN + 1)];
        assert!(sanitize_tags(&overlong).is_err());
    }

    #[test]
    fn reject_banned_metadata_keys_catches_nested_proto() {
        let value = json!({"ok": 1, "nested": {"__proto__": {}}});
        assert!(reject_banned_metadata_keys(&value).is_err());
    }

    #[test]
    fn sanitize_vault_path_rejects_traversal_and_absolute() {
        assert!(sanitize_vault_path("../escape.md").is_err());
        assert!(sanitize_vault_path("/etc/passwd").is_err());
        assert!(sanitize_vault_path("~/notes.md").is_err());
        assert_eq!(sanitize_vault_path("people/jane.md").unwrap(), "people/jane.md");
    }
}
