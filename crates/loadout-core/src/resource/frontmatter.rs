//! YAML frontmatter for markdown-defined resources (SKILL.md, subagents).

use serde_json::{Map, Value};

/// Split `---` delimited YAML frontmatter from a markdown body.
///
/// Returns `None` when the document has no complete frontmatter block.
pub fn split(input: &str) -> Option<(&str, &str)> {
    let rest = input
        .strip_prefix("---\n")
        .or_else(|| input.strip_prefix("---\r\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

/// Parse frontmatter into a JSON object.
///
/// `Ok(None)` means no frontmatter; `Err` carries the YAML error text.
pub fn parse(input: &str) -> Result<Option<Map<String, Value>>, String> {
    let Some((yaml, _)) = split(input) else {
        return Ok(None);
    };
    if yaml.trim().is_empty() {
        return Ok(Some(Map::new()));
    }

    let value: serde_yaml::Value = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
    match serde_json::to_value(value).map_err(|e| e.to_string())? {
        Value::Object(map) => Ok(Some(map)),
        Value::Null => Ok(Some(Map::new())),
        _ => Err("frontmatter must be a mapping".to_string()),
    }
}

/// Non-empty string field from a frontmatter map.
pub fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_frontmatter_and_body() {
        let doc = "---\nname: reviewer\ndescription: Reviews code\n---\n\nBody text\n";
        let (yaml, body) = split(doc).expect("frontmatter present");
        assert_eq!(yaml, "name: reviewer\ndescription: Reviews code\n");
        assert_eq!(body, "\nBody text\n");
    }

    #[test]
    fn parses_mapping_into_json() {
        let doc = "---\nname: reviewer\ntools:\n  - Read\n  - Grep\n---\nbody";
        let map = parse(doc).expect("valid yaml").expect("frontmatter present");
        assert_eq!(string_field(&map, "name").as_deref(), Some("reviewer"));
        assert_eq!(map["tools"], serde_json::json!(["Read", "Grep"]));
    }

    #[test]
    fn missing_or_unterminated_frontmatter_is_none() {
        assert_eq!(parse("# Title\n").expect("no error"), None);
        assert_eq!(parse("---\nname: x\n").expect("no error"), None);
    }

    #[test]
    fn malformed_yaml_is_error() {
        assert!(parse("---\nname: [unclosed\n---\n").is_err());
    }

    #[test]
    fn handles_crlf_delimiters() {
        let doc = "---\r\nname: x\r\n---\r\nbody";
        let (yaml, body) = split(doc).expect("frontmatter present");
        assert_eq!(yaml, "name: x\r\n");
        assert_eq!(body, "body");
    }
}
