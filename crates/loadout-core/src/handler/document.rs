//! Keyed entries inside a shared JSON document.
//!
//! Every mutation is a read, a pure merge over the parsed map, and an atomic
//! write of the result. Keys outside the managed section are carried through
//! untouched. There is no cross-process lock: two writers racing on the same
//! document can lose one update.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::fs::write_atomic;

/// Why a pure document edit could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    /// The key is already present and overwriting was not requested.
    KeyExists,
    /// The key to remove is not present.
    KeyMissing,
    /// A segment on the path holds something other than an object.
    NotAnObject(String),
}

/// Parsed document plus where it came from.
#[derive(Debug, Clone)]
pub struct JsonDocument {
    path: PathBuf,
    root: Map<String, Value>,
    existed: bool,
}

impl JsonDocument {
    /// Read a document. A missing file is an empty document.
    pub async fn load(path: &Path) -> Result<Self> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Ok(Self {
                    path: path.to_path_buf(),
                    root: Map::new(),
                    existed: false,
                });
            }
            Err(err) => return Err(Error::io(path, err)),
        };

        let root = if bytes.iter().all(u8::is_ascii_whitespace) {
            Map::new()
        } else {
            match serde_json::from_slice::<Value>(&bytes).map_err(|e| Error::parse(path, e))? {
                Value::Object(map) => map,
                _ => return Err(Error::parse(path, "expected a JSON object at the root")),
            }
        };

        Ok(Self {
            path: path.to_path_buf(),
            root,
            existed: true,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn existed(&self) -> bool {
        self.existed
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    /// The object at `path`, empty when absent.
    pub fn section(&self, path: &[&str]) -> Result<Map<String, Value>> {
        extract_map_at_path(&self.root, path).map_err(|e| edit_error(&self.path, e))
    }

    /// Apply a pure edit, replacing the in-memory root on success.
    pub fn apply<F>(&mut self, edit: F) -> std::result::Result<(), EditError>
    where
        F: FnOnce(&Map<String, Value>) -> std::result::Result<Map<String, Value>, EditError>,
    {
        self.root = edit(&self.root)?;
        Ok(())
    }

    /// Atomically write the document back, pretty-printed.
    pub async fn commit(&self) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&Value::Object(self.root.clone()))
            .map_err(|e| Error::parse(&self.path, e))?;
        write_atomic(&self.path, &bytes).await
    }
}

/// Generic error for an edit the caller did not map itself.
pub fn edit_error(document: &Path, err: EditError) -> Error {
    match err {
        EditError::NotAnObject(segment) => {
            Error::parse(document, format!("expected '{segment}' to be a JSON object"))
        }
        EditError::KeyExists => Error::parse(document, "entry already exists"),
        EditError::KeyMissing => Error::parse(document, "entry not found"),
    }
}

/// Insert `key = value` into the object at `path`, returning the new root.
pub fn insert_entry(
    root: &Map<String, Value>,
    path: &[&str],
    key: &str,
    value: Value,
    overwrite: bool,
) -> std::result::Result<Map<String, Value>, EditError> {
    let mut section = extract_map_at_path(root, path)?;
    if section.contains_key(key) && !overwrite {
        return Err(EditError::KeyExists);
    }
    section.insert(key.to_string(), value);

    let mut updated = root.clone();
    set_map_at_path(&mut updated, path, section)?;
    Ok(updated)
}

/// Remove `key` from the object at `path`, returning the new root.
pub fn remove_entry(
    root: &Map<String, Value>,
    path: &[&str],
    key: &str,
) -> std::result::Result<Map<String, Value>, EditError> {
    let mut section = extract_map_at_path(root, path)?;
    if section.shift_remove(key).is_none() {
        return Err(EditError::KeyMissing);
    }

    let mut updated = root.clone();
    set_map_at_path(&mut updated, path, section)?;
    Ok(updated)
}

fn extract_map_at_path(
    root: &Map<String, Value>,
    path: &[&str],
) -> std::result::Result<Map<String, Value>, EditError> {
    let mut current = root;
    for (idx, segment) in path.iter().enumerate() {
        let Some(value) = current.get(*segment) else {
            return Ok(Map::new());
        };
        match value {
            Value::Object(map) if idx == path.len() - 1 => return Ok(map.clone()),
            Value::Object(map) => current = map,
            _ => return Err(EditError::NotAnObject(segment.to_string())),
        }
    }
    Ok(current.clone())
}

fn set_map_at_path(
    root: &mut Map<String, Value>,
    path: &[&str],
    map: Map<String, Value>,
) -> std::result::Result<(), EditError> {
    let Some((last, parents)) = path.split_last() else {
        *root = map;
        return Ok(());
    };

    let mut current = root;
    for segment in parents {
        let next = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        match next {
            Value::Object(inner) => current = inner,
            _ => return Err(EditError::NotAnObject(segment.to_string())),
        }
    }
    current.insert(last.to_string(), Value::Object(map));
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn obj(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn insert_preserves_unrelated_keys() {
        let root = obj(json!({"theme": "dark", "mcpServers": {"alpha": {"command": "a"}}}));
        let updated = insert_entry(&root, &["mcpServers"], "beta", json!({"command": "b"}), false)
            .expect("insert");

        assert_eq!(updated["theme"], "dark");
        assert_eq!(updated["mcpServers"]["alpha"]["command"], "a");
        assert_eq!(updated["mcpServers"]["beta"]["command"], "b");
    }

    #[test]
    fn insert_existing_key_requires_overwrite() {
        let root = obj(json!({"mcpServers": {"alpha": {"command": "a"}}}));
        assert_eq!(
            insert_entry(&root, &["mcpServers"], "alpha", json!({}), false),
            Err(EditError::KeyExists)
        );
        let updated = insert_entry(&root, &["mcpServers"], "alpha", json!({"command": "z"}), true)
            .expect("overwrite");
        assert_eq!(updated["mcpServers"]["alpha"]["command"], "z");
    }

    #[test]
    fn remove_reports_missing_key() {
        let root = obj(json!({"mcpServers": {"beta": {}}}));
        assert_eq!(
            remove_entry(&root, &["mcpServers"], "alpha"),
            Err(EditError::KeyMissing)
        );
        let updated = remove_entry(&root, &["mcpServers"], "beta").expect("remove");
        assert_eq!(updated["mcpServers"], json!({}));
    }

    #[test]
    fn non_object_section_is_rejected() {
        let root = obj(json!({"mcpServers": []}));
        assert_eq!(
            insert_entry(&root, &["mcpServers"], "a", json!({}), false),
            Err(EditError::NotAnObject("mcpServers".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_document_loads_empty_and_commits_atomically() {
        let temp = tempfile::tempdir().expect("tempdir should succeed");
        let path = temp.path().join(".roo/mcp.json");

        let mut doc = JsonDocument::load(&path).await.expect("load missing");
        assert!(!doc.existed());
        doc.apply(|root| {
            insert_entry(root, &["mcpServers"], "alpha", json!({"command": "a"}), false)
        })
        .expect("apply");
        doc.commit().await.expect("commit");

        let reloaded = JsonDocument::load(&path).await.expect("reload");
        assert_eq!(reloaded.root()["mcpServers"]["alpha"]["command"], "a");
    }
}
