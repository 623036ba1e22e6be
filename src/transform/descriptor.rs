//! Package descriptor enrichment.

use crate::error::TransformError;
use serde_json::{Map, Value};
use std::path::Path;

/// Merge `fields` into the JSON descriptor at `path` and rewrite it.
///
/// Returns whether the file content changed.
pub async fn enrich_descriptor(
    path: &Path,
    fields: &Map<String, Value>,
) -> Result<bool, TransformError> {
    let original = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(TransformError::DescriptorMissing {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let enriched = enrich_content(&original, fields).map_err(|reason| {
        TransformError::DescriptorInvalid {
            path: path.to_path_buf(),
            reason,
        }
    })?;

    if enriched == original {
        return Ok(false);
    }

    tokio::fs::write(path, enriched).await?;
    Ok(true)
}

/// Apply `fields` to descriptor text, returning the pretty-printed result
pub fn enrich_content(content: &str, fields: &Map<String, Value>) -> Result<String, String> {
    let mut descriptor = match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err("root is not a JSON object".to_string()),
        Err(e) => return Err(e.to_string()),
    };

    merge_fields(&mut descriptor, fields);

    let mut rendered =
        serde_json::to_string_pretty(&Value::Object(descriptor)).map_err(|e| e.to_string())?;
    rendered.push('\n');
    Ok(rendered)
}

/// Deep-merge `patch` into `target`
///
/// Nested objects merge key by key; any other value replaces what was there.
/// Existing keys keep their position.
pub fn merge_fields(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_fields(existing, nested),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}
