//! Load model metadata from a `file://` path, inline text, or a directory of model files.

use crate::config::{MetaData, Model};
use crate::error::ModelError;
use std::path::Path;

const FILE_PREFIX: &str = "file://";

/// Read the raw text of a model source: `file://<path>` is read from disk, anything else is the text itself.
pub async fn read_source(source: &str) -> Result<String, ModelError> {
    match source.strip_prefix(FILE_PREFIX) {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ModelError::Parse(format!("{}: {}", path, e))),
        None => Ok(source.to_string()),
    }
}

pub fn parse_metadata(text: &str) -> Result<MetaData, ModelError> {
    serde_json::from_str(text).map_err(|e| ModelError::Parse(e.to_string()))
}

/// Read, parse and resolve one model. The returned model is not registered anywhere.
pub async fn load_model(source: &str, name: &str) -> Result<Model, ModelError> {
    let text = read_source(source).await?;
    let meta = parse_metadata(&text)
        .map_err(|e| ModelError::Parse(format!("model {}: {}", name, e)))?;
    Model::resolve(name, source, meta)
}

/// Load every `*.json` file in `dir`, naming each model after its file stem. Sorted by name.
pub async fn load_dir(dir: &Path) -> Result<Vec<Model>, ModelError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| ModelError::Parse(format!("{}: {}", dir.display(), e)))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| ModelError::Parse(format!("{}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut models = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let source = format!("{}{}", FILE_PREFIX, path.display());
        models.push(load_model(&source, name).await?);
    }
    Ok(models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inline_source_is_parsed_directly() {
        let m = load_model(r#"{"name":"Tag","table":{"name":"tags"},"columns":[{"name":"label","type":"string"}]}"#, "tag")
            .await
            .unwrap();
        assert_eq!(m.name, "tag");
        assert_eq!(m.meta.name, "Tag");
        assert_eq!(m.table_name(), "tags");
    }

    #[tokio::test]
    async fn malformed_source_is_a_parse_error() {
        let err = load_model("{not json", "broken").await.unwrap_err();
        assert!(matches!(err, ModelError::Parse(_)));
    }

    #[tokio::test]
    async fn missing_file_is_a_parse_error() {
        let err = load_model("file:///definitely/not/here.json", "x").await.unwrap_err();
        assert!(matches!(err, ModelError::Parse(_)));
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let meta = parse_metadata(
            r#"{"table":{"name":"t"},"columns":[{"name":"a","type":"string"},{"name":"a","type":"text"}]}"#,
        )
        .unwrap();
        assert!(matches!(Model::resolve("t", "inline", meta), Err(ModelError::Parse(_))));
    }
}
