//! Loading raw JSON into [`Document`]s.
//!
//! Accepts a JSON array of objects, a single object, JSON Lines, or a
//! directory walked for `.json` / `.jsonl` files in path order. Nested
//! objects are flattened to `parent_child` keys and arrays to `field_0`,
//! `field_1`, ...; scalars that are not strings keep their JSON text and
//! `null` becomes the empty string.

use crate::error::{RankError, Result};
use crate::Document;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const SEPARATOR: char = '_';

pub fn read_documents<P: AsRef<Path>>(input: P) -> Result<Vec<Document>> {
    let input = input.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).sort_by_file_name() {
            let entry = entry?;
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else {
        files.push(input.to_path_buf());
    }

    let mut docs = Vec::new();
    for file in files {
        let before = docs.len();
        if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file, &mut docs)?;
        } else {
            read_json(&file, &mut docs)?;
        }
        tracing::debug!(file = %file.display(), docs = docs.len() - before, "read documents");
    }
    Ok(docs)
}

fn read_jsonl(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let value: Value = serde_json::from_str(&line)?;
        docs.push(to_document(value).map_err(|e| at(file, lineno + 1, e))?);
    }
    Ok(())
}

fn read_json(file: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(file)?);
    let json: Value = serde_json::from_reader(reader)?;
    match json {
        Value::Array(arr) => {
            for (i, v) in arr.into_iter().enumerate() {
                docs.push(to_document(v).map_err(|e| at(file, i, e))?);
            }
        }
        other => docs.push(to_document(other).map_err(|e| at(file, 0, e))?),
    }
    Ok(())
}

fn at(file: &Path, position: usize, err: RankError) -> RankError {
    RankError::InvalidArgument(format!("{}:{}: {}", file.display(), position, err))
}

/// Flatten one JSON object into a document.
pub fn to_document(value: Value) -> Result<Document> {
    match value {
        Value::Object(map) => {
            let mut doc = Document::new();
            for (key, v) in map {
                flatten_into(&mut doc, key, v);
            }
            Ok(doc)
        }
        other => Err(RankError::InvalidArgument(format!("expected a JSON object, found {}", kind(&other)))),
    }
}

fn flatten_into(doc: &mut Document, key: String, value: Value) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (k, v) in map {
                flatten_into(doc, format!("{key}{SEPARATOR}{k}"), v);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (i, v) in items.into_iter().enumerate() {
                flatten_into(doc, format!("{key}{SEPARATOR}{i}"), v);
            }
        }
        Value::String(s) => { doc.insert(key, s); }
        Value::Null => { doc.insert(key, String::new()); }
        other => { doc.insert(key, other.to_string()); }
    }
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flattens_nested_values() {
        let doc = to_document(json!({
            "question": "How do I join?",
            "meta": {"course": "de", "week": 3},
            "tags": ["a", "b"],
            "answer": null
        }))
        .unwrap();
        assert_eq!(doc["question"], "How do I join?");
        assert_eq!(doc["meta_course"], "de");
        assert_eq!(doc["meta_week"], "3");
        assert_eq!(doc["tags_0"], "a");
        assert_eq!(doc["tags_1"], "b");
        assert_eq!(doc["answer"], "");
    }

    #[test]
    fn rejects_non_objects() {
        assert!(matches!(to_document(json!(["x"])), Err(RankError::InvalidArgument(_))));
    }

    #[test]
    fn reads_json_and_jsonl_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), r#"[{"q": "one"}, {"q": "two"}]"#).unwrap();
        std::fs::write(dir.path().join("b.jsonl"), "{\"q\": \"three\"}\n\n{\"q\": \"four\"}\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let docs = read_documents(dir.path()).unwrap();
        let qs: Vec<&str> = docs.iter().map(|d| d["q"].as_str()).collect();
        assert_eq!(qs, vec!["one", "two", "three", "four"]);
    }
}
