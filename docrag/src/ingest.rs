//! Turning scraped text files into [`Document`]s.
//!
//! Scrapers write one `.txt` file per page. A file may open with a short
//! header of `Key: value` lines (`Title`, `URL`, ...) ended by a blank line;
//! the header becomes document metadata and the remainder the body.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::document::{Document, SOURCE_FILE_KEY};
use crate::error::{RagError, Result};

/// Header lines inspected for `Key: value` metadata.
const HEADER_LINES: usize = 10;

const KEPT_PUNCTUATION: &str = ".,;:!?()-";

/// Collapse whitespace runs to single spaces, drop characters other than
/// word characters, whitespace and `.,;:!?()-`, and trim.
pub fn clean_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if !(c.is_alphanumeric() || c == '_' || KEPT_PUNCTUATION.contains(c)) {
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Split a scraped file into header metadata and cleaned body text.
///
/// `path` becomes the document id and the `source_file` metadata entry;
/// its file name is recorded as `file_name`.
pub fn parse_scraped_file(path: &Path, raw: &str) -> Document {
    let lines: Vec<&str> = raw.split('\n').collect();
    let mut metadata: HashMap<String, String> = HashMap::new();
    let mut body: Option<String> = None;

    for (i, line) in lines.iter().take(HEADER_LINES).enumerate() {
        if let Some((key, value)) = line.split_once(": ") {
            metadata.insert(key.trim().to_string(), value.trim().to_string());
        }
        if line.trim().is_empty() && !metadata.is_empty() {
            body = Some(lines[i + 1..].join("\n"));
            break;
        }
    }

    let path_label = path.display().to_string();
    if let Some(name) = path.file_name() {
        metadata.insert("file_name".to_string(), name.to_string_lossy().into_owned());
    }
    metadata.insert(SOURCE_FILE_KEY.to_string(), path_label.clone());

    let text = clean_text(body.as_deref().unwrap_or(raw));
    Document { id: path_label, text, metadata, source_uri: None }
}

/// Decode file bytes as UTF-8, falling back to Latin-1.
fn decode(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

fn collect_txt_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| RagError::Persistence {
        path: dir.display().to_string(),
        message: format!("failed to read directory: {e}"),
    })?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_txt_files(&path, out)?;
        } else if path.extension().is_some_and(|ext| ext == "txt") {
            out.push(path);
        }
    }
    Ok(())
}

/// Read every `*.txt` file under `dir`, recursively, in path order.
///
/// Files that cannot be read are logged and skipped.
pub fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<Document>> {
    let dir = dir.as_ref();
    let mut paths = Vec::new();
    collect_txt_files(dir, &mut paths)?;
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in &paths {
        match fs::read(path) {
            Ok(bytes) => {
                let document = parse_scraped_file(path, &decode(bytes));
                debug!(path = %path.display(), chars = document.text.len(), "loaded document");
                documents.push(document);
            }
            Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable file"),
        }
    }
    info!(dir = %dir.display(), documents = documents.len(), "loaded scraped documents");
    Ok(documents)
}
