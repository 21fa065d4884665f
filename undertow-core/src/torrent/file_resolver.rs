//! Picks one file out of a torrent from loose selection criteria.
//!
//! Every present criterion must hold. Among the remaining candidates an exact
//! path match wins, otherwise the largest file does (first one on ties).

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::registry::FileRecord;

/// Optional selectors supplied by the caller, e.g. from a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCriteria {
    /// File name or path, case-insensitive, leading slash optional
    #[serde(default)]
    pub file: Option<String>,
    /// 1-based position in the torrent's file list
    #[serde(default)]
    pub file_index: Option<usize>,
    /// MIME primary type, full MIME type, subtype or extension (`video`,
    /// `video/mp4`, `mp4`, `.mp4`)
    #[serde(default)]
    pub file_type: Option<String>,
}

impl FileCriteria {
    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.file_index.is_none() && self.file_type.is_none()
    }
}

/// Selects the file `criteria` describes, or `None` if nothing matches.
pub fn find_file<'a>(files: &'a [FileRecord], criteria: &FileCriteria) -> Option<&'a FileRecord> {
    let wanted_file = criteria.file.as_deref().map(strip_root);
    let wanted_file_lower = wanted_file.map(str::to_lowercase);
    let wanted_type = criteria.file_type.as_deref().map(normalize_type);

    let candidates: Vec<&FileRecord> = files
        .iter()
        .enumerate()
        .filter(|(i, _)| criteria.file_index.is_none_or(|index| index == i + 1))
        .filter(|(_, f)| {
            wanted_file_lower
                .as_deref()
                .is_none_or(|wanted| matches_name_or_path(f, wanted))
        })
        .filter(|(_, f)| {
            wanted_type
                .as_deref()
                .is_none_or(|wanted| type_tokens(f).iter().any(|token| token == wanted))
        })
        .map(|(_, f)| f)
        .collect();

    if let Some(wanted) = wanted_file {
        if let Some(exact) = candidates.iter().find(|f| strip_root(&f.path) == wanted) {
            return Some(*exact);
        }
    }

    // `max_by_key` keeps the last maximum, so fold to keep the first.
    candidates
        .into_iter()
        .fold(None, |best: Option<&FileRecord>, f| match best {
            Some(b) if b.length >= f.length => Some(b),
            _ => Some(f),
        })
}

fn strip_root(value: &str) -> &str {
    value.strip_prefix('/').unwrap_or(value)
}

fn matches_name_or_path(file: &FileRecord, wanted_lower: &str) -> bool {
    file.name.to_lowercase() == wanted_lower || strip_root(&file.path).to_lowercase() == wanted_lower
}

fn normalize_type(value: &str) -> String {
    let lower = value.trim().to_lowercase();
    lower.strip_prefix('.').map(str::to_string).unwrap_or(lower)
}

/// Values a `fileType` selector may equal for this file.
///
/// An unknown MIME type and a missing extension both contribute an empty
/// token, so `fileType=` selects untyped files.
fn type_tokens(file: &FileRecord) -> Vec<String> {
    let mime = file.file_type.to_lowercase();
    let mut tokens: Vec<String> = mime.split('/').map(str::to_string).collect();
    tokens.push(mime);
    tokens.push(
        Path::new(&file.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default(),
    );
    tokens
}
