//! Two-tier file type classification: magic-byte signature first, filename
//! extension second.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::tables::{lookup_extension, lookup_signature, FileKind};

/// Number of leading bytes inspected for a signature.
pub const HEADER_LEN: usize = 1024;

pub const UNKNOWN: FileKind = FileKind { label: "UNKNOWN", category: "Unknown" };

pub const DEFAULT_MIME: &str = "application/octet-stream";

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Which tier produced the label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    Signature,
    Extension,
    /// Neither tier matched.
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub filename: String,
    pub filesize_bytes: u64,
    pub filesize: String,
    pub extension: String,
    pub filetype: &'static str,
    pub category: &'static str,
    pub mime_type: String,
    pub detection_method: DetectionMethod,
}

/// Per-file outcome. A file that cannot be read is reported in-band.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ClassificationResult {
    Classified(Classification),
    Error { filename: String, error: String },
}

impl ClassificationResult {
    pub fn size_bytes(&self) -> u64 {
        match self {
            ClassificationResult::Classified(c) => c.filesize_bytes,
            ClassificationResult::Error { .. } => 0,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            ClassificationResult::Classified(c) => Some(c.category),
            ClassificationResult::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ClassificationResult::Error { .. })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AggregateStats {
    pub count: usize,
    pub total_size: String,
    pub categories: BTreeMap<String, usize>,
}

/// A batch of results with its summary, as returned by `/analyze`.
#[derive(Clone, Debug, Serialize)]
pub struct Report {
    pub files: Vec<ClassificationResult>,
    pub stats: AggregateStats,
}

impl Report {
    pub fn new(files: Vec<ClassificationResult>) -> Self {
        let stats = aggregate(&files);
        Self { files, stats }
    }
}

/// Classify an in-memory header. `header` only needs the leading bytes.
pub fn classify(header: &[u8], filename: &str, size: u64) -> Classification {
    let extension = extension_of(filename);

    let (kind, detection_method) = if let Some(sig) = lookup_signature(header) {
        (sig.kind, DetectionMethod::Signature)
    } else if let Some(kind) = lookup_extension(&extension) {
        (kind, DetectionMethod::Extension)
    } else {
        (UNKNOWN, DetectionMethod::Unknown)
    };

    Classification {
        filename: filename.to_owned(),
        filesize_bytes: size,
        filesize: format_size(size),
        extension: extension.to_uppercase(),
        filetype: kind.label,
        category: kind.category,
        mime_type: guess_mime(filename).unwrap_or_else(|| DEFAULT_MIME.to_owned()),
        detection_method,
    }
}

/// Read the head of `path` and classify it under the display name `filename`.
/// I/O failures become [`ClassificationResult::Error`].
pub fn classify_file(path: &Path, filename: &str) -> ClassificationResult {
    match read_header(path) {
        Ok((header, size)) => {
            let c = classify(&header, filename, size);
            tracing::debug!(
                filename,
                filetype = c.filetype,
                method = ?c.detection_method,
                "classified"
            );
            ClassificationResult::Classified(c)
        }
        Err(e) => {
            let error = if e.kind() == io::ErrorKind::NotFound {
                format!("File not found: {filename}")
            } else {
                format!("Cannot read file: {e}")
            };
            tracing::warn!(filename, path = %path.display(), error = %e, "classification failed");
            ClassificationResult::Error { filename: filename.to_owned(), error }
        }
    }
}

fn read_header(path: &Path) -> io::Result<(Vec<u8>, u64)> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let mut header = Vec::with_capacity(HEADER_LEN);
    file.take(HEADER_LEN as u64).read_to_end(&mut header)?;
    Ok((header, size))
}

/// Lowercased text after the last `.` of the final path component, or `""`.
/// Dotfiles (`.bashrc`) and trailing dots (`name.`) have no extension.
pub fn extension_of(filename: &str) -> String {
    let name = filename.rsplit(&['/', '\\'][..]).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(i) if i > 0 && i + 1 < name.len() => name[i + 1..].to_lowercase(),
        _ => String::new(),
    }
}

pub fn guess_mime(filename: &str) -> Option<String> {
    mime_guess::from_path(filename).first_raw().map(str::to_owned)
}

/// Human-readable size: one decimal, binary units up to TB.
pub fn format_size(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in UNITS {
        if value < 1024.0 {
            return format!("{value:.1} {unit}");
        }
        value /= 1024.0;
    }
    format!("{value:.1} TB")
}

pub fn aggregate(results: &[ClassificationResult]) -> AggregateStats {
    let mut categories = BTreeMap::new();
    for category in results.iter().filter_map(ClassificationResult::category) {
        *categories.entry(category.to_owned()).or_insert(0) += 1;
    }
    let total: u64 = results.iter().map(ClassificationResult::size_bytes).sum();

    AggregateStats {
        count: results.len(),
        total_size: format_size(total),
        categories,
    }
}
