//! On-disk homes for uploaded bytes: the persistent upload directory served
//! back by name, and a process-lifetime scratch directory for `/analyze`.

use chrono::Utc;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tempfile::TempDir;
use tokio::fs::{self, File, OpenOptions};
use uuid::Uuid;

use crate::classify::extension_of;
use crate::error::AppError;

/// Prefix of every name handed out by [`UploadStore::create`].
pub const UPLOAD_PREFIX: &str = "img_";

const MAX_NAME_ATTEMPTS: u32 = 64;

/// Reduce a client-supplied name to a safe single path component.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(&['/', '\\'][..]).next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_owned()
    } else {
        trimmed.to_owned()
    }
}

/// Reject anything that could step outside the upload directory.
pub fn validate_name(name: &str) -> Result<(), AppError> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains(&['/', '\\', '\0'][..])
    {
        return Err(AppError::InvalidRequest(format!("invalid file name: {name:?}")));
    }
    Ok(())
}

#[derive(Clone, Debug)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub async fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `img_<millis>[.<ext>]`, extension taken from the sanitized client name.
    pub fn unique_name(original: &str, millis: i64) -> String {
        let ext = extension_of(&sanitize_filename(original));
        if ext.is_empty() {
            format!("{UPLOAD_PREFIX}{millis}")
        } else {
            format!("{UPLOAD_PREFIX}{millis}.{ext}")
        }
    }

    /// Allocate a fresh upload file. Same-millisecond collisions get a
    /// numeric suffix rather than overwriting.
    pub async fn create(&self, original: &str) -> io::Result<(String, File)> {
        let base = Self::unique_name(original, Utc::now().timestamp_millis());
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                base.clone()
            } else {
                with_suffix(&base, attempt)
            };
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&name))
                .await
            {
                Ok(file) => return Ok((name, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free upload name for {base}"),
        ))
    }

    pub async fn remove(&self, name: &str) -> io::Result<()> {
        fs::remove_file(self.dir.join(name)).await
    }

    /// Most recently created regular file whose name starts with `prefix`.
    pub async fn latest(&self, prefix: &str) -> io::Result<Option<String>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut best: Option<(SystemTime, String)> = None;

        while let Some(entry) = entries.next_entry().await? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !name.starts_with(prefix) {
                continue;
            }
            // entries can vanish between listing and stat
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let stamp = meta.created().or_else(|_| meta.modified())?;
            let newer = match &best {
                Some((t, n)) => (stamp, &name) > (*t, n),
                None => true,
            };
            if newer {
                best = Some((stamp, name));
            }
        }

        Ok(best.map(|(_, name)| name))
    }

    pub async fn read(&self, name: &str) -> Result<Option<Vec<u8>>, AppError> {
        validate_name(name)?;
        match fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn with_suffix(name: &str, n: u32) -> String {
    match name.rfind('.') {
        Some(i) => format!("{}_{n}{}", &name[..i], &name[i..]),
        None => format!("{name}_{n}"),
    }
}

/// Temporary directory removed when the server shuts down.
#[derive(Debug)]
pub struct ScratchDir {
    inner: TempDir,
}

impl ScratchDir {
    pub fn new() -> io::Result<Self> {
        let inner = tempfile::Builder::new().prefix("typescope-").tempdir()?;
        Ok(Self { inner })
    }

    pub fn path(&self) -> &Path {
        self.inner.path()
    }

    /// A path no other request will be handed.
    pub fn slot(&self, original: &str) -> PathBuf {
        self.path()
            .join(format!("{}-{}", Uuid::new_v4().simple(), sanitize_filename(original)))
    }
}
