//! Migration file discovery.
//!
//! Migrations are plain script files in one directory. The file name is both
//! the ledger key and the sort key, so names need sortable prefixes such as
//! `001_` or a timestamp.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::error::{MigrationError, MigrationResult};

/// One migration script discovered on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    /// File name, used as the ledger key.
    pub filename: String,
    /// Raw script text.
    pub contents: String,
}

impl MigrationFile {
    /// Returns true when the script has nothing to send to the database.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.contents.trim().is_empty()
    }
}

/// Location and naming of migration files.
#[derive(Debug, Clone)]
pub struct MigrationSource {
    dir: PathBuf,
    extension: String,
}

impl MigrationSource {
    /// Creates a source reading `*.{extension}` files from `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Directory this source reads from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lists and reads every migration file, sorted by file name.
    ///
    /// All files are read before returning, so a read failure surfaces
    /// before any migration has been executed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed, a matching file
    /// name is not UTF-8, or a matching file cannot be read.
    pub async fn discover(&self) -> MigrationResult<Vec<MigrationFile>> {
        let discovery_err = |source| MigrationError::Discovery {
            dir: self.dir.clone(),
            source,
        };

        let mut entries = tokio::fs::read_dir(&self.dir).await.map_err(discovery_err)?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(discovery_err)? {
            let path = entry.path();
            if !has_extension(&path, &self.extension) {
                continue;
            }

            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|source| MigrationError::Read {
                    path: path.clone(),
                    source,
                })?;
            if !metadata.is_file() {
                continue;
            }

            let name = entry
                .file_name()
                .into_string()
                .map_err(|_| MigrationError::InvalidFilename { path: path.clone() })?;
            names.push(name);
        }

        let mut files = Vec::new();
        for filename in select_migrations(names, &self.extension) {
            let path = self.dir.join(&filename);
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|source| MigrationError::Read { path, source })?;
            files.push(MigrationFile { filename, contents });
        }

        debug!(dir = %self.dir.display(), count = files.len(), "Discovered migration files");
        Ok(files)
    }

    /// Creates an empty migration file named `{timestamp}_{slug}.{extension}`.
    ///
    /// The timestamp prefix makes the new file sort after every file created
    /// earlier. The directory is created if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if `name` has no usable characters, the file already
    /// exists, or it cannot be written.
    pub async fn create(&self, name: &str, now: DateTime<Utc>) -> MigrationResult<PathBuf> {
        let slug = slugify(name);
        if slug.is_empty() {
            return Err(MigrationError::InvalidName(name.to_string()));
        }

        let filename = format!("{}_{slug}.{}", now.format("%Y%m%d%H%M%S"), self.extension);
        let path = self.dir.join(filename);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| MigrationError::Discovery {
                dir: self.dir.clone(),
                source,
            })?;

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(_) => Ok(path),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(MigrationError::AlreadyExists { path })
            }
            Err(source) => Err(MigrationError::Read { path, source }),
        }
    }
}

/// Selects migration file names and puts them in application order.
///
/// Keeps names whose extension is exactly `extension`, sorts them byte-wise
/// and drops duplicates. The result does not depend on input order.
pub fn select_migrations<I, S>(names: I, extension: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut selected: Vec<String> = names
        .into_iter()
        .map(Into::into)
        .filter(|name| has_extension(Path::new(name), extension))
        .collect();
    selected.sort_unstable();
    selected.dedup();
    selected
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension() == Some(OsStr::new(extension))
}

/// Lowercases `name` and collapses every run of other characters into `_`.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    while slug.ends_with('_') {
        slug.pop();
    }
    slug
}
