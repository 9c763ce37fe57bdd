use std::collections::HashSet;
use std::fs;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};

use crate::url_utils::file_name_from_url;

/// Ensure the given output directory exists. Creates missing parent directories as needed.
///
/// Returns Ok(()) if the directory already exists (and is a directory) or is successfully created.
/// Returns an io::Error if creation fails or if a non-directory entity exists at the path.
pub fn ensure_output_dir<P: AsRef<Path>>(output_path: P) -> io::Result<()> {
    let path = output_path.as_ref();
    if path.exists() {
        if !path.is_dir() {
            return Err(io::Error::new(ErrorKind::AlreadyExists, "Output path exists but is not a directory"));
        }
        return Ok(());
    }
    fs::create_dir_all(path)
}

/// Directory creation seam, so tests can observe how often the filesystem is touched.
pub trait DirectoryCreator: Send {
    fn create_dir(&mut self, path: &Path) -> io::Result<()>;
}

/// Real filesystem, via [`ensure_output_dir`].
#[derive(Debug, Default)]
pub struct FsDirectories;

impl DirectoryCreator for FsDirectories {
    fn create_dir(&mut self, path: &Path) -> io::Result<()> {
        ensure_output_dir(path)
    }
}

/// One directory name per category. Path separators would nest directories, so they become `-`.
/// `None` for names that do not denote a child of the base directory (empty, `.` or `..`).
pub fn category_dir_name(category: &str) -> Option<String> {
    let name: String = category
        .chars()
        .map(|c| if c == '/' || c == '\\' { '-' } else { c })
        .collect();
    match name.trim() {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Category directories under the base output directory, each created at most once.
pub struct CategoryDirs {
    base: PathBuf,
    fallback: String,
    created: HashSet<String>,
    creator: Box<dyn DirectoryCreator>,
}

impl CategoryDirs {
    /// `fallback` names the directory used for categories without a usable name.
    pub fn new(base: impl Into<PathBuf>, fallback: &str, creator: Box<dyn DirectoryCreator>) -> Self {
        Self {
            base: base.into(),
            fallback: category_dir_name(fallback).unwrap_or_else(|| "Uncategorized".to_string()),
            created: HashSet::new(),
            creator,
        }
    }

    /// Directory for `category`, creating it on first use.
    pub fn ensure(&mut self, category: &str) -> io::Result<PathBuf> {
        let name = category_dir_name(category).unwrap_or_else(|| self.fallback.clone());
        let dir = self.base.join(&name);
        if !self.created.contains(&name) {
            self.creator.create_dir(&dir)?;
            self.created.insert(name);
        }
        Ok(dir)
    }
}

/// `{dir}/{last path segment of link}`, or `None` when the link has no usable file name.
pub fn destination_for(dir: &Path, link: &str) -> Option<PathBuf> {
    file_name_from_url(link).map(|name| dir.join(name))
}
