use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use bookcrawl_core::layout::{category_dir_name, destination_for, ensure_output_dir, CategoryDirs, DirectoryCreator};
use tempfile::tempdir;

#[test]
fn creates_missing_directory() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("a/b/c");
    ensure_output_dir(&nested).expect("should create dirs");
    assert!(nested.exists() && nested.is_dir());
}

#[test]
fn ok_if_directory_exists() {
    let dir = tempdir().unwrap();
    ensure_output_dir(dir.path()).expect("existing dir should be ok");
}

#[test]
fn error_if_path_is_file() {
    let dir = tempdir().unwrap();
    let file_path = dir.path().join("file.txt");
    fs::write(&file_path, "data").unwrap();
    let err = ensure_output_dir(&file_path).expect_err("should error when path is a file");
    assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
}

#[derive(Clone, Default)]
struct CountingCreator {
    calls: Arc<Mutex<Vec<PathBuf>>>,
}

impl DirectoryCreator for CountingCreator {
    fn create_dir(&mut self, path: &Path) -> std::io::Result<()> {
        self.calls.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}

#[test]
fn category_directory_created_once() {
    let creator = CountingCreator::default();
    let mut dirs = CategoryDirs::new("books", "Uncategorized", Box::new(creator.clone()));

    let first = dirs.ensure("Databases & Data").unwrap();
    let again = dirs.ensure("Databases & Data").unwrap();
    dirs.ensure("Networking").unwrap();

    assert_eq!(first, again);
    assert_eq!(first, Path::new("books").join("Databases & Data"));
    assert_eq!(creator.calls.lock().unwrap().len(), 2);
}

#[test]
fn category_separators_stay_one_level() {
    assert_eq!(category_dir_name("Web/Networking").as_deref(), Some("Web-Networking"));
    assert_eq!(category_dir_name(" Programming ").as_deref(), Some("Programming"));
    assert_eq!(category_dir_name("../etc").as_deref(), Some("..-etc"));
}

#[test]
fn dot_categories_fall_back_inside_base() {
    let creator = CountingCreator::default();
    let mut dirs = CategoryDirs::new("books", "Uncategorized", Box::new(creator.clone()));

    for category in ["..", ".", " .. ", ""] {
        assert_eq!(dirs.ensure(category).unwrap(), Path::new("books").join("Uncategorized"));
    }
    assert_eq!(category_dir_name(".."), None);
    assert_eq!(creator.calls.lock().unwrap().len(), 1);
}

#[test]
fn dot_category_never_escapes_real_output_dir() {
    let root = tempdir().unwrap();
    let base = root.path().join("out");
    let mut dirs = CategoryDirs::new(&base, "Misc", Box::new(bookcrawl_core::layout::FsDirectories));

    let dir = dirs.ensure("..").unwrap();
    assert_eq!(dir, base.join("Misc"));
    assert!(dir.is_dir());
    assert_eq!(fs::read_dir(root.path()).unwrap().count(), 1);
}

#[test]
fn destination_uses_last_path_segment() {
    let dir = Path::new("books/Databases");
    assert_eq!(
        destination_for(dir, "http://example.test/2017/01/file.pdf"),
        Some(dir.join("file.pdf"))
    );
    assert_eq!(destination_for(dir, "http://example.test/"), None);
}
