//! Input file resolution against an extraction root.
//!
//! The root is walked once and every regular file is indexed by its path
//! relative to the root, with `/` separators and a leading `/` standing in
//! for the root itself. A pattern matches a file when it matches either that
//! rooted form or the bare relative path. A `*` may span directory
//! separators, so `*/PhotoData/Photos.sqlite*` finds the database at any
//! depth, including directly under the root.

use crate::error::{LeappError, Result};
use glob::{MatchOptions, Pattern};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Indexed view of an extraction root.
#[derive(Debug, Clone)]
pub struct FileSeeker {
    root: PathBuf,
    files: Vec<(String, PathBuf)>,
}

impl FileSeeker {
    /// Indexes every file under `root`.
    ///
    /// Fails only when the root itself is missing or not a directory.
    /// Unreadable entries below the root are skipped with a warning.
    pub fn new(root: &Path) -> Result<Self> {
        check_root(root)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {:?}: {}", root, e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push((to_match_path(relative), entry.path().to_path_buf()));
            }
        }

        debug!("Indexed {} files under {:?}", files.len(), root);

        Ok(Self {
            root: root.to_path_buf(),
            files,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Files matching any of `patterns`.
    ///
    /// Ordered by pattern, then by walk order, without duplicates. An empty
    /// result is a normal outcome.
    pub fn resolve<S: AsRef<str>>(&self, patterns: &[S]) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut matches = Vec::new();

        for raw in patterns {
            let raw = raw.as_ref();
            let pattern = match Pattern::new(raw) {
                Ok(pattern) => pattern,
                Err(e) => {
                    warn!("Ignoring bad search pattern {:?}: {}", raw, e);
                    continue;
                }
            };

            for (rooted, path) in &self.files {
                let hit = pattern.matches_with(rooted, MATCH_OPTIONS)
                    || pattern.matches_with(&rooted[1..], MATCH_OPTIONS);
                if hit && seen.insert(path.clone()) {
                    matches.push(path.clone());
                }
            }
        }

        matches
    }
}

/// Checks that `root` exists and is a directory.
pub fn check_root(root: &Path) -> Result<()> {
    let metadata = fs::metadata(root).map_err(|e| {
        LeappError::global_io(format!("Cannot open extraction root {:?}", root), e)
    })?;

    if !metadata.is_dir() {
        return Err(LeappError::global_io(
            format!("Extraction root {:?} is not a directory", root),
            io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
        ));
    }

    Ok(())
}

/// One-off resolution without keeping the index.
pub fn resolve<S: AsRef<str>>(root: &Path, patterns: &[S]) -> Result<Vec<PathBuf>> {
    Ok(FileSeeker::new(root)?.resolve(patterns))
}

fn to_match_path(relative: &Path) -> String {
    let mut rooted = String::from("/");
    let parts: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();
    rooted.push_str(&parts.join("/"));
    rooted
}

/// MD5 of a file's contents, lowercase hex.
pub fn md5_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }

    Ok(format!("{:x}", context.compute()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, relative.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_star_spans_directories() {
        let dir = TempDir::new().unwrap();
        let db = touch(dir.path(), "private/var/mobile/Media/PhotoData/Photos.sqlite");
        let wal = touch(dir.path(), "private/var/mobile/Media/PhotoData/Photos.sqlite-wal");
        touch(dir.path(), "private/var/mobile/Media/Other/Photos.sqlite");

        let seeker = FileSeeker::new(dir.path()).unwrap();
        let found = seeker.resolve(&["*/PhotoData/Photos.sqlite*"]);

        assert_eq!(found, vec![db, wal]);
    }

    #[test]
    fn test_match_directly_under_root() {
        let dir = TempDir::new().unwrap();
        let db = touch(dir.path(), "PhotoData/Photos.sqlite");
        let top = touch(dir.path(), "Manifest.db");

        let seeker = FileSeeker::new(dir.path()).unwrap();

        assert_eq!(seeker.resolve(&["*/PhotoData/Photos.sqlite*"]), vec![db.clone()]);
        assert_eq!(seeker.resolve(&["**/PhotoData/Photos.sqlite"]), vec![db.clone()]);
        assert_eq!(seeker.resolve(&["/PhotoData/Photos.sqlite"]), vec![db]);
        assert_eq!(seeker.resolve(&["*/Manifest.db"]), vec![top]);
    }

    #[test]
    fn test_check_root() {
        let dir = TempDir::new().unwrap();
        assert!(check_root(dir.path()).is_ok());
        assert!(check_root(&dir.path().join("absent")).unwrap_err().is_fatal());
    }

    #[test]
    fn test_union_preserves_pattern_order_and_dedups() {
        let dir = TempDir::new().unwrap();
        let a = touch(dir.path(), "a/one.db");
        let b = touch(dir.path(), "b/two.plist");

        let seeker = FileSeeker::new(dir.path()).unwrap();
        let found = seeker.resolve(&["**/*.plist", "*.db", "*/one.db"]);

        assert_eq!(found, vec![b, a]);
    }

    #[test]
    fn test_no_match_is_empty() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "a/one.db");

        let found = resolve(dir.path(), &["*/nothing.sqlite"]).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_missing_root_is_global_error() {
        let dir = TempDir::new().unwrap();
        let err = FileSeeker::new(&dir.path().join("absent")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_file_root_rejected() {
        let dir = TempDir::new().unwrap();
        let file = touch(dir.path(), "image.tar");
        assert!(matches!(FileSeeker::new(&file), Err(LeappError::GlobalIo { .. })));
    }

    #[test]
    fn test_md5_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(md5_digest(&path).unwrap(), "900150983cd24fb0d6963f7d28e17f72");
    }
}
