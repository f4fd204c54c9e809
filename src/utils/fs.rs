//! File system utilities for config lookup.
//!
//! Provides upward ancestor search, separator normalization for path string
//! comparison, and idempotent removal.

use std::{
    io,
    path::{Path, PathBuf},
};

/// Options for [`lookup_file`].
#[derive(Default)]
pub struct LookupOptions<'a> {
    /// Stop ascending once the parent directory leaves this root.
    pub root_dir: Option<&'a Path>,

    /// Extra acceptance test applied to each candidate path.
    pub predicate: Option<&'a dyn Fn(&Path) -> bool>,
}

/// Searches `dir` and then each of its ancestors for the first regular file
/// named by one of `formats`.
///
/// Within one directory the formats are tried in order. Returns `None` once
/// the filesystem root (or `options.root_dir`) is passed without a match.
pub fn lookup_file(dir: &Path, formats: &[&str], options: &LookupOptions<'_>) -> Option<PathBuf> {
    let mut current = Some(dir);

    while let Some(dir) = current {
        for format in formats {
            let full_path = dir.join(format);
            if full_path.is_file() && options.predicate.is_none_or(|accept| accept(&full_path)) {
                return Some(full_path);
            }
        }

        current = dir
            .parent()
            .filter(|parent| options.root_dir.is_none_or(|root| parent.starts_with(root)));
    }

    None
}

/// Converts backslashes to forward slashes.
pub fn slash(path: &str) -> String {
    path.replace('\\', "/")
}

/// Normalizes a path into a forward-slash string with `.` and `..` segments
/// folded away, so that equal locations compare equal as strings.
pub fn normalize_path(path: &Path) -> String {
    let raw = path.to_string_lossy();
    let raw = if cfg!(windows) { slash(&raw) } else { raw.into_owned() };
    posix_normalize(&raw)
}

fn posix_normalize(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let absolute = path.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(&last) if last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let mut normalized = segments.join("/");
    if absolute {
        normalized.insert(0, '/');
    }
    if path.ends_with('/') && !segments.is_empty() {
        normalized.push('/');
    }
    if normalized.is_empty() {
        normalized.push('.');
    }
    normalized
}

/// Removes a file, treating an already-missing file as success.
pub fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn lookup_finds_file_in_ancestor() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("package.json"), "{}").unwrap();

        let found = lookup_file(&nested, &["package.json"], &LookupOptions::default());
        assert_eq!(found, Some(root.path().join("package.json")));
    }

    #[test]
    fn lookup_prefers_nearest_directory() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("pkg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("package.json"), "{}").unwrap();
        fs::write(nested.join("package.json"), "{}").unwrap();

        let found = lookup_file(&nested, &["package.json"], &LookupOptions::default());
        assert_eq!(found, Some(nested.join("package.json")));
    }

    #[test]
    fn lookup_skips_directories_with_matching_name() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("pkg");
        fs::create_dir_all(nested.join("package.json")).unwrap();
        fs::write(root.path().join("package.json"), "{}").unwrap();

        let found = lookup_file(&nested, &["package.json"], &LookupOptions::default());
        assert_eq!(found, Some(root.path().join("package.json")));
    }

    #[test]
    fn lookup_respects_root_dir() {
        let root = TempDir::new().unwrap();
        let project = root.path().join("project");
        let nested = project.join("src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(root.path().join("package.json"), "{}").unwrap();

        let options = LookupOptions {
            root_dir: Some(&project),
            ..Default::default()
        };
        assert_eq!(lookup_file(&nested, &["package.json"], &options), None);
    }

    #[test]
    fn lookup_applies_predicate() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("pkg");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join("package.json"), "{}").unwrap();
        fs::write(root.path().join("package.json"), r#"{"name":"outer"}"#).unwrap();

        let has_name = |path: &Path| {
            fs::read_to_string(path)
                .map(|text| text.contains("name"))
                .unwrap_or(false)
        };
        let options = LookupOptions {
            predicate: Some(&has_name),
            ..Default::default()
        };
        assert_eq!(
            lookup_file(&nested, &["package.json"], &options),
            Some(root.path().join("package.json"))
        );
    }

    #[test]
    fn normalize_folds_dot_segments() {
        assert_eq!(posix_normalize("/a/./b/../c"), "/a/c");
        assert_eq!(posix_normalize("a//b/"), "a/b/");
        assert_eq!(posix_normalize("../x/../../y"), "../../y");
        assert_eq!(posix_normalize("/.."), "/");
        assert_eq!(posix_normalize(""), ".");
    }

    #[test]
    fn slash_converts_backslashes() {
        assert_eq!(slash(r"C:\work\esbuild.config.ts"), "C:/work/esbuild.config.ts");
    }

    #[test]
    fn remove_missing_file_is_ok() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("gone.mjs");
        assert!(remove_file_if_exists(&path).is_ok());
        fs::write(&path, "x").unwrap();
        assert!(remove_file_if_exists(&path).is_ok());
        assert!(!path.exists());
    }
}
