// src/core/paths.rs

//! Path helpers shared by the parser, the resolver and the generators.
//! Canonical paths are the deduplication and cache keys everywhere, so all
//! canonicalization goes through one place.

use std::env;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Canonicalizes a path for use as a deduplication or cache key.
///
/// Falls back to the path itself when it cannot be resolved (e.g. an output
/// file that has not been written yet), so callers never have to handle a
/// canonicalization failure separately.
pub fn canonicalize(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// True if `path` is located inside `directory`, comparing canonically.
pub fn is_inside(path: &Path, directory: &Path) -> bool {
    canonicalize(path).starts_with(canonicalize(directory))
}

/// Recursively enumerates regular files under a directory.
///
/// Entries are sorted by name so the resulting file lists are stable across
/// runs and platforms; resolution output order depends on this.
pub fn enumerate_files(directory: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory).sort_by_file_name() {
        let entry = entry.map_err(io::Error::other)?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Best-effort relative path from `base` to `target`.
///
/// Used when writing generated files that refer to project sources. When the
/// two paths share no common root (e.g. different Windows drives), the
/// absolute target is returned unchanged.
pub fn relative_to(base: &Path, target: &Path) -> PathBuf {
    let base = canonicalize(base);
    let target = canonicalize(target);

    let base_components: Vec<Component<'_>> = base.components().collect();
    let target_components: Vec<Component<'_>> = target.components().collect();

    let common = base_components
        .iter()
        .zip(target_components.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if common == 0 {
        return target;
    }

    let mut result = PathBuf::new();
    for _ in common..base_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component);
    }
    if result.as_os_str().is_empty() {
        result.push(".");
    }
    result
}

/// Searches the `PATH` environment for an executable.
pub fn resolve_executable(name: &str) -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for directory in env::split_paths(&path_var) {
        let candidate = directory.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if cfg!(windows) {
            let candidate = directory.join(format!("{name}.exe"));
            if candidate.is_file() {
                return Some(candidate);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn relative_path_descends_and_climbs() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out/cmake");
        let target = dir.path().join("src/main.cpp");
        fs::create_dir_all(&base).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(&target, "int main() {}\n").unwrap();

        let relative = relative_to(&base, &target);
        assert_eq!(relative, PathBuf::from("../../src/main.cpp"));
    }

    #[test]
    fn relative_path_to_base_itself_is_dot() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(relative_to(dir.path(), dir.path()), PathBuf::from("."));
    }

    #[test]
    fn is_inside_detects_containment() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/file.txt");
        fs::create_dir_all(nested.parent().unwrap()).unwrap();
        fs::write(&nested, "x").unwrap();

        assert!(is_inside(&nested, dir.path()));
        assert!(!is_inside(dir.path(), &nested));
    }

    #[test]
    fn enumeration_is_sorted_and_recursive() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.cpp"), "").unwrap();
        fs::write(dir.path().join("a.cpp"), "").unwrap();
        fs::write(dir.path().join("sub/c.cpp"), "").unwrap();

        let files = enumerate_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| {
                relative_to(dir.path(), f)
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.cpp", "b.cpp", "sub/c.cpp"]);
    }
}
