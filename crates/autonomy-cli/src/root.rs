use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// Priority:
/// 1. `--root` flag / `AUTONOMY_ROOT` env var (passed in as `explicit`)
/// 2. Nearest ancestor of `cwd` containing `.autonomy/`
/// 3. Nearest ancestor of `cwd` containing `.git/`
/// 4. `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, ".autonomy")
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn explicit_root_wins() {
        let dir = TempDir::new().unwrap();
        assert_eq!(resolve_root(Some(dir.path())), dir.path());
    }

    #[test]
    fn autonomy_dir_beats_git_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let project = dir.path().join("services/api");
        std::fs::create_dir_all(project.join(".autonomy")).unwrap();
        let deep = project.join("src/handlers");
        std::fs::create_dir_all(&deep).unwrap();

        assert_eq!(find_upward(&deep, ".autonomy").as_deref(), Some(project.as_path()));
        assert_eq!(find_upward(&deep, ".git").as_deref(), Some(dir.path()));
    }

    #[test]
    fn missing_marker_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(find_upward(dir.path(), ".autonomy-marker-that-does-not-exist").is_none());
    }
}
