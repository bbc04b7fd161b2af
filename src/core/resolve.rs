// Request path resolution against the data root.
// A resolved path is canonical and always lies under the canonical data root.
use std::io;
use std::path::{Component, Path, PathBuf};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RequestPathError {
    /// Parent references, absolute overrides, or symlinks leaving the root.
    Traversal,
    /// Nothing servable at the resolved location.
    NotFound,
}

/// Resolve a decoded URL path (leading `/` optional) to a regular file under `root`.
///
/// `root` must already be canonical.
pub fn resolve_request_path(root: &Path, request: &str) -> Result<PathBuf, RequestPathError> {
    let relative = relative_path(request)?;
    if relative.as_os_str().is_empty() {
        return Err(RequestPathError::NotFound);
    }

    let joined = root.join(&relative);
    let canonical = joined.canonicalize().map_err(io_to_request_error)?;
    if !canonical.starts_with(root) {
        return Err(RequestPathError::Traversal);
    }

    let meta = canonical.metadata().map_err(io_to_request_error)?;
    if !meta.is_file() {
        return Err(RequestPathError::NotFound);
    }
    Ok(canonical)
}

/// Build a relative path from URL segments, refusing anything that could climb
/// out of the root before the filesystem is consulted.
pub fn relative_path(request: &str) -> Result<PathBuf, RequestPathError> {
    let mut out = PathBuf::new();
    for segment in request.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(RequestPathError::Traversal),
            _ => {}
        }
        if segment.contains('\0') {
            return Err(RequestPathError::Traversal);
        }
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => out.push(name),
            _ => return Err(RequestPathError::Traversal),
        }
    }
    Ok(out)
}

fn io_to_request_error(err: io::Error) -> RequestPathError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => RequestPathError::Traversal,
        _ => RequestPathError::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::{RequestPathError, relative_path, resolve_request_path};
    use std::path::{Path, PathBuf};

    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path().join("root");
        std::fs::create_dir_all(root.join("a")).expect("dirs");
        std::fs::write(root.join("a/b.txt"), b"bee").expect("file");
        std::fs::write(temp.path().join("secret.txt"), b"secret").expect("secret");
        let root = root.canonicalize().expect("canonical root");
        (temp, root)
    }

    #[test]
    fn relative_path_skips_empty_and_current_segments() {
        assert_eq!(
            relative_path("/a//./b.txt").expect("relative"),
            Path::new("a").join("b.txt")
        );
        assert_eq!(relative_path("/").expect("relative"), PathBuf::new());
    }

    #[test]
    fn relative_path_rejects_parent_segments() {
        assert_eq!(relative_path("/../secret"), Err(RequestPathError::Traversal));
        assert_eq!(relative_path("a/../../x"), Err(RequestPathError::Traversal));
        assert_eq!(relative_path("a/\0b"), Err(RequestPathError::Traversal));
    }

    #[test]
    fn resolves_nested_file() {
        let (_temp, root) = fixture();
        let path = resolve_request_path(&root, "/a/b.txt").expect("resolved");
        assert_eq!(std::fs::read(path).expect("read"), b"bee");
    }

    #[test]
    fn missing_and_directories_are_not_found() {
        let (_temp, root) = fixture();
        assert_eq!(
            resolve_request_path(&root, "/a/missing.txt"),
            Err(RequestPathError::NotFound)
        );
        assert_eq!(resolve_request_path(&root, "/a"), Err(RequestPathError::NotFound));
        assert_eq!(resolve_request_path(&root, "/"), Err(RequestPathError::NotFound));
    }

    #[test]
    fn traversal_never_reaches_outside_file() {
        let (_temp, root) = fixture();
        assert_eq!(
            resolve_request_path(&root, "/../secret.txt"),
            Err(RequestPathError::Traversal)
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_escape_is_rejected() {
        let (temp, root) = fixture();
        std::os::unix::fs::symlink(temp.path().join("secret.txt"), root.join("link.txt"))
            .expect("symlink");
        assert_eq!(
            resolve_request_path(&root, "/link.txt"),
            Err(RequestPathError::Traversal)
        );
    }

    #[cfg(unix)]
    #[test]
    fn symlink_inside_root_is_served() {
        let (_temp, root) = fixture();
        std::os::unix::fs::symlink(root.join("a/b.txt"), root.join("alias.txt")).expect("symlink");
        let path = resolve_request_path(&root, "/alias.txt").expect("resolved");
        assert_eq!(path, root.join("a/b.txt"));
    }
}
