//! Repository path resolution against the directory cursor
//!
//! Paths are plain `/`-separated strings relative to the repository root;
//! the root itself is the empty string.

use super::ToolError;

/// Resolve `path` against `cursor`
///
/// A leading `/` starts from the root. `.` and empty segments are dropped and
/// `..` pops one level; popping past the root is rejected.
pub fn resolve_path(cursor: &str, path: &str) -> Result<String, ToolError> {
    let path = path.trim();
    let mut parts: Vec<&str> = if path.starts_with('/') {
        Vec::new()
    } else {
        cursor.split('/').filter(|s| !s.is_empty()).collect()
    };

    for segment in path.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(ToolError::PathEscapesRoot {
                        path: path.to_string(),
                    });
                }
            }
            name => parts.push(name),
        }
    }

    Ok(parts.join("/"))
}

/// Resolve a path that must name a file rather than the root
pub fn resolve_file_path(cursor: &str, path: &str) -> Result<String, ToolError> {
    let resolved = resolve_path(cursor, path)?;
    if resolved.is_empty() {
        return Err(ToolError::NotAFile {
            path: path.to_string(),
        });
    }
    Ok(resolved)
}

/// Root-absolute form shown to the model
pub fn display_path(resolved: &str) -> String {
    format!("/{}", resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_to_cursor() {
        assert_eq!(resolve_path("src", "main.rs").unwrap(), "src/main.rs");
        assert_eq!(resolve_path("", "README.md").unwrap(), "README.md");
        assert_eq!(resolve_path("src/util", "").unwrap(), "src/util");
    }

    #[test]
    fn test_root_absolute() {
        assert_eq!(resolve_path("src/util", "/README.md").unwrap(), "README.md");
        assert_eq!(resolve_path("src", "/").unwrap(), "");
    }

    #[test]
    fn test_dot_segments() {
        assert_eq!(resolve_path("src/util", "../lib.rs").unwrap(), "src/lib.rs");
        assert_eq!(resolve_path("src", "./a//b/./c").unwrap(), "src/a/b/c");
        assert_eq!(resolve_path("src", "..").unwrap(), "");
    }

    #[test]
    fn test_escape_rejected() {
        assert!(matches!(
            resolve_path("", "../../etc/passwd"),
            Err(ToolError::PathEscapesRoot { .. })
        ));
        assert!(matches!(
            resolve_path("src", "../../etc"),
            Err(ToolError::PathEscapesRoot { .. })
        ));
        assert!(matches!(
            resolve_path("src", "/../x"),
            Err(ToolError::PathEscapesRoot { .. })
        ));
    }

    #[test]
    fn test_escape_then_return_still_rejected() {
        assert!(resolve_path("", "../src/main.rs").is_err());
    }

    #[test]
    fn test_file_path_must_not_be_root() {
        assert!(matches!(
            resolve_file_path("src", ".."),
            Err(ToolError::NotAFile { .. })
        ));
        assert_eq!(resolve_file_path("src", "lib.rs").unwrap(), "src/lib.rs");
    }

    #[test]
    fn test_display_path() {
        assert_eq!(display_path(""), "/");
        assert_eq!(display_path("src/main.rs"), "/src/main.rs");
    }
}
