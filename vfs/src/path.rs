//! POSIX-style path utilities shared by the VFS and the `path` built-in
//! module. Canonical form: leading `/`, no `.`/`..` segments, no duplicate
//! slashes, no trailing slash except root.

pub const SEP: char = '/';
pub const DELIMITER: char = ':';

/// Split a path into its non-empty segments.
fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Normalize a path standalone, matching Node's `path.normalize`: resolves
/// `.`/`..` and collapses duplicate slashes, but preserves relativeness — a
/// relative input normalizes to a relative output (e.g.
/// `normalize("foo/../bar") == "bar"`, not `"/bar"`). A leading `..` with
/// nothing left to pop is kept (`normalize("../foo") == "../foo"`); above an
/// absolute root it is discarded instead (`normalize("/../foo") == "/foo"`).
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut stack: Vec<String> = Vec::new();
    for seg in segments(path) {
        match seg {
            "." => {}
            ".." => {
                if stack.last().map(|s| s != "..").unwrap_or(false) {
                    stack.pop();
                } else if !absolute {
                    stack.push("..".to_string());
                }
            }
            other => stack.push(other.to_string()),
        }
    }

    if absolute {
        if stack.is_empty() {
            "/".to_string()
        } else {
            format!("/{}", stack.join("/"))
        }
    } else if stack.is_empty() {
        ".".to_string()
    } else {
        stack.join("/")
    }
}

/// Normalize `path` anchored to a base directory `cwd` (used by
/// [`resolve`] and module-specifier resolution). Unlike [`normalize`], the
/// result always inherits `cwd`'s absoluteness: a relative `path` resolved
/// against an absolute `cwd` yields an absolute path.
pub fn normalize_from(path: &str, cwd: &str) -> String {
    if path.starts_with('/') {
        return normalize(path);
    }
    let combined = if cwd.is_empty() { path.to_string() } else { format!("{cwd}/{path}") };
    normalize(&combined)
}

/// Join segments and normalize the result, matching Node's `path.join`.
pub fn join(parts: &[&str]) -> String {
    if parts.is_empty() {
        return ".".to_string();
    }
    let joined = parts.join("/");
    normalize(&joined)
}

/// Resolve `path` against `base_dir`, always returning an absolute path.
pub fn resolve(base_dir: &str, path: &str) -> String {
    normalize_from(path, base_dir)
}

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/')
}

pub fn dirname(path: &str) -> String {
    let norm = normalize(path);
    match norm.rfind('/') {
        Some(0) => "/".to_string(),
        Some(idx) => norm[..idx].to_string(),
        None => ".".to_string(),
    }
}

pub fn basename(path: &str, strip_ext: Option<&str>) -> String {
    let norm = normalize(path);
    let name = norm.rsplit('/').next().unwrap_or(&norm).to_string();
    if let Some(ext) = strip_ext {
        if !ext.is_empty() && name.ends_with(ext) && name != ext {
            return name[..name.len() - ext.len()].to_string();
        }
    }
    name
}

pub fn extname(path: &str) -> String {
    let name = basename(path, None);
    // A leading dot does not count as an extension marker (e.g. ".gitignore").
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    let trimmed = &name[leading_dots..];
    match trimmed.rfind('.') {
        Some(idx) => trimmed[idx..].to_string(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedPath {
    pub root: String,
    pub dir: String,
    pub base: String,
    pub ext: String,
    pub name: String,
}

pub fn parse(path: &str) -> ParsedPath {
    let dir = dirname(path);
    let base = basename(path, None);
    let ext = extname(path);
    let name = if ext.is_empty() {
        base.clone()
    } else {
        base[..base.len() - ext.len()].to_string()
    };
    ParsedPath {
        root: if is_absolute(path) { "/".to_string() } else { String::new() },
        dir,
        base,
        ext,
        name,
    }
}

pub fn format(parsed: &ParsedPath) -> String {
    if !parsed.dir.is_empty() {
        let base = if !parsed.base.is_empty() {
            parsed.base.clone()
        } else {
            format!("{}{}", parsed.name, parsed.ext)
        };
        join(&[&parsed.dir, &base])
    } else if !parsed.base.is_empty() {
        parsed.base.clone()
    } else {
        format!("{}{}", parsed.name, parsed.ext)
    }
}

/// Relative path from `from` to `to`, both absolute and normalized.
pub fn relative(from: &str, to: &str) -> String {
    let from_segs = segments(&normalize(from));
    let to_segs = segments(&normalize(to));

    let common = from_segs
        .iter()
        .zip(to_segs.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from_segs.len() {
        parts.push("..".to_string());
    }
    for seg in &to_segs[common..] {
        parts.push(seg.to_string());
    }

    if parts.is_empty() {
        String::new()
    } else {
        parts.join("/")
    }
}

/// Validate that a child name is legal within a directory: non-empty, not
/// `.`/`..`, and contains no path separator.
pub fn is_valid_child_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_idempotent() {
        for p in ["/foo/bar/../baz", "/a//b/./c/", "/", "/a/b/c"] {
            let once = normalize(p);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {p}");
        }
    }

    #[test]
    fn join_matches_normalize_of_concat() {
        assert_eq!(join(&["foo", "..", "bar"]), "bar");
        assert_eq!(join(&["/a", "b"]), normalize("/a/b"));
    }

    #[test]
    fn normalize_preserves_relativeness() {
        assert_eq!(normalize("foo/../bar"), "bar");
        assert_eq!(normalize("../foo"), "../foo");
        assert_eq!(normalize("foo/../../bar"), "../bar");
        assert_eq!(normalize("/../foo"), "/foo");
        assert_eq!(normalize("."), ".");
    }

    #[test]
    fn dirname_basename_extname() {
        assert_eq!(dirname("/foo/bar/baz.txt"), "/foo/bar");
        assert_eq!(basename("/foo/bar/baz.txt", Some(".txt")), "baz");
        assert_eq!(extname("foo.bar.txt"), ".txt");
        assert_eq!(extname(".gitignore"), "");
    }

    #[test]
    fn relative_paths() {
        assert_eq!(
            relative("/data/orandea/test/aaa", "/data/orandea/impl/bbb"),
            "../../impl/bbb"
        );
    }

    #[test]
    fn format_roundtrips_parse() {
        for p in ["/foo/bar/baz.txt", "/a/b/c", "/index.js"] {
            let parsed = parse(p);
            assert_eq!(format(&parsed), p);
        }
    }
}
