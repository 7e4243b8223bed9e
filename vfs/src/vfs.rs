//! The in-memory virtual filesystem (spec §4.1, C1).

use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::error::{VfsError, VfsResult};
use crate::node::{Content, Node, Stats, Times};
use crate::path;

/// Options for `mkdir`/`rmdir`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirOptions {
    pub recursive: bool,
}

/// The virtual filesystem tree. Single-threaded by design (spec §5); callers
/// embedding this in a multi-threaded host must add their own
/// synchronization (e.g. wrap in `Mutex<Vfs>`).
#[derive(Debug, Clone)]
pub struct Vfs {
    root: Node,
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl Vfs {
    /// A fresh VFS with the default directories `/tmp`, `/home`, `/src`.
    pub fn new() -> Self {
        let mut vfs = Self {
            root: Node::new_directory(),
        };
        vfs.seed_defaults();
        vfs
    }

    fn seed_defaults(&mut self) {
        for dir in ["/tmp", "/home", "/src"] {
            // Infallible: root always exists and these are top-level dirs.
            let _ = self.mkdir(dir, DirOptions { recursive: true });
        }
    }

    /// Reset the tree and restore the default directories.
    pub fn clear(&mut self) {
        self.root = Node::new_directory();
        self.seed_defaults();
    }

    /// Canonicalizes `path` to an absolute form, rooting a relative input at
    /// `/` rather than leaving it relative — every VFS path is absolute
    /// (spec §3 "Canonical form").
    fn normalize(path: &str) -> String {
        path::resolve("/", path)
    }

    fn split_parent(norm_path: &str) -> Option<(String, String)> {
        if norm_path == "/" {
            return None;
        }
        let dir = path::dirname(norm_path);
        let name = path::basename(norm_path, None);
        Some((dir, name))
    }

    fn get_node<'a>(&'a self, norm_path: &str) -> VfsResult<&'a Node> {
        if norm_path == "/" {
            return Ok(&self.root);
        }
        let mut current = &self.root;
        for seg in norm_path.trim_start_matches('/').split('/') {
            match current {
                Node::Directory { children, .. } => {
                    current = children
                        .get(seg)
                        .ok_or_else(|| VfsError::not_found(norm_path))?;
                }
                Node::File { .. } => return Err(VfsError::not_a_directory(norm_path)),
            }
        }
        Ok(current)
    }

    fn get_node_mut<'a>(&'a mut self, norm_path: &str) -> VfsResult<&'a mut Node> {
        if norm_path == "/" {
            return Ok(&mut self.root);
        }
        let mut current = &mut self.root;
        for seg in norm_path.trim_start_matches('/').split('/') {
            match current {
                Node::Directory { children, .. } => {
                    current = children
                        .get_mut(seg)
                        .ok_or_else(|| VfsError::not_found(norm_path))?;
                }
                Node::File { .. } => return Err(VfsError::not_a_directory(norm_path)),
            }
        }
        Ok(current)
    }

    fn children_mut(&mut self, dir_path: &str) -> VfsResult<&mut IndexMap<String, Node>> {
        match self.get_node_mut(dir_path)? {
            Node::Directory { children, .. } => Ok(children),
            Node::File { .. } => Err(VfsError::not_a_directory(dir_path)),
        }
    }

    pub fn exists(&self, path: &str) -> bool {
        let norm = Self::normalize(path);
        self.get_node(&norm).is_ok()
    }

    pub fn stat(&self, path: &str) -> VfsResult<Stats> {
        let norm = Self::normalize(path);
        self.get_node(&norm).map(Stats::from_node)
    }

    pub fn read_file(&mut self, path: &str) -> VfsResult<Content> {
        let norm = Self::normalize(path);
        let node = self.get_node_mut(&norm)?;
        match node {
            Node::File { content, times, .. } => {
                times.touch_atime();
                Ok(content.clone())
            }
            Node::Directory { .. } => Err(VfsError::is_a_directory(norm)),
        }
    }

    pub fn read_file_string(&mut self, path: &str) -> VfsResult<String> {
        self.read_file(path).map(|c| c.as_utf8_lossy())
    }

    /// Create or overwrite a file. The parent directory must already exist.
    pub fn write_file(&mut self, path: &str, content: Content) -> VfsResult<()> {
        let norm = Self::normalize(path);
        let (parent, name) = Self::split_parent(&norm).ok_or_else(|| VfsError::is_a_directory(&norm))?;
        if !path::is_valid_child_name(&name) {
            return Err(VfsError::io(&norm, "invalid file name"));
        }

        let children = self.children_mut(&parent)?;
        match children.get_mut(&name) {
            Some(Node::Directory { .. }) => return Err(VfsError::is_a_directory(&norm)),
            Some(Node::File { content: existing, times, .. }) => {
                *existing = content;
                times.touch_mtime();
            }
            None => {
                children.insert(name, Node::new_file(content));
            }
        }
        self.touch_mtime(&parent);
        Ok(())
    }

    fn touch_mtime(&mut self, dir_path: &str) {
        if let Ok(node) = self.get_node_mut(dir_path) {
            node.times_mut().touch_mtime();
        }
    }

    pub fn mkdir(&mut self, path: &str, options: DirOptions) -> VfsResult<()> {
        let norm = Self::normalize(path);
        if norm == "/" {
            return Ok(());
        }
        let segs: Vec<&str> = norm.trim_start_matches('/').split('/').collect();

        if options.recursive {
            let mut current_path = String::new();
            for seg in &segs {
                current_path = if current_path.is_empty() {
                    format!("/{seg}")
                } else {
                    format!("{current_path}/{seg}")
                };
                let (parent, name) = Self::split_parent(&current_path).unwrap();
                let children = self.children_mut(&parent)?;
                match children.get(&name) {
                    Some(Node::Directory { .. }) => {}
                    Some(Node::File { .. }) => return Err(VfsError::not_a_directory(&current_path)),
                    None => {
                        children.insert(name, Node::new_directory());
                    }
                }
            }
            Ok(())
        } else {
            let (parent, name) = Self::split_parent(&norm).unwrap();
            let children = self.children_mut(&parent)?;
            if children.contains_key(&name) {
                return Err(VfsError::already_exists(&norm));
            }
            children.insert(name, Node::new_directory());
            self.touch_mtime(&parent);
            Ok(())
        }
    }

    pub fn rmdir(&mut self, path: &str, options: DirOptions) -> VfsResult<()> {
        let norm = Self::normalize(path);
        if norm == "/" {
            return Err(VfsError::io(&norm, "cannot remove the root directory"));
        }
        let (parent, name) = Self::split_parent(&norm).unwrap();

        {
            let node = self.get_node(&norm)?;
            match node {
                Node::File { .. } => return Err(VfsError::not_a_directory(&norm)),
                Node::Directory { children, .. } => {
                    if !options.recursive && !children.is_empty() {
                        return Err(VfsError::not_empty(&norm));
                    }
                }
            }
        }

        let children = self.children_mut(&parent)?;
        children.shift_remove(&name);
        self.touch_mtime(&parent);
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> VfsResult<()> {
        let norm = Self::normalize(path);
        let (parent, name) = Self::split_parent(&norm).ok_or_else(|| VfsError::is_a_directory(&norm))?;

        {
            let node = self.get_node(&norm)?;
            if node.is_directory() {
                return Err(VfsError::is_a_directory(&norm));
            }
        }

        let children = self.children_mut(&parent)?;
        children.shift_remove(&name);
        self.touch_mtime(&parent);
        Ok(())
    }

    pub fn readdir(&self, path: &str) -> VfsResult<Vec<String>> {
        let norm = Self::normalize(path);
        match self.get_node(&norm)? {
            Node::Directory { children, .. } => Ok(children.keys().cloned().collect()),
            Node::File { .. } => Err(VfsError::not_a_directory(&norm)),
        }
    }

    /// Atomic rename: either both parents are mutated or neither.
    pub fn rename(&mut self, old: &str, new: &str) -> VfsResult<()> {
        let old_norm = Self::normalize(old);
        let new_norm = Self::normalize(new);

        let node = self.get_node(&old_norm)?.clone();

        if let Ok(existing) = self.get_node(&new_norm) {
            match (existing, &node) {
                (Node::Directory { children, .. }, Node::Directory { .. }) => {
                    if !children.is_empty() {
                        return Err(VfsError::not_empty(&new_norm));
                    }
                }
                (Node::Directory { .. }, Node::File { .. }) => {
                    return Err(VfsError::is_a_directory(&new_norm))
                }
                (Node::File { .. }, Node::Directory { .. }) => {
                    return Err(VfsError::not_a_directory(&new_norm))
                }
                _ => {}
            }
        }

        let (old_parent, old_name) =
            Self::split_parent(&old_norm).ok_or_else(|| VfsError::io(&old_norm, "cannot rename root"))?;
        let (new_parent, new_name) =
            Self::split_parent(&new_norm).ok_or_else(|| VfsError::io(&new_norm, "cannot rename root"))?;

        // Validate destination parent exists before mutating anything, so the
        // rename is atomic (both sides updated, or neither).
        self.get_node(&new_parent)?;

        {
            let children = self.children_mut(&old_parent)?;
            children.shift_remove(&old_name);
        }
        {
            let children = self.children_mut(&new_parent)?;
            children.insert(new_name, node);
        }
        self.touch_mtime(&old_parent);
        self.touch_mtime(&new_parent);
        Ok(())
    }

    pub fn copy_file(&mut self, src: &str, dest: &str) -> VfsResult<()> {
        let content = {
            let node = self.get_node(&Self::normalize(src))?;
            match node {
                Node::File { content, .. } => content.clone(),
                Node::Directory { .. } => return Err(VfsError::is_a_directory(src)),
            }
        };
        self.write_file(dest, content)
    }

    /// Serialize the whole tree as `{absolute_path: utf8_content}`.
    pub fn to_json(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        collect_files(&self.root, "", &mut out);
        out
    }

    /// Replace the tree with the contents of a JSON snapshot, creating
    /// intermediate directories as needed.
    pub fn from_json(map: &BTreeMap<String, String>) -> Self {
        let mut vfs = Self {
            root: Node::new_directory(),
        };
        for (path, content) in map {
            let norm = Self::normalize(path);
            if let Some((parent, _)) = Self::split_parent(&norm) {
                let _ = vfs.mkdir(&parent, DirOptions { recursive: true });
            }
            let _ = vfs.write_file(&norm, Content::Text(content.clone()));
        }
        vfs.seed_defaults();
        vfs
    }

    /// Touch `atime`/`mtime` directly; used by async wrapper layers that
    /// need to report access without re-reading content.
    pub fn touch(&mut self, path: &str) -> VfsResult<()> {
        let norm = Self::normalize(path);
        let times = self.get_node_mut(&norm)?.times_mut();
        times.touch_atime();
        Ok(())
    }

    pub fn root_times(&self) -> Times {
        self.root.times()
    }
}

fn collect_files(node: &Node, prefix: &str, out: &mut BTreeMap<String, String>) {
    if let Node::Directory { children, .. } = node {
        for (name, child) in children {
            let path = format!("{prefix}/{name}");
            match child {
                Node::File { content, .. } => {
                    out.insert(path, content.as_utf8_lossy());
                }
                Node::Directory { .. } => collect_files(child, &path, out),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s1_round_trip_scenario() {
        let mut vfs = Vfs::new();
        vfs.write_file("/a/b.txt", Content::Text("hi".into())).unwrap_err();
        // Parent must exist first; create it explicitly per spec semantics.
        vfs.mkdir("/a", DirOptions { recursive: true }).unwrap();
        vfs.write_file("/a/b.txt", Content::Text("hi".into())).unwrap();
        vfs.write_file("/a/c.txt", Content::Text("ho".into())).unwrap();
        vfs.mkdir("/d", DirOptions { recursive: true }).unwrap();

        assert_eq!(vfs.readdir("/a").unwrap(), vec!["b.txt", "c.txt"]);
        assert_eq!(vfs.read_file_string("/a/b.txt").unwrap(), "hi");
        assert!(vfs.exists("/d"));
        assert!(vfs.stat("/a/b.txt").unwrap().is_file);

        let json = vfs.to_json();
        assert_eq!(json.get("/a/b.txt").unwrap(), "hi");
        assert_eq!(json.get("/a/c.txt").unwrap(), "ho");

        let err = vfs.rmdir("/a", DirOptions { recursive: false }).unwrap_err();
        assert_eq!(err.code, crate::error::VfsErrorCode::NotEmpty);
    }

    #[test]
    fn round_trip_property() {
        let mut map = BTreeMap::new();
        map.insert("/a/b.txt".to_string(), "hi".to_string());
        map.insert("/a/c/d.txt".to_string(), "nested".to_string());

        let vfs = Vfs::from_json(&map);
        let round = vfs.to_json();
        for (k, v) in &map {
            assert_eq!(round.get(k), Some(v));
        }
    }

    #[test]
    fn rename_is_atomic_on_missing_destination_parent() {
        let mut vfs = Vfs::new();
        vfs.write_file("/a.txt", Content::Text("x".into())).unwrap();
        let err = vfs.rename("/a.txt", "/missing/b.txt").unwrap_err();
        assert_eq!(err.code, crate::error::VfsErrorCode::NotFound);
        // Original file must still be present since nothing was mutated.
        assert!(vfs.exists("/a.txt"));
    }

    #[test]
    fn unlink_rejects_directories() {
        let mut vfs = Vfs::new();
        let err = vfs.unlink("/tmp").unwrap_err();
        assert_eq!(err.code, crate::error::VfsErrorCode::IsADirectory);
    }
}
