//! VFS node representation: files and directories with POSIX-style metadata.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

/// Either UTF-8 text or a raw byte buffer. Encoding conversions happen at
/// read time, per spec.
#[derive(Debug, Clone)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    pub fn as_bytes(&self) -> Vec<u8> {
        match self {
            Content::Text(s) => s.as_bytes().to_vec(),
            Content::Bytes(b) => b.clone(),
        }
    }

    pub fn as_utf8_lossy(&self) -> String {
        match self {
            Content::Text(s) => s.clone(),
            Content::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Content::Text(s) => s.len(),
            Content::Bytes(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Timestamps tracked per node, matching Node's `fs.Stats` fields.
#[derive(Debug, Clone, Copy)]
pub struct Times {
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub birthtime: SystemTime,
}

impl Times {
    pub fn now() -> Self {
        let now = SystemTime::now();
        Self {
            atime: now,
            mtime: now,
            ctime: now,
            birthtime: now,
        }
    }

    pub fn touch_atime(&mut self) {
        self.atime = SystemTime::now();
    }

    pub fn touch_mtime(&mut self) {
        let now = SystemTime::now();
        self.mtime = now;
        self.ctime = now;
    }
}

/// A node in the VFS tree: a leaf file or an interior directory.
#[derive(Debug, Clone)]
pub enum Node {
    File {
        content: Content,
        mode: u32,
        times: Times,
    },
    Directory {
        /// Insertion-ordered so `readdir` returns a stable order across
        /// non-mutating operations.
        children: IndexMap<String, Node>,
        mode: u32,
        times: Times,
    },
}

impl Node {
    pub fn new_file(content: Content) -> Self {
        Node::File {
            content,
            mode: 0o644,
            times: Times::now(),
        }
    }

    pub fn new_directory() -> Self {
        Node::Directory {
            children: IndexMap::new(),
            mode: 0o755,
            times: Times::now(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Node::File { .. })
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Node::Directory { .. })
    }

    pub fn times(&self) -> Times {
        match self {
            Node::File { times, .. } => *times,
            Node::Directory { times, .. } => *times,
        }
    }

    pub fn times_mut(&mut self) -> &mut Times {
        match self {
            Node::File { times, .. } => times,
            Node::Directory { times, .. } => times,
        }
    }

    pub fn mode(&self) -> u32 {
        match self {
            Node::File { mode, .. } => *mode,
            Node::Directory { mode, .. } => *mode,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Node::File { content, .. } => content.len() as u64,
            Node::Directory { .. } => 0,
        }
    }
}

/// Read-only view of a node's metadata, returned by `stat`.
#[derive(Debug, Clone)]
pub struct Stats {
    pub is_file: bool,
    pub is_directory: bool,
    pub size: u64,
    pub mode: u32,
    pub atime: SystemTime,
    pub mtime: SystemTime,
    pub ctime: SystemTime,
    pub birthtime: SystemTime,
}

impl Stats {
    pub fn from_node(node: &Node) -> Self {
        let times = node.times();
        Self {
            is_file: node.is_file(),
            is_directory: node.is_directory(),
            size: node.size(),
            mode: node.mode(),
            atime: times.atime,
            mtime: times.mtime,
            ctime: times.ctime,
            birthtime: times.birthtime,
        }
    }

    pub fn mtime_ms(&self) -> f64 {
        self.mtime
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64() * 1000.0)
            .unwrap_or(0.0)
    }
}
