//! Error types for VFS operations.
//!
//! Mirrors the errno-style taxonomy the teacher's `vsys` crate carries for
//! real-filesystem access, narrowed to the codes the in-memory tree can
//! actually raise.

use std::fmt;

/// Result type for VFS operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Stable error codes surfaced to callers, matching POSIX errno names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsErrorCode {
    NotFound,
    AlreadyExists,
    NotADirectory,
    IsADirectory,
    NotEmpty,
    Io,
}

impl VfsErrorCode {
    pub fn as_errno_str(self) -> &'static str {
        match self {
            VfsErrorCode::NotFound => "ENOENT",
            VfsErrorCode::AlreadyExists => "EEXIST",
            VfsErrorCode::NotADirectory => "ENOTDIR",
            VfsErrorCode::IsADirectory => "EISDIR",
            VfsErrorCode::NotEmpty => "ENOTEMPTY",
            VfsErrorCode::Io => "EIO",
        }
    }
}

/// An error from a VFS operation, carrying the offending path for
/// debuggability per spec.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message} (path: {path})", code = self.code.as_errno_str())]
pub struct VfsError {
    pub code: VfsErrorCode,
    pub path: String,
    pub message: String,
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            code: VfsErrorCode::NotFound,
            message: format!("no such file or directory, '{path}'"),
            path,
        }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            code: VfsErrorCode::AlreadyExists,
            message: format!("file already exists, '{path}'"),
            path,
        }
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            code: VfsErrorCode::NotADirectory,
            message: format!("not a directory, '{path}'"),
            path,
        }
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            code: VfsErrorCode::IsADirectory,
            message: format!("illegal operation on a directory, '{path}'"),
            path,
        }
    }

    pub fn not_empty(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            code: VfsErrorCode::NotEmpty,
            message: format!("directory not empty, '{path}'"),
            path,
        }
    }

    pub fn io(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self {
            code: VfsErrorCode::Io,
            path: path.into(),
            message: message.to_string(),
        }
    }
}
