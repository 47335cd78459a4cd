//! The `.external` link sidecar and its resolution to a download URL.
//!
//! A sidecar sits next to the file it describes (`foo.bin.external` for
//! `foo.bin`) and is JSON:
//!
//! ```json
//! {"url": "gs://bucket/foo.bin", "size": 1024, "sha256sum": "9f86d0...", "executable": false}
//! {"type": "artifact", "name": "foo.bin"}
//! ```
//!
//! Unknown fields are rejected, so a corrupted sidecar fails loudly instead
//! of being treated as an absent artifact.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::LinkError;

/// Suffix of link sidecar files.
pub const LINK_SUFFIX: &str = ".external";

/// Suffix of the error sidecar written when an artifact cannot be prepared.
pub const ERROR_SUFFIX: &str = ".external-error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LinkKind {
    /// Fixed object at `url`, checked by size and SHA-256.
    #[default]
    #[serde(rename = "")]
    Static,

    /// Named file among the current build's artifacts.
    #[serde(rename = "artifact")]
    Artifact,
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Static => write!(f, "static"),
            LinkKind::Artifact => write!(f, "build artifact"),
        }
    }
}

/// Contents of a link sidecar, as written on disk.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkData {
    #[serde(rename = "type", default)]
    pub kind: LinkKind,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    #[serde(rename = "sha256sum", default, skip_serializing_if = "String::is_empty")]
    pub sha256: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub executable: bool,
}

impl LinkData {
    pub fn parse(raw: &[u8]) -> Result<Self, LinkError> { Ok(serde_json::from_slice(raw)?) }

    /// A static link to `url`.
    pub fn fixed(url: impl Into<String>, size: u64, sha256: impl Into<String>) -> Self {
        Self {
            kind: LinkKind::Static,
            url: url.into(),
            size: Some(size),
            sha256: sha256.into(),
            ..Self::default()
        }
    }

    /// A link to build artifact `name`.
    pub fn artifact(name: impl Into<String>) -> Self {
        Self {
            kind: LinkKind::Artifact,
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn executable(mut self, executable: bool) -> Self {
        self.executable = executable;
        self
    }

    pub fn to_json(&self) -> Result<Vec<u8>, LinkError> { Ok(serde_json::to_vec_pretty(self)?) }

    /// Checks field combinations and computes the download URL.
    ///
    /// `artifacts_url` is only consulted for [`LinkKind::Artifact`] links and
    /// is concatenated with the artifact name as is, so it normally ends in `/`.
    pub fn resolve(self, artifacts_url: &str) -> Result<ResolvedLink, LinkError> {
        let kind = self.kind;
        let invalid = |reason: &str| LinkError::Invalid {
            kind,
            reason: reason.to_string(),
        };

        let computed_url = match kind {
            LinkKind::Static => {
                if self.url.is_empty() {
                    return Err(invalid("url is required"));
                }
                if self.size.is_none() {
                    return Err(invalid("size is required"));
                }
                if self.sha256.is_empty() {
                    return Err(invalid("sha256sum is required"));
                }
                if self.sha256.len() != 64 || !self.sha256.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid("sha256sum must be 64 hex digits"));
                }
                if !self.name.is_empty() {
                    return Err(invalid("name must not be set"));
                }
                self.url.clone()
            }
            LinkKind::Artifact => {
                if self.name.is_empty() {
                    return Err(invalid("name is required"));
                }
                if !self.url.is_empty() || !self.sha256.is_empty() || self.size.is_some() {
                    return Err(invalid("url, size and sha256sum must not be set"));
                }
                if artifacts_url.is_empty() {
                    return Err(LinkError::NoArtifactsUrl {
                        name: self.name.clone(),
                    });
                }
                format!("{artifacts_url}{}", self.name)
            }
        };

        Ok(ResolvedLink {
            data: self,
            computed_url,
        })
    }
}

/// A validated link together with the URL its data is fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    data:         LinkData,
    computed_url: String,
}

impl ResolvedLink {
    pub fn data(&self) -> &LinkData { &self.data }

    pub fn kind(&self) -> LinkKind { self.data.kind }

    pub fn computed_url(&self) -> &str { &self.computed_url }

    pub fn executable(&self) -> bool { self.data.executable }

    /// Reads, parses and resolves the sidecar at `path`.
    ///
    /// Returns `Ok(None)` if there is no sidecar: the file is ordinary data.
    pub fn load(path: &Path, artifacts_url: &str) -> Result<Option<Self>, LinkError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(LinkError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        LinkData::parse(&raw)?.resolve(artifacts_url).map(Some)
    }
}

/// `path` with `suffix` appended to its file name.
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(suffix);
    PathBuf::from(s)
}

/// Path of the link sidecar for the data file at `dest`.
pub fn link_path(dest: &Path) -> PathBuf { with_suffix(dest, LINK_SUFFIX) }

/// Path of the error sidecar for the data file at `dest`.
pub fn error_path(dest: &Path) -> PathBuf { with_suffix(dest, ERROR_SUFFIX) }
