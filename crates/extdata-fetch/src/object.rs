use std::fmt;

use crate::error::{Error, Result};

/// A `gs://bucket/dir/file` object location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUrl {
    bucket: String,
    dir:    String,
    file:   String,
}

impl ObjectUrl {
    pub fn parse(url: &str) -> Result<Self> {
        let invalid = || Error::InvalidUrl(url.to_string());
        let rest = url.strip_prefix("gs://").ok_or_else(invalid)?;
        let (bucket, path) = rest.split_once('/').ok_or_else(invalid)?;
        let (dir, file) = path.rsplit_once('/').unwrap_or(("", path));
        if bucket.is_empty() || file.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            bucket: bucket.to_string(),
            dir:    dir.to_string(),
            file:   file.to_string(),
        })
    }

    pub fn bucket(&self) -> &str { &self.bucket }

    pub fn file(&self) -> &str { &self.file }

    /// Object path relative to the bucket.
    pub fn path(&self) -> String {
        if self.dir.is_empty() {
            self.file.clone()
        } else {
            format!("{}/{}", self.dir, self.file)
        }
    }

    /// The enclosing "archive" directory, as the stage endpoint expects it.
    pub fn archive_url(&self) -> String {
        if self.dir.is_empty() {
            format!("gs://{}", self.bucket)
        } else {
            format!("gs://{}/{}", self.bucket, self.dir)
        }
    }
}

impl fmt::Display for ObjectUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.path())
    }
}
