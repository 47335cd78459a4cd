use std::path::PathBuf;

/// Something that declares data files it needs, such as a test.
pub trait Entity {
    /// Package identifier, e.g. `example.com/bundles/cros/camera`.
    fn package(&self) -> &str;

    /// Declared data file names, relative to the package's data directory.
    fn data(&self) -> &[String];

    /// Directory holding the package's data files, relative to the data root.
    fn data_dir(&self) -> PathBuf { relative_data_dir(self.package()) }
}

/// `<package path>/data`.
pub fn relative_data_dir(package: &str) -> PathBuf {
    package
        .split('/')
        .filter(|part| !part.is_empty())
        .chain(std::iter::once("data"))
        .collect()
}

/// Plain [`Entity`] value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataEntity {
    pub package: String,
    pub data:    Vec<String>,
}

impl DataEntity {
    pub fn new<I, S>(package: impl Into<String>, data: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            package: package.into(),
            data:    data.into_iter().map(Into::into).collect(),
        }
    }
}

impl Entity for DataEntity {
    fn package(&self) -> &str { &self.package }

    fn data(&self) -> &[String] { &self.data }
}

impl std::str::FromStr for DataEntity {
    type Err = String;

    /// Parses `package:file[,file...]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (package, files) = s
            .split_once(':')
            .ok_or_else(|| format!("expected <package>:<file>[,<file>...], got {s:?}"))?;
        if package.is_empty() {
            return Err(format!("empty package in {s:?}"));
        }
        let data: Vec<&str> = files.split(',').filter(|f| !f.is_empty()).collect();
        if data.is_empty() {
            return Err(format!("no data files in {s:?}"));
        }
        Ok(Self::new(package, data))
    }
}
