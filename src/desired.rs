// SPDX-License-Identifier: MPL-2.0
//! The allow-list of page titles to extract.

use std::{fs::File, io::Read, path::Path};

use rustc_hash::FxHashSet;

#[derive(Debug, thiserror::Error)]
pub enum DesiredListError {
    #[error("failed to open desired page list {path}")]
    Open {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read desired page list")]
    Csv(#[from] csv::Error),
}

/// Titles of the pages whose revisions are extracted. Titles are local, without a
/// namespace prefix, and compared exactly.
#[derive(Debug, Clone, Default)]
pub struct DesiredPages {
    titles: FxHashSet<String>,
}

impl DesiredPages {
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads the first field of every row. Empty rows and rows starting with `#` are skipped.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DesiredListError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut titles = FxHashSet::default();
        for record in csv_reader.byte_records() {
            let record = record?;
            let Some(first) = record.get(0) else {
                continue;
            };
            if first.is_empty() || first.starts_with(b"#") {
                continue;
            }
            titles.insert(String::from_utf8_lossy(first).into_owned());
        }

        tracing::debug!(desired_pages = titles.len(), "Loaded desired page list");
        Ok(Self { titles })
    }

    pub fn from_path(path: &Path) -> Result<Self, DesiredListError> {
        let file = File::open(path).map_err(|source| DesiredListError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}
