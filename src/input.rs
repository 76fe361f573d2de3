// SPDX-License-Identifier: MPL-2.0
//! Opening dump files and reading the language out of their names.

use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use bzip2::read::MultiBzDecoder;
use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum InputError {
    #[error("failed to open {path}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to set up the decompressor for {path}")]
    Decoder {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("file name {0:?} does not look like <lang>wiki-<YYYYMMDD>...")]
    FileName(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Plain,
    Bzip2,
    Zstd,
}

impl Compression {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("bz2") => Compression::Bzip2,
            Some("zst") => Compression::Zstd,
            _ => Compression::Plain,
        }
    }
}

/// Opens a dump for streaming, decompressing on the fly according to the file extension.
pub fn open_dump(path: &Path) -> Result<Box<dyn BufRead>, InputError> {
    let file = File::open(path).map_err(|source| InputError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    Ok(match Compression::from_path(path) {
        Compression::Plain => Box::new(reader),
        // multistream dumps are several bzip2 streams concatenated
        Compression::Bzip2 => Box::new(BufReader::new(MultiBzDecoder::new(reader))),
        Compression::Zstd => {
            let decoder = zstd::stream::Decoder::with_buffer(reader).map_err(|source| {
                InputError::Decoder {
                    path: path.to_path_buf(),
                    source,
                }
            })?;
            Box::new(BufReader::new(decoder))
        }
    })
}

/// The parts of a dump file name such as `itwiki-20100218-pages-meta-current.xml.bz2`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DumpFileName {
    pub lang: String,
    pub date: String,
    pub suffix: String,
}

impl DumpFileName {
    pub fn parse(file_name: &str) -> Result<Self, InputError> {
        static REGEX_DUMP_NAME: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"(.*?)wiki[\-]*-(\d{8})([^.]*)").unwrap());

        let captures = REGEX_DUMP_NAME
            .captures(file_name)
            .ok_or_else(|| InputError::FileName(file_name.to_string()))?;

        Ok(Self {
            lang: captures[1].to_string(),
            date: captures[2].to_string(),
            suffix: captures[3].to_string(),
        })
    }

    /// Parses the final component of `path`.
    pub fn from_path(path: &Path) -> Result<Self, InputError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        Self::parse(&file_name)
    }
}
