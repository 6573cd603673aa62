use std::path::PathBuf;

use thiserror::Error;

/// Every failure the dump pipeline can report.
///
/// Only `FieldExtraction` is recoverable: the listing box that produced it is
/// skipped and the page continues. Everything else aborts the run.
#[derive(Error, Debug)]
pub enum DumpError {
    #[error("wrong username or password")]
    Authentication,

    #[error("listing box {index} on {page}: missing {field}")]
    FieldExtraction {
        page: String,
        index: usize,
        field: &'static str,
    },

    #[error("rating date for object {object_id}: {reason}")]
    RatingDateFetch { object_id: String, reason: String },

    #[error("stored ratings in {} are not readable", path.display())]
    CorruptStore {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to back up {} to {}", from.display(), to.display())]
    Backup {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not set up the HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {url} returned HTTP {status}")]
    Http { url: String, status: u16 },

    #[error("invalid url {url}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("i/o on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DumpError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        DumpError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = DumpError> = std::result::Result<T, E>;
