use thiserror::Error;

/// Every way the carving/reassembly pipeline can fail. Non-fatal anomalies
/// (a broken chain bridged by a dummy block, a clipped chain tail) are
/// never represented here — they are traced at `--debug` and otherwise
/// invisible, per the recovery philosophy in the design notes.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Not found VSS volume header.")]
    NotVss,

    #[error("catalog walk is malformed: {0}")]
    MalformedCatalog(&'static str),

    #[error("too few arguments.")]
    InvalidArgument,
}

pub type Result<T> = std::result::Result<T, Error>;
