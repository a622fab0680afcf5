// Keeps the teacher's habit of logging an error at the moment it is
// constructed, so a fatal exit always leaves a trace in the tracing
// subscriber even if the caller only prints `Display`. Unlike the teacher's
// opaque `DynBacktraceError` wrapper, callers here need to match on which
// fatal condition occurred (FieldTooLarge vs. BadRegion vs. BadToken vs. Io),
// so this is a closed `thiserror` enum instead.

use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("field or line exceeds the {buffer_size}-byte sliding buffer")]
    FieldTooLarge { buffer_size: usize },

    #[error("invalid region string {region:?}: {reason}")]
    BadRegion { region: String, reason: &'static str },

    #[error("malformed back-reference token at byte offset {offset}: {reason}")]
    BadToken { offset: usize, reason: &'static str },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn field_too_large(buffer_size: usize) -> Error {
        let err = Error::FieldTooLarge { buffer_size };
        error!(target: "popvcf", "{err}");
        err
    }

    pub fn bad_region(region: impl Into<String>, reason: &'static str) -> Error {
        let err = Error::BadRegion {
            region: region.into(),
            reason,
        };
        error!(target: "popvcf", "{err}");
        err
    }

    pub fn bad_token(offset: usize, reason: &'static str) -> Error {
        let err = Error::BadToken { offset, reason };
        error!(target: "popvcf", "{err}");
        err
    }
}
