use crate::domain::PhotoId;

/// Why a single image source could not produce a decoded image.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode image (tried {tried}): {message}")]
    Decode { tried: String, message: String },

    #[error("photo has no large or original rendition")]
    NoSources,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("MySQL error: {0}")]
    MySql(#[from] mysql::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot connect to photo library: {0}")]
    Connectivity(String),

    #[error("cannot prepare photo library: {0}")]
    Schema(String),

    #[error("failed to acquire image for photo {photo_id}, last error: {last}")]
    AcquisitionFailed {
        photo_id: PhotoId,
        #[source]
        last: SourceError,
    },

    #[error("failed to classify photo {photo_id}: {reason}")]
    ClassificationFailed { photo_id: PhotoId, reason: String },

    #[error("failed to persist result for photo {photo_id}: {source}")]
    PersistenceFailed {
        photo_id: PhotoId,
        #[source]
        source: Box<Error>,
    },

    #[error("photo not found in library: {0}")]
    PhotoNotFound(PhotoId),
}

impl Error {
    /// Per-photo errors are caught by the batch driver; everything else ends the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::AcquisitionFailed { .. }
                | Error::ClassificationFailed { .. }
                | Error::PersistenceFailed { .. }
        )
    }

    pub(crate) fn persistence(photo_id: &PhotoId, source: Error) -> Self {
        Error::PersistenceFailed {
            photo_id: photo_id.clone(),
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        let id = PhotoId::from("abc");
        assert!(Error::AcquisitionFailed {
            photo_id: id.clone(),
            last: SourceError::NoSources,
        }
        .is_recoverable());
        assert!(Error::ClassificationFailed {
            photo_id: id.clone(),
            reason: "empty".into(),
        }
        .is_recoverable());
        assert!(Error::persistence(&id, Error::PhotoNotFound(id.clone())).is_recoverable());

        assert!(!Error::Config("missing host".into()).is_recoverable());
        assert!(!Error::Connectivity("refused".into()).is_recoverable());
        assert!(!Error::Schema("no photos table".into()).is_recoverable());
    }

    #[test]
    fn test_acquisition_message_carries_last_error() {
        let err = Error::AcquisitionFailed {
            photo_id: PhotoId::from("p1"),
            last: SourceError::Status(500),
        };
        assert_eq!(
            err.to_string(),
            "failed to acquire image for photo p1, last error: HTTP 500"
        );
    }
}
