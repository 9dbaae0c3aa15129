use crate::catalog::LibraryStore;
use crate::domain::PhotoId;
use crate::error::{Error, Result};
use crate::pipeline::RunContext;

/// Result of applying the Black & White tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagStatus {
    Applied,
    AlreadyPresent,
    Failed(String),
}

/// Write the classification flag. Past this point the photo is done for the pass,
/// whatever happens to the tag.
pub fn record_classification<S: LibraryStore + ?Sized>(
    store: &mut S,
    photo_id: &PhotoId,
    is_grayscale: bool,
) -> Result<()> {
    store
        .record_classification(photo_id, is_grayscale)
        .map_err(|e| Error::persistence(photo_id, e))
}

/// Associate the Black & White tag. Re-applying an existing association is a no-op.
pub fn apply_tag<S: LibraryStore + ?Sized>(
    store: &mut S,
    ctx: &RunContext,
    photo_id: &PhotoId,
) -> Result<TagStatus> {
    match store.apply_tag(photo_id, ctx.tag_id) {
        Ok(true) => Ok(TagStatus::Applied),
        Ok(false) => Ok(TagStatus::AlreadyPresent),
        Err(e) => Err(Error::persistence(photo_id, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{insert_photo, prepared_catalog};
    use crate::domain::Classification;

    #[test]
    fn test_record_then_tag() {
        let (mut catalog, tag) = prepared_catalog();
        insert_photo(&catalog, "a", "image/jpeg", "2024-01-01", Some("l"), None);
        let ctx = RunContext::new(tag.id, 0.1);
        let id = PhotoId::from("a");

        record_classification(&mut catalog, &id, true).unwrap();
        assert_eq!(apply_tag(&mut catalog, &ctx, &id).unwrap(), TagStatus::Applied);
        assert_eq!(
            apply_tag(&mut catalog, &ctx, &id).unwrap(),
            TagStatus::AlreadyPresent
        );
        assert_eq!(catalog.classification(&id).unwrap(), Classification::Grayscale);
        assert_eq!(catalog.tag_count(&id, tag.id).unwrap(), 1);
    }

    #[test]
    fn test_record_failure_is_persistence_error() {
        let (mut catalog, _tag) = prepared_catalog();
        let err = record_classification(&mut catalog, &PhotoId::from("ghost"), false).unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(err, Error::PersistenceFailed { ref photo_id, .. } if photo_id.as_str() == "ghost"));
    }
}
