use tracing::{debug, warn};

use crate::catalog::LibraryStore;
use crate::domain::{is_eligible_media_kind, PageCursor, Photo};
use crate::error::Result;
use crate::pipeline::RunContext;

/// Photos pulled from the library per page.
pub const PAGE_SIZE: usize = 100;

/// Pulls bounded pages of unclassified photos, oldest first.
#[derive(Debug, Clone)]
pub struct CandidateSelector {
    page_size: usize,
}

impl Default for CandidateSelector {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
        }
    }
}

impl CandidateSelector {
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Next page of candidates after `after`, the last photo already dispatched
    /// in this pass. An empty page means the library is exhausted.
    pub fn fetch_page<S: LibraryStore + ?Sized>(
        &self,
        store: &mut S,
        ctx: &RunContext,
        after: Option<&PageCursor>,
    ) -> Result<Vec<Photo>> {
        let mut page = store.fetch_candidates(ctx.tag_id, self.page_size, after)?;
        page.retain(|photo| {
            let eligible = is_eligible_media_kind(&photo.media_kind);
            if !eligible {
                warn!(photo = %photo.id, kind = %photo.media_kind, "store returned ineligible media kind");
            }
            eligible
        });
        debug!(count = page.len(), after = ?after.map(|c| &c.id), "fetched candidate page");
        Ok(page)
    }
}
