use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::acquire::{Acquirer, ImageSource};
use crate::catalog::LibraryStore;
use crate::classify::{self, Classifier};
use crate::domain::{PageCursor, Photo, PhotoId, TagId};
use crate::error::{Error, Result};
use crate::persist::{self, TagStatus};
use crate::selector::CandidateSelector;

/// Pause between pages to throttle load on the image server.
pub const PAGE_PAUSE: Duration = Duration::from_millis(100);

/// Run-wide values resolved at startup and threaded through every component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunContext {
    pub tag_id: TagId,
    pub tolerance: f64,
}

impl RunContext {
    pub fn new(tag_id: TagId, tolerance: f64) -> Self {
        Self { tag_id, tolerance }
    }
}

/// Per-photo stage at which processing stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquiring,
    Classifying,
    Persisting,
    Tagging,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Acquiring => "acquiring",
            Stage::Classifying => "classifying",
            Stage::Persisting => "persisting",
            Stage::Tagging => "tagging",
        };
        write!(f, "{s}")
    }
}

/// What happened to one photo.
#[derive(Debug, Clone, PartialEq)]
pub enum PhotoOutcome {
    /// Flag written. `tag` is set only for grayscale photos.
    Classified {
        grayscale: bool,
        tag: Option<TagStatus>,
    },
    /// Stopped before the flag was written; the photo stays eligible for the next run.
    Skipped { stage: Stage, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageStats {
    pub examined: usize,
    pub grayscale: usize,
    pub color: usize,
    pub skipped: usize,
}

/// Totals for a whole pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub pages: usize,
    pub examined: usize,
    pub grayscale: usize,
    pub color: usize,
    pub tagged: usize,
    pub already_tagged: usize,
    pub tag_failures: usize,
    pub skipped: usize,
}

impl PassReport {
    fn record(&mut self, outcome: &PhotoOutcome) {
        self.examined += 1;
        match outcome {
            PhotoOutcome::Classified { grayscale, tag } => {
                if *grayscale {
                    self.grayscale += 1;
                } else {
                    self.color += 1;
                }
                match tag {
                    Some(TagStatus::Applied) => self.tagged += 1,
                    Some(TagStatus::AlreadyPresent) => self.already_tagged += 1,
                    Some(TagStatus::Failed(_)) => self.tag_failures += 1,
                    None => {}
                }
            }
            PhotoOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

impl PageStats {
    fn record(&mut self, outcome: &PhotoOutcome) {
        self.examined += 1;
        match outcome {
            PhotoOutcome::Classified { grayscale: true, .. } => self.grayscale += 1,
            PhotoOutcome::Classified { grayscale: false, .. } => self.color += 1,
            PhotoOutcome::Skipped { .. } => self.skipped += 1,
        }
    }
}

/// Progress callback payloads.
pub enum PassProgress {
    PageStart { page: usize, size: usize },
    PhotoDone { photo_id: PhotoId, outcome: PhotoOutcome },
    PageComplete { page: usize, stats: PageStats },
    Complete { report: PassReport },
}

enum DriverState {
    Paging,
    Dispatching {
        page: usize,
        queue: VecDeque<Photo>,
        stats: PageStats,
    },
    Pausing,
    Done,
}

/// One pass over the library: page, dispatch each photo, pause, repeat until
/// a page comes back empty.
pub struct BatchDriver<'a, S: ?Sized, F, C: ?Sized> {
    store: &'a mut S,
    acquirer: &'a Acquirer<F>,
    classifier: &'a C,
    ctx: RunContext,
    selector: CandidateSelector,
    pause: Duration,
    state: DriverState,
    pages: usize,
    /// Last photo dispatched. Later pages start after it, so photos that
    /// failed in this pass are not selected again.
    cursor: Option<PageCursor>,
    report: PassReport,
}

impl<'a, S, F, C> BatchDriver<'a, S, F, C>
where
    S: LibraryStore + ?Sized,
    F: ImageSource,
    C: Classifier + ?Sized,
{
    pub fn new(
        store: &'a mut S,
        acquirer: &'a Acquirer<F>,
        classifier: &'a C,
        ctx: RunContext,
    ) -> Self {
        Self {
            store,
            acquirer,
            classifier,
            ctx,
            selector: CandidateSelector::default(),
            pause: PAGE_PAUSE,
            state: DriverState::Paging,
            pages: 0,
            cursor: None,
            report: PassReport::default(),
        }
    }

    pub fn with_selector(mut self, selector: CandidateSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, DriverState::Done)
    }

    /// Drive the pass to completion. Only a failed page fetch ends it early.
    pub fn run(
        mut self,
        mut progress_cb: Option<&mut dyn FnMut(PassProgress)>,
    ) -> Result<PassReport> {
        while !self.is_done() {
            self.step(&mut progress_cb)?;
        }
        info!(
            pages = self.report.pages,
            examined = self.report.examined,
            grayscale = self.report.grayscale,
            color = self.report.color,
            skipped = self.report.skipped,
            "pass complete"
        );
        if let Some(ref mut cb) = progress_cb {
            cb(PassProgress::Complete {
                report: self.report.clone(),
            });
        }
        Ok(self.report)
    }

    /// Perform one state transition.
    pub fn step(&mut self, progress_cb: &mut Option<&mut dyn FnMut(PassProgress)>) -> Result<()> {
        let state = std::mem::replace(&mut self.state, DriverState::Done);
        self.state = match state {
            DriverState::Paging => {
                let photos = self
                    .selector
                    .fetch_page(&mut *self.store, &self.ctx, self.cursor.as_ref())?;
                if photos.is_empty() {
                    info!("no more photos to process");
                    DriverState::Done
                } else {
                    self.pages += 1;
                    self.report.pages += 1;
                    info!(page = self.pages, count = photos.len(), "processing photos");
                    if let Some(cb) = progress_cb.as_mut() {
                        cb(PassProgress::PageStart {
                            page: self.pages,
                            size: photos.len(),
                        });
                    }
                    DriverState::Dispatching {
                        page: self.pages,
                        queue: photos.into(),
                        stats: PageStats::default(),
                    }
                }
            }
            DriverState::Dispatching {
                page,
                mut queue,
                mut stats,
            } => match queue.pop_front() {
                Some(photo) => {
                    self.cursor = Some(photo.cursor());
                    let outcome = self.process(&photo);
                    stats.record(&outcome);
                    self.report.record(&outcome);
                    if let Some(cb) = progress_cb.as_mut() {
                        cb(PassProgress::PhotoDone {
                            photo_id: photo.id,
                            outcome,
                        });
                    }
                    DriverState::Dispatching { page, queue, stats }
                }
                None => {
                    info!(
                        page,
                        grayscale = stats.grayscale,
                        color = stats.color,
                        skipped = stats.skipped,
                        "page complete"
                    );
                    if let Some(cb) = progress_cb.as_mut() {
                        cb(PassProgress::PageComplete { page, stats });
                    }
                    DriverState::Pausing
                }
            },
            DriverState::Pausing => {
                if !self.pause.is_zero() {
                    std::thread::sleep(self.pause);
                }
                DriverState::Paging
            }
            DriverState::Done => DriverState::Done,
        };
        Ok(())
    }

    /// Acquiring → Classifying → Persisting → Tagging for one photo.
    /// Never fails: every error is turned into an outcome.
    fn process(&mut self, photo: &Photo) -> PhotoOutcome {
        debug!(photo = %photo.id, kind = %photo.media_kind, checksum = ?photo.checksum, "processing photo");

        let acquired = match self.acquirer.acquire(photo) {
            Ok(acquired) => acquired,
            Err(e) => return self.skip(photo, Stage::Acquiring, e),
        };
        debug!(photo = %photo.id, rendition = %acquired.rendition, decoder = acquired.decoder, "acquired image");

        let grayscale = match classify::is_grayscale(
            self.classifier,
            &photo.id,
            &acquired.image,
            self.ctx.tolerance,
        ) {
            Ok(grayscale) => grayscale,
            Err(e) => return self.skip(photo, Stage::Classifying, e),
        };

        if let Err(e) = persist::record_classification(&mut *self.store, &photo.id, grayscale) {
            return self.skip(photo, Stage::Persisting, e);
        }

        if !grayscale {
            debug!(photo = %photo.id, rendition = %acquired.rendition, "photo is not grayscale");
            return PhotoOutcome::Classified {
                grayscale: false,
                tag: None,
            };
        }

        debug!(photo = %photo.id, rendition = %acquired.rendition, "photo is grayscale, applying tag");
        let tag = match persist::apply_tag(&mut *self.store, &self.ctx, &photo.id) {
            Ok(status) => status,
            Err(e) => {
                warn!(photo = %photo.id, stage = %Stage::Tagging, error = %e, "failed to apply tag");
                TagStatus::Failed(e.to_string())
            }
        };
        PhotoOutcome::Classified {
            grayscale: true,
            tag: Some(tag),
        }
    }

    fn skip(&self, photo: &Photo, stage: Stage, error: Error) -> PhotoOutcome {
        if error.is_recoverable() {
            warn!(photo = %photo.id, %stage, error = %error, "failed to process photo");
        } else {
            // Still contained to this photo; the pass goes on.
            error!(photo = %photo.id, %stage, error = %error, "unexpected error while processing photo");
        }
        PhotoOutcome::Skipped {
            stage,
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acquire::tests::{png, FakeSource};
    use crate::catalog::tests::{insert_photo, prepared_catalog};
    use crate::classify::SaturationClassifier;
    use crate::domain::Classification;
    use image::DynamicImage;

    /// Fails on one photo's image (recognised by its first pixel), defers otherwise.
    struct FailOnRed;

    impl Classifier for FailOnRed {
        fn classify(&self, image: &DynamicImage, tolerance: f64) -> std::result::Result<bool, String> {
            if image.to_rgb8().get_pixel(0, 0).0 == [255, 0, 0] {
                return Err("classifier crashed".to_string());
            }
            SaturationClassifier.classify(image, tolerance)
        }
    }

    #[test]
    fn test_classifier_error_isolated() {
        let (mut catalog, tag) = prepared_catalog();
        insert_photo(&catalog, "a", "image/png", "2024-01-01", Some("a.png"), None);
        insert_photo(&catalog, "b", "image/png", "2024-01-02", Some("b.png"), None);
        let acquirer = Acquirer::new(
            FakeSource::default()
                .ok("a.png", png(255, 0, 0))
                .ok("b.png", png(90, 90, 90)),
        );

        let report = BatchDriver::new(&mut catalog, &acquirer, &FailOnRed, RunContext::new(tag.id, 0.1))
            .with_pause(Duration::ZERO)
            .run(None)
            .unwrap();

        assert_eq!(report.skipped, 1);
        assert_eq!(report.grayscale, 1);
        assert_eq!(catalog.classification(&PhotoId::from("a")).unwrap(), Classification::Unknown);
        assert_eq!(catalog.classification(&PhotoId::from("b")).unwrap(), Classification::Grayscale);
    }

    #[test]
    fn test_state_machine_steps() {
        let (mut catalog, tag) = prepared_catalog();
        insert_photo(&catalog, "a", "image/png", "2024-01-01", Some("a.png"), None);
        let acquirer = Acquirer::new(FakeSource::default().ok("a.png", png(0, 0, 255)));

        let mut driver = BatchDriver::new(
            &mut catalog,
            &acquirer,
            &SaturationClassifier,
            RunContext::new(tag.id, 0.1),
        )
        .with_pause(Duration::ZERO);
        let mut events = Vec::new();
        let mut cb = |p: PassProgress| {
            events.push(match p {
                PassProgress::PageStart { .. } => "page-start",
                PassProgress::PhotoDone { .. } => "photo",
                PassProgress::PageComplete { .. } => "page-complete",
                PassProgress::Complete { .. } => "complete",
            })
        };
        let mut progress: Option<&mut dyn FnMut(PassProgress)> = Some(&mut cb);

        // Paging → Dispatching → (photo) → page complete → Pausing → Paging → Done
        let mut steps = 0;
        while !driver.is_done() {
            driver.step(&mut progress).unwrap();
            steps += 1;
        }
        assert_eq!(steps, 5);
        drop(progress);
        assert_eq!(events, vec!["page-start", "photo", "page-complete"]);
    }

    #[test]
    fn test_failed_photos_not_retried_within_pass() {
        let (mut catalog, tag) = prepared_catalog();
        for i in 0..3 {
            insert_photo(&catalog, &format!("p{i}"), "image/jpeg", &format!("2024-01-0{}", i + 1), Some("missing"), None);
        }
        let acquirer = Acquirer::new(FakeSource::default());

        let report = BatchDriver::new(
            &mut catalog,
            &acquirer,
            &SaturationClassifier,
            RunContext::new(tag.id, 0.1),
        )
        .with_selector(CandidateSelector::with_page_size(2))
        .with_pause(Duration::ZERO)
        .run(None)
        .unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.examined, 3);
        assert_eq!(report.skipped, 3);
        assert_eq!(acquirer.source().requests.borrow().len(), 3);
    }
}
