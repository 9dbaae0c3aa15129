pub mod acquire;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod persist;
pub mod pipeline;
pub mod selector;

use std::time::Duration;

use tracing::info;

use acquire::{Acquirer, HttpSource, ImageSource};
use catalog::{Catalog, LibraryStore, MysqlCatalog};
use classify::{Classifier, SaturationClassifier};
use config::{Config, Driver};
use domain::*;
use error::{Error, Result};
use pipeline::{BatchDriver, PassProgress, PassReport, RunContext};
use selector::CandidateSelector;

pub use pipeline::PhotoOutcome;

/// Open the library named by the configuration.
pub fn open_store(config: &Config) -> Result<Box<dyn LibraryStore>> {
    let db = &config.database;
    match db.driver {
        Driver::Mysql => Ok(Box::new(MysqlCatalog::connect(db)?)),
        Driver::Sqlite => {
            let path = db
                .path
                .as_deref()
                .ok_or_else(|| Error::Config("database.path is required for the sqlite driver".into()))?;
            let catalog = Catalog::open(path).map_err(|e| match e {
                Error::Connectivity(_) => e,
                other => Error::Connectivity(other.to_string()),
            })?;
            info!(path = %path.display(), "opened SQLite library");
            Ok(Box::new(catalog))
        }
    }
}

/// Classification counts for the configured library without changing it:
/// no schema preparation, no tag creation. `None` when the library has never
/// been prepared.
pub fn library_stats(config: &Config) -> Result<Option<LibraryStats>> {
    let mut store = open_store(config)?;
    inspect(&mut store)
}

/// Read-only counterpart of [`Tagger::stats`] for any store.
pub fn inspect<S: LibraryStore + ?Sized>(store: &mut S) -> Result<Option<LibraryStats>> {
    if !store.is_prepared()? {
        return Ok(None);
    }
    let tag = store.find_tag(BW_TAG_NAME)?;
    store.stats(tag.map(|t| t.id)).map(Some)
}

/// The main entry point: a prepared library, an image source and a classifier,
/// bound together by the run context resolved at startup.
pub struct Tagger<S = Box<dyn LibraryStore>, F = HttpSource, C = SaturationClassifier> {
    store: S,
    acquirer: Acquirer<F>,
    classifier: C,
    ctx: RunContext,
    selector: CandidateSelector,
    pause: Duration,
}

impl Tagger {
    /// Connect to the configured library and image server, prepare the schema
    /// and resolve the Black & White tag.
    pub fn connect(config: &Config) -> Result<Self> {
        let store = open_store(config)?;
        let source = HttpSource::new(&config.image_base_url, config.http_timeout())?;
        Self::new(
            store,
            Acquirer::new(source),
            SaturationClassifier,
            config.grayscale_tolerance,
        )
    }
}

impl<S, F, C> Tagger<S, F, C>
where
    S: LibraryStore,
    F: ImageSource,
    C: Classifier,
{
    /// Prepare the library and bootstrap the tag. Both failures are fatal schema errors.
    pub fn new(mut store: S, acquirer: Acquirer<F>, classifier: C, tolerance: f64) -> Result<Self> {
        store.prepare_schema()?;
        info!("library schema is ready");
        let tag = catalog::find_or_create_bw_tag(&mut store).map_err(|e| match e {
            Error::Schema(_) => e,
            other => Error::Schema(format!("failed to find or create {BW_TAG_NAME} tag: {other}")),
        })?;
        Ok(Self {
            store,
            acquirer,
            classifier,
            ctx: RunContext::new(tag.id, tolerance),
            selector: CandidateSelector::default(),
            pause: pipeline::PAGE_PAUSE,
        })
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.selector = CandidateSelector::with_page_size(page_size);
        self
    }

    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn acquirer(&self) -> &Acquirer<F> {
        &self.acquirer
    }

    /// Run one pass until the library has no candidates left.
    /// Calls `progress_cb` with progress updates if provided.
    pub fn run(&mut self, progress_cb: Option<&mut dyn FnMut(PassProgress)>) -> Result<PassReport> {
        BatchDriver::new(&mut self.store, &self.acquirer, &self.classifier, self.ctx)
            .with_selector(self.selector.clone())
            .with_pause(self.pause)
            .run(progress_cb)
    }

    /// Classification counts across the library.
    pub fn stats(&mut self) -> Result<LibraryStats> {
        self.store.stats(Some(self.ctx.tag_id))
    }
}
