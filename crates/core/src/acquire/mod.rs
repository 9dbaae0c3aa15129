pub mod decode;
pub mod http;

use image::DynamicImage;
use tracing::debug;

use crate::domain::{Photo, RenditionKind};
use crate::error::{Error, Result, SourceError};

pub use decode::{DecoderChain, ImageDecoder};
pub use http::HttpSource;

/// Where rendition bytes come from.
pub trait ImageSource {
    /// Fetch the raw encoded bytes stored at a rendition's relative path.
    fn fetch(&self, path: &str) -> std::result::Result<Vec<u8>, SourceError>;
}

/// A decoded image plus where it came from.
pub struct AcquiredImage {
    pub image: DynamicImage,
    pub rendition: RenditionKind,
    pub decoder: &'static str,
}

/// Fetches and decodes a photo, walking its renditions in priority order.
pub struct Acquirer<F> {
    source: F,
    decoders: DecoderChain,
}

impl<F: ImageSource> Acquirer<F> {
    pub fn new(source: F) -> Self {
        Self::with_decoders(source, DecoderChain::standard())
    }

    pub fn with_decoders(source: F, decoders: DecoderChain) -> Self {
        debug!(decoders = ?decoders.names(), "image decoders ready");
        Self { source, decoders }
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    /// Return the first rendition that both fetches and decodes.
    /// A failed fetch or decode only rules out that rendition; the error from
    /// the last one tried is reported once all are exhausted.
    pub fn acquire(&self, photo: &Photo) -> Result<AcquiredImage> {
        let mut last = SourceError::NoSources;

        for (rendition, path) in photo.sources() {
            debug!(photo = %photo.id, %rendition, path, "fetching rendition");

            let bytes = match self.source.fetch(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    debug!(photo = %photo.id, %rendition, error = %e, "fetch failed");
                    last = e;
                    continue;
                }
            };

            match self.decoders.decode(&bytes) {
                Ok((image, decoder)) => {
                    debug!(photo = %photo.id, %rendition, decoder, "decoded image");
                    return Ok(AcquiredImage {
                        image,
                        rendition,
                        decoder,
                    });
                }
                Err(e) => {
                    debug!(photo = %photo.id, %rendition, error = %e, "decode failed");
                    last = e;
                }
            }
        }

        Err(Error::AcquisitionFailed {
            photo_id: photo.id.clone(),
            last,
        })
    }
}
