use std::io::Cursor;

use image::DynamicImage;

use crate::error::SourceError;

/// One way of turning fetched bytes into pixels.
pub trait ImageDecoder {
    fn name(&self) -> &'static str;

    fn decode(&self, bytes: &[u8]) -> std::result::Result<DynamicImage, String>;
}

/// `image` crate decode with the format sniffed from the content.
/// Handles JPEG, PNG, GIF, BMP, TIFF and WebP.
pub struct StandardDecoder;

impl ImageDecoder for StandardDecoder {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<DynamicImage, String> {
        image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())?
            .decode()
            .map_err(|e| e.to_string())
    }
}

/// Forces the WebP codec regardless of what the content sniffing said.
pub struct WebpDecoder;

impl ImageDecoder for WebpDecoder {
    fn name(&self) -> &'static str {
        "webp"
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<DynamicImage, String> {
        let decoder = image::codecs::webp::WebPDecoder::new(Cursor::new(bytes))
            .map_err(|e| e.to_string())?;
        DynamicImage::from_decoder(decoder).map_err(|e| e.to_string())
    }
}

/// JPEG fast path through libjpeg-turbo, straight to RGB.
#[cfg(feature = "turbojpeg")]
pub struct TurboJpegDecoder;

#[cfg(feature = "turbojpeg")]
impl ImageDecoder for TurboJpegDecoder {
    fn name(&self) -> &'static str {
        "turbojpeg"
    }

    fn decode(&self, bytes: &[u8]) -> std::result::Result<DynamicImage, String> {
        if !bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Err("not a JPEG stream".to_string());
        }
        let mut decompressor = turbojpeg::Decompressor::new().map_err(|e| e.to_string())?;
        let header = decompressor.read_header(bytes).map_err(|e| e.to_string())?;
        let (w, h) = (header.width, header.height);

        let mut buf = vec![0u8; w * h * 3];
        let output = turbojpeg::Image {
            pixels: buf.as_mut_slice(),
            width: w,
            pitch: w * 3,
            height: h,
            format: turbojpeg::PixelFormat::RGB,
        };
        decompressor
            .decompress(bytes, output)
            .map_err(|e| e.to_string())?;

        image::RgbImage::from_raw(w as u32, h as u32, buf)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| "decoded buffer does not match header dimensions".to_string())
    }
}

/// Ordered decoder strategies; the first one to succeed wins.
pub struct DecoderChain {
    decoders: Vec<Box<dyn ImageDecoder>>,
}

impl DecoderChain {
    pub fn new(decoders: Vec<Box<dyn ImageDecoder>>) -> Self {
        Self { decoders }
    }

    /// Standard formats first, WebP as the named fallback.
    /// With the `turbojpeg` feature, JPEGs try libjpeg-turbo before either.
    pub fn standard() -> Self {
        let mut decoders: Vec<Box<dyn ImageDecoder>> = Vec::new();
        #[cfg(feature = "turbojpeg")]
        decoders.push(Box::new(TurboJpegDecoder));
        decoders.push(Box::new(StandardDecoder));
        decoders.push(Box::new(WebpDecoder));
        Self { decoders }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.decoders.iter().map(|d| d.name()).collect()
    }

    /// Returns the image and the name of the decoder that produced it.
    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<(DynamicImage, &'static str), SourceError> {
        let mut last = String::from("no decoders configured");
        for decoder in &self.decoders {
            match decoder.decode(bytes) {
                Ok(img) => return Ok((img, decoder.name())),
                Err(e) => last = e,
            }
        }
        Err(SourceError::Decode {
            tried: self.names().join(", "),
            message: last,
        })
    }
}

impl Default for DecoderChain {
    fn default() -> Self {
        Self::standard()
    }
}
