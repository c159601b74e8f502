//! Batch compositing engine.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};

use crate::blending::Overlay;
use crate::bundle;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::image_overlay::{self, ImageWatermark};
use crate::retention::{self, RetentionScheduler};
use crate::storage::StorageAllocator;
use crate::text::{self, TextWatermark};

/// One base image and the watermarks to put on it.
#[derive(Debug, Clone)]
pub struct WatermarkRequest {
    /// Original file name; decides the output format and appears in the output name.
    pub name: String,
    /// Encoded base image.
    pub data: Vec<u8>,
    /// Text watermark, drawn above the image watermark.
    pub text: Option<TextWatermark>,
    /// Image watermark.
    pub image: Option<ImageWatermark>,
}

impl WatermarkRequest {
    /// A request with no watermarks attached yet.
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            text: None,
            image: None,
        }
    }

    /// Attach a text watermark.
    #[must_use]
    pub fn with_text(mut self, text: TextWatermark) -> Self {
        self.text = Some(text);
        self
    }

    /// Attach an image watermark.
    #[must_use]
    pub fn with_image(mut self, image: ImageWatermark) -> Self {
        self.image = Some(image);
        self
    }
}

/// A watermarked image written to disk.
#[derive(Debug, Clone)]
pub struct CompositeResult {
    /// Name of the request this came from.
    pub source_name: String,
    /// Where the encoded output was written.
    pub path: PathBuf,
    /// Size of the encoded output.
    pub bytes: u64,
}

/// A request that could not be processed.
#[derive(Debug)]
pub struct ItemFailure {
    /// Name of the failing request.
    pub name: String,
    /// Why it failed.
    pub error: Error,
}

/// Outcome of one [`Watermarker::composite`] call.
#[derive(Debug)]
pub struct Bundle {
    /// Zip archive holding every successful output, in request order.
    pub archive: PathBuf,
    /// Successful outputs, in request order.
    pub results: Vec<CompositeResult>,
    /// Requests that failed, in request order.
    pub failures: Vec<ItemFailure>,
}

impl Bundle {
    /// Every file this batch created: the archive first, then each output.
    #[must_use]
    pub fn artifacts(&self) -> Vec<PathBuf> {
        std::iter::once(self.archive.clone())
            .chain(self.results.iter().map(|r| r.path.clone()))
            .collect()
    }

    /// Whether every request succeeded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Composites watermarks onto images and packages the results.
///
/// Create once and reuse for many batches. Every output and bundle gets a
/// unique path, so concurrent batches never overwrite each other.
///
/// With a [`RetentionScheduler`] attached, the artifacts of every successful
/// batch are handed to it for deferred deletion.
#[derive(Debug, Clone)]
pub struct Watermarker {
    config: Config,
    storage: StorageAllocator,
    retention: Option<Arc<RetentionScheduler>>,
}

impl Watermarker {
    /// Create an engine writing into `config.output_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the output directory cannot be created.
    pub fn new(config: Config) -> Result<Self> {
        let storage = StorageAllocator::new(&config.output_dir)?;
        Ok(Self {
            config,
            storage,
            retention: None,
        })
    }

    /// Hand the artifacts of every successful batch to `scheduler`.
    ///
    /// The scheduler is shared, so one instance can serve every engine in a process.
    #[must_use]
    pub fn with_retention(mut self, scheduler: Arc<RetentionScheduler>) -> Self {
        self.retention = Some(scheduler);
        self
    }

    /// Settings this engine was created with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Path allocator for this engine's output directory.
    #[must_use]
    pub fn storage(&self) -> &StorageAllocator {
        &self.storage
    }

    /// Composite the watermarks of `request` onto its base image without writing anything.
    ///
    /// The image watermark goes down first and the text on top of it. With no
    /// watermarks the decoded base pixels come back unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if either image cannot be decoded and
    /// [`Error::InvalidGradient`] for a malformed gradient color.
    pub fn render(&self, request: &WatermarkRequest) -> Result<RgbImage> {
        let base = image::load_from_memory(&request.data)
            .map_err(|source| Error::Decode {
                name: request.name.clone(),
                source,
            })?
            .to_rgba8();
        let dims = base.dimensions();

        let mut overlay = Overlay::for_base(&base);
        if let Some(spec) = &request.image {
            if let Some(layer) = image_overlay::render(spec, dims)? {
                overlay.add(&layer);
            }
        }
        if let Some(spec) = &request.text {
            if let Some(layer) = text::render(spec, dims, self.config.default_font_size)? {
                overlay.add(&layer);
            }
        }

        let composed = if overlay.is_transparent() {
            base
        } else {
            overlay.apply(base)
        };
        Ok(DynamicImage::ImageRgba8(composed).into_rgb8())
    }

    /// Watermark every request, write the outputs and bundle them into one zip.
    ///
    /// A failing request is recorded in [`Bundle::failures`] and the rest of
    /// the batch carries on, unless [`Config::fail_fast`] is set: then the
    /// outputs already written are removed and the first error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first item error under `fail_fast`, or any error raised
    /// while writing the archive. Nothing is left behind to schedule in either case.
    pub fn composite(&self, requests: &[WatermarkRequest]) -> Result<Bundle> {
        let mut results: Vec<CompositeResult> = Vec::with_capacity(requests.len());
        let mut failures = Vec::new();

        for request in requests {
            match self.process(request) {
                Ok(result) => {
                    tracing::debug!(name = %request.name, path = %result.path.display(), "watermarked");
                    results.push(result);
                }
                Err(error) if self.config.fail_fast => {
                    tracing::warn!(name = %request.name, "aborting batch: {error}");
                    retention::purge(&output_paths(&results));
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(name = %request.name, "skipping image: {error}");
                    failures.push(ItemFailure {
                        name: request.name.clone(),
                        error,
                    });
                }
            }
        }

        let archive = self.storage.bundle_path();
        let outputs = output_paths(&results);
        if let Err(e) = bundle::package(&outputs, &archive, self.config.compress_bundle) {
            retention::purge(&outputs);
            retention::purge(std::slice::from_ref(&archive));
            return Err(e);
        }

        tracing::info!(
            archive = %archive.display(),
            succeeded = results.len(),
            failed = failures.len(),
            "batch complete"
        );
        let bundle = Bundle {
            archive,
            results,
            failures,
        };
        if let Some(scheduler) = &self.retention {
            scheduler.schedule(bundle.artifacts());
        }
        Ok(bundle)
    }

    fn process(&self, request: &WatermarkRequest) -> Result<CompositeResult> {
        let image = self.render(request)?;
        let (format, ext) = output_format(&request.name);
        let encoded = encode_image(&image, format, self.config.jpeg_quality)?;

        let path = self.storage.output_path(&request.name, ext);
        std::fs::write(&path, &encoded)?;

        Ok(CompositeResult {
            source_name: request.name.clone(),
            path,
            bytes: encoded.len() as u64,
        })
    }
}

fn output_paths(results: &[CompositeResult]) -> Vec<PathBuf> {
    results.iter().map(|r| r.path.clone()).collect()
}

/// Check if a file has a supported image extension.
#[must_use]
pub fn is_supported_image(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "webp" | "bmp"
        ),
        None => false,
    }
}

/// Output format and extension for an input named `name`.
///
/// JPEG, WebP and BMP inputs keep their format; everything else becomes PNG.
#[must_use]
pub fn output_format(name: &str) -> (ImageFormat, &'static str) {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => (ImageFormat::Jpeg, "jpg"),
        Some("webp") => (ImageFormat::WebP, "webp"),
        Some("bmp") => (ImageFormat::Bmp, "bmp"),
        _ => (ImageFormat::Png, "png"),
    }
}

/// Encode an RGB image, using `jpeg_quality` for JPEG output.
///
/// # Errors
///
/// Returns [`Error::UnsupportedFormat`] for formats other than JPEG, PNG,
/// WebP and BMP, or [`Error::Image`] if encoding fails.
pub fn encode_image(img: &RgbImage, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
    let mut buf = Cursor::new(Vec::new());
    match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality.clamp(1, 100));
            img.write_with_encoder(encoder)?;
        }
        ImageFormat::Png | ImageFormat::WebP | ImageFormat::Bmp => {
            img.write_to(&mut buf, format)?;
        }
        _ => {
            return Err(Error::UnsupportedFormat(format!("{format:?}")));
        }
    }
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::Anchor;
    use image::{Rgb, Rgba, RgbaImage};

    fn png(img: &RgbImage) -> Vec<u8> {
        encode_image(img, ImageFormat::Png, 95).unwrap()
    }

    fn engine(dir: &Path) -> Watermarker {
        Watermarker::new(Config {
            output_dir: dir.join("out"),
            ..Config::default()
        })
        .unwrap()
    }

    #[test]
    fn is_supported_image_accepts_common_formats() {
        assert!(is_supported_image(Path::new("photo.jpg")));
        assert!(is_supported_image(Path::new("photo.JPEG")));
        assert!(is_supported_image(Path::new("photo.png")));
        assert!(is_supported_image(Path::new("photo.webp")));
        assert!(is_supported_image(Path::new("photo.bmp")));
    }

    #[test]
    fn is_supported_image_rejects_unsupported_formats() {
        assert!(!is_supported_image(Path::new("photo.gif")));
        assert!(!is_supported_image(Path::new("photo.txt")));
        assert!(!is_supported_image(Path::new("photo")));
    }

    #[test]
    fn output_format_falls_back_to_png() {
        assert_eq!(output_format("a.JPEG"), (ImageFormat::Jpeg, "jpg"));
        assert_eq!(output_format("a.webp"), (ImageFormat::WebP, "webp"));
        assert_eq!(output_format("a.bmp"), (ImageFormat::Bmp, "bmp"));
        assert_eq!(output_format("a.gif"), (ImageFormat::Png, "png"));
        assert_eq!(output_format("noext"), (ImageFormat::Png, "png"));
    }

    #[test]
    fn encode_rejects_unsupported_format() {
        let img = RgbImage::new(2, 2);
        assert!(matches!(
            encode_image(&img, ImageFormat::Gif, 95),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn jpeg_quality_changes_size() {
        let img = RgbImage::from_fn(64, 64, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8])
        });
        let low = encode_image(&img, ImageFormat::Jpeg, 10).unwrap();
        let high = encode_image(&img, ImageFormat::Jpeg, 100).unwrap();
        assert!(low.len() < high.len());
        assert_eq!(image::guess_format(&low).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn render_without_watermarks_is_identity() {
        let dir = tempfile::tempdir().unwrap();
        let base = RgbImage::from_fn(17, 9, |x, y| {
            #[allow(clippy::cast_possible_truncation)]
            Rgb([(x * 15) as u8, (y * 28) as u8, 77])
        });
        let out = engine(dir.path())
            .render(&WatermarkRequest::new("plain.png", png(&base)))
            .unwrap();
        assert_eq!(out, base);
    }

    #[test]
    fn render_applies_image_watermark() {
        let dir = tempfile::tempdir().unwrap();
        let base = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let mark = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let mut mark_png = Cursor::new(Vec::new());
        mark.write_to(&mut mark_png, ImageFormat::Png).unwrap();

        let request = WatermarkRequest::new("base.png", png(&base)).with_image(ImageWatermark {
            scale: 20.0,
            opacity: 100.0,
            anchor: Anchor::TopLeft,
            ..ImageWatermark::new(mark_png.into_inner())
        });
        let out = engine(dir.path()).render(&request).unwrap();

        assert_eq!(out.get_pixel(15, 15), &Rgb([0, 0, 0]));
        assert_eq!(out.get_pixel(5, 5), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(50, 50), &Rgb([255, 255, 255]));
    }

    #[test]
    fn undecodable_base_names_the_request() {
        let dir = tempfile::tempdir().unwrap();
        let err = engine(dir.path())
            .render(&WatermarkRequest::new("broken.jpg", b"garbage".to_vec()))
            .unwrap_err();
        match err {
            Error::Decode { name, .. } => assert_eq!(name, "broken.jpg"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn composite_writes_outputs_in_the_input_format() {
        let dir = tempfile::tempdir().unwrap();
        let base = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        let jpeg = encode_image(&base, ImageFormat::Jpeg, 90).unwrap();

        let bundle = engine(dir.path())
            .composite(&[
                WatermarkRequest::new("a.jpg", jpeg),
                WatermarkRequest::new("b.gif", png(&base)),
            ])
            .unwrap();

        assert!(bundle.is_complete());
        assert_eq!(bundle.results.len(), 2);
        assert_eq!(bundle.results[0].path.extension().unwrap(), "jpg");
        assert_eq!(bundle.results[1].path.extension().unwrap(), "png");
        for result in &bundle.results {
            assert_eq!(std::fs::metadata(&result.path).unwrap().len(), result.bytes);
        }

        let artifacts = bundle.artifacts();
        assert_eq!(artifacts.len(), 3);
        assert_eq!(artifacts[0], bundle.archive);
        assert!(artifacts.iter().all(|p| p.exists()));
    }
}
