//! Image scrubber
//!
//! Decodes and re-encodes raster images, which drops EXIF, XMP, ICC and
//! text chunks wholesale. Pixel data is preserved; JPEG output is written at
//! quality 95 with any alpha channel flattened away.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

use crate::config::ScrubOptions;
use crate::error::Result;
use crate::scrubbers::{has_extension, Scrubber};

const JPEG_QUALITY: u8 = 95;

pub struct ImageScrubber;

impl Scrubber for ImageScrubber {
    fn name(&self) -> &'static str {
        "images"
    }

    fn can_handle(&self, path: &Path) -> bool {
        has_extension(path, &["jpg", "jpeg", "png", "tif", "tiff", "webp"])
    }

    fn scrub(&self, src: &Path, dst: &Path, _options: &ScrubOptions) -> Result<()> {
        let img = image::open(src)?;
        debug!(src = %src.display(), "re-encoding image");

        if has_extension(src, &["jpg", "jpeg"]) {
            // JPEG has no alpha channel.
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgb8(img.to_rgb8())
            } else {
                img
            };
            let mut out = BufWriter::new(File::create(dst)?);
            let encoder = JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
            img.write_with_encoder(encoder)?;
        } else if has_extension(src, &["png"]) {
            img.save_with_format(dst, ImageFormat::Png)?;
        } else if has_extension(src, &["tif", "tiff"]) {
            img.save_with_format(dst, ImageFormat::Tiff)?;
        } else {
            img.save_with_format(dst, ImageFormat::WebP)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;

    #[test]
    fn test_can_handle_image_extensions() {
        let s = ImageScrubber;
        assert!(s.can_handle(Path::new("photo.JPG")));
        assert!(s.can_handle(Path::new("scan.tiff")));
        assert!(!s.can_handle(Path::new("doc.pdf")));
    }

    #[test]
    fn test_png_roundtrip_keeps_pixels() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.png");
        let dst = dir.path().join("out.png");

        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(1, 2, image::Rgba([10, 20, 30, 255]));
        img.save(&src).unwrap();

        ImageScrubber
            .scrub(&src, &dst, &ScrubOptions::default())
            .unwrap();

        let out = image::open(&dst).unwrap().to_rgba8();
        assert_eq!(out.get_pixel(1, 2), &image::Rgba([10, 20, 30, 255]));
    }

    #[test]
    fn test_jpeg_reencodes_to_readable_output() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.jpg");
        let dst = dir.path().join("out.jpg");

        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        img.save_with_format(&src, ImageFormat::Jpeg).unwrap();

        ImageScrubber
            .scrub(&src, &dst, &ScrubOptions::default())
            .unwrap();

        assert!(image::open(&dst).is_ok());
    }
}
