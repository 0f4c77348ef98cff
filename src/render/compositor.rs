use ab_glyph::{FontVec, PxScale};
use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use log::{debug, info, warn};
use std::io::Cursor;
use std::path::{Path, PathBuf};

use super::{qr::render_qr, CertificateRenderer, RenderedCertificate};
use crate::error::{CertissueError, Result};
use crate::record::Certificate;
use crate::template::{LayoutSet, TemplateVariant};

/// Fonts tried when no font is configured.
pub const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:/Windows/Fonts/arial.ttf",
];

const INK: Rgb<u8> = Rgb([0, 0, 0]);

/// Loads the configured font, falling back to well-known system fonts.
pub fn load_font(configured: Option<&Path>) -> Result<FontVec> {
    let candidates = configured
        .map(Path::to_path_buf)
        .into_iter()
        .chain(FALLBACK_FONTS.iter().map(PathBuf::from));

    for path in candidates {
        if !path.exists() {
            debug!("Font not present: {}", path.display());
            continue;
        }
        let bytes = std::fs::read(&path)?;
        match FontVec::try_from_vec(bytes) {
            Ok(font) => {
                info!("Font loaded from: {}", path.display());
                return Ok(font);
            }
            Err(e) => warn!("Font loading error for {}: {}", path.display(), e),
        }
    }

    Err(CertissueError::FontUnavailable)
}

/// Draws certificate fields and the verification QR code onto template
/// images.
pub struct Compositor {
    templates_dir: PathBuf,
    layouts: LayoutSet,
    font: FontVec,
    base_font_size: u32,
    verify_base: String,
}

impl Compositor {
    pub fn new(
        templates_dir: impl Into<PathBuf>,
        layouts: LayoutSet,
        font: FontVec,
        base_font_size: u32,
        verify_base: impl Into<String>,
    ) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            layouts,
            font,
            base_font_size,
            verify_base: verify_base.into(),
        }
    }

    /// Renders onto an already opened template image.
    pub fn compose(
        &self,
        mut canvas: RgbImage,
        cert: &Certificate,
        variant: TemplateVariant,
    ) -> Result<RenderedCertificate> {
        let layout = self.layouts.layout_for(variant);

        for placement in &layout.fields {
            let text = placement.field.text_for(cert, &self.verify_base);
            let scale = PxScale::from(placement.font.size(self.base_font_size) as f32);
            let (width, _) = text_size(scale, &self.font, &text);
            let (x, y) = placement.anchor.origin(width);
            draw_text_mut(&mut canvas, INK, x, y, scale, &self.font, &text);
        }

        let qr = render_qr(&cert.verification_url, layout.qr.width, layout.qr.height)?;
        imageops::overlay(&mut canvas, &qr, layout.qr.x, layout.qr.y);

        Ok(RenderedCertificate {
            image_png: encode_png(canvas)?,
            qr_png: encode_png(qr)?,
        })
    }
}

impl CertificateRenderer for Compositor {
    fn render(&self, cert: &Certificate, variant: TemplateVariant) -> Result<RenderedCertificate> {
        let path = variant.image_path(&self.templates_dir)?;
        debug!("Rendering {} on {}", cert.certificate_id, path.display());
        let canvas = image::open(&path)?.to_rgb8();
        self.compose(canvas, cert, variant)
    }
}

fn encode_png(img: RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::sample_certificate;

    const PNG_MAGIC: &[u8] = b"\x89PNG";

    fn compositor(dir: &Path) -> Option<Compositor> {
        let font = match load_font(None) {
            Ok(font) => font,
            Err(CertissueError::FontUnavailable) => {
                eprintln!("no system font available, skipping");
                return None;
            }
            Err(e) => panic!("{}", e),
        };
        Some(Compositor::new(dir, LayoutSet::default(), font, 22, "https://verify.example.org"))
    }

    #[test]
    fn test_missing_configured_font_falls_through() {
        let result = load_font(Some(Path::new("/nonexistent/font.ttf")));
        // either a system fallback was found or nothing was
        assert!(matches!(result, Ok(_) | Err(CertissueError::FontUnavailable)));
    }

    #[test]
    fn test_render_from_template_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let Some(compositor) = compositor(dir.path()) else { return };

        let blank = RgbImage::from_pixel(1200, 850, Rgb([255, 255, 255]));
        blank
            .save_with_format(
                dir.path().join(TemplateVariant::DataValley.image_filename()),
                ImageFormat::Jpeg,
            )
            .unwrap();

        let cert = sample_certificate();
        let rendered = compositor.render(&cert, TemplateVariant::DataValley).unwrap();
        assert!(rendered.image_png.starts_with(PNG_MAGIC));
        assert!(rendered.qr_png.starts_with(PNG_MAGIC));

        let img = image::load_from_memory(&rendered.image_png).unwrap().to_rgb8();
        assert_eq!(img.dimensions(), (1200, 850));
        // the name line has ink on it
        let inked = (460..1080).any(|x| (375..400).any(|y| img.get_pixel(x, y).0[0] < 128));
        assert!(inked);
    }

    #[test]
    fn test_missing_template_is_reported() {
        let dir = tempfile::TempDir::new().unwrap();
        let Some(compositor) = compositor(dir.path()) else { return };
        let result = compositor.render(&sample_certificate(), TemplateVariant::Proplore);
        assert!(matches!(result, Err(CertissueError::TemplateNotFound(_))));
    }
}
