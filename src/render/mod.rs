//! Turns a certificate record into PNG images.

pub mod compositor;
pub mod qr;

pub use compositor::{load_font, Compositor, FALLBACK_FONTS};
pub use qr::render_qr;

use crate::error::Result;
use crate::record::Certificate;
use crate::template::TemplateVariant;

/// Output of one render pass.
#[derive(Debug, Clone)]
pub struct RenderedCertificate {
    pub image_png: Vec<u8>,
    pub qr_png: Vec<u8>,
}

/// Draws certificates. Implementations must be shareable between request
/// handlers.
pub trait CertificateRenderer: Send + Sync {
    fn render(&self, cert: &Certificate, variant: TemplateVariant) -> Result<RenderedCertificate>;
}
