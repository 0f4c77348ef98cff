use image::imageops::{self, FilterType};
use image::{DynamicImage, Luma, RgbImage};
use qrcode::{EcLevel, QrCode};

use crate::error::Result;

/// Pixels per QR module before scaling down.
const MODULE_PX: u32 = 20;

/// Renders `data` as a QR code at high resolution and scales it to
/// `width` x `height`, which keeps edges sharp at small sizes.
pub fn render_qr(data: &str, width: u32, height: u32) -> Result<RgbImage> {
    let code = QrCode::with_error_correction_level(data.as_bytes(), EcLevel::H)?;
    let large = code
        .render::<Luma<u8>>()
        .quiet_zone(true)
        .module_dimensions(MODULE_PX, MODULE_PX)
        .build();

    let rgb = DynamicImage::ImageLuma8(large).to_rgb8();
    Ok(imageops::resize(&rgb, width, height, FilterType::Lanczos3))
}
