//! Image import/export and file dialog handling.
//!
//! Import decodes any raster format the `image` crate understands and
//! replaces the sprite wholesale; oversized sources are downscaled first so
//! a stray photo cannot blow up the cell grid.  Export renders the sprite
//! as a block-replicated PNG at an integer scale.

use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{ImageFormat, RgbaImage};

use crate::canvas::{PixelColor, SpriteRaster};
use crate::log_warn;

/// Longest edge above which an imported image is downscaled.
pub const IMPORT_MAX_EDGE: u32 = 1024;
/// Fixed divisor applied to both axes of oversized imports.
pub const IMPORT_DOWNSCALE_FACTOR: u32 = 10;

// ============================================================================
// ERRORS
// ============================================================================

/// Error type for image import/export operations.
#[derive(Debug)]
pub enum IoError {
    Io(std::io::Error),
    /// The file could not be decoded as a supported raster format.
    Decode(String),
    /// The encoder failed for a non-I/O reason.
    Encode(String),
    /// Export scale must be at least 1.
    InvalidScale(u32),
}

impl std::fmt::Display for IoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IoError::Io(e) => write!(f, "I/O error: {}", e),
            IoError::Decode(e) => write!(f, "Decode error: {}", e),
            IoError::Encode(e) => write!(f, "Encode error: {}", e),
            IoError::InvalidScale(s) => write!(f, "Invalid export scale: {}", s),
        }
    }
}

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Io(e)
    }
}

// ============================================================================
// IMPORT
// ============================================================================

/// Decode an image file into a fresh sprite raster.
///
/// Sources with either dimension above [`IMPORT_MAX_EDGE`] are first
/// downscaled by [`IMPORT_DOWNSCALE_FACTOR`] on both axes (nearest
/// neighbor).  Alpha-zero source pixels become [`PixelColor::Transparent`];
/// everything else copies RGBA verbatim.
pub fn load_image(path: &Path) -> Result<SpriteRaster, IoError> {
    let img = image::open(path)
        .map_err(|e| IoError::Decode(e.to_string()))?
        .to_rgba8();
    raster_from_rgba(&img)
}

/// Convert a decoded RGBA image into a raster, applying the oversize
/// downscale rule.  Split out from [`load_image`] so tests can feed
/// in-memory images.
pub fn raster_from_rgba(img: &RgbaImage) -> Result<SpriteRaster, IoError> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return Err(IoError::Decode("image has a zero dimension".into()));
    }

    let scaled;
    let src = if w > IMPORT_MAX_EDGE || h > IMPORT_MAX_EDGE {
        let nw = (w / IMPORT_DOWNSCALE_FACTOR).max(1);
        let nh = (h / IMPORT_DOWNSCALE_FACTOR).max(1);
        log_warn!(
            "Import {}×{} exceeds {} px, downscaling to {}×{}",
            w,
            h,
            IMPORT_MAX_EDGE,
            nw,
            nh
        );
        scaled = image::imageops::resize(img, nw, nh, FilterType::Nearest);
        &scaled
    } else {
        img
    };

    let mut raster = SpriteRaster::new(src.width(), src.height());
    for (x, y, pixel) in src.enumerate_pixels() {
        raster.set_pixel(x, y, PixelColor::from_rgba(*pixel));
    }
    Ok(raster)
}

// ============================================================================
// EXPORT
// ============================================================================

/// Render the raster at an integer scale and save it as a PNG.
pub fn export_image(raster: &SpriteRaster, path: &Path, scale: u32) -> Result<(), IoError> {
    let img = render_scaled(raster, scale)?;
    img.save_with_format(path, ImageFormat::Png)
        .map_err(|e| match e {
            image::ImageError::IoError(io) => IoError::Io(io),
            other => IoError::Encode(other.to_string()),
        })
}

/// Nearest-neighbor block replication: each sprite cell becomes a
/// `scale`×`scale` solid block.  Transparent cells stay at zero alpha in
/// the output.
pub fn render_scaled(raster: &SpriteRaster, scale: u32) -> Result<RgbaImage, IoError> {
    if scale == 0 {
        return Err(IoError::InvalidScale(scale));
    }
    let mut out = RgbaImage::new(raster.width() * scale, raster.height() * scale);
    for y in 0..raster.height() {
        for x in 0..raster.width() {
            let Some(rgba) = raster.get_pixel(x, y).rgba() else {
                continue;
            };
            for by in 0..scale {
                for bx in 0..scale {
                    out.put_pixel(x * scale + bx, y * scale + by, rgba);
                }
            }
        }
    }
    Ok(out)
}

// ============================================================================
// FILE HANDLER — native dialogs, last-directory memory
// ============================================================================

const IMPORT_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tga"];

/// Wraps the native file dialogs and remembers the directory the user last
/// visited so successive dialogs open where they left off.
pub struct FileHandler {
    last_dir: Option<PathBuf>,
}

impl Default for FileHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl FileHandler {
    pub fn new() -> Self {
        Self { last_dir: None }
    }

    /// Ask the user for an image to import.
    pub fn pick_import_path(&mut self) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new().add_filter("Images", IMPORT_EXTENSIONS);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.pick_file()?;
        self.remember_dir(&path);
        Some(path)
    }

    /// Ask the user where to save the exported PNG.
    pub fn pick_export_path(&mut self) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new()
            .add_filter("PNG image", &["png"])
            .set_file_name("sprite.png");
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.save_file()?;
        self.remember_dir(&path);
        Some(path)
    }

    /// Ask the user for a palette container file.
    pub fn pick_palette_path(&mut self) -> Option<PathBuf> {
        let mut dialog = rfd::FileDialog::new().add_filter("Palette", &["ase", "aseprite"]);
        if let Some(dir) = &self.last_dir {
            dialog = dialog.set_directory(dir);
        }
        let path = dialog.pick_file()?;
        self.remember_dir(&path);
        Some(path)
    }

    fn remember_dir(&mut self, path: &Path) {
        if let Some(parent) = path.parent() {
            self.last_dir = Some(parent.to_path_buf());
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn import_maps_zero_alpha_to_transparent() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([10, 20, 30, 0]));
        img.put_pixel(1, 0, Rgba([10, 20, 30, 128]));

        let raster = raster_from_rgba(&img).unwrap();
        assert_eq!(raster.get_pixel(0, 0), PixelColor::Transparent);
        assert_eq!(
            raster.get_pixel(1, 0),
            PixelColor::Solid(Rgba([10, 20, 30, 128]))
        );
    }

    #[test]
    fn import_keeps_small_images_one_to_one() {
        let img = RgbaImage::from_pixel(1024, 300, Rgba([1, 2, 3, 255]));
        let raster = raster_from_rgba(&img).unwrap();
        assert_eq!((raster.width(), raster.height()), (1024, 300));
    }

    #[test]
    fn import_downscales_oversized_sources_by_ten() {
        let img = RgbaImage::from_pixel(1025, 400, Rgba([9, 9, 9, 255]));
        let raster = raster_from_rgba(&img).unwrap();
        assert_eq!((raster.width(), raster.height()), (102, 40));
        assert_eq!(raster.get_pixel(0, 0), PixelColor::Solid(Rgba([9, 9, 9, 255])));
    }

    #[test]
    fn export_replicates_blocks_and_skips_transparent() {
        let mut raster = SpriteRaster::new(2, 1);
        raster.set_pixel(0, 0, PixelColor::Solid(Rgba([255, 0, 0, 255])));

        let out = render_scaled(&raster, 3).unwrap();
        assert_eq!(out.dimensions(), (6, 3));
        for by in 0..3 {
            for bx in 0..3 {
                assert_eq!(*out.get_pixel(bx, by), Rgba([255, 0, 0, 255]));
                assert_eq!(*out.get_pixel(bx + 3, by), Rgba([0, 0, 0, 0]));
            }
        }
    }

    #[test]
    fn export_rejects_zero_scale() {
        let raster = SpriteRaster::new(2, 2);
        assert!(matches!(
            render_scaled(&raster, 0),
            Err(IoError::InvalidScale(0))
        ));
    }

    #[test]
    fn load_image_reports_decode_errors() {
        let dir = std::env::temp_dir();
        let path = dir.join("pixelfe_not_an_image.txt");
        std::fs::write(&path, b"definitely not a PNG").unwrap();
        let result = load_image(&path);
        std::fs::remove_file(&path).ok();
        assert!(matches!(result, Err(IoError::Decode(_))));
    }
}
