use std::path::Path;

use crate::domain::PhotoFormat;

/// Map a file extension (lowercase, without dot) to a PhotoFormat.
pub fn format_from_extension(ext: &str) -> Option<PhotoFormat> {
    match ext {
        "jpg" | "jpeg" => Some(PhotoFormat::Jpeg),
        "tif" | "tiff" => Some(PhotoFormat::Tiff),
        "png" => Some(PhotoFormat::Png),
        "webp" => Some(PhotoFormat::Webp),
        _ => None,
    }
}

/// Format of a path judged by its extension, case-insensitively.
pub fn format_of(path: &Path) -> Option<PhotoFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    format_from_extension(&ext)
}

/// All supported file extensions.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "tif", "tiff", "png", "webp"];
