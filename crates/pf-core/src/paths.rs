//! Path utilities for detecting input images by extension.

use std::path::Path;

/// Image extensions the selection collector accepts as transcoding input.
const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif", "avif",
];

/// Check if a path has an image file extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use pf_core::paths::is_image_file;
///
/// assert!(is_image_file(Path::new("holiday.jpg")));
/// assert!(is_image_file(Path::new("/path/to/scan.TIFF")));
/// assert!(!is_image_file(Path::new("notes.txt")));
/// ```
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
