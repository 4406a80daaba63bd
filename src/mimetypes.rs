//! MIME type and file extension mapping.
//!
//! A fixed registry in the spirit of the `/etc/mime.types` tables: each
//! entry maps a content type to its extensions, the first one being the
//! canonical extension returned by [`guess_extension`].

/// `(content type, extensions)`; extensions carry the leading dot.
const TYPES: &[(&str, &[&str])] = &[
    // Images
    ("image/png", &[".png"]),
    ("image/jpeg", &[".jpg", ".jpeg", ".jpe"]),
    ("image/gif", &[".gif"]),
    ("image/webp", &[".webp"]),
    ("image/bmp", &[".bmp"]),
    ("image/x-ms-bmp", &[".bmp"]),
    ("image/tiff", &[".tiff", ".tif"]),
    ("image/x-icon", &[".ico"]),
    ("image/vnd.microsoft.icon", &[".ico"]),
    ("image/avif", &[".avif"]),
    ("image/heic", &[".heic"]),
    ("image/heif", &[".heif"]),
    ("image/svg+xml", &[".svg"]),
    ("image/x-portable-anymap", &[".pnm"]),
    ("image/x-portable-bitmap", &[".pbm"]),
    ("image/x-portable-graymap", &[".pgm"]),
    ("image/x-portable-pixmap", &[".ppm"]),
    ("image/x-tga", &[".tga"]),
    ("image/vnd.radiance", &[".hdr"]),
    ("image/x-exr", &[".exr"]),
    ("image/qoi", &[".qoi"]),
    // Everything else an upload might declare
    ("application/octet-stream", &[".bin"]),
    ("application/pdf", &[".pdf"]),
    ("application/json", &[".json"]),
    ("application/zip", &[".zip"]),
    ("text/plain", &[".txt"]),
    ("text/html", &[".html", ".htm"]),
    ("text/csv", &[".csv"]),
];

/// Strips parameters (`; charset=...`) and normalizes case.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Canonical extension (with leading dot) for a content type.
pub fn guess_extension(content_type: &str) -> Option<&'static str> {
    let essence = essence(content_type);
    TYPES
        .iter()
        .find(|(mime, _)| *mime == essence)
        .and_then(|(_, exts)| exts.first().copied())
}

/// Content type for a file name, judged by its extension.
pub fn guess_type(filename: &str) -> Option<&'static str> {
    let ext = extension_of(filename)?.to_ascii_lowercase();
    TYPES
        .iter()
        .find(|(_, exts)| exts.iter().any(|e| *e == ext))
        .map(|(mime, _)| *mime)
}

/// Final `.ext` suffix of a file name, if it has one. Leading-dot names
/// such as `.hidden` have no suffix.
pub fn extension_of(filename: &str) -> Option<&str> {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match name.rfind('.') {
        Some(0) | None => None,
        Some(i) if i + 1 == name.len() => None,
        Some(i) => Some(&name[i..]),
    }
}
