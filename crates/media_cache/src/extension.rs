use std::path::Path;

/// Picks a file extension for a blob: declared MIME type first, then the
/// content signature, then the original filename. Empty when all three fail.
pub fn infer_extension(mime_type: Option<&str>, bytes: &[u8], filename: Option<&str>) -> String {
    mime_type
        .and_then(extension_for_mime)
        .or_else(|| infer::get(bytes).map(|kind| kind.extension().to_string()))
        .or_else(|| filename.and_then(extension_from_filename))
        .unwrap_or_default()
}

fn extension_for_mime(mime_type: &str) -> Option<String> {
    let essence = mime_type.split(';').next()?.trim().to_ascii_lowercase();
    let extensions = mime_guess::get_mime_extensions_str(&essence)?;
    let subtype = essence
        .split('/')
        .nth(1)
        .map(|subtype| subtype.trim_start_matches("x-"))
        .unwrap_or_default();

    extensions
        .iter()
        .find(|ext| **ext == subtype)
        .or_else(|| extensions.first())
        .map(|ext| ext.to_string())
}

fn extension_from_filename(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
}
