//! Key sanitization for on-disk record names.

/// Storage extension carried by every record file.
pub const EXTENSION: &str = ".dbr";

/// Map an arbitrary key to a filesystem-safe file name.
///
/// Every character outside alphanumerics, `_` and `-` becomes `_`,
/// then the fixed extension is appended. Total and deterministic, but
/// not injective: distinct keys can sanitize to the same name, in
/// which case they share one file and one lock. Callers that need
/// uniqueness must restrict their key alphabet.
pub fn safe_filename(key: &str) -> String {
    let safe: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{safe}{EXTENSION}")
}

/// Strip the storage extension from a directory entry, if present.
pub fn strip_extension(file_name: &str) -> Option<&str> {
    file_name.strip_suffix(EXTENSION)
}
