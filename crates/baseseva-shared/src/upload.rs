//! Certificate upload rules, applied by the client before sending and by
//! the server before writing anything to storage.

use crate::constants::{ALLOWED_CERTIFICATE_TYPES, MAX_CERTIFICATE_SIZE};
use crate::error::UploadError;

/// Check a certificate's declared MIME type and size.
pub fn validate_certificate(content_type: &str, size: usize) -> Result<(), UploadError> {
    let content_type = normalize_content_type(content_type);
    if !ALLOWED_CERTIFICATE_TYPES.contains(&content_type.as_str()) {
        return Err(UploadError::UnsupportedType(content_type));
    }
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > MAX_CERTIFICATE_SIZE {
        return Err(UploadError::TooLarge {
            size,
            max: MAX_CERTIFICATE_SIZE,
        });
    }
    Ok(())
}

/// Lower-case the MIME type and drop parameters such as `; charset=...`.
pub fn normalize_content_type(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// File extension used when storing a certificate of the given type.
pub fn extension_for(content_type: &str) -> &'static str {
    match normalize_content_type(content_type).as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        _ => "jpg",
    }
}
