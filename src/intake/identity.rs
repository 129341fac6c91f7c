use std::path::Path;

pub const NOT_ADMITTED: &str = "not admitted yet";

/// Builds `"{last}, {preferred} - {identity}{extension}"` display names.
///
/// Only the identity receives a fallback; empty name fields are kept empty.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    placeholder: String,
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(NOT_ADMITTED)
    }
}

impl IdentityResolver {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    fn stem(&self, last: &str, preferred: &str, id_number: &str) -> String {
        let identity = if id_number.is_empty() {
            self.placeholder.as_str()
        } else {
            id_number
        };
        format!("{last}, {preferred} - {identity}")
    }

    pub fn canonical_name(
        &self,
        last: &str,
        preferred: &str,
        id_number: &str,
        extension: &str,
    ) -> String {
        format!("{}{extension}", self.stem(last, preferred, id_number))
    }
}

/// Extension of an original member name, dot included (`"img1.jpg"` -> `".jpg"`).
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default()
}
