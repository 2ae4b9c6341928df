//! UUID helpers.
//!
//! Every first-class DCP entity carries a UUID, stored bare and written to
//! XML as `urn:uuid:<lowercase-uuid>`.

use uuid::Uuid;

/// Create a new random UUID as a lowercase hyphenated string.
pub fn make_uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Strip a leading `urn:uuid:` prefix, if present.
pub fn remove_urn_uuid(id: &str) -> String {
    id.strip_prefix("urn:uuid:").unwrap_or(id).to_string()
}

/// Compare two identifiers, ignoring case and surrounding whitespace.
pub fn ids_equal(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
