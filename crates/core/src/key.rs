//! Canonical object key derivation.

use uuid::Uuid;

/// Build the canonical object key for a template version.
///
/// Both the cache and the primary backend store the artifact under this
/// exact key, so a cache entry can always be re-populated from primary.
pub fn object_key(template_id: Uuid, version: i64) -> String {
    format!("templates/{template_id}/{version}")
}
