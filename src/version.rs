//! OpenAPI version normalization
//!
//! The validator understands OpenAPI 3.0.0 through 3.0.3. Documents that
//! declare a later 3.0 patch release are rewritten to 3.0.3 so they can still
//! be processed, and the rewrite is recorded so callers can warn that the
//! result may not match the original document exactly.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::sync::OnceLock;

/// Highest OpenAPI version the validator accepts
pub const SUPPORTED_CEILING: &str = "3.0.3";

/// OpenAPI versions the validator accepts
pub const SUPPORTED_OPENAPI_VERSIONS: [&str; 4] = ["3.0.0", "3.0.1", "3.0.2", "3.0.3"];

/// Swagger version the validator accepts
pub const SUPPORTED_SWAGGER_VERSION: &str = "2.0";

const CEILING_PATCH: u64 = 3;

/// Which stage rewrote the declared version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OverrideStage {
    /// Plain `3.0.<n>` caught before validation
    Normalizer,
    /// Decorated versions (e.g. `3.0.4-rc1`) caught after the validator rejected them
    ValidationRetry,
}

/// Record of a forced version rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionOverride {
    pub original: String,
    pub applied: String,
    pub stage: OverrideStage,
}

impl VersionOverride {
    pub fn warning(&self) -> String {
        format!(
            "Declared OpenAPI version {} is newer than the supported {}; it was processed as {} and the result may not be fully accurate",
            self.original, SUPPORTED_CEILING, self.applied
        )
    }
}

fn plain_patch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^3\.0\.(\d+)$").expect("static pattern"))
}

fn decorated_patch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*v?3\.0\.(\d+)(?:[-+.][0-9A-Za-z.+-]*)?\s*$").expect("static pattern")
    })
}

fn exceeds_ceiling(patch: &str) -> bool {
    // Only digits reach here; a parse failure means the numeral overflowed u64
    patch.parse::<u64>().map_or(true, |n| n > CEILING_PATCH)
}

/// Downgrade a plain `3.0.<n>` version with `n > 3` to 3.0.3
///
/// Returns the override record when the document was changed. Swagger 2.x,
/// OpenAPI 3.1.x and documents without an `openapi` string pass through.
pub fn normalize(document: &mut Value) -> Option<VersionOverride> {
    let declared = document.get("openapi")?.as_str()?.to_string();
    let captures = plain_patch_pattern().captures(&declared)?;
    if !exceeds_ceiling(&captures[1]) {
        return None;
    }

    apply_override(document, declared, OverrideStage::Normalizer)
}

/// Whether a version rejected by the validator is a 3.0.x newer than 3.0.3
///
/// Broader than [`normalize`]: accepts surrounding whitespace, a leading `v`,
/// and pre-release or build suffixes.
pub fn is_retry_eligible(version: &str) -> bool {
    decorated_patch_pattern()
        .captures(version)
        .map(|captures| exceeds_ceiling(&captures[1]))
        .unwrap_or(false)
}

/// Rewrite the document's `openapi` field to the supported ceiling
pub fn apply_override(
    document: &mut Value,
    original: String,
    stage: OverrideStage,
) -> Option<VersionOverride> {
    let object = document.as_object_mut()?;
    object.insert(
        "openapi".to_string(),
        Value::String(SUPPORTED_CEILING.to_string()),
    );

    tracing::warn!(
        original = %original,
        applied = SUPPORTED_CEILING,
        ?stage,
        "Overriding unsupported OpenAPI version"
    );

    Some(VersionOverride {
        original,
        applied: SUPPORTED_CEILING.to_string(),
        stage,
    })
}
