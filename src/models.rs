use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Hard cap eBay places on listing titles; anything longer is cut down to
/// exactly this many characters before the record is considered final.
pub const TITLE_MAX_CHARS: usize = 80;

/// Smallest postage weight the marketplace will quote, in kilograms.
pub const MIN_POSTAGE_WEIGHT_KG: f64 = 0.1;

/// Weight substituted when the estimator output cannot be parsed at all.
pub const FALLBACK_POSTAGE_WEIGHT_KG: f64 = 0.5;

/// The structured output of one generation run. Every field is always
/// populated; degradation is reported out of band via [`FieldReport`] instead
/// of error text smuggled into the content.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub description: String,
    pub category: String,
    pub postage_weight: f64,
    pub suggested_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingField {
    Title,
    Description,
    Category,
    PostageWeight,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedCause {
    Upstream,
    Timeout,
}

/// Outcome of a single field generator, attached to the response so callers
/// can tell a clean generation from a substituted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FieldStatus {
    Generated,
    Degraded { cause: DegradedCause, reason: String },
    WeightClamped { raw: f64 },
    WeightFallback { raw: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldReport {
    pub field: ListingField,
    #[serde(flatten)]
    pub status: FieldStatus,
}

impl FieldReport {
    pub fn generated(field: ListingField) -> Self {
        Self {
            field,
            status: FieldStatus::Generated,
        }
    }
}

/// One product photo as submitted by the client: base64 bytes plus the
/// content type used both for the inline analysis payload and the upload.
#[derive(Debug, Clone, Deserialize)]
pub struct ImagePayload {
    pub data: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
}

fn default_content_type() -> String {
    "image/jpeg".to_string()
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub images: Vec<ImagePayload>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub record: ListingRecord,
    pub fields: Vec<FieldReport>,
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub postage_weight: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub images: Vec<ImagePayload>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub urls: Vec<String>,
    pub skipped: usize,
}

#[derive(Debug, Deserialize)]
pub struct ExchangeRequest {
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}
