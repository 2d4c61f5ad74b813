//! Wire types for the Brain Mapper HTTP API.
//!
//! Field names follow the backend's JSON (mostly camelCase); Rust-side names
//! are snake_case with serde renames.

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// AUTH
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Login payload. `Debug` never prints the password.
#[derive(Clone, Serialize, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub passwd: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, passwd: impl Into<String>) -> Self {
        Self { email: email.into(), passwd: passwd.into() }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("passwd", &"[REDACTED]")
            .finish()
    }
}

/// Self-registration payload for `POST /auth/register`.
#[derive(Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub passwd: String,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("passwd", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RoleRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub role: RoleRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub user: UserProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggedInResponse {
    #[serde(rename = "loggedIn")]
    pub logged_in: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleResponse {
    pub role: String,
}

// =============================================================================
// SCENES
// =============================================================================

/// Upload target plus the public URL the object will be served from.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PresignedUrl {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(rename = "liveURL")]
    pub live_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScenePresignedUrls {
    pub map_urls: PresignedUrl,
    pub img_urls: PresignedUrl,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewScene {
    pub name: String,
    pub image_url: String,
    pub map_url: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: i64,
    pub name: String,
    pub image_url: String,
    pub map_url: String,
    pub uploaded_on: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenesResponse {
    pub scenes: Vec<Scene>,
}

// =============================================================================
// INFERENCES
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InferencePresignedUrls {
    #[serde(rename = "uploadURL")]
    pub upload_url: String,
    #[serde(rename = "liveURL")]
    pub live_url: String,
    pub img_object_key: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    pub name: String,
    pub img_url: String,
    pub img_object_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    pub generated_img_url: String,
}

// =============================================================================
// MODELS
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Model {
    pub id: i64,
    pub name: String,
    pub version: serde_json::Value,
    pub description: Option<String>,
    pub model_type: Option<String>,
}

impl Model {
    /// Display name, e.g. `"yolo (v2)"`.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.version {
            serde_json::Value::String(v) => format!("{} (v{v})", self.name),
            other => format!("{} (v{other})", self.name),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelsResponse {
    #[serde(default)]
    pub success: bool,
    pub models: Option<Vec<Model>>,
}

// =============================================================================
// ADMIN
// =============================================================================

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RoleInfo {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    pub id: i64,
    pub name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub role: RoleInfo,
    #[serde(default)]
    pub inference_count: i64,
    pub last_login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub success: bool,
    pub users: Option<Vec<AdminUser>>,
}

/// Admin-created account for `POST /auth/addUser`.
#[derive(Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: String,
    pub last_name: String,
    pub email: String,
    pub passwd: String,
    pub role_id: i64,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("email", &self.email)
            .field("role_id", &self.role_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RolesResponse {
    #[serde(default)]
    pub success: bool,
    pub roles: Option<Vec<RoleInfo>>,
}

/// Generic `{ success, message }` envelope used by mutating admin calls.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct StatusMessage {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

// =============================================================================
// PROFILE
// =============================================================================

/// One of the caller's own inferences, as listed under `/users`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRecord {
    pub id: i64,
    pub name: String,
    pub result: Option<String>,
    pub base_image_url: String,
    pub generated_image_url: String,
    pub metadata_url: Option<String>,
    pub created_on: String,
    pub model_id: Option<i64>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: i64,
    pub login_at: String,
    pub logout_at: Option<String>,
    pub ip_address: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub total_analyses: u64,
    pub analyses_this_week: u64,
    pub images_processed: u64,
    pub last_login: Option<String>,
    pub active_days_this_month: u64,
    pub current_login_streak: u64,
}

/// `GET /users/stats`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub summary: StatsSummary,
    #[serde(default)]
    pub recent_analyses: Vec<InferenceRecord>,
    #[serde(default)]
    pub recent_sessions: Vec<SessionRecord>,
}

/// Page metadata. `/users/inferences` and `/audit/logs` name two fields
/// differently; both spellings are accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    #[serde(alias = "per_page")]
    pub limit: u32,
    pub total: u64,
    #[serde(alias = "pages")]
    pub total_pages: u32,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InferencePage {
    pub inferences: Vec<InferenceRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InferenceLookup {
    pub inference: InferenceRecord,
}

/// `PUT /users/update-profile` payload.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub name: String,
    pub last_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UpdatedProfile {
    pub id: i64,
    pub name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProfileUpdateResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
    pub user: Option<UpdatedProfile>,
}

/// `PUT /users/change-password` payload. `Debug` never prints either password.
#[derive(Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

impl fmt::Debug for PasswordChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordChange").finish_non_exhaustive()
    }
}

// =============================================================================
// INFERENCE METADATA
// =============================================================================

/// Box corners, either `[x1, y1, x2, y2]` or `{x1, y1, x2, y2}`.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum BoxCoords {
    Corners([f64; 4]),
    Named { x1: f64, y1: f64, x2: f64, y2: f64 },
}

impl BoxCoords {
    #[must_use]
    pub fn corners(self) -> [f64; 4] {
        match self {
            Self::Corners(c) => c,
            Self::Named { x1, y1, x2, y2 } => [x1, y1, x2, y2],
        }
    }
}

/// One model detection, as written by the inference worker.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Detection {
    pub class_id: i64,
    pub confidence: f64,
    /// Pixel coordinates in the original image.
    pub bbox: Option<BoxCoords>,
    /// 0..1 coordinates, when the model provides them.
    pub bbox_normalized: Option<BoxCoords>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ImageInfo {
    /// `[width, height]` in pixels.
    pub original_size: Option<[f64; 2]>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct InferenceMetadata {
    #[serde(default)]
    pub detections: Vec<Detection>,
    pub image_info: Option<ImageInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataResponse {
    #[serde(default)]
    pub success: bool,
    pub metadata: Option<InferenceMetadata>,
    pub error: Option<String>,
}

// =============================================================================
// METRICS + AUDIT
// =============================================================================

/// Bucket size for `/metrics/time-series`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Grouping {
    #[default]
    Day,
    Week,
    Month,
}

impl Grouping {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

impl std::str::FromStr for Grouping {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "day" => Ok(Self::Day),
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            other => Err(format!("unknown grouping '{other}' (expected day, week, or month)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub details: serde_json::Value,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity_type: entity_type.into(),
            entity_id: None,
            details: serde_json::Value::Object(serde_json::Map::new()),
        }
    }

    #[must_use]
    pub fn entity_id(mut self, id: i64) -> Self {
        self.entity_id = Some(id);
        self
    }

    #[must_use]
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Stored audit entry, as returned by the admin-only readers.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogRecord {
    pub id: i64,
    pub user_id: Option<i64>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<i64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogPage {
    pub audit_logs: Vec<AuditLogRecord>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLogLookup {
    pub audit_log: AuditLogRecord,
}

/// Filters for `GET /audit/logs`. Unset fields are left to the server default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditLogQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    /// Substring match on the action name.
    pub action: Option<String>,
    pub entity_type: Option<String>,
    pub user_id: Option<i64>,
}
