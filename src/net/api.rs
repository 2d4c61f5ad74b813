//! Typed wrappers for the platform's resource endpoints.
//!
//! Reads go straight through the shared `ApiClient`; anything that changes
//! server state goes through the `CsrfGuard`. Presigned object-store uploads
//! use `ApiClient::send_external` so the session token never leaves the API
//! origin.
//!
//! ERROR HANDLING
//! ==============
//! Every call returns `ApiError`: no response is `Transport`, a non-2xx
//! (including a rejected upload) is `Status`, and an unexpected body is
//! `Decode`. The audit log is the exception: it is best effort and only logs.

#![allow(clippy::missing_errors_doc)]

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::rc::Rc;

use serde::de::DeserializeOwned;

use super::client::{ApiClient, ApiError, decode};
use super::csrf::CsrfGuard;
use super::transport::{HttpRequest, HttpResponse};
use super::types::{
    AdminUser, AuditEntry, AuditLogLookup, AuditLogPage, AuditLogQuery, AuditLogRecord, Grouping, InferenceLookup,
    InferencePage, InferencePresignedUrls, InferenceRecord, InferenceRequest, InferenceResult, Model, ModelsResponse,
    NewScene, NewUser, PasswordChange, ProfileUpdate, ProfileUpdateResponse, RoleInfo, RolesResponse, Scene,
    ScenePresignedUrls, ScenesResponse, StatusMessage, UserStats, UsersResponse,
};

pub const SCENE_PRESIGN_PATH: &str = "/scenes/getScenePresignedUrls";
pub const ADD_SCENE_PATH: &str = "/scenes/addScene";
pub const USER_SCENES_PATH: &str = "/scenes/getUserScenes";
pub const INFERENCE_PRESIGN_PATH: &str = "/inferences/getBaseImgPresignedUrls";
pub const GENERATE_INFERENCE_PATH: &str = "/inferences/generateInference";
pub const MODELS_PATH: &str = "/models/";
pub const ADMIN_USERS_PATH: &str = "/admin/users";
pub const ADMIN_ROLES_PATH: &str = "/admin/roles";
pub const ADD_USER_PATH: &str = "/auth/addUser";
pub const CLASS_DETECTIONS_PATH: &str = "/metrics/class-detections";
pub const TIME_SERIES_PATH: &str = "/metrics/time-series";
pub const METRICS_SUMMARY_PATH: &str = "/metrics/summary";
pub const AUDIT_LOG_PATH: &str = "/audit/log";
pub const AUDIT_LOGS_PATH: &str = "/audit/logs";
pub const MY_STATS_PATH: &str = "/users/stats";
pub const MY_INFERENCES_PATH: &str = "/users/inferences";
pub const UPDATE_PROFILE_PATH: &str = "/users/update-profile";
pub const CHANGE_PASSWORD_PATH: &str = "/users/change-password";
pub const DELETE_ACCOUNT_PATH: &str = "/users/delete-account";

fn delete_scene_path(scene_id: i64) -> String {
    format!("/scenes/deleteScene/{scene_id}")
}

fn user_path(user_id: i64) -> String {
    format!("{ADMIN_USERS_PATH}/{user_id}")
}

fn user_role_path(user_id: i64) -> String {
    format!("{ADMIN_USERS_PATH}/{user_id}/role")
}

fn user_stats_path(user_id: i64) -> String {
    format!("{ADMIN_USERS_PATH}/{user_id}/stats")
}

fn time_series_path(grouping: Grouping, days: u32) -> String {
    format!("{TIME_SERIES_PATH}?grouping={}&days={days}", grouping.as_str())
}

fn my_inferences_path(page: u32, limit: u32) -> String {
    format!("{MY_INFERENCES_PATH}?page={page}&limit={limit}")
}

fn my_inference_path(inference_id: i64) -> String {
    format!("{MY_INFERENCES_PATH}?id={inference_id}")
}

fn audit_log_path(log_id: i64) -> String {
    format!("{AUDIT_LOGS_PATH}/{log_id}")
}

fn audit_logs_path(query: &AuditLogQuery) -> String {
    let mut params = Vec::new();
    if let Some(page) = query.page {
        params.push(format!("page={page}"));
    }
    if let Some(per_page) = query.per_page {
        params.push(format!("per_page={per_page}"));
    }
    if let Some(action) = &query.action {
        params.push(format!("action={}", urlencoding::encode(action)));
    }
    if let Some(entity_type) = &query.entity_type {
        params.push(format!("entityType={}", urlencoding::encode(entity_type)));
    }
    if let Some(user_id) = query.user_id {
        params.push(format!("userId={user_id}"));
    }
    if params.is_empty() {
        AUDIT_LOGS_PATH.to_owned()
    } else {
        format!("{AUDIT_LOGS_PATH}?{}", params.join("&"))
    }
}

/// A file to push to a presigned URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: impl Into<String>, content_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self { file_name: file_name.into(), content_type: content_type.into(), data }
    }
}

/// Guess an image MIME type from the file extension.
#[must_use]
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = file_name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("tif" | "tiff") => "image/tiff",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

fn checked(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status { status: response.status, body: response.body })
    }
}

// =============================================================================
// API
// =============================================================================

pub struct PlatformApi {
    api: Rc<ApiClient>,
    csrf: Rc<CsrfGuard>,
}

impl PlatformApi {
    #[must_use]
    pub fn new(api: Rc<ApiClient>, csrf: Rc<CsrfGuard>) -> Self {
        Self { api, csrf }
    }

    async fn secured<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T, ApiError> {
        let response = checked(self.csrf.secure_request(request).await?)?;
        decode(&response)
    }

    async fn upload(&self, upload_url: &str, upload: &Upload) -> Result<(), ApiError> {
        let request = HttpRequest::put(upload_url).bytes(upload.content_type.clone(), upload.data.clone());
        let response = self.api.send_external(request).await?;
        if !response.is_success() {
            tracing::warn!(status = response.status, file = %upload.file_name, "presigned upload rejected");
        }
        checked(response).map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Scenes
    // -------------------------------------------------------------------------

    pub async fn scene_presigned_urls(&self) -> Result<ScenePresignedUrls, ApiError> {
        self.api.get_json(SCENE_PRESIGN_PATH).await
    }

    pub async fn add_scene(&self, scene: &NewScene) -> Result<StatusMessage, ApiError> {
        let body = serde_json::to_value(scene).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.secured(HttpRequest::post(ADD_SCENE_PATH).json(body)).await
    }

    pub async fn user_scenes(&self) -> Result<Vec<Scene>, ApiError> {
        let body: ScenesResponse = self.api.get_json(USER_SCENES_PATH).await?;
        Ok(body.scenes)
    }

    pub async fn delete_scene(&self, scene_id: i64) -> Result<StatusMessage, ApiError> {
        self.secured(HttpRequest::delete(delete_scene_path(scene_id))).await
    }

    /// Presign, upload image and map, then register the scene.
    pub async fn upload_scene(&self, name: &str, image: &Upload, map: &Upload) -> Result<NewScene, ApiError> {
        let urls = self.scene_presigned_urls().await?;
        self.upload(&urls.img_urls.upload_url, image).await?;
        self.upload(&urls.map_urls.upload_url, map).await?;

        let scene = NewScene {
            name: name.to_owned(),
            image_url: urls.img_urls.live_url,
            map_url: urls.map_urls.live_url,
        };
        self.add_scene(&scene).await?;
        tracing::info!(scene = %scene.name, "scene uploaded");
        Ok(scene)
    }

    // -------------------------------------------------------------------------
    // Inferences
    // -------------------------------------------------------------------------

    pub async fn inference_presigned_urls(&self) -> Result<InferencePresignedUrls, ApiError> {
        self.api.get_json(INFERENCE_PRESIGN_PATH).await
    }

    pub async fn generate_inference(&self, request: &InferenceRequest) -> Result<InferenceResult, ApiError> {
        let body = serde_json::to_value(request).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.secured(HttpRequest::post(GENERATE_INFERENCE_PATH).json(body)).await
    }

    /// Presign, upload the base image, then ask the backend to run the model.
    pub async fn run_inference(&self, image: &Upload) -> Result<InferenceResult, ApiError> {
        let urls = self.inference_presigned_urls().await?;
        self.upload(&urls.upload_url, image).await?;
        let request = InferenceRequest {
            name: image.file_name.clone(),
            img_url: urls.live_url,
            img_object_key: urls.img_object_key,
        };
        self.generate_inference(&request).await
    }

    // -------------------------------------------------------------------------
    // Models + admin
    // -------------------------------------------------------------------------

    pub async fn models(&self) -> Result<Vec<Model>, ApiError> {
        let body: ModelsResponse = self.api.get_json(MODELS_PATH).await?;
        Ok(body.models.unwrap_or_default())
    }

    pub async fn users(&self) -> Result<Vec<AdminUser>, ApiError> {
        let body: UsersResponse = self.api.get_json(ADMIN_USERS_PATH).await?;
        Ok(body.users.unwrap_or_default())
    }

    pub async fn roles(&self) -> Result<Vec<RoleInfo>, ApiError> {
        let body: RolesResponse = self.api.get_json(ADMIN_ROLES_PATH).await?;
        Ok(body.roles.unwrap_or_default())
    }

    pub async fn set_user_role(&self, user_id: i64, role_id: i64) -> Result<StatusMessage, ApiError> {
        let request = HttpRequest::put(user_role_path(user_id)).json(serde_json::json!({ "roleId": role_id }));
        self.secured(request).await
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<StatusMessage, ApiError> {
        self.secured(HttpRequest::delete(user_path(user_id))).await
    }

    pub async fn user_stats(&self, user_id: i64) -> Result<serde_json::Value, ApiError> {
        self.api.get_json(&user_stats_path(user_id)).await
    }

    pub async fn add_user(&self, user: &NewUser) -> Result<StatusMessage, ApiError> {
        let body = serde_json::to_value(user).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.secured(HttpRequest::post(ADD_USER_PATH).json(body)).await
    }

    // -------------------------------------------------------------------------
    // Own profile
    // -------------------------------------------------------------------------

    pub async fn my_stats(&self) -> Result<UserStats, ApiError> {
        self.api.get_json(MY_STATS_PATH).await
    }

    /// One page of the caller's inferences, newest first. The server caps
    /// `limit` at 100.
    pub async fn my_inferences(&self, page: u32, limit: u32) -> Result<InferencePage, ApiError> {
        self.api.get_json(&my_inferences_path(page.max(1), limit.max(1))).await
    }

    pub async fn my_inference(&self, inference_id: i64) -> Result<InferenceRecord, ApiError> {
        let body: InferenceLookup = self.api.get_json(&my_inference_path(inference_id)).await?;
        Ok(body.inference)
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<ProfileUpdateResponse, ApiError> {
        let body = serde_json::to_value(update).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.secured(HttpRequest::put(UPDATE_PROFILE_PATH).json(body)).await
    }

    /// A wrong current password comes back as `ApiError::Status` 400.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<StatusMessage, ApiError> {
        let body = serde_json::to_value(change).map_err(|e| ApiError::Decode(e.to_string()))?;
        self.secured(HttpRequest::put(CHANGE_PASSWORD_PATH).json(body)).await
    }

    /// Permanently delete the caller's account. SUPERADMIN accounts get a 403.
    pub async fn delete_account(&self) -> Result<StatusMessage, ApiError> {
        self.secured(HttpRequest::delete(DELETE_ACCOUNT_PATH)).await
    }

    // -------------------------------------------------------------------------
    // Metrics + audit
    // -------------------------------------------------------------------------

    pub async fn class_detections(&self) -> Result<serde_json::Value, ApiError> {
        self.api.get_json(CLASS_DETECTIONS_PATH).await
    }

    pub async fn time_series(&self, grouping: Grouping, days: u32) -> Result<serde_json::Value, ApiError> {
        self.api.get_json(&time_series_path(grouping, days)).await
    }

    pub async fn metrics_summary(&self) -> Result<serde_json::Value, ApiError> {
        self.api.get_json(METRICS_SUMMARY_PATH).await
    }

    /// Admin only.
    pub async fn audit_logs(&self, query: &AuditLogQuery) -> Result<AuditLogPage, ApiError> {
        self.api.get_json(&audit_logs_path(query)).await
    }

    pub async fn audit_log(&self, log_id: i64) -> Result<AuditLogRecord, ApiError> {
        let body: AuditLogLookup = self.api.get_json(&audit_log_path(log_id)).await?;
        Ok(body.audit_log)
    }

    /// Record an audit entry. Failures are logged and otherwise ignored.
    pub async fn log_audit(&self, entry: &AuditEntry) {
        let body = match serde_json::to_value(entry) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode audit entry");
                return;
            }
        };
        match self.csrf.secure_request(HttpRequest::post(AUDIT_LOG_PATH).json(body)).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => tracing::warn!(status = response.status, action = %entry.action, "audit log rejected"),
            Err(e) => tracing::warn!(error = %e, action = %entry.action, "failed to log audit action"),
        }
    }
}
