//! Inference detection metadata: fetch cache and box post-processing.
//!
//! The inference worker writes one metadata document per inference
//! (detections plus original image size). Views fetch it once per id, then
//! turn detections into normalized boxes for overlay and summarize them.
//! Results are cached per inference id until cleared or force-refreshed.

#[cfg(test)]
#[path = "metadata_test.rs"]
mod metadata_test;

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

use serde::Serialize;

use crate::net::client::{ApiClient, ApiError};
use crate::net::types::{BoxCoords, Detection, InferenceMetadata, MetadataResponse};

pub const INFERENCE_METADATA_PATH: &str = "/inferences/getInferenceMetadata";

/// Detection classes the model is trained on: id, label, overlay color.
pub const DETECTION_CLASSES: [(i64, &str, &str); 5] = [
    (0, "C1 Boton", "#6B7280"),
    (1, "C4 BrightRed", "#EF4444"),
    (2, "C5 DarkRed", "#991B1B"),
    (3, "C2 Green", "#22C55E"),
    (4, "C3 Orange (Red dot)", "#F59E0B"),
];

const FALLBACK_COLOR: &str = "#6366F1";
const MIN_BOX_EXTENT: f64 = 1e-6;

fn metadata_path(inference_id: i64) -> String {
    format!("{INFERENCE_METADATA_PATH}/{inference_id}")
}

#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("metadata unavailable: {0}")]
    Missing(String),
}

// =============================================================================
// BOXES
// =============================================================================

/// Box in 0..1 image coordinates.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct NormalizedBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl From<BoxCoords> for NormalizedBox {
    fn from(coords: BoxCoords) -> Self {
        let [x1, y1, x2, y2] = coords.corners();
        Self { x1, y1, x2, y2 }
    }
}

/// A detection ready for overlay.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DetectedBox {
    /// `<inference id>-<detection index>`.
    pub id: String,
    pub class_id: i64,
    pub label: String,
    pub confidence: f64,
    pub bbox_normalized: Option<NormalizedBox>,
    pub bbox_original: Option<BoxCoords>,
    pub color: &'static str,
    pub original_size: Option<[f64; 2]>,
}

#[must_use]
pub fn class_label(class_id: i64) -> String {
    DETECTION_CLASSES
        .iter()
        .find(|(id, _, _)| *id == class_id)
        .map_or_else(|| format!("Clase {class_id}"), |(_, label, _)| (*label).to_owned())
}

#[must_use]
pub fn class_color(class_id: i64) -> &'static str {
    DETECTION_CLASSES
        .iter()
        .find(|(id, _, _)| *id == class_id)
        .map_or(FALLBACK_COLOR, |(_, _, color)| *color)
}

/// Scale a pixel box by `[width, height]`, clamp to 0..1, and order the
/// corners. Degenerate boxes and non-positive image sizes give `None`.
#[must_use]
pub fn normalize_box(bbox: BoxCoords, image_size: [f64; 2]) -> Option<NormalizedBox> {
    let [width, height] = image_size;
    if !(width > 0.0 && height > 0.0) {
        return None;
    }
    let [x1, y1, x2, y2] = bbox.corners();
    let scale = |v: f64, extent: f64| (v / extent).clamp(0.0, 1.0);
    let (nx1, nx2) = (scale(x1, width), scale(x2, width));
    let (ny1, ny2) = (scale(y1, height), scale(y2, height));

    let (x1, x2) = if nx1 > nx2 { (nx2, nx1) } else { (nx1, nx2) };
    let (y1, y2) = if ny1 > ny2 { (ny2, ny1) } else { (ny1, ny2) };
    if x2 - x1 < MIN_BOX_EXTENT || y2 - y1 < MIN_BOX_EXTENT {
        return None;
    }
    Some(NormalizedBox { x1, y1, x2, y2 })
}

/// Overlay boxes for every detection. Model-provided normalized coordinates
/// win; otherwise pixel boxes are normalized against the original size.
#[must_use]
pub fn detected_boxes(inference_id: i64, metadata: &InferenceMetadata) -> Vec<DetectedBox> {
    let original_size = metadata.image_info.as_ref().and_then(|info| info.original_size);
    metadata
        .detections
        .iter()
        .enumerate()
        .map(|(index, detection)| {
            let bbox_normalized = match (detection.bbox_normalized, detection.bbox, original_size) {
                (Some(normalized), _, _) => Some(normalized.into()),
                (None, Some(bbox), Some(size)) => normalize_box(bbox, size),
                _ => None,
            };
            DetectedBox {
                id: format!("{inference_id}-{index}"),
                class_id: detection.class_id,
                label: class_label(detection.class_id),
                confidence: detection.confidence,
                bbox_normalized,
                bbox_original: detection.bbox,
                color: class_color(detection.class_id),
                original_size,
            }
        })
        .collect()
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_confidence(detections: &[Detection]) -> Option<f64> {
    if detections.is_empty() {
        return None;
    }
    let total: f64 = detections.iter().map(|d| d.confidence).sum();
    Some(total / detections.len() as f64)
}

/// Per-label counts over the known classes (zero included). Labels outside
/// the known classes are not counted. `None` when there are no boxes.
#[must_use]
pub fn class_count_summary(boxes: &[DetectedBox]) -> Option<BTreeMap<String, u32>> {
    if boxes.is_empty() {
        return None;
    }
    let mut counts: BTreeMap<String, u32> =
        DETECTION_CLASSES.iter().map(|(_, label, _)| ((*label).to_owned(), 0)).collect();
    for detected in boxes {
        if let Some(count) = counts.get_mut(&detected.label) {
            *count += 1;
        }
    }
    Some(counts)
}

// =============================================================================
// STORE
// =============================================================================

pub struct MetadataStore {
    api: Rc<ApiClient>,
    cache: RefCell<HashMap<i64, InferenceMetadata>>,
    loaded: RefCell<HashSet<i64>>,
    confidence: RefCell<HashMap<i64, Option<f64>>>,
}

impl MetadataStore {
    #[must_use]
    pub fn new(api: Rc<ApiClient>) -> Self {
        Self {
            api,
            cache: RefCell::new(HashMap::new()),
            loaded: RefCell::new(HashSet::new()),
            confidence: RefCell::new(HashMap::new()),
        }
    }

    /// Metadata for one inference, from cache unless `force_refresh`.
    ///
    /// A failed fetch still marks the id as loaded, so callers polling
    /// [`MetadataStore::is_loaded`] stop retrying.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::Api`] when the request fails and
    /// [`MetadataError::Missing`] when the server reports no metadata.
    pub async fn fetch(&self, inference_id: i64, force_refresh: bool) -> Result<InferenceMetadata, MetadataError> {
        if !force_refresh {
            let cached = self.cache.borrow().get(&inference_id).cloned();
            if let Some(metadata) = cached {
                self.remember_confidence(inference_id, &metadata);
                return Ok(metadata);
            }
        }

        let fetched = self.api.get_json::<MetadataResponse>(&metadata_path(inference_id)).await;
        self.loaded.borrow_mut().insert(inference_id);

        let metadata = match fetched {
            Ok(MetadataResponse { success: true, metadata: Some(metadata), .. }) => metadata,
            Ok(body) => {
                let reason = body.error.unwrap_or_else(|| "Failed to load metadata".to_owned());
                tracing::warn!(inference_id, %reason, "inference metadata missing");
                return Err(MetadataError::Missing(reason));
            }
            Err(e) => {
                tracing::warn!(inference_id, error = %e, "inference metadata fetch failed");
                return Err(e.into());
            }
        };

        self.cache.borrow_mut().insert(inference_id, metadata.clone());
        self.remember_confidence(inference_id, &metadata);
        tracing::debug!(inference_id, detections = metadata.detections.len(), "inference metadata loaded");
        Ok(metadata)
    }

    /// Average detection confidence computed by the last fetch.
    #[must_use]
    pub fn cached_confidence(&self, inference_id: i64) -> Option<f64> {
        self.confidence.borrow().get(&inference_id).copied().flatten()
    }

    /// A fetch for this id has finished, successfully or not.
    #[must_use]
    pub fn is_loaded(&self, inference_id: i64) -> bool {
        self.loaded.borrow().contains(&inference_id)
    }

    /// Forget one inference, or everything when `inference_id` is `None`.
    pub fn clear(&self, inference_id: Option<i64>) {
        match inference_id {
            Some(id) => {
                self.cache.borrow_mut().remove(&id);
                self.loaded.borrow_mut().remove(&id);
                self.confidence.borrow_mut().remove(&id);
            }
            None => {
                self.cache.borrow_mut().clear();
                self.loaded.borrow_mut().clear();
                self.confidence.borrow_mut().clear();
            }
        }
    }

    fn remember_confidence(&self, inference_id: i64, metadata: &InferenceMetadata) {
        self.confidence
            .borrow_mut()
            .insert(inference_id, average_confidence(&metadata.detections));
    }
}
