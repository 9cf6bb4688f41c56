//! `DataObject` - the unit of data flowing between stages.
//!
//! A record is a pure state holder: payload, modification version, frame
//! identity, bounding geometry, its node in the spatial hierarchy, and a
//! per-device retain table. It knows nothing about ports or stages beyond a
//! non-owning `producer` id.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{DeviceId, RecordId, SpatialNodeId, StageId};
use crate::pipeline::spatial::{BoundingBox, SpatialHierarchy};
use chrono::{DateTime, Utc};
use glam::Vec3;
use std::collections::HashMap;

/// Content carried by a record. The pipeline never interprets it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Payload {
    #[default]
    Empty,
    Scalar(f64),
    Signal(Vec<f32>),
    Image {
        width: u32,
        height: u32,
        pixels: Vec<f32>,
    },
    Volume {
        dims: [u32; 3],
        voxels: Vec<f32>,
    },
}

impl Payload {
    /// Natural extent of the payload in its own frame.
    pub fn extent(&self) -> BoundingBox {
        match self {
            Payload::Empty | Payload::Scalar(_) => BoundingBox::default(),
            Payload::Signal(samples) => {
                BoundingBox::from_size(Vec3::new(samples.len() as f32, 0.0, 0.0))
            }
            Payload::Image { width, height, .. } => {
                BoundingBox::from_size(Vec3::new(*width as f32, *height as f32, 0.0))
            }
            Payload::Volume { dims, .. } => BoundingBox::from_size(Vec3::new(
                dims[0] as f32,
                dims[1] as f32,
                dims[2] as f32,
            )),
        }
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Payload::Scalar(v) => Some(*v),
            _ => None,
        }
    }
}

/// Result of a successful [`DataObject::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The device still holds `remaining` retains.
    Retained { remaining: u32 },
    /// The device's count reached zero and its backing storage was freed.
    Freed,
}

#[derive(Debug, Clone)]
pub struct DataObject {
    id: RecordId,
    payload: Payload,
    version: u64,
    is_dynamic: bool,
    frame_id: u64,
    is_last_frame: bool,
    retain_count: HashMap<DeviceId, u32>,
    bounding_box: BoundingBox,
    spatial_node: SpatialNodeId,
    producer: Option<StageId>,
    created_at: DateTime<Utc>,
}

impl DataObject {
    pub fn new(id: RecordId, payload: Payload, spatial_node: SpatialNodeId) -> Self {
        let bounding_box = payload.extent();
        Self {
            id,
            payload,
            version: 0,
            is_dynamic: false,
            frame_id: 0,
            is_last_frame: false,
            retain_count: HashMap::new(),
            bounding_box,
            spatial_node,
            producer: None,
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replace the content. Counts as one modification.
    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
        self.mark_modified();
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Bump the version; exactly once per content mutation.
    pub fn mark_modified(&mut self) {
        self.version += 1;
    }

    /// True if this record came from a pacing stream rather than a one-shot import.
    pub fn is_dynamic(&self) -> bool {
        self.is_dynamic
    }

    pub fn set_dynamic(&mut self, dynamic: bool) {
        self.is_dynamic = dynamic;
    }

    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    pub fn is_last_frame(&self) -> bool {
        self.is_last_frame
    }

    pub fn set_frame(&mut self, frame_id: u64, is_last_frame: bool) {
        self.frame_id = frame_id;
        self.is_last_frame = is_last_frame;
    }

    pub fn producer(&self) -> Option<StageId> {
        self.producer
    }

    pub fn set_producer(&mut self, producer: Option<StageId>) {
        self.producer = producer;
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    pub fn set_bounding_box(&mut self, bounding_box: BoundingBox) {
        self.bounding_box = bounding_box;
    }

    pub fn spatial_node(&self) -> SpatialNodeId {
        self.spatial_node
    }

    /// Bounding box placed by the transform of this record's own node.
    pub fn transformed_bounding_box(&self, hierarchy: &impl SpatialHierarchy) -> BoundingBox {
        let transform = hierarchy.lookup_transform(self.spatial_node);
        self.bounding_box.transformed(&transform)
    }

    // ── Device accounting ──

    pub fn retain(&mut self, device: DeviceId) {
        *self.retain_count.entry(device).or_insert(0) += 1;
        tracing::trace!("{:?} retained on {:?}", self.id, device);
    }

    /// Drop one retain held by `device`; frees that device's storage at zero.
    pub fn release(&mut self, device: DeviceId) -> PipelineResult<ReleaseOutcome> {
        let Some(count) = self.retain_count.get_mut(&device) else {
            return Err(PipelineError::InvalidRelease {
                record: self.id,
                device,
            });
        };
        *count -= 1;
        if *count > 0 {
            return Ok(ReleaseOutcome::Retained { remaining: *count });
        }
        self.retain_count.remove(&device);
        self.free(device);
        Ok(ReleaseOutcome::Freed)
    }

    fn free(&mut self, device: DeviceId) {
        // Device-local buffers are managed outside the core; only the trigger lives here.
        tracing::trace!("{:?} freed on {:?}", self.id, device);
    }

    /// Current retain count for `device` (0 if it never retained).
    pub fn retain_count(&self, device: DeviceId) -> u32 {
        self.retain_count.get(&device).copied().unwrap_or(0)
    }

    /// Whether any device still co-owns this record.
    pub fn is_retained(&self) -> bool {
        !self.retain_count.is_empty()
    }

    pub fn retaining_devices(&self) -> impl Iterator<Item = DeviceId> + '_ {
        self.retain_count.keys().copied()
    }
}
