//! Record arena with explicit ownership accounting.
//!
//! Two kinds of owners keep a record alive:
//! - **holders**: port slots, static input bindings and reader cursors. Each
//!   distinct place that references the record counts once.
//! - **devices**: per-device retains tracked on the record itself.
//!
//! A record is reclaimed (and its spatial node detached) the moment both
//! counts are zero. Reclamation is always an explicit call here, never a
//! `Drop` side effect.

use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::id::{DeviceId, RecordId};
use crate::pipeline::record::{DataObject, Payload, ReleaseOutcome};
use crate::pipeline::spatial::{SceneGraph, SpatialHierarchy};
use std::collections::HashMap;

#[derive(Debug)]
struct RecordEntry {
    record: DataObject,
    holders: u32,
}

/// Owner of every live record in a pipeline, plus the scene graph their
/// spatial nodes live in.
#[derive(Debug, Default)]
pub struct RecordStore {
    entries: HashMap<RecordId, RecordEntry>,
    next_id: u32,
    scene: SceneGraph,
    frees: u64,
    reclaimed: u64,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unowned record with a fresh spatial node.
    ///
    /// The record survives until its first holder or retain is dropped, or
    /// until [`RecordStore::discard`]; callers hand it to a port or static
    /// input straight away.
    pub fn create(&mut self, payload: Payload) -> PipelineResult<RecordId> {
        let id = RecordId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .ok_or(PipelineError::RecordIdsExhausted)?;
        let node = self.scene.attach();
        self.entries.insert(
            id,
            RecordEntry {
                record: DataObject::new(id, payload, node),
                holders: 0,
            },
        );
        Ok(id)
    }

    /// Reclaim `id` now if nothing holds or retains it. Returns whether it
    /// was removed.
    pub fn discard(&mut self, id: RecordId) -> PipelineResult<bool> {
        self.get(id)?;
        self.reclaim_if_unowned(id);
        Ok(!self.contains(id))
    }

    pub fn get(&self, id: RecordId) -> PipelineResult<&DataObject> {
        self.entries
            .get(&id)
            .map(|e| &e.record)
            .ok_or(PipelineError::UnknownRecord(id))
    }

    pub fn get_mut(&mut self, id: RecordId) -> PipelineResult<&mut DataObject> {
        self.entries
            .get_mut(&id)
            .map(|e| &mut e.record)
            .ok_or(PipelineError::UnknownRecord(id))
    }

    pub fn contains(&self, id: RecordId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    // ── Holders ──

    pub fn hold(&mut self, id: RecordId) {
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.holders += 1;
        }
    }

    pub fn unhold(&mut self, id: RecordId) {
        let Some(entry) = self.entries.get_mut(&id) else {
            return;
        };
        entry.holders = entry.holders.saturating_sub(1);
        self.reclaim_if_unowned(id);
    }

    pub fn holders(&self, id: RecordId) -> u32 {
        self.entries.get(&id).map(|e| e.holders).unwrap_or(0)
    }

    // ── Devices ──

    pub fn retain(&mut self, id: RecordId, device: DeviceId) -> PipelineResult<()> {
        self.get_mut(id)?.retain(device);
        Ok(())
    }

    pub fn release(&mut self, id: RecordId, device: DeviceId) -> PipelineResult<ReleaseOutcome> {
        let outcome = self.get_mut(id)?.release(device)?;
        if outcome == ReleaseOutcome::Freed {
            self.frees += 1;
            self.reclaim_if_unowned(id);
        }
        Ok(outcome)
    }

    fn reclaim_if_unowned(&mut self, id: RecordId) {
        let unowned = self
            .entries
            .get(&id)
            .is_some_and(|e| e.holders == 0 && !e.record.is_retained());
        if !unowned {
            return;
        }
        if let Some(entry) = self.entries.remove(&id) {
            self.scene.remove(entry.record.spatial_node());
            self.reclaimed += 1;
            tracing::trace!("Reclaimed {:?} (frame {})", id, entry.record.frame_id());
        }
    }

    /// Number of device-level frees triggered by balanced releases.
    pub fn free_count(&self) -> u64 {
        self.frees
    }

    /// Number of records removed from the arena.
    pub fn reclaimed_count(&self) -> u64 {
        self.reclaimed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_holder_reclaims() {
        let mut store = RecordStore::new();
        let id = store.create(Payload::Scalar(1.0)).unwrap();
        store.hold(id);
        store.hold(id);
        store.unhold(id);
        assert!(store.contains(id));
        store.unhold(id);
        assert!(!store.contains(id));
        assert_eq!(store.reclaimed_count(), 1);
        assert!(store.scene().is_empty());
    }

    #[test]
    fn test_device_keeps_record_alive_past_holders() {
        let mut store = RecordStore::new();
        let gpu = DeviceId(1);
        let id = store.create(Payload::Empty).unwrap();
        store.hold(id);
        store.retain(id, gpu).unwrap();
        store.unhold(id);
        assert!(store.contains(id));

        assert_eq!(store.release(id, gpu).unwrap(), ReleaseOutcome::Freed);
        assert_eq!(store.free_count(), 1);
        assert!(!store.contains(id));
    }

    #[test]
    fn test_release_free_keeps_held_record() {
        let mut store = RecordStore::new();
        let id = store.create(Payload::Empty).unwrap();
        store.hold(id);
        store.retain(id, DeviceId::HOST).unwrap();
        store.release(id, DeviceId::HOST).unwrap();
        assert_eq!(store.free_count(), 1);
        assert!(store.contains(id));
    }

    #[test]
    fn test_unmatched_release_is_rejected() {
        let mut store = RecordStore::new();
        let id = store.create(Payload::Empty).unwrap();
        store.hold(id);
        assert!(matches!(
            store.release(id, DeviceId(9)),
            Err(PipelineError::InvalidRelease { .. })
        ));
        assert_eq!(store.free_count(), 0);
    }

    #[test]
    fn test_ids_are_not_reused() {
        let mut store = RecordStore::new();
        let a = store.create(Payload::Empty).unwrap();
        store.hold(a);
        store.unhold(a);
        let b = store.create(Payload::Empty).unwrap();
        assert_ne!(a, b);
        assert!(matches!(store.get(a), Err(PipelineError::UnknownRecord(_))));
    }

    #[test]
    fn test_discard_reclaims_only_unowned() {
        let mut store = RecordStore::new();
        let loose = store.create(Payload::Empty).unwrap();
        let held = store.create(Payload::Empty).unwrap();
        store.hold(held);

        assert!(store.discard(loose).unwrap());
        assert!(!store.contains(loose));
        assert!(!store.discard(held).unwrap());
        assert!(store.contains(held));
        assert!(matches!(
            store.discard(loose),
            Err(PipelineError::UnknownRecord(_))
        ));
    }

    #[test]
    fn test_exhausted_ids_fail_instead_of_wrapping() {
        let mut store = RecordStore::new();
        store.next_id = u32::MAX;
        assert!(matches!(
            store.create(Payload::Empty),
            Err(PipelineError::RecordIdsExhausted)
        ));
        assert!(store.is_empty());
        assert!(store.scene().is_empty());
    }
}
