//! Identity types for the pipeline system.
//!
//! All IDs are newtypes over `u32` that serve as keys into their respective
//! arenas (`Pipeline::stages`, `Pipeline::ports`, `RecordStore`, `SceneGraph`).

use std::fmt;

/// Index into `Pipeline::stages`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct StageId(pub u32);

impl StageId {
    pub const INVALID: StageId = StageId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "StageId(INVALID)")
        } else {
            write!(f, "StageId({})", self.0)
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index into `Pipeline::ports`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PortId(pub u32);

impl PortId {
    pub const INVALID: PortId = PortId(u32::MAX);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "PortId(INVALID)")
        } else {
            write!(f, "PortId({})", self.0)
        }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Key into the `RecordStore`. Never reused within one pipeline, so a
/// `(RecordId, version)` pair identifies one exact piece of content.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u32);

impl RecordId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Opaque execution-context handle (a CPU or GPU-like device).
///
/// The pipeline never dispatches through it; it is only a key for
/// retain/release accounting.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u32);

impl DeviceId {
    /// Conventional handle for the host CPU.
    pub const HOST: DeviceId = DeviceId(0);
}

impl fmt::Debug for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DeviceId({})", self.0)
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Index into `Pipeline::readers`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReaderId(pub u32);

impl ReaderId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for ReaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReaderId({})", self.0)
    }
}

/// Index into `SceneGraph::nodes`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpatialNodeId(pub u32);

impl SpatialNodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for SpatialNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpatialNodeId({})", self.0)
    }
}

/// Who is reading from a port: an input slot of a stage, or an external reader.
///
/// Ports keep their per-consumer read position keyed on this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ConsumerId {
    Stage { stage: StageId, input: usize },
    Reader(ReaderId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_stage_id() {
        let id = StageId(42);
        assert!(id.is_valid());
        assert_eq!(id.index(), 42);
        assert!(!StageId::INVALID.is_valid());
        assert_eq!(format!("{:?}", StageId::INVALID), "StageId(INVALID)");
    }

    #[test]
    fn test_port_id() {
        let id = PortId(5);
        assert!(id.is_valid());
        assert_eq!(id.index(), 5);
        assert!(!PortId::INVALID.is_valid());
    }

    #[test]
    fn test_consumer_id_keys_distinct_inputs() {
        let mut set = HashSet::new();
        set.insert(ConsumerId::Stage {
            stage: StageId(1),
            input: 0,
        });
        set.insert(ConsumerId::Stage {
            stage: StageId(1),
            input: 1,
        });
        set.insert(ConsumerId::Reader(ReaderId(0)));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_device_id_display() {
        assert_eq!(DeviceId::HOST.to_string(), "DeviceId(0)");
        assert_ne!(DeviceId(1), DeviceId::HOST);
    }
}
