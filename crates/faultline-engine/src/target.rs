//! The capability contract between the scheduler and fault-able assets.
//!
//! The engine never touches asset physics.  Everything it needs from an
//! asset is expressed by the [`Faultable`] trait: report identity and group
//! membership, apply a fault of a requested kind, and lift a previously
//! applied fault.  Assets that cannot be faulted are rejected at registry
//! resolution, not at dispatch time.

use thiserror::Error;

use crate::time::SimTimeDelta;

/// Stable handle to an asset inside an [`AssetSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetId(pub(crate) usize);

impl TargetId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Tag for the concrete fault variant an asset actually realized.  May
/// differ from the requested kind; the asset decides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaultKindId(pub i32);

/// What a successful `create_fault` reports back.
#[derive(Debug, Clone, Copy)]
pub struct FaultOutcome {
    pub realized_kind: FaultKindId,
    /// Extra repair time the asset adds on top of the scheduled
    /// restoration duration (crew travel, switching, ...).
    pub mean_repair_time: SimTimeDelta,
}

/// Failure reported by an asset capability call.  Always fatal to the run:
/// a selected target that cannot be faulted or restored is a model
/// mismatch, not a retryable condition.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct CapabilityError(pub String);

/// Capability contract every managed asset must implement.
pub trait Faultable {
    /// Unique name, used by manual schedules and diagnostics.
    fn name(&self) -> &str;

    /// Whether this asset matches a host group query.  Query syntax is the
    /// host's business; the engine only forwards the string.
    fn in_group(&self, _query: &str) -> bool {
        false
    }

    /// Whether this asset can actually be faulted.  Group queries may
    /// match assets that merely carry the trait for enumeration; those are
    /// rejected at registry resolution, before anything is touched.
    fn supports_faulting(&self) -> bool {
        true
    }

    /// Whether the asset reports a secondary interruption count.  The
    /// engine checks the first resolved asset to decide if secondary
    /// differential counting is on for the whole run.
    fn supports_secondary_interruption(&self) -> bool {
        false
    }

    /// Apply a fault of the requested kind.
    fn create_fault(&mut self, requested_kind: &str) -> Result<FaultOutcome, CapabilityError>;

    /// Lift the previously applied fault.  `realized_kind` is `None` when
    /// the fault was applied outside this engine and no realized kind was
    /// recorded.
    fn fix_fault(&mut self, realized_kind: Option<FaultKindId>) -> Result<(), CapabilityError>;
}

/// The engine's view of the host's asset population.
///
/// Owns trait objects for the run; hands out stable [`TargetId`]s that
/// survive for the whole simulation (assets are never removed).
pub struct AssetSet {
    assets: Vec<Box<dyn Faultable>>,
}

impl AssetSet {
    pub fn new(assets: Vec<Box<dyn Faultable>>) -> AssetSet {
        AssetSet { assets }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn get(&self, id: TargetId) -> &dyn Faultable {
        &*self.assets[id.0]
    }

    pub fn get_mut(&mut self, id: TargetId) -> &mut dyn Faultable {
        &mut *self.assets[id.0]
    }

    pub fn name_of(&self, id: TargetId) -> &str {
        self.assets[id.0].name()
    }

    pub fn find_by_name(&self, name: &str) -> Option<TargetId> {
        self.assets
            .iter()
            .position(|a| a.name() == name)
            .map(TargetId)
    }

    /// All assets matching a group query, in asset order.
    pub fn find_group(&self, query: &str) -> Vec<TargetId> {
        self.assets
            .iter()
            .enumerate()
            .filter(|(_, a)| a.in_group(query))
            .map(|(i, _)| TargetId(i))
            .collect()
    }
}
