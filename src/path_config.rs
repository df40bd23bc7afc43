//! The time-sliced kinematic graph: `T` free slices plus a `k_order`-deep
//! pinned prefix, flattened into one decision-vector layout.

pub use crate::world::{FrameId, JointKind};
use crate::errors::{EngineError, EngineResult};
use crate::switch::Switch;
use crate::world::World;
use std::collections::HashMap;
use std::ops::Range;

/// `PathConfig` owns the static [`World`] blueprint plus the per-slice
/// structural edits ([`Switch`]es) applied on top of it, and precomputes the
/// decision-vector column layout every free slice's free frames occupy.
///
/// Slices are addressed two ways: a signed index `s` in `-k_order..T` (the
/// vocabulary objectives are authored against, where `s = 0` is the first
/// free slice and negative indices are the pinned prefix), and an internal
/// `usize` index in `0..T+k_order` used for storage. [`PathConfig::to_internal`]
/// converts between them.
pub struct PathConfig {
    pub(crate) world: World,
    t: usize,
    k_order: usize,
    /// `(internal slice, frame)` -> effective parent, for frames a [`Switch`]
    /// has re-parented as of that slice. Absent entries fall back to the
    /// frame's static parent in `world`.
    overrides: HashMap<(usize, FrameId), FrameId>,
    columns: HashMap<(usize, FrameId), Range<usize>>,
    total_dims: usize,
}

impl PathConfig {
    pub fn new(world: World, t: usize, k_order: usize) -> Self {
        let mut config = PathConfig {
            world,
            t,
            k_order,
            overrides: HashMap::new(),
            columns: HashMap::new(),
            total_dims: 0,
        };
        config.relayout();
        config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn t(&self) -> usize {
        self.t
    }

    pub fn k_order(&self) -> usize {
        self.k_order
    }

    /// Total number of internal slices, `T + k_order`.
    pub fn slice_count(&self) -> usize {
        self.t + self.k_order
    }

    pub fn total_dims(&self) -> usize {
        self.total_dims
    }

    /// Converts a signed slice index (spec vocabulary, `-k_order..T`) into an
    /// internal storage index, or an [`EngineError::SliceOutOfRange`] if it
    /// falls outside the path's domain.
    pub fn to_internal(&self, s: i64) -> EngineResult<usize> {
        let lower = -(self.k_order as i64);
        let upper = self.t as i64 - 1;
        if s < lower || s > upper {
            return Err(EngineError::SliceOutOfRange(s, self.k_order, upper));
        }
        Ok((s + self.k_order as i64) as usize)
    }

    /// `true` for internal slices in the pinned prefix (no decision-vector
    /// columns; boundary conditions only).
    pub fn is_prefix(&self, internal_slice: usize) -> bool {
        internal_slice < self.k_order
    }

    /// Applies a structural edit: re-parents `switch.frame` starting at its
    /// causality-resolved slice, for every subsequent internal slice.
    ///
    /// Rejects the switch with [`EngineError::ParentCycle`] if it would make
    /// `switch.frame` its own ancestor at any affected slice (spec §4.8/§7:
    /// inconsistent switches are reported as setup failures before
    /// optimization begins), before any override is inserted.
    pub fn apply_switch(&mut self, switch: &Switch) -> EngineResult<()> {
        let start = self.to_internal(switch.effective_from())?;
        for slice in start..self.slice_count() {
            if self.introduces_cycle(slice, switch.frame, switch.new_parent) {
                return Err(EngineError::ParentCycle {
                    frame: self.world.frame_name(switch.frame).unwrap_or_default().to_string(),
                    reference: self.world.frame_name(switch.new_parent).unwrap_or_default().to_string(),
                });
            }
        }
        for slice in start..self.slice_count() {
            self.overrides.insert((slice, switch.frame), switch.new_parent);
        }
        self.relayout();
        Ok(())
    }

    /// `true` if re-parenting `frame` under `new_parent` would make `frame`
    /// its own ancestor at `slice`: walks `new_parent`'s effective-parent
    /// chain (under the overrides already applied) looking for `frame`.
    fn introduces_cycle(&self, slice: usize, frame: FrameId, new_parent: FrameId) -> bool {
        let mut current = Some(new_parent);
        let mut steps = 0;
        let bound = self.world.len();
        while let Some(candidate) = current {
            if candidate == frame {
                return true;
            }
            steps += 1;
            if steps > bound {
                return false;
            }
            current = self.effective_parent(slice, candidate);
        }
        false
    }

    /// The effective parent of `frame` at `internal_slice`, after switches.
    pub fn effective_parent(&self, internal_slice: usize, frame: FrameId) -> Option<FrameId> {
        if let Some(&overridden) = self.overrides.get(&(internal_slice, frame)) {
            return Some(overridden);
        }
        self.world.parent_of(frame)
    }

    /// Decision-vector column range `frame` occupies at `internal_slice`, or
    /// `None` if the frame has no DOF or the slice is in the pinned prefix.
    pub fn columns(&self, internal_slice: usize, frame: FrameId) -> Option<Range<usize>> {
        self.columns.get(&(internal_slice, frame)).cloned()
    }

    /// The contiguous decision-vector block covering every frame's DOF at
    /// `internal_slice`, in `world`'s depth-first (== DOF offset) order.
    /// `None` for pinned prefix slices. Since `relayout` assigns columns
    /// slice-by-slice in that same order, this block is exactly one slice's
    /// local joint-state vector as [`crate::kinematics::KinematicModel::set_joint_state`]
    /// expects it.
    pub fn slice_range(&self, internal_slice: usize) -> Option<Range<usize>> {
        if self.is_prefix(internal_slice) {
            return None;
        }
        let order = self.world.frames_depth_first();
        let start = order
            .iter()
            .find_map(|&frame| self.columns(internal_slice, frame).map(|r| r.start))
            .unwrap_or(0);
        let end = order
            .iter()
            .rev()
            .find_map(|&frame| self.columns(internal_slice, frame).map(|r| r.end))
            .unwrap_or(start);
        Some(start..end)
    }

    fn relayout(&mut self) {
        self.columns.clear();
        let mut cursor = 0;
        let order = self.world.frames_depth_first();
        for slice in self.k_order..self.slice_count() {
            for &frame in &order {
                let dof = self.world.joint_kind(frame).dof();
                if dof == 0 {
                    continue;
                }
                self.columns.insert((slice, frame), cursor..cursor + dof);
                cursor += dof;
            }
        }
        self.total_dims = cursor;
    }
}
