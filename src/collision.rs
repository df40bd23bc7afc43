//! Collision backend trait (spec §6) plus a reference proxy-sphere
//! implementation so `accumulatedCollisions`/`pairCollision` objectives are
//! groundable and evaluable standalone.

use crate::kinematics::{FrameId, KinematicModel};
use nalgebra::Vector3;
use std::collections::HashMap;

/// One candidate colliding pair, refreshed once per evaluation before
/// `accumulatedCollisions`/`pairCollision` features read it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProxyPair {
    pub frame_a: FrameId,
    pub frame_b: FrameId,
    /// Signed distance: negative means penetrating.
    pub distance: f64,
    /// Unit vector pointing from `frame_a` towards `frame_b` in world frame.
    pub normal: Vector3<f64>,
}

/// Backend a caller's own collision geometry engine implements; this crate
/// ships [`ProxySphereBackend`] as the reference implementation.
pub trait CollisionBackend {
    /// Recomputes the candidate pair list against the model's current pose.
    fn refresh_proxies(&mut self, model: &dyn KinematicModel, frames: &[FrameId]) -> Vec<ProxyPair>;
}

/// Treats every registered frame as a sphere of a fixed radius and reports
/// every pair whose surface-to-surface distance is below `margin`.
pub struct ProxySphereBackend {
    radii: HashMap<FrameId, f64>,
    margin: f64,
}

impl ProxySphereBackend {
    pub fn new(margin: f64) -> Self {
        ProxySphereBackend {
            radii: HashMap::new(),
            margin,
        }
    }

    pub fn set_radius(&mut self, frame: FrameId, radius: f64) {
        self.radii.insert(frame, radius);
    }

    fn radius(&self, frame: FrameId) -> f64 {
        self.radii.get(&frame).copied().unwrap_or(0.0)
    }
}

impl CollisionBackend for ProxySphereBackend {
    fn refresh_proxies(&mut self, model: &dyn KinematicModel, frames: &[FrameId]) -> Vec<ProxyPair> {
        let mut pairs = Vec::new();
        for (i, &a) in frames.iter().enumerate() {
            for &b in &frames[i + 1..] {
                let pa = model.frame(a).pose.translation.vector;
                let pb = model.frame(b).pose.translation.vector;
                let delta = pb - pa;
                let center_distance = delta.norm();
                let distance = center_distance - self.radius(a) - self.radius(b);
                if distance < self.margin {
                    let normal = if center_distance > 1e-9 {
                        delta / center_distance
                    } else {
                        Vector3::x()
                    };
                    pairs.push(ProxyPair {
                        frame_a: a,
                        frame_b: b,
                        distance,
                        normal,
                    });
                }
            }
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kinematics::ArenaKinematicModel;
    use crate::world::{Axis, JointKind, World};
    use nalgebra::Isometry3;

    #[test]
    fn reports_pairs_within_margin() {
        let mut world = World::new("base");
        let a = world
            .add_frame("a", "base", JointKind::Prismatic(Axis::X), Isometry3::identity())
            .unwrap();
        let b = world
            .add_frame("b", "base", JointKind::Prismatic(Axis::X), Isometry3::translation(2.0, 0.0, 0.0))
            .unwrap();
        let model = ArenaKinematicModel::new(&world);

        let mut backend = ProxySphereBackend::new(0.5);
        backend.set_radius(a, 0.2);
        backend.set_radius(b, 0.2);
        let pairs = backend.refresh_proxies(&model, &[a, b]);
        assert_eq!(pairs.len(), 1);
        assert!((pairs[0].distance - 1.6).abs() < 1e-9);
    }
}
