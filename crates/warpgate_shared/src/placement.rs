use glam::{DVec3, IVec3};

use crate::geometry::{cell_of, offset_cell};
use crate::physics::Face;

pub const DEFAULT_FALLBACK_DISTANCE: i32 = 5;

/// Where a new portal goes and which way it faces.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Placement {
    pub anchor: DVec3,
    pub yaw: f32,
    /// Face of the hit cell the portal is attached to, `None` on fallback.
    pub face: Option<Face>,
}

impl Placement {
    pub fn found_surface(&self) -> bool {
        self.face.is_some()
    }
}

/// Derives a portal placement from an optional raycast hit.
///
/// With a hit, the portal sits one cell out from the face of the hit cell that
/// looks toward the requester, and faces the requester. Without one, it goes
/// `fallback_distance` cells along +Z from the requester's cell and keeps the
/// requester's yaw. Never fails.
pub fn compute_placement(
    hit: Option<IVec3>,
    requester: DVec3,
    requester_yaw: f32,
    fallback_distance: i32,
) -> Placement {
    let Some(hit) = hit else {
        let cell = offset_cell(cell_of(requester), IVec3::Z * fallback_distance);
        return Placement {
            anchor: cell.as_dvec3(),
            yaw: requester_yaw,
            face: None,
        };
    };

    let face = face_toward(hit, requester);
    Placement {
        anchor: offset_cell(hit, face.normal_ivec3()).as_dvec3(),
        yaw: yaw_for_face(face),
        face: Some(face),
    }
}

/// The horizontal face of `hit` on the requester's side; Z wins ties.
fn face_toward(hit: IVec3, requester: DVec3) -> Face {
    let delta = requester - hit.as_dvec3();
    if delta.x.abs() > delta.z.abs() {
        if delta.x > 0.0 {
            Face::PosX
        } else {
            Face::NegX
        }
    } else if delta.z > 0.0 {
        Face::PosZ
    } else {
        Face::NegZ
    }
}

fn yaw_for_face(face: Face) -> f32 {
    match face {
        Face::PosX => 180.0,
        Face::NegX => 0.0,
        Face::PosZ => 270.0,
        Face::NegZ => 90.0,
        // face_toward only yields horizontal faces
        Face::PosY | Face::NegY => 0.0,
    }
}
