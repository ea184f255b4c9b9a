use glam::{DVec3, IVec3};

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    /// Inclusive on every face.
    pub fn contains_point(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

#[derive(Debug, Copy, Clone)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

impl Ray {
    /// Ray along a yaw/pitch look direction, both in degrees.
    ///
    /// Yaw 0 looks down +Z and grows toward -X, pitch is positive upward.
    pub fn from_look(origin: DVec3, yaw_deg: f32, pitch_deg: f32) -> Self {
        let yaw = f64::from(yaw_deg).to_radians();
        let pitch = f64::from(pitch_deg).to_radians();
        let direction = DVec3::new(
            -yaw.sin() * pitch.cos(),
            pitch.sin(),
            yaw.cos() * pitch.cos(),
        );
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Face {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl Face {
    pub fn normal_ivec3(&self) -> IVec3 {
        match self {
            Face::PosX => IVec3::X,
            Face::NegX => IVec3::NEG_X,
            Face::PosY => IVec3::Y,
            Face::NegY => IVec3::NEG_Y,
            Face::PosZ => IVec3::Z,
            Face::NegZ => IVec3::NEG_Z,
        }
    }
}

fn axis_step(direction: f64) -> i32 {
    if direction > 0.0 {
        1
    } else if direction < 0.0 {
        -1
    } else {
        0
    }
}

fn first_boundary(origin: f64, cell: i32, step: i32, direction: f64) -> f64 {
    if direction == 0.0 {
        return f64::INFINITY;
    }
    let next = if step > 0 {
        f64::from(cell) + 1.0
    } else {
        f64::from(cell)
    };
    (next - origin) / direction
}

fn boundary_spacing(direction: f64) -> f64 {
    if direction == 0.0 {
        f64::INFINITY
    } else {
        1.0 / direction.abs()
    }
}

/// Voxel traversal yielding each visited cell and the face it was entered through.
#[derive(Debug, Copy, Clone)]
pub struct RaycastIter {
    current: IVec3,
    step: IVec3,
    t_max: DVec3,
    t_delta: DVec3,
    max_distance: f64,
    started: bool,
    finished: bool,
    last_face: Face,
}

impl RaycastIter {
    fn new(ray: &Ray, max_distance: f64) -> Self {
        let direction = ray.direction;
        let current = ray.origin.floor().as_ivec3();
        let step = IVec3::new(
            axis_step(direction.x),
            axis_step(direction.y),
            axis_step(direction.z),
        );

        let t_max = DVec3::new(
            first_boundary(ray.origin.x, current.x, step.x, direction.x),
            first_boundary(ray.origin.y, current.y, step.y, direction.y),
            first_boundary(ray.origin.z, current.z, step.z, direction.z),
        );
        let t_delta = DVec3::new(
            boundary_spacing(direction.x),
            boundary_spacing(direction.y),
            boundary_spacing(direction.z),
        );

        Self {
            current,
            step,
            t_max,
            t_delta,
            max_distance: max_distance.max(0.0),
            started: false,
            finished: false,
            last_face: Face::NegY,
        }
    }
}

impl Iterator for RaycastIter {
    type Item = (IVec3, Face);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        if !self.started {
            self.started = true;
            return Some((self.current, self.last_face));
        }

        let (axis, distance) = if self.t_max.x <= self.t_max.y && self.t_max.x <= self.t_max.z {
            (0usize, self.t_max.x)
        } else if self.t_max.y <= self.t_max.z {
            (1usize, self.t_max.y)
        } else {
            (2usize, self.t_max.z)
        };

        if !distance.is_finite() || distance > self.max_distance {
            self.finished = true;
            return None;
        }

        // Cells past the edge of the grid do not exist.
        let advanced = match axis {
            0 => self.current.x.checked_add(self.step.x).map(|x| {
                self.current.x = x;
                self.t_max.x += self.t_delta.x;
                self.last_face = if self.step.x > 0 { Face::NegX } else { Face::PosX };
            }),
            1 => self.current.y.checked_add(self.step.y).map(|y| {
                self.current.y = y;
                self.t_max.y += self.t_delta.y;
                self.last_face = if self.step.y > 0 { Face::NegY } else { Face::PosY };
            }),
            _ => self.current.z.checked_add(self.step.z).map(|z| {
                self.current.z = z;
                self.t_max.z += self.t_delta.z;
                self.last_face = if self.step.z > 0 { Face::NegZ } else { Face::PosZ };
            }),
        };
        if advanced.is_none() {
            self.finished = true;
            return None;
        }

        Some((self.current, self.last_face))
    }
}

pub fn raycast_blocks(ray: &Ray, max_distance: f64) -> impl Iterator<Item = (IVec3, Face)> {
    RaycastIter::new(ray, max_distance)
}
