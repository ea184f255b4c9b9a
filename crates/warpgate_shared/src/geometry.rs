//! Discrete and continuous shape of a portal.
//!
//! A portal is 2 cells wide and 3 cells tall. Its frame cells follow the wall
//! axis implied by its yaw, while its trigger volume is a coarse axis-aligned
//! box of 2 x 3 x 2 cells anchored at the same corner. The box ignores yaw; an
//! agent's footprint is small next to it, so the approximation holds.

use glam::{DVec3, IVec3};

use crate::physics::Aabb;

pub const PORTAL_WIDTH: i32 = 2;
pub const PORTAL_HEIGHT: i32 = 3;
pub const FRAME_CELL_COUNT: usize = (PORTAL_WIDTH * PORTAL_HEIGHT) as usize;

/// Horizontal axis a portal's frame spans.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WallAxis {
    X,
    Z,
}

impl WallAxis {
    pub fn from_yaw(yaw: f32) -> Self {
        let yaw = normalize_yaw(yaw);
        if (45.0..135.0).contains(&yaw) || (225.0..315.0).contains(&yaw) {
            WallAxis::X
        } else {
            WallAxis::Z
        }
    }

    fn step(self) -> IVec3 {
        match self {
            WallAxis::X => IVec3::X,
            WallAxis::Z => IVec3::Z,
        }
    }
}

/// Maps any yaw in degrees into `[0, 360)`.
pub fn normalize_yaw(yaw: f32) -> f32 {
    let wrapped = yaw.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// The cell containing a continuous position.
pub fn cell_of(position: DVec3) -> IVec3 {
    position.floor().as_ivec3()
}

/// `cell + delta`, pinned to the edge of the cell grid instead of overflowing.
pub fn offset_cell(cell: IVec3, delta: IVec3) -> IVec3 {
    IVec3::new(
        cell.x.saturating_add(delta.x),
        cell.y.saturating_add(delta.y),
        cell.z.saturating_add(delta.z),
    )
}

/// Frame cells ordered row by row from the bottom, then along the wall.
///
/// Near the edge of the grid the cells past it collapse onto the last one.
pub fn frame_cells(anchor: DVec3, yaw: f32) -> [IVec3; FRAME_CELL_COUNT] {
    let base = cell_of(anchor);
    let along = WallAxis::from_yaw(yaw).step();
    let mut cells = [IVec3::ZERO; FRAME_CELL_COUNT];
    let mut index = 0;
    for y in 0..PORTAL_HEIGHT {
        for w in 0..PORTAL_WIDTH {
            cells[index] = offset_cell(base, IVec3::Y * y + along * w);
            index += 1;
        }
    }
    cells
}

pub fn center_point(anchor: DVec3) -> DVec3 {
    let width = f64::from(PORTAL_WIDTH);
    let height = f64::from(PORTAL_HEIGHT);
    anchor + DVec3::new(width / 2.0, height / 2.0, width / 2.0)
}

pub fn trigger_bounds(anchor: DVec3) -> Aabb {
    let width = f64::from(PORTAL_WIDTH);
    let height = f64::from(PORTAL_HEIGHT);
    Aabb {
        min: anchor,
        max: anchor + DVec3::new(width, height, width),
    }
}

pub fn contains_point(anchor: DVec3, point: DVec3) -> bool {
    trigger_bounds(anchor).contains_point(point)
}

#[cfg(test)]
mod tests {
    use glam::{DVec3, IVec3};

    use super::{
        center_point, contains_point, frame_cells, normalize_yaw, offset_cell, WallAxis,
        FRAME_CELL_COUNT,
    };

    #[test]
    fn yaw_is_normalized_into_one_turn() {
        assert_eq!(normalize_yaw(0.0), 0.0);
        assert_eq!(normalize_yaw(360.0), 0.0);
        assert_eq!(normalize_yaw(-90.0), 270.0);
        assert_eq!(normalize_yaw(450.0), 90.0);
        assert_eq!(normalize_yaw(-720.0), 0.0);
    }

    #[test]
    fn wall_axis_classification_boundaries() {
        assert_eq!(WallAxis::from_yaw(0.0), WallAxis::Z);
        assert_eq!(WallAxis::from_yaw(44.9), WallAxis::Z);
        assert_eq!(WallAxis::from_yaw(45.0), WallAxis::X);
        assert_eq!(WallAxis::from_yaw(134.9), WallAxis::X);
        assert_eq!(WallAxis::from_yaw(135.0), WallAxis::Z);
        assert_eq!(WallAxis::from_yaw(180.0), WallAxis::Z);
        assert_eq!(WallAxis::from_yaw(225.0), WallAxis::X);
        assert_eq!(WallAxis::from_yaw(270.0), WallAxis::X);
        assert_eq!(WallAxis::from_yaw(315.0), WallAxis::Z);
        assert_eq!(WallAxis::from_yaw(-90.0), WallAxis::X);
    }

    #[test]
    fn z_axis_frame_is_row_major_from_the_bottom() {
        let cells = frame_cells(DVec3::new(10.0, 64.0, 10.0), 0.0);
        assert_eq!(
            cells,
            [
                IVec3::new(10, 64, 10),
                IVec3::new(10, 64, 11),
                IVec3::new(10, 65, 10),
                IVec3::new(10, 65, 11),
                IVec3::new(10, 66, 10),
                IVec3::new(10, 66, 11),
            ]
        );
    }

    #[test]
    fn x_axis_frame_spans_along_x() {
        let cells = frame_cells(DVec3::new(20.0, 64.0, 10.0), 90.0);
        assert_eq!(cells.len(), FRAME_CELL_COUNT);
        assert_eq!(cells[0], IVec3::new(20, 64, 10));
        assert_eq!(cells[1], IVec3::new(21, 64, 10));
        assert_eq!(cells[5], IVec3::new(21, 66, 10));
        assert!(cells.iter().all(|cell| cell.z == 10));
    }

    #[test]
    fn frame_cells_are_stable_for_equal_inputs() {
        let anchor = DVec3::new(-3.25, 70.9, 5.5);
        assert_eq!(frame_cells(anchor, 270.0), frame_cells(anchor, 270.0));
        assert_eq!(frame_cells(anchor, 270.0), frame_cells(anchor, -90.0));
    }

    #[test]
    fn negative_anchors_floor_to_the_enclosing_cell() {
        let cells = frame_cells(DVec3::new(-0.5, 64.0, -3.2), 0.0);
        assert_eq!(cells[0], IVec3::new(-1, 64, -4));
        assert_eq!(cells[1], IVec3::new(-1, 64, -3));
    }

    #[test]
    fn center_is_inside_the_trigger_volume() {
        for anchor in [
            DVec3::new(10.0, 64.0, 10.0),
            DVec3::new(-7.5, -12.0, 300.25),
            DVec3::ZERO,
        ] {
            let center = center_point(anchor);
            assert_eq!(center, anchor + DVec3::new(1.0, 1.5, 1.0));
            assert!(contains_point(anchor, center));
        }
    }

    #[test]
    fn containment_is_an_inclusive_box() {
        let anchor = DVec3::new(10.0, 64.0, 10.0);
        assert!(contains_point(anchor, DVec3::new(10.0, 64.0, 10.0)));
        assert!(contains_point(anchor, DVec3::new(12.0, 67.0, 12.0)));
        assert!(!contains_point(anchor, DVec3::new(12.5, 65.0, 11.0)));
        assert!(!contains_point(anchor, DVec3::new(11.0, 67.1, 11.0)));
        assert!(!contains_point(anchor, DVec3::new(11.0, 65.0, 9.9)));
    }

    #[test]
    fn frame_cells_stay_on_the_grid_at_its_edges() {
        let top = frame_cells(DVec3::new(0.0, 64.0, 2_147_483_647.0), 0.0);
        assert_eq!(top[0], IVec3::new(0, 64, i32::MAX));
        assert!(top.iter().all(|cell| cell.z == i32::MAX));

        let bottom = frame_cells(DVec3::new(-2_147_483_648.0, 64.0, 0.0), 90.0);
        assert_eq!(bottom[0], IVec3::new(i32::MIN, 64, 0));
        assert_eq!(bottom[1], IVec3::new(i32::MIN + 1, 64, 0));

        let beyond = frame_cells(DVec3::new(1.0e12, -1.0e12, 0.0), 90.0);
        assert_eq!(beyond[0], IVec3::new(i32::MAX, i32::MIN, 0));
        assert_eq!(beyond[5], IVec3::new(i32::MAX, i32::MIN + 2, 0));
        assert_eq!(
            offset_cell(IVec3::new(i32::MIN, 0, i32::MAX), IVec3::new(-1, 0, 5)),
            IVec3::new(i32::MIN, 0, i32::MAX)
        );
    }
}
