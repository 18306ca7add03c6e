// Relative (0-1000) to physical pixel mapping.
use crate::protocol::action::{Point, COORD_MAX};

/// `round(relative / 1000 * dimension)`.
pub fn relative_to_pixel(relative: f64, dimension: u32) -> i32 {
    (relative / COORD_MAX * f64::from(dimension)).round() as i32
}

/// Maps a relative point onto a screen of `width`×`height` pixels.
pub fn point_to_pixels(point: Point, width: u32, height: u32) -> (i32, i32) {
    (
        relative_to_pixel(point.x, width),
        relative_to_pixel(point.y, height),
    )
}
