//! Page geometry: measurement, centering, scroll bounds and neighbor placement.
//!
//! Everything here is a pure function of sizes and offsets so the controller
//! can recompute the whole filmstrip on every layout pass.

use crate::config::Orientation;
use crate::geometry::{Point, Rect, Size};

/// Size a page is laid out at: fitted into the viewport and multiplied by
/// `scale`, or left at its natural size in reflow mode.
pub fn measure(natural: Size, viewport: Size, scale: f32, reflow: bool) -> Size {
    if reflow || natural.is_empty() || viewport.is_empty() {
        return natural;
    }
    let fit = (viewport.width as f32 / natural.width as f32)
        .min(viewport.height as f32 / natural.height as f32);
    Size::new(
        (natural.width as f32 * fit * scale) as i32,
        (natural.height as f32 * fit * scale) as i32,
    )
}

/// Offset that centers a page smaller than the viewport. Never negative.
pub fn sub_viewport_offset(measured: Size, viewport: Size) -> Point {
    Point::new(
        ((viewport.width - measured.width) / 2).max(0),
        ((viewport.height - measured.height) / 2).max(0),
    )
}

/// Range of translations that keep `page` covering the viewport. On an axis
/// where the page is smaller than the viewport the range collapses to the
/// translation that centers it.
pub fn scroll_bounds(page: Rect, viewport: Size) -> Rect {
    let mut xmin = viewport.width - page.right;
    let mut xmax = -page.left;
    let mut ymin = viewport.height - page.bottom;
    let mut ymax = -page.top;

    if xmin > xmax {
        xmin = (xmin + xmax) / 2;
        xmax = xmin;
    }
    if ymin > ymax {
        ymin = (ymin + ymax) / 2;
        ymax = ymin;
    }

    Rect::new(xmin, ymin, xmax, ymax)
}

/// Smallest translation that moves the origin into `bounds`.
pub fn correction(bounds: Rect) -> Point {
    Point::new(
        0.max(bounds.left).min(bounds.right),
        0.max(bounds.top).min(bounds.bottom),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Before,
    After,
}

/// Rectangle for the page adjacent to `current`, separated by `gap` plus both
/// pages' centering offsets and centered on the current page's cross axis.
pub fn place_adjacent(
    current: Rect,
    current_offset: Point,
    neighbor: Size,
    neighbor_offset: Point,
    gap: i32,
    orientation: Orientation,
    side: Side,
) -> Rect {
    match (orientation, side) {
        (Orientation::Horizontal, Side::Before) => {
            let gap = neighbor_offset.x + gap + current_offset.x;
            Rect::new(
                current.left - neighbor.width - gap,
                (current.bottom + current.top - neighbor.height) / 2,
                current.left - gap,
                (current.bottom + current.top + neighbor.height) / 2,
            )
        }
        (Orientation::Horizontal, Side::After) => {
            let gap = current_offset.x + gap + neighbor_offset.x;
            Rect::new(
                current.right + gap,
                (current.bottom + current.top - neighbor.height) / 2,
                current.right + neighbor.width + gap,
                (current.bottom + current.top + neighbor.height) / 2,
            )
        }
        (Orientation::Vertical, Side::Before) => {
            let gap = neighbor_offset.y + gap + current_offset.y;
            Rect::new(
                (current.left + current.right - neighbor.width) / 2,
                current.top - neighbor.height - gap,
                (current.left + current.right + neighbor.width) / 2,
                current.top - gap,
            )
        }
        (Orientation::Vertical, Side::After) => {
            let gap = current_offset.y + gap + neighbor_offset.y;
            Rect::new(
                (current.left + current.right - neighbor.width) / 2,
                current.bottom + gap,
                (current.left + current.right + neighbor.width) / 2,
                current.bottom + gap + neighbor.height,
            )
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Diagonal,
    Left,
    Right,
    Up,
    Down,
}

/// An axis dominates only when its velocity exceeds twice the other's.
pub fn direction_of_travel(velocity_x: f32, velocity_y: f32) -> Direction {
    if velocity_x.abs() > 2.0 * velocity_y.abs() {
        if velocity_x > 0.0 {
            Direction::Right
        } else {
            Direction::Left
        }
    } else if velocity_y.abs() > 2.0 * velocity_x.abs() {
        if velocity_y > 0.0 {
            Direction::Down
        } else {
            Direction::Up
        }
    } else {
        Direction::Diagonal
    }
}

pub fn within_bounds_in_direction(bounds: Rect, velocity_x: f32, velocity_y: f32) -> bool {
    match direction_of_travel(velocity_x, velocity_y) {
        Direction::Diagonal => bounds.contains(0, 0),
        Direction::Left => bounds.left <= 0,
        Direction::Right => bounds.right >= 0,
        Direction::Up => bounds.top <= 0,
        Direction::Down => bounds.bottom >= 0,
    }
}

/// Step for paging through `max` pixels of remaining content: about 90% of
/// `screen`, stretched by up to 5% or shrunk by up to 10% when that reaches
/// the end in a whole number of steps, and never more than `max`.
pub fn smart_advance_amount(screen: i32, max: i32) -> i32 {
    let mut advance = (screen as f64 * 0.9 + 0.5) as i32;
    if advance <= 0 || max <= 0 {
        return max.max(0);
    }
    let left_over = max % advance;
    let steps = max / advance;
    if left_over == 0 {
        // exact
    } else if left_over as f32 / steps as f32 <= screen as f32 * 0.05 {
        advance += (left_over as f32 / steps as f32 + 0.5) as i32;
    } else {
        let overshoot = advance - left_over;
        if overshoot as f32 / steps as f32 <= screen as f32 * 0.1 {
            advance -= (overshoot as f32 / steps as f32 + 0.5) as i32;
        }
    }
    advance.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn smart_advance_snaps_up_to_reach_the_end() {
        assert_eq!(smart_advance_amount(800, 3800), 760);
        assert_eq!(3800 % 760, 0);
    }

    #[test]
    fn smart_advance_snaps_down_when_enlarging_is_too_much() {
        // 720 nominal, 2 steps leave 560: shrinking by (720-560)/2 = 80 <= 80
        assert_eq!(smart_advance_amount(800, 2000), 640);
    }

    #[test]
    fn smart_advance_keeps_nominal_when_snapping_is_out_of_range() {
        // 720 nominal, 3 steps leave 360: +120 > 40 and -120 > 80
        assert_eq!(smart_advance_amount(800, 2520), 720);
    }

    #[test]
    fn smart_advance_never_overshoots() {
        assert_eq!(smart_advance_amount(800, 300), 300);
        assert_eq!(smart_advance_amount(800, 0), 0);
        assert_eq!(smart_advance_amount(0, 500), 500);
    }

    #[test]
    fn centering_offset_for_small_pages() {
        let viewport = Size::new(1000, 800);
        assert_eq!(
            sub_viewport_offset(Size::new(601, 800), viewport),
            Point::new(199, 0)
        );
        assert_eq!(
            sub_viewport_offset(Size::new(2000, 3000), viewport),
            Point::ZERO
        );
    }

    #[test]
    fn centering_offset_is_never_negative() {
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let viewport = Size::new(rng.gen_range(1..3000), rng.gen_range(1..3000));
            let page = Size::new(rng.gen_range(1..6000), rng.gen_range(1..6000));
            let offset = sub_viewport_offset(page, viewport);
            assert!(offset.x >= 0 && offset.y >= 0);
            if page.width <= viewport.width {
                assert_eq!(offset.x, (viewport.width - page.width) / 2);
            }
            if page.height <= viewport.height {
                assert_eq!(offset.y, (viewport.height - page.height) / 2);
            }
        }
    }

    #[test]
    fn measure_fits_then_scales() {
        let viewport = Size::new(1000, 1000);
        assert_eq!(
            measure(Size::new(500, 2000), viewport, 1.0, false),
            Size::new(250, 1000)
        );
        assert_eq!(
            measure(Size::new(500, 2000), viewport, 2.0, false),
            Size::new(500, 2000)
        );
        assert_eq!(
            measure(Size::new(500, 2000), viewport, 2.0, true),
            Size::new(500, 2000)
        );
    }

    #[test]
    fn bounds_collapse_to_center_for_narrow_pages() {
        let viewport = Size::new(1000, 800);
        let bounds = scroll_bounds(Rect::new(0, 0, 600, 1600), viewport);
        assert_eq!(bounds.left, 200);
        assert_eq!(bounds.right, 200);
        assert_eq!(bounds.top, -800);
        assert_eq!(bounds.bottom, 0);
        assert_eq!(correction(bounds), Point::new(200, 0));
    }

    #[test]
    fn correction_is_zero_inside_bounds() {
        let viewport = Size::new(1000, 800);
        let bounds = scroll_bounds(Rect::new(-300, -200, 1700, 1400), viewport);
        assert_eq!(correction(bounds), Point::ZERO);
    }

    #[test]
    fn neighbors_are_cross_axis_centered() {
        let current = Rect::new(0, 0, 1000, 800);
        let after = place_adjacent(
            current,
            Point::ZERO,
            Size::new(500, 400),
            Point::new(250, 200),
            20,
            Orientation::Horizontal,
            Side::After,
        );
        assert_eq!(after, Rect::new(1270, 200, 1770, 600));

        let before = place_adjacent(
            current,
            Point::ZERO,
            Size::new(1000, 800),
            Point::ZERO,
            20,
            Orientation::Horizontal,
            Side::Before,
        );
        assert_eq!(before, Rect::new(-1020, 0, -20, 800));

        let below = place_adjacent(
            current,
            Point::ZERO,
            Size::new(600, 800),
            Point::new(200, 0),
            20,
            Orientation::Vertical,
            Side::After,
        );
        assert_eq!(below, Rect::new(200, 820, 800, 1620));
    }

    #[test]
    fn dominant_axis_needs_twice_the_velocity() {
        assert_eq!(direction_of_travel(201.0, 100.0), Direction::Right);
        assert_eq!(direction_of_travel(200.0, 100.0), Direction::Diagonal);
        assert_eq!(direction_of_travel(-500.0, 10.0), Direction::Left);
        assert_eq!(direction_of_travel(0.0, -30.0), Direction::Up);
        assert_eq!(direction_of_travel(10.0, 300.0), Direction::Down);
    }

    #[test]
    fn direction_checks_only_the_travelled_edge() {
        let bounds = Rect::new(-200, 50, 0, 50);
        assert!(within_bounds_in_direction(bounds, -1000.0, 0.0));
        assert!(within_bounds_in_direction(bounds, 1000.0, 0.0));
        assert!(!within_bounds_in_direction(bounds, 0.0, -1000.0));
        assert!(within_bounds_in_direction(bounds, 0.0, 1000.0));
        assert!(!within_bounds_in_direction(bounds, 800.0, 800.0));
    }
}
