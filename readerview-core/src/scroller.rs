use std::time::{Duration, Instant};

use crate::geometry::{Point, Rect};

/// Animation source polled once per frame by the controller. Every motion
/// starts at the origin; the controller applies deltas between successive
/// positions.
pub trait ScrollDriver {
    fn start_scroll(&mut self, dx: i32, dy: i32, duration: Duration);

    /// Decelerating motion whose end point is clamped into `bounds`.
    fn start_fling(&mut self, velocity_x: f32, velocity_y: f32, bounds: Rect);

    /// Advances to `now`. Returns `false` once the motion has ended.
    fn compute(&mut self, now: Instant) -> bool;

    fn current(&self) -> Point;

    fn final_position(&self) -> Point;

    fn is_finished(&self) -> bool;

    /// Stops where the motion currently is.
    fn abort(&mut self);

    fn remaining(&self) -> Point {
        let current = self.current();
        let target = self.final_position();
        Point::new(target.x - current.x, target.y - current.y)
    }
}

const GRAVITY_EARTH: f32 = 9.80665;
const INCHES_PER_METER: f32 = 39.37;
const DEFAULT_PPI: f32 = 160.0;
const VISCOUS_FLUID_SCALE: f32 = 8.0;

#[derive(Debug, Clone, Copy)]
enum Motion {
    Scroll {
        start: Instant,
        duration: Duration,
        delta: Point,
    },
    Fling {
        start: Instant,
        duration: Duration,
        velocity: f32,
        coeff_x: f32,
        coeff_y: f32,
        bounds: Rect,
    },
}

#[derive(Debug, Clone)]
pub struct Scroller {
    motion: Option<Motion>,
    current: Point,
    target: Point,
    deceleration: f32,
}

impl Default for Scroller {
    fn default() -> Self {
        Self::new(0.015)
    }
}

impl Scroller {
    pub fn new(friction: f32) -> Self {
        Self {
            motion: None,
            current: Point::ZERO,
            target: Point::ZERO,
            deceleration: GRAVITY_EARTH * INCHES_PER_METER * DEFAULT_PPI * friction.max(0.0001),
        }
    }

    pub fn start_scroll_at(&mut self, dx: i32, dy: i32, duration: Duration, start: Instant) {
        self.current = Point::ZERO;
        self.target = Point::new(dx, dy);
        self.motion = Some(Motion::Scroll {
            start,
            duration,
            delta: self.target,
        });
    }

    pub fn start_fling_at(
        &mut self,
        velocity_x: f32,
        velocity_y: f32,
        bounds: Rect,
        start: Instant,
    ) {
        self.current = Point::ZERO;
        let velocity = velocity_x.hypot(velocity_y);
        if !velocity.is_finite() || velocity <= 0.0 {
            self.target = clamp_into(Point::ZERO, bounds);
            self.current = self.target;
            self.motion = None;
            return;
        }
        let coeff_x = velocity_x / velocity;
        let coeff_y = velocity_y / velocity;
        let duration = Duration::from_secs_f32(velocity / self.deceleration);
        let total = velocity * velocity / (2.0 * self.deceleration);
        self.target = clamp_into(
            Point::new(
                (total * coeff_x).round() as i32,
                (total * coeff_y).round() as i32,
            ),
            bounds,
        );
        self.motion = Some(Motion::Fling {
            start,
            duration,
            velocity,
            coeff_x,
            coeff_y,
            bounds,
        });
    }

    fn sample(&self, motion: Motion, now: Instant) -> Option<Point> {
        match motion {
            Motion::Scroll {
                start,
                duration,
                delta,
            } => {
                let elapsed = now.saturating_duration_since(start);
                if elapsed >= duration || duration.is_zero() {
                    return None;
                }
                let t = viscous_fluid(elapsed.as_secs_f32() / duration.as_secs_f32());
                Some(Point::new(
                    (delta.x as f32 * t).round() as i32,
                    (delta.y as f32 * t).round() as i32,
                ))
            }
            Motion::Fling {
                start,
                duration,
                velocity,
                coeff_x,
                coeff_y,
                bounds,
            } => {
                let elapsed = now.saturating_duration_since(start);
                if elapsed >= duration {
                    return None;
                }
                let t = elapsed.as_secs_f32();
                let distance = velocity * t - self.deceleration * t * t / 2.0;
                let position = Point::new(
                    (distance * coeff_x).round() as i32,
                    (distance * coeff_y).round() as i32,
                );
                let position = clamp_into(position, bounds);
                if position == self.target {
                    return None;
                }
                Some(position)
            }
        }
    }
}

impl ScrollDriver for Scroller {
    fn start_scroll(&mut self, dx: i32, dy: i32, duration: Duration) {
        self.start_scroll_at(dx, dy, duration, Instant::now());
    }

    fn start_fling(&mut self, velocity_x: f32, velocity_y: f32, bounds: Rect) {
        self.start_fling_at(velocity_x, velocity_y, bounds, Instant::now());
    }

    fn compute(&mut self, now: Instant) -> bool {
        let Some(motion) = self.motion else {
            return false;
        };
        match self.sample(motion, now) {
            Some(position) => {
                self.current = position;
                true
            }
            None => {
                self.current = self.target;
                self.motion = None;
                true
            }
        }
    }

    fn current(&self) -> Point {
        self.current
    }

    fn final_position(&self) -> Point {
        self.target
    }

    fn is_finished(&self) -> bool {
        self.motion.is_none()
    }

    fn abort(&mut self) {
        self.motion = None;
        self.target = self.current;
    }
}

fn clamp_into(point: Point, bounds: Rect) -> Point {
    Point::new(
        point.x.max(bounds.left).min(bounds.right),
        point.y.max(bounds.top).min(bounds.bottom),
    )
}

/// Ease-in/ease-out curve mapping `[0, 1]` onto `[0, 1]`.
fn viscous_fluid(input: f32) -> f32 {
    fn raw(x: f32) -> f32 {
        let x = x * VISCOUS_FLUID_SCALE;
        if x < 1.0 {
            x - (1.0 - (-x).exp())
        } else {
            let start = 0.367_879_44;
            let x = 1.0 - (1.0 - x).exp();
            start + x * (1.0 - start)
        }
    }
    (raw(input.clamp(0.0, 1.0)) / raw(1.0)).min(1.0)
}
