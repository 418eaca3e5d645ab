//! Turns raw pointer events into the gestures the controller understands.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::trace;

use crate::config::GestureConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    Down,
    Move,
    Up,
    Cancel,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub pointer_id: u32,
    pub action: PointerAction,
    pub x: f32,
    pub y: f32,
    pub time: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    /// First finger touched down.
    Down { x: f32, y: f32 },
    /// Distance travelled since the previous drag event; positive when the
    /// finger moved left/up.
    Drag { distance_x: f32, distance_y: f32 },
    /// Release velocity in pixels per second.
    Fling { velocity_x: f32, velocity_y: f32 },
    SingleTap { x: f32, y: f32 },
    DoubleTap { x: f32, y: f32 },
    ScaleBegin { focus_x: f32, focus_y: f32 },
    Scale { factor: f32, focus_x: f32, focus_y: f32 },
    ScaleEnd,
    /// Last finger lifted or the sequence was cancelled.
    Up,
}

#[derive(Debug, Clone, Copy)]
struct Pointer {
    id: u32,
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, Copy)]
struct Sample {
    x: f32,
    y: f32,
    time: Instant,
}

#[derive(Debug, Clone, Copy)]
struct Tap {
    x: f32,
    y: f32,
    time: Instant,
}

#[derive(Debug)]
pub struct GestureDetector {
    config: GestureConfig,
    pointers: Vec<Pointer>,
    down_x: f32,
    down_y: f32,
    last_x: f32,
    last_y: f32,
    dragging: bool,
    scaling: bool,
    scaled_this_sequence: bool,
    double_tapped: bool,
    span: f32,
    samples: VecDeque<Sample>,
    last_tap: Option<Tap>,
}

impl GestureDetector {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            pointers: Vec::with_capacity(2),
            down_x: 0.0,
            down_y: 0.0,
            last_x: 0.0,
            last_y: 0.0,
            dragging: false,
            scaling: false,
            scaled_this_sequence: false,
            double_tapped: false,
            span: 0.0,
            samples: VecDeque::new(),
            last_tap: None,
        }
    }

    pub fn is_scaling(&self) -> bool {
        self.scaling
    }

    pub fn on_pointer(&mut self, event: PointerEvent) -> Vec<Gesture> {
        let mut out = Vec::new();
        match event.action {
            PointerAction::Down => self.pointer_down(event, &mut out),
            PointerAction::Move => self.pointer_move(event, &mut out),
            PointerAction::Up => self.pointer_up(event, &mut out),
            PointerAction::Cancel => self.cancel(&mut out),
        }
        if !out.is_empty() {
            trace!(?out, "classified pointer event");
        }
        out
    }

    fn pointer_down(&mut self, event: PointerEvent, out: &mut Vec<Gesture>) {
        if self.pointers.iter().any(|p| p.id == event.pointer_id) {
            return;
        }
        self.pointers.push(Pointer {
            id: event.pointer_id,
            x: event.x,
            y: event.y,
        });

        if self.pointers.len() == 1 {
            self.down_x = event.x;
            self.down_y = event.y;
            self.last_x = event.x;
            self.last_y = event.y;
            self.dragging = false;
            self.scaled_this_sequence = false;
            self.double_tapped = false;
            self.samples.clear();
            self.push_sample(event.x, event.y, event.time);
            out.push(Gesture::Down {
                x: event.x,
                y: event.y,
            });

            if let Some(tap) = self.last_tap.take() {
                let within_time =
                    event.time.saturating_duration_since(tap.time) <= self.config.double_tap_timeout;
                let dx = event.x - tap.x;
                let dy = event.y - tap.y;
                let within_slop = dx.hypot(dy) <= self.config.double_tap_slop;
                if within_time && within_slop {
                    self.double_tapped = true;
                    out.push(Gesture::DoubleTap {
                        x: event.x,
                        y: event.y,
                    });
                }
            }
        } else if self.pointers.len() == 2 {
            let (focus_x, focus_y) = self.focus();
            self.span = self.current_span();
            self.scaling = true;
            self.scaled_this_sequence = true;
            self.dragging = false;
            out.push(Gesture::ScaleBegin { focus_x, focus_y });
        }
    }

    fn pointer_move(&mut self, event: PointerEvent, out: &mut Vec<Gesture>) {
        let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == event.pointer_id) else {
            return;
        };
        pointer.x = event.x;
        pointer.y = event.y;

        if self.scaling {
            let span = self.current_span();
            if self.span > 0.0 && span > 0.0 {
                let (focus_x, focus_y) = self.focus();
                out.push(Gesture::Scale {
                    factor: span / self.span,
                    focus_x,
                    focus_y,
                });
            }
            self.span = span;
            return;
        }

        if self.pointers.len() != 1 {
            return;
        }

        if !self.dragging {
            let dx = event.x - self.down_x;
            let dy = event.y - self.down_y;
            if dx.hypot(dy) <= self.config.touch_slop {
                return;
            }
            self.dragging = true;
        }

        let distance_x = self.last_x - event.x;
        let distance_y = self.last_y - event.y;
        self.last_x = event.x;
        self.last_y = event.y;
        self.push_sample(event.x, event.y, event.time);
        if distance_x != 0.0 || distance_y != 0.0 {
            out.push(Gesture::Drag {
                distance_x,
                distance_y,
            });
        }
    }

    fn pointer_up(&mut self, event: PointerEvent, out: &mut Vec<Gesture>) {
        let Some(position) = self.pointers.iter().position(|p| p.id == event.pointer_id) else {
            return;
        };
        self.pointers.remove(position);

        if self.scaling {
            if self.pointers.len() < 2 {
                self.scaling = false;
                out.push(Gesture::ScaleEnd);
            }
            if let Some(remaining) = self.pointers.first() {
                // continue dragging from the finger still down without a jump
                self.last_x = remaining.x;
                self.last_y = remaining.y;
                self.down_x = remaining.x;
                self.down_y = remaining.y;
                self.samples.clear();
            }
        }

        if !self.pointers.is_empty() {
            return;
        }

        if self.dragging && !self.scaled_this_sequence {
            self.push_sample(event.x, event.y, event.time);
            let (velocity_x, velocity_y) = self.velocity();
            if velocity_x.hypot(velocity_y) >= self.config.min_fling_velocity {
                out.push(Gesture::Fling {
                    velocity_x,
                    velocity_y,
                });
            }
        } else if !self.dragging && !self.scaled_this_sequence {
            if self.double_tapped {
                self.last_tap = None;
            } else {
                out.push(Gesture::SingleTap {
                    x: event.x,
                    y: event.y,
                });
                self.last_tap = Some(Tap {
                    x: self.down_x,
                    y: self.down_y,
                    time: event.time,
                });
            }
        }

        self.dragging = false;
        self.double_tapped = false;
        out.push(Gesture::Up);
    }

    fn cancel(&mut self, out: &mut Vec<Gesture>) {
        if self.pointers.is_empty() {
            return;
        }
        if self.scaling {
            out.push(Gesture::ScaleEnd);
        }
        self.pointers.clear();
        self.scaling = false;
        self.dragging = false;
        self.double_tapped = false;
        self.last_tap = None;
        self.samples.clear();
        out.push(Gesture::Up);
    }

    fn focus(&self) -> (f32, f32) {
        let count = self.pointers.len().max(1) as f32;
        let (sum_x, sum_y) = self
            .pointers
            .iter()
            .fold((0.0, 0.0), |(x, y), p| (x + p.x, y + p.y));
        (sum_x / count, sum_y / count)
    }

    fn current_span(&self) -> f32 {
        match self.pointers.as_slice() {
            [a, b, ..] => (a.x - b.x).hypot(a.y - b.y),
            _ => 0.0,
        }
    }

    fn push_sample(&mut self, x: f32, y: f32, time: Instant) {
        self.samples.push_back(Sample { x, y, time });
        while let Some(front) = self.samples.front() {
            if time.saturating_duration_since(front.time) > self.config.velocity_window {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn velocity(&self) -> (f32, f32) {
        let (Some(first), Some(last)) = (self.samples.front(), self.samples.back()) else {
            return (0.0, 0.0);
        };
        let elapsed = last.time.saturating_duration_since(first.time).as_secs_f32();
        if elapsed <= 0.0 {
            return (0.0, 0.0);
        }
        let max = self.config.max_fling_velocity;
        (
            ((last.x - first.x) / elapsed).clamp(-max, max),
            ((last.y - first.y) / elapsed).clamp(-max, max),
        )
    }
}
