use std::time::Instant;

use tracing::{debug, instrument, trace, warn};

use crate::config::ViewerConfig;
use crate::error::ViewError;
use crate::geometry::{Point, Rect, Size};
use crate::gesture::Gesture;
use crate::phase::{Deferred, Phase, TaskQueue, Transition};
use crate::placement::{
    correction, direction_of_travel, measure, place_adjacent, scroll_bounds, sub_viewport_offset,
    within_bounds_in_direction, Direction, Side,
};
use crate::provider::{ContentProvider, NoHooks, PageContent, PageHooks};
use crate::scroller::{ScrollDriver, Scroller};
use crate::window::{MaterializedPage, PageWindow};

mod smart;

/// Paging viewport over a strip of pages. At most the current page and its
/// two neighbors are materialized; everything else lives in the provider.
///
/// The host feeds it gestures and calls [`ReaderView::frame`] once per
/// display frame while [`ReaderView::wants_frame`] is true.
pub struct ReaderView<C> {
    config: ViewerConfig,
    viewport: Size,
    provider: Option<Box<dyn ContentProvider<Content = C>>>,
    driver: Box<dyn ScrollDriver>,
    hooks: Box<dyn PageHooks<C>>,
    window: PageWindow<C>,
    current: usize,
    scale: f32,
    scroll: Point,
    driver_last: Point,
    phase: Phase,
    reflow: bool,
    source_changed: bool,
    last_scale_focus: Option<(f32, f32)>,
    deferred: TaskQueue,
    needs_layout: bool,
    frame_requested: bool,
}

impl<C> ReaderView<C> {
    pub fn new(config: ViewerConfig, viewport: Size) -> Self {
        let driver = Scroller::new(config.fling_friction);
        Self {
            config,
            viewport,
            provider: None,
            driver: Box::new(driver),
            hooks: Box::new(NoHooks),
            window: PageWindow::new(),
            current: 0,
            scale: 1.0,
            scroll: Point::ZERO,
            driver_last: Point::ZERO,
            phase: Phase::Idle,
            reflow: false,
            source_changed: false,
            last_scale_focus: None,
            deferred: TaskQueue::default(),
            needs_layout: true,
            frame_requested: false,
        }
    }

    pub fn with_driver(mut self, driver: impl ScrollDriver + 'static) -> Self {
        self.driver = Box::new(driver);
        self
    }

    pub fn with_hooks(mut self, hooks: impl PageHooks<C> + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn count(&self) -> usize {
        self.provider.as_ref().map_or(0, |provider| provider.count())
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_reflow(&self) -> bool {
        self.reflow
    }

    pub fn page(&self, index: usize) -> Option<&C> {
        self.window.get(index).map(|page| &page.content)
    }

    pub fn displayed_page(&self) -> Option<&C> {
        self.page(self.current)
    }

    pub fn page_rect(&self, index: usize) -> Option<Rect> {
        self.window.get(index).map(|page| page.rect)
    }

    /// Laid-out rectangles of every materialized page, in index order.
    pub fn page_rects(&self) -> Vec<(usize, Rect)> {
        self.window.pages().map(|page| (page.index, page.rect)).collect()
    }

    pub fn materialized_count(&self) -> usize {
        self.window.len()
    }

    pub fn pool_len(&self) -> usize {
        self.window.pool_len()
    }

    pub fn needs_layout(&self) -> bool {
        self.needs_layout
    }

    /// True while another call to [`ReaderView::frame`] would make progress.
    pub fn wants_frame(&self) -> bool {
        self.frame_requested || self.needs_layout || !self.deferred.is_empty()
    }

    pub fn set_viewport_size(&mut self, size: Size) {
        if size == self.viewport {
            return;
        }
        debug!(width = size.width, height = size.height, "viewport resized");
        self.viewport = size;
        self.needs_layout = true;
    }

    #[instrument(skip(self, provider))]
    pub fn set_content_provider(&mut self, provider: impl ContentProvider<Content = C> + 'static) {
        let count = provider.count();
        self.provider = Some(Box::new(provider));
        if self.current >= count {
            self.current = count.saturating_sub(1);
        }
        self.source_changed = true;
        self.request_reset();
    }

    /// Jumps straight to `index`. Out-of-range indices are ignored.
    #[instrument(skip(self))]
    pub fn set_current_index(&mut self, index: usize) {
        if index >= self.count() {
            return;
        }
        self.hooks.on_move_off_child(self.current);
        self.current = index;
        self.hooks.on_move_to_child(index);
        self.request_reset();
    }

    /// Switches between fitted and reflowed layout. Scale returns to 1.0 and
    /// every page is rebuilt from scratch.
    #[instrument(skip(self))]
    pub fn refresh(&mut self, reflow: bool) {
        self.reflow = reflow;
        self.source_changed = true;
        self.scale = 1.0;
        self.scroll = Point::ZERO;
        self.request_reset();
    }

    pub fn reset_children(&mut self) {
        for page in self.window.pages_mut() {
            self.hooks.on_child_setup(page.index, &mut page.content);
        }
    }

    pub fn for_each_page_mut(&mut self, mut f: impl FnMut(usize, &mut C)) {
        for page in self.window.pages_mut() {
            f(page.index, &mut page.content);
        }
    }

    pub fn set_selection(&mut self, _index: usize) -> Result<(), ViewError> {
        Err(ViewError::NotSupported("set_selection"))
    }

    pub fn advance_to_next(&mut self) {
        self.slide_onto_screen(self.current + 1);
    }

    pub fn retreat_to_previous(&mut self) {
        if let Some(previous) = self.current.checked_sub(1) {
            self.slide_onto_screen(previous);
        }
    }

    pub fn on_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::Down { .. } => {
                self.driver.abort();
                self.transition(Transition::FingerDown);
            }
            Gesture::Drag {
                distance_x,
                distance_y,
            } => {
                if !self.phase.is_scaling() {
                    self.scroll.x -= distance_x.round() as i32;
                    self.scroll.y -= distance_y.round() as i32;
                    self.needs_layout = true;
                }
            }
            Gesture::Fling {
                velocity_x,
                velocity_y,
            } => self.fling(velocity_x, velocity_y),
            Gesture::DoubleTap { x, y } => self.double_tap(x, y),
            Gesture::SingleTap { x, y } => trace!(x, y, "single tap"),
            Gesture::ScaleBegin { .. } => {
                self.transition(Transition::ScaleBegin);
                // pending scroll is not on screen yet and would only jump
                self.scroll = Point::ZERO;
                self.last_scale_focus = None;
            }
            Gesture::Scale {
                factor,
                focus_x,
                focus_y,
            } => self.pinch(factor, focus_x, focus_y),
            Gesture::ScaleEnd => {
                if self.reflow {
                    let scale = self.scale;
                    for page in self.window.pages_mut() {
                        self.hooks
                            .on_scale_child(page.index, &mut page.content, scale);
                    }
                }
                self.transition(Transition::ScaleEnd);
            }
            Gesture::Up => self.finger_up(),
        }
    }

    /// Applies the driver's motion since the previous tick. Once the driver
    /// has stopped and nobody is touching the view, queues a settle for the
    /// current page.
    pub fn on_driver_tick(&mut self, now: Instant) {
        if !self.frame_requested {
            return;
        }
        self.frame_requested = false;

        if !self.driver.is_finished() {
            self.driver.compute(now);
            let position = self.driver.current();
            self.scroll.x += position.x - self.driver_last.x;
            self.scroll.y += position.y - self.driver_last.y;
            trace!(
                dx = position.x - self.driver_last.x,
                dy = position.y - self.driver_last.y,
                "driver step"
            );
            self.driver_last = position;
            self.needs_layout = true;
            self.frame_requested = true;
        } else if !self.phase.is_user_interacting() {
            if self.phase == Phase::Animating {
                self.transition(Transition::AnimationFinished);
            }
            if self.window.contains(self.current) {
                self.deferred.push(Deferred::Settle(self.current));
            }
        }
    }

    /// Lays out the current page and its neighbors, applying pending scroll,
    /// page changes, eviction and bounds correction.
    #[instrument(level = "trace", skip(self), fields(current = self.current))]
    pub fn layout_pass(&mut self) {
        self.needs_layout = false;
        let count = self.count();

        for page in self.window.pages_mut() {
            page.measured = measure(page.natural, self.viewport, self.scale, self.reflow);
        }

        if self.phase.is_reset_pending() {
            self.scroll = Point::ZERO;
            self.evict_all();
            if self.source_changed {
                debug!(dropped = self.window.pool_len(), "clearing recycle pool");
                self.window.clear_pool();
                self.source_changed = false;
            }
            // settle the freshly placed page once motion is known to be over
            self.request_frame();
            let animating = !self.driver.is_finished();
            self.transition(Transition::ResetApplied { animating });
        } else {
            self.follow_scroll(count);
            for index in self.window.outside_window(self.current) {
                self.evict(index);
            }
        }

        if count == 0 || self.viewport.is_empty() {
            return;
        }
        if self.current >= count {
            self.current = count - 1;
        }

        let created = !self.window.contains(self.current);
        self.materialize(self.current);
        let Some((measured, rect)) = self
            .window
            .get(self.current)
            .map(|page| (page.measured, page.rect))
        else {
            return;
        };

        let offset = sub_viewport_offset(measured, self.viewport);
        let origin = if created {
            offset
        } else {
            Point::new(rect.left + self.scroll.x, rect.top + self.scroll.y)
        };
        self.scroll = Point::ZERO;

        let mut placed = Rect::from_origin(origin, measured);
        let corr = correction(scroll_bounds(placed, self.viewport));
        let horizontal = self.config.orientation.is_horizontal();
        if !self.phase.is_user_interacting() && self.driver.is_finished() {
            placed = placed.offset(corr.x, corr.y);
        } else if horizontal && measured.height <= self.viewport.height {
            placed = placed.offset(0, corr.y);
        } else if !horizontal && measured.width <= self.viewport.width {
            placed = placed.offset(corr.x, 0);
        }
        if let Some(page) = self.window.get_mut(self.current) {
            page.rect = placed;
        }

        if let Some(previous) = self.current.checked_sub(1) {
            self.place_neighbor(previous, placed, offset, Side::Before);
        }
        if self.current + 1 < count {
            self.place_neighbor(self.current + 1, placed, offset, Side::After);
        }
    }

    /// Runs queued settle/unsettle notifications. Pages evicted since the
    /// notification was queued are skipped.
    pub fn drain_deferred(&mut self) {
        for task in self.deferred.take() {
            let (index, settle) = match task {
                Deferred::Settle(index) => (index, true),
                Deferred::Unsettle(index) => (index, false),
            };
            let Some(page) = self.window.get_mut(index) else {
                trace!(?task, "page no longer materialized");
                continue;
            };
            if settle {
                self.hooks.on_settle(index, &mut page.content);
            } else {
                self.hooks.on_unsettle(index, &mut page.content);
            }
        }
    }

    /// One display frame: driver tick, layout if anything moved, then the
    /// deferred notifications.
    pub fn frame(&mut self, now: Instant) {
        self.on_driver_tick(now);
        if self.needs_layout {
            self.layout_pass();
        }
        self.drain_deferred();
    }

    fn request_frame(&mut self) {
        self.frame_requested = true;
    }

    fn request_reset(&mut self) {
        self.transition(Transition::ResetRequested);
        self.needs_layout = true;
    }

    fn transition(&mut self, transition: Transition) {
        match self.phase.next(transition) {
            Some(next) => {
                if next != self.phase {
                    trace!(from = ?self.phase, to = ?next, "phase change");
                }
                self.phase = next;
            }
            None => warn!(phase = ?self.phase, ?transition, "rejected phase transition"),
        }
    }

    fn start_scroll(&mut self, dx: i32, dy: i32) {
        self.driver_last = Point::ZERO;
        self.driver.start_scroll(dx, dy, self.config.slide_duration);
        self.request_frame();
        self.transition(Transition::AnimationStarted);
    }

    /// Scroll bounds of a page at its measured size with pending scroll
    /// applied.
    fn bounds_of(&self, page: &MaterializedPage<C>) -> Rect {
        let rect = page.measured_rect().offset(self.scroll.x, self.scroll.y);
        scroll_bounds(rect, self.viewport)
    }

    fn slide_onto_screen(&mut self, index: usize) {
        let Some(page) = self.window.get(index) else {
            return;
        };
        let corr = correction(self.bounds_of(page));
        if !corr.is_zero() {
            self.start_scroll(corr.x, corr.y);
        }
    }

    fn finger_up(&mut self) {
        if self.window.contains(self.current) {
            if self.driver.is_finished() {
                self.slide_onto_screen(self.current);
            }
            if self.driver.is_finished() {
                self.deferred.push(Deferred::Settle(self.current));
            }
        }
        let animating = !self.driver.is_finished();
        self.transition(Transition::FingerUp { animating });
    }

    fn fling(&mut self, velocity_x: f32, velocity_y: f32) {
        if self.phase.is_scaling() {
            return;
        }
        let Some(page) = self.window.get(self.current) else {
            return;
        };
        let bounds = self.bounds_of(page);
        let horizontal = self.config.orientation.is_horizontal();

        let target = match direction_of_travel(velocity_x, velocity_y) {
            Direction::Left if horizontal && bounds.left >= 0 => Some(self.current + 1),
            Direction::Up if !horizontal && bounds.top >= 0 => Some(self.current + 1),
            Direction::Right if horizontal && bounds.right <= 0 => self.current.checked_sub(1),
            Direction::Down if !horizontal && bounds.bottom <= 0 => self.current.checked_sub(1),
            _ => None,
        };
        if let Some(target) = target {
            if self.window.contains(target) {
                debug!(from = self.current, to = target, "fling to adjacent page");
                self.slide_onto_screen(target);
                return;
            }
        }

        let margin = self.config.fling_margin;
        let expanded = bounds.inset(-margin, -margin);
        if within_bounds_in_direction(bounds, velocity_x, velocity_y) && expanded.contains(0, 0) {
            self.driver_last = Point::ZERO;
            self.driver.start_fling(velocity_x, velocity_y, bounds);
            self.request_frame();
            self.transition(Transition::AnimationStarted);
        }
    }

    fn double_tap(&mut self, x: f32, y: f32) {
        if self.reflow {
            return;
        }
        let Some(page) = self.window.get(self.current) else {
            return;
        };
        if page.measured.is_empty() {
            return;
        }
        let rect = page.rect;
        let vw = self.viewport.width as f32;
        let vh = self.viewport.height as f32;

        let fit = vw / page.measured.width as f32;
        let target = if self.scale > 1.0 {
            1.0
        } else if fit < 1.5 {
            2.0
        } else {
            fit
        };
        let (min, max) = self.config.scale_range(false);
        let target = target.clamp(min, max);
        let factor = target / self.scale;

        let (mut x_scroll, mut y_scroll) = if target >= 1.5 {
            // a tap within 25% of an edge counts as a tap on the edge
            let focus_x = (2.0 * x - vw / 2.0).clamp(0.0, vw);
            let focus_y = (2.0 * y - vh / 2.0).clamp(0.0, vh);
            let view_focus_x = focus_x as i32 - (rect.left + self.scroll.x);
            let view_focus_y = focus_y as i32 - (rect.top + self.scroll.y);
            (
                self.scroll.x + view_focus_x - (view_focus_x as f32 * factor) as i32,
                self.scroll.y + view_focus_y - (view_focus_y as f32 * factor) as i32,
            )
        } else {
            (self.scroll.x, self.scroll.y)
        };

        let width = rect.width() as f32 * factor;
        if width <= vw {
            x_scroll = -rect.left + ((vw - width) / 2.0) as i32;
        } else if rect.left + x_scroll > 0 {
            x_scroll = -rect.left;
        } else if rect.left as f32 + width + (x_scroll as f32) < vw {
            x_scroll = self.viewport.width - (rect.left as f32 + width) as i32;
        }

        let height = rect.height() as f32 * factor;
        if height <= vh {
            y_scroll = -rect.top + ((vh - height) / 2.0) as i32;
        } else if rect.top + y_scroll > 0 {
            y_scroll = -rect.top;
        } else if rect.top as f32 + height + (y_scroll as f32) < vh {
            y_scroll = self.viewport.height - (rect.top as f32 + height) as i32;
        }

        debug!(from = self.scale, to = target, "double tap zoom");
        self.scroll = Point::new(x_scroll, y_scroll);
        self.scale = target;
        self.needs_layout = true;
    }

    fn pinch(&mut self, factor: f32, focus_x: f32, focus_y: f32) {
        let previous = self.scale;
        let (min, max) = self.config.scale_range(self.reflow);
        self.scale = (self.scale * factor).clamp(min, max);

        if self.reflow {
            let scale = self.scale;
            if let Some(page) = self.window.get_mut(self.current) {
                self.hooks
                    .on_scale_child(page.index, &mut page.content, scale);
            }
            return;
        }

        let Some(rect) = self.page_rect(self.current) else {
            return;
        };
        let factor = self.scale / previous;
        let view_focus_x = focus_x as i32 - (rect.left + self.scroll.x);
        let view_focus_y = focus_y as i32 - (rect.top + self.scroll.y);
        let mut x = self.scroll.x as f32 + view_focus_x as f32 - view_focus_x as f32 * factor;
        let mut y = self.scroll.y as f32 + view_focus_y as f32 - view_focus_y as f32 * factor;
        if let Some((last_x, last_y)) = self.last_scale_focus {
            x += focus_x - last_x;
            y += focus_y - last_y;
        }
        self.scroll = Point::new(x as i32, y as i32);
        self.last_scale_focus = Some((focus_x, focus_y));
        self.needs_layout = true;
    }

    /// Moves `current` by one when its page has scrolled more than half a
    /// viewport past center.
    fn follow_scroll(&mut self, count: usize) {
        let Some(page) = self.window.get(self.current) else {
            return;
        };
        let measured = page.measured;
        let rect = page.rect;
        let offset = sub_viewport_offset(measured, self.viewport);
        let half_gap = self.config.gap / 2;
        let (forward, backward) = if self.config.orientation.is_horizontal() {
            let center = self.viewport.width / 2;
            (
                rect.left + measured.width + offset.x + half_gap + self.scroll.x < center,
                rect.left - offset.x - half_gap + self.scroll.x >= center,
            )
        } else {
            let center = self.viewport.height / 2;
            (
                rect.top + measured.height + offset.y + half_gap + self.scroll.y < center,
                rect.top - offset.y - half_gap + self.scroll.y >= center,
            )
        };

        if forward && self.current + 1 < count {
            self.move_current(self.current + 1);
        } else if backward && self.current > 0 {
            self.move_current(self.current - 1);
        }
    }

    fn move_current(&mut self, to: usize) {
        debug!(from = self.current, to, "current page changed");
        self.deferred.push(Deferred::Unsettle(self.current));
        self.request_frame();
        self.hooks.on_move_off_child(self.current);
        self.current = to;
        self.hooks.on_move_to_child(to);
    }

    fn evict(&mut self, index: usize) {
        if let Some(mut page) = self.window.remove(index) {
            self.hooks.on_not_in_use(index, &mut page.content);
            self.window.recycle(page.content);
            debug!(index, pool = self.window.pool_len(), "recycled page");
        }
    }

    fn evict_all(&mut self) {
        for index in self.window.indices() {
            self.evict(index);
        }
    }

    fn materialize(&mut self, index: usize) {
        if self.window.contains(index) {
            return;
        }
        let Some(provider) = self.provider.as_mut() else {
            return;
        };
        let recycled = self.window.take_recycled();
        let reused = recycled.is_some();
        let PageContent {
            content,
            natural_size,
        } = provider.page_content(index, recycled);
        let mut page = MaterializedPage {
            index,
            content,
            natural: natural_size,
            measured: measure(natural_size, self.viewport, self.scale, self.reflow),
            rect: Rect::default(),
        };
        self.hooks.on_child_setup(index, &mut page.content);
        self.hooks
            .on_scale_child(index, &mut page.content, self.scale);
        debug!(index, reused, "materialized page");
        self.window.insert(page);
    }

    fn place_neighbor(&mut self, index: usize, current: Rect, current_offset: Point, side: Side) {
        self.materialize(index);
        let viewport = self.viewport;
        let gap = self.config.gap;
        let orientation = self.config.orientation;
        if let Some(page) = self.window.get_mut(index) {
            let offset = sub_viewport_offset(page.measured, viewport);
            page.rect = place_adjacent(
                current,
                current_offset,
                page.measured,
                offset,
                gap,
                orientation,
                side,
            );
        }
    }
}
