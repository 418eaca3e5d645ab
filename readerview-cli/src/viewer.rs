use std::io::{self, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture};
use crossterm::{cursor, terminal};
use readerview_core::{Gesture, GestureDetector, Orientation, ReaderView, ViewerConfig};
use readerview_tty::{Canvas, CellMetrics, EventMapper, OutlineRenderer, PageOutline, UiEvent};
use tracing::{debug, info};

use crate::manifest::{ManifestProvider, PageTile};
use crate::{combine_status, truncate_with_ellipsis, LoopAction, RawModeGuard};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const IDLE_POLL: Duration = Duration::from_millis(100);

pub struct ViewerState {
    view: ReaderView<PageTile>,
    detector: GestureDetector,
    mapper: EventMapper,
    metrics: CellMetrics,
    columns: u16,
    rows: u16,
}

impl ViewerState {
    pub fn new(config: ViewerConfig, metrics: CellMetrics, columns: u16, rows: u16) -> Self {
        let detector = GestureDetector::new(config.gestures.clone());
        let viewport = metrics.viewport(columns, rows.saturating_sub(1));
        let view = ReaderView::new(config, viewport).with_hooks(crate::manifest::TileHooks);
        Self {
            view,
            detector,
            mapper: EventMapper::new(metrics),
            metrics,
            columns,
            rows,
        }
    }

    pub fn view(&self) -> &ReaderView<PageTile> {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ReaderView<PageTile> {
        &mut self.view
    }

    fn reads_in_columns(&self) -> bool {
        self.view.config().orientation == Orientation::Vertical || self.view.is_reflow()
    }

    fn center(&self) -> (f32, f32) {
        let viewport = self.view.viewport();
        (viewport.width as f32 / 2.0, viewport.height as f32 / 2.0)
    }

    fn replay(&mut self, gestures: &[Gesture]) {
        for gesture in gestures {
            self.view.on_gesture(*gesture);
        }
    }

    pub fn handle_event(&mut self, event: UiEvent) -> LoopAction {
        let (x, y) = self.center();
        match event {
            UiEvent::Quit => return LoopAction::Quit,
            UiEvent::SmartAdvance => {
                let columns = self.reads_in_columns();
                self.view.smart_advance(columns);
            }
            UiEvent::SmartRetreat => {
                let columns = self.reads_in_columns();
                self.view.smart_retreat(columns);
            }
            UiEvent::NextPage => self.view.advance_to_next(),
            UiEvent::PrevPage => self.view.retreat_to_previous(),
            UiEvent::GotoPage { page } => {
                let count = self.view.count();
                if count == 0 {
                    return LoopAction::Continue;
                }
                self.view.set_current_index(page.min(count - 1));
            }
            UiEvent::Zoom { factor } => self.replay(&[
                Gesture::Down { x, y },
                Gesture::ScaleBegin {
                    focus_x: x,
                    focus_y: y,
                },
                Gesture::Scale {
                    factor,
                    focus_x: x,
                    focus_y: y,
                },
                Gesture::ScaleEnd,
                Gesture::Up,
            ]),
            UiEvent::ZoomToggle => {
                self.replay(&[Gesture::Down { x, y }, Gesture::DoubleTap { x, y }, Gesture::Up])
            }
            UiEvent::ToggleReflow => {
                let reflow = !self.view.is_reflow();
                info!(reflow, "switching layout mode");
                self.view.refresh(reflow);
            }
            UiEvent::Pan { delta_x, delta_y } => self.replay(&[
                Gesture::Down { x, y },
                Gesture::Drag {
                    distance_x: delta_x,
                    distance_y: delta_y,
                },
                Gesture::Up,
            ]),
            UiEvent::Pointer(pointer) => {
                let gestures = self.detector.on_pointer(pointer);
                self.replay(&gestures);
            }
            UiEvent::Resize { columns, rows } => {
                self.metrics = terminal::window_size()
                    .map(|window| CellMetrics::from_window(&window))
                    .unwrap_or(self.metrics);
                self.resize(columns, rows);
                return LoopAction::ClearRedraw;
            }
            UiEvent::ListMove { .. } | UiEvent::ListActivate | UiEvent::None => {
                return LoopAction::Continue
            }
        }
        LoopAction::ContinueRedraw
    }

    pub fn resize(&mut self, columns: u16, rows: u16) {
        debug!(columns, rows, "terminal resized");
        self.columns = columns;
        self.rows = rows;
        self.mapper.set_metrics(self.metrics);
        self.view
            .set_viewport_size(self.metrics.viewport(columns, rows.saturating_sub(1)));
    }

    pub fn compose(&self) -> Canvas {
        let mut canvas = Canvas::new(self.columns, self.rows.saturating_sub(1));
        for (index, rect) in self.view.page_rects() {
            let Some(tile) = self.view.page(index) else {
                continue;
            };
            canvas.draw_page(
                &PageOutline {
                    index,
                    rect,
                    label: tile.caption(index),
                    settled: tile.settled,
                },
                self.metrics,
            );
        }
        canvas
    }

    pub fn status(&self) -> String {
        let view = &self.view;
        let mut status = if view.count() == 0 {
            "no pages".to_string()
        } else {
            format!(
                "page {}/{} | zoom {:.2}",
                view.current_index() + 1,
                view.count(),
                view.scale()
            )
        };
        if view.is_reflow() {
            status.push_str(" | reflow");
        }
        let pending = self.mapper.pending_input();
        combine_status(Some(status), pending.as_deref()).unwrap_or_default()
    }

    fn redraw<W: Write>(&self, renderer: &mut OutlineRenderer<W>) -> Result<()> {
        let canvas = self.compose();
        renderer.begin_sync_update()?;
        renderer.present(&canvas)?;
        let status = truncate_with_ellipsis(self.status(), usize::from(self.columns));
        renderer.status_line(self.rows.saturating_sub(1), &status)?;
        renderer.end_sync_update()?;
        Ok(())
    }
}

pub fn run(
    config: ViewerConfig,
    provider: ManifestProvider,
    start_page: Option<usize>,
) -> Result<()> {
    let window = terminal::window_size()?;
    let metrics = CellMetrics::from_window(&window);
    let mut state = ViewerState::new(config, metrics, window.columns, window.rows);
    state.view_mut().set_content_provider(provider);
    if let Some(page) = start_page {
        state.view_mut().set_current_index(page);
    }

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide, EnableMouseCapture)?;
    let mut renderer = OutlineRenderer::new(stdout);
    renderer.clear_all()?;
    let mut dirty = true;

    loop {
        if state.view().wants_frame() {
            state.view_mut().frame(Instant::now());
            dirty = true;
        }
        if dirty {
            state.redraw(&mut renderer)?;
            dirty = false;
        }

        let timeout = if state.view().wants_frame() {
            FRAME_INTERVAL
        } else {
            IDLE_POLL
        };
        if event::poll(timeout)? {
            let ui_event = state.mapper.map_event(event::read()?);
            match state.handle_event(ui_event) {
                LoopAction::Continue => {
                    if state.mapper.pending_input().is_some() {
                        dirty = true;
                    }
                }
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::ClearRedraw => {
                    renderer.clear_all()?;
                    dirty = true;
                }
                LoopAction::Quit => break,
            }
        }
    }

    crossterm::execute!(renderer.writer(), DisableMouseCapture)?;
    renderer.clear_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use readerview_core::Size;

    /// Runs frames until the view has nothing left to animate, at most
    /// `limit` of them.
    fn pump(state: &mut ViewerState, limit: usize) {
        let now = Instant::now();
        for _ in 0..limit {
            if !state.view().wants_frame() {
                break;
            }
            state.view_mut().frame(now);
        }
    }

    fn state(count: usize) -> ViewerState {
        let metrics = CellMetrics {
            cell_width: 10,
            cell_height: 20,
        };
        let mut state = ViewerState::new(ViewerConfig::default(), metrics, 100, 41);
        state
            .view_mut()
            .set_content_provider(ManifestProvider::new(Manifest::uniform(
                count,
                Size::new(500, 800),
            )));
        pump(&mut state, 8);
        state
    }

    #[test]
    fn first_frame_settles_the_current_page() {
        let state = state(3);
        assert_eq!(state.view().viewport(), Size::new(1000, 800));
        assert!(state.view().displayed_page().unwrap().settled);
        assert_eq!(state.status(), "page 1/3 | zoom 1.00");
    }

    #[test]
    fn goto_clamps_to_the_last_page() {
        let mut state = state(3);
        assert_eq!(
            state.handle_event(UiEvent::GotoPage { page: usize::MAX }),
            LoopAction::ContinueRedraw
        );
        pump(&mut state, 8);
        assert_eq!(state.view().current_index(), 2);
    }

    #[test]
    fn zoom_keys_scale_the_view() {
        let mut state = state(1);
        state.handle_event(UiEvent::Zoom { factor: 2.0 });
        assert!((state.view().scale() - 2.0).abs() < 1e-6);
        state.handle_event(UiEvent::Zoom { factor: 0.1 });
        assert!((state.view().scale() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn reflow_toggle_shows_in_status() {
        let mut state = state(2);
        state.handle_event(UiEvent::ToggleReflow);
        pump(&mut state, 8);
        assert!(state.view().is_reflow());
        assert!(state.status().ends_with("| reflow"));
    }

    #[test]
    fn composed_canvas_outlines_the_current_page() {
        let state = state(2);
        let canvas = state.compose();
        // 500x800 page centered in a 1000x800 viewport
        assert_eq!(canvas.get(25, 0), Some('╔'));
        assert_eq!(canvas.get(74, 39), Some('╝'));
    }

    #[test]
    fn empty_document_ignores_goto() {
        let mut state = state(0);
        assert_eq!(
            state.handle_event(UiEvent::GotoPage { page: 3 }),
            LoopAction::Continue
        );
        assert_eq!(state.status(), "no pages");
    }
}
