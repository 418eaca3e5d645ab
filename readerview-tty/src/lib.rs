use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;
use crossterm::{
    cursor,
    event::{
        Event, KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType, WindowSize},
};
use readerview_core::{PointerAction, PointerEvent, Rect, Size};
use tracing::trace;

/// Pixel size of one terminal cell. Pointer positions and page rectangles
/// are exchanged with the controller in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellMetrics {
    pub cell_width: u16,
    pub cell_height: u16,
}

impl Default for CellMetrics {
    fn default() -> Self {
        Self {
            cell_width: 10,
            cell_height: 20,
        }
    }
}

impl CellMetrics {
    /// Uses the pixel size reported by the terminal, falling back to the
    /// default cell when the terminal reports none.
    pub fn from_window(window: &WindowSize) -> Self {
        if window.width == 0 || window.height == 0 || window.columns == 0 || window.rows == 0 {
            return Self::default();
        }
        Self {
            cell_width: (window.width / window.columns).max(1),
            cell_height: (window.height / window.rows).max(1),
        }
    }

    /// Center of the cell, in pixels.
    pub fn to_pixels(&self, column: u16, row: u16) -> (f32, f32) {
        (
            (f32::from(column) + 0.5) * f32::from(self.cell_width),
            (f32::from(row) + 0.5) * f32::from(self.cell_height),
        )
    }

    /// Pixel viewport for a page area of `columns` by `rows` cells.
    pub fn viewport(&self, columns: u16, rows: u16) -> Size {
        Size::new(
            i32::from(columns) * i32::from(self.cell_width),
            i32::from(rows) * i32::from(self.cell_height),
        )
    }

    fn column_of(&self, x: i32) -> i32 {
        x.div_euclid(i32::from(self.cell_width))
    }

    fn row_of(&self, y: i32) -> i32 {
        y.div_euclid(i32::from(self.cell_height))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UiEvent {
    SmartAdvance,
    SmartRetreat,
    NextPage,
    PrevPage,
    GotoPage { page: usize },
    Zoom { factor: f32 },
    ZoomToggle,
    ToggleReflow,
    Pan { delta_x: f32, delta_y: f32 },
    Pointer(PointerEvent),
    Resize { columns: u16, rows: u16 },
    ListMove { delta: isize },
    ListActivate,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Viewer,
    Chooser,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    metrics: CellMetrics,
}

impl EventMapper {
    pub const PAN_STEP: f32 = 40.0;
    pub const ZOOM_STEP: f32 = 1.25;

    pub fn new(metrics: CellMetrics) -> Self {
        Self {
            metrics,
            ..Self::default()
        }
    }

    pub fn set_metrics(&mut self, metrics: CellMetrics) {
        self.metrics = metrics;
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        self.map_event_at(event, Instant::now())
    }

    pub fn map_event_at(&mut self, event: Event, now: Instant) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Mouse(mouse) if self.mode == InputMode::Viewer => self.map_mouse(mouse, now),
            Event::Key(key) => match self.mode {
                InputMode::Viewer => self.map_key_viewer(key),
                InputMode::Chooser => self.map_key_chooser(key),
            },
            _ => UiEvent::None,
        }
    }

    fn map_key_viewer(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;
        match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Left, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(-Self::PAN_STEP, 0.0)
            }
            (KeyCode::Right, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(Self::PAN_STEP, 0.0)
            }
            (KeyCode::Up, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(0.0, -Self::PAN_STEP)
            }
            (KeyCode::Down, modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.pan(0.0, Self::PAN_STEP)
            }
            (KeyCode::Char('H'), KeyModifiers::SHIFT) => self.pan(-Self::PAN_STEP, 0.0),
            (KeyCode::Char('L'), KeyModifiers::SHIFT) => self.pan(Self::PAN_STEP, 0.0),
            (KeyCode::Char('K'), KeyModifiers::SHIFT) => self.pan(0.0, -Self::PAN_STEP),
            (KeyCode::Char('J'), KeyModifiers::SHIFT) => self.pan(0.0, Self::PAN_STEP),
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Char(' '), KeyModifiers::NONE)
            | (KeyCode::Down, KeyModifiers::NONE)
            | (KeyCode::PageDown, _) => {
                self.reset_count();
                UiEvent::SmartAdvance
            }
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Backspace, _)
            | (KeyCode::Up, KeyModifiers::NONE)
            | (KeyCode::PageUp, _) => {
                self.reset_count();
                UiEvent::SmartRetreat
            }
            (KeyCode::Char('l'), KeyModifiers::NONE) | (KeyCode::Right, KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::NextPage
            }
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::PrevPage
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                let page = self.take_count().saturating_sub(1);
                UiEvent::GotoPage { page }
            }
            (KeyCode::Char('G'), KeyModifiers::SHIFT) | (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::GotoPage { page: usize::MAX }
            }
            (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => {
                self.reset_count();
                UiEvent::Zoom {
                    factor: Self::ZOOM_STEP,
                }
            }
            (KeyCode::Char('-'), _) => {
                self.reset_count();
                UiEvent::Zoom {
                    factor: 1.0 / Self::ZOOM_STEP,
                }
            }
            (KeyCode::Char('z'), _) => {
                self.reset_count();
                UiEvent::ZoomToggle
            }
            (KeyCode::Char('r'), _) => {
                self.reset_count();
                UiEvent::ToggleReflow
            }
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => {
                self.reset_count();
                UiEvent::Quit
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_chooser(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, KeyModifiers::NONE) => {
                UiEvent::ListMove { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, KeyModifiers::NONE) => {
                UiEvent::ListMove { delta: -1 }
            }
            (KeyCode::PageDown, _) => UiEvent::ListMove { delta: 10 },
            (KeyCode::PageUp, _) => UiEvent::ListMove { delta: -10 },
            (KeyCode::Enter, _) => UiEvent::ListActivate,
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_mouse(&mut self, mouse: MouseEvent, now: Instant) -> UiEvent {
        let action = match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => PointerAction::Down,
            MouseEventKind::Drag(MouseButton::Left) => PointerAction::Move,
            MouseEventKind::Up(MouseButton::Left) => PointerAction::Up,
            MouseEventKind::ScrollDown => return self.pan(0.0, Self::PAN_STEP),
            MouseEventKind::ScrollUp => return self.pan(0.0, -Self::PAN_STEP),
            _ => return UiEvent::None,
        };
        let (x, y) = self.metrics.to_pixels(mouse.column, mouse.row);
        trace!(column = mouse.column, row = mouse.row, ?action, "pointer");
        UiEvent::Pointer(PointerEvent {
            pointer_id: 0,
            action,
            x,
            y,
            time: now,
        })
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    fn pan(&mut self, delta_x: f32, delta_y: f32) -> UiEvent {
        let multiplier = self.take_count() as f32;
        UiEvent::Pan {
            delta_x: delta_x * multiplier,
            delta_y: delta_y * multiplier,
        }
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

/// One page as the renderer sees it.
#[derive(Debug, Clone)]
pub struct PageOutline {
    pub index: usize,
    pub rect: Rect,
    pub label: String,
    pub settled: bool,
}

/// Character grid the page outlines are composed into before being written.
#[derive(Debug, Clone)]
pub struct Canvas {
    columns: u16,
    rows: u16,
    cells: Vec<char>,
}

impl Canvas {
    pub fn new(columns: u16, rows: u16) -> Self {
        Self {
            columns,
            rows,
            cells: vec![' '; usize::from(columns) * usize::from(rows)],
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn get(&self, column: i32, row: i32) -> Option<char> {
        self.offset(column, row).map(|idx| self.cells[idx])
    }

    pub fn row_text(&self, row: u16) -> String {
        let start = usize::from(row) * usize::from(self.columns);
        self.cells[start..start + usize::from(self.columns)]
            .iter()
            .collect()
    }

    fn offset(&self, column: i32, row: i32) -> Option<usize> {
        if column < 0 || row < 0 || column >= i32::from(self.columns) || row >= i32::from(self.rows)
        {
            return None;
        }
        Some(row as usize * usize::from(self.columns) + column as usize)
    }

    fn put(&mut self, column: i32, row: i32, ch: char) {
        if let Some(idx) = self.offset(column, row) {
            self.cells[idx] = ch;
        }
    }

    /// Draws the outline of `page`, clipped to the canvas. Settled pages get
    /// a double border.
    pub fn draw_page(&mut self, page: &PageOutline, metrics: CellMetrics) {
        let rect = page.rect;
        if rect.width() <= 0 || rect.height() <= 0 {
            return;
        }
        let left = metrics.column_of(rect.left);
        let right = metrics.column_of(rect.right - 1);
        let top = metrics.row_of(rect.top);
        let bottom = metrics.row_of(rect.bottom - 1);

        let (h, v, tl, tr, bl, br) = if page.settled {
            ('═', '║', '╔', '╗', '╚', '╝')
        } else {
            ('─', '│', '┌', '┐', '└', '┘')
        };
        let first_col = left.max(0);
        let last_col = right.min(i32::from(self.columns) - 1);
        for column in first_col..=last_col {
            self.put(column, top, h);
            self.put(column, bottom, h);
        }
        let first_row = top.max(0);
        let last_row = bottom.min(i32::from(self.rows) - 1);
        for row in first_row..=last_row {
            self.put(left, row, v);
            self.put(right, row, v);
        }
        self.put(left, top, tl);
        self.put(right, top, tr);
        self.put(left, bottom, bl);
        self.put(right, bottom, br);

        let label_width = page.label.chars().count() as i32;
        let label_row = (top + bottom) / 2;
        let label_col = (left + right + 1 - label_width) / 2;
        for (offset, ch) in page.label.chars().enumerate() {
            let column = label_col + offset as i32;
            if column > left && column < right {
                self.put(column, label_row, ch);
            }
        }
    }
}

pub struct OutlineRenderer<W: Write> {
    writer: W,
}

impl<W: Write> OutlineRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes every canvas row starting at the top-left of the screen.
    pub fn present(&mut self, canvas: &Canvas) -> Result<()> {
        for row in 0..canvas.rows() {
            crossterm::queue!(
                self.writer,
                cursor::MoveTo(0, row),
                Print(canvas.row_text(row))
            )?;
        }
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// The terminal renders everything buffered since
    /// [`OutlineRenderer::begin_sync_update`] at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }

    pub fn status_line(&mut self, row: u16, label: &str) -> Result<()> {
        crossterm::queue!(
            self.writer,
            cursor::MoveTo(0, row),
            Clear(ClearType::CurrentLine)
        )?;
        write_status_line(&mut self.writer, label)?;
        Ok(())
    }

    pub fn print_inverted(&mut self, column: u16, row: u16, content: &str) -> Result<()> {
        crossterm::execute!(
            self.writer,
            cursor::MoveTo(column, row),
            SetAttribute(Attribute::Reverse),
            Print(content),
            SetAttribute(Attribute::Reset)
        )?;
        Ok(())
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEventKind, KeyEventState};

    fn key_event(code: KeyCode) -> Event {
        key_event_with_modifiers(code, KeyModifiers::NONE)
    }

    fn key_event_with_modifiers(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse_event(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn event_mapper_uses_numeric_prefix_for_goto() {
        let mut mapper = EventMapper::default();
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('1'))), UiEvent::None);
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('2'))), UiEvent::None);
        assert_eq!(mapper.pending_input().as_deref(), Some("12"));

        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::GotoPage { page: 11 }
        );
        assert!(mapper.pending_input().is_none());
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('g'))),
            UiEvent::GotoPage { page: 0 }
        );
    }

    #[test]
    fn event_mapper_drops_prefix_on_other_command() {
        let mut mapper = EventMapper::default();
        mapper.map_event(key_event(KeyCode::Char('4')));
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char(' '))),
            UiEvent::SmartAdvance
        );
        assert!(mapper.pending_input().is_none());
    }

    #[test]
    fn event_mapper_maps_paging_keys() {
        let mut mapper = EventMapper::default();
        assert_eq!(
            mapper.map_event(key_event(KeyCode::PageUp)),
            UiEvent::SmartRetreat
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('l'))),
            UiEvent::NextPage
        );
        assert_eq!(mapper.map_event(key_event(KeyCode::Left)), UiEvent::PrevPage);
        assert_eq!(
            mapper.map_event(key_event_with_modifiers(
                KeyCode::Char('G'),
                KeyModifiers::SHIFT
            )),
            UiEvent::GotoPage { page: usize::MAX }
        );
        assert_eq!(mapper.map_event(key_event(KeyCode::Char('q'))), UiEvent::Quit);
    }

    #[test]
    fn event_mapper_numeric_prefix_scales_pan_distance() {
        let mut mapper = EventMapper::default();
        mapper.map_event(key_event(KeyCode::Char('3')));
        match mapper.map_event(key_event_with_modifiers(
            KeyCode::Right,
            KeyModifiers::CONTROL,
        )) {
            UiEvent::Pan { delta_x, delta_y } => {
                assert!((delta_x - 3.0 * EventMapper::PAN_STEP).abs() < f32::EPSILON);
                assert_eq!(delta_y, 0.0);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn event_mapper_zoom_keys_are_reciprocal() {
        let mut mapper = EventMapper::default();
        let zoom_in = mapper.map_event(key_event(KeyCode::Char('+')));
        let zoom_out = mapper.map_event(key_event(KeyCode::Char('-')));
        match (zoom_in, zoom_out) {
            (UiEvent::Zoom { factor: a }, UiEvent::Zoom { factor: b }) => {
                assert!((a * b - 1.0).abs() < 1e-6);
            }
            other => panic!("unexpected events: {:?}", other),
        }
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('z'))),
            UiEvent::ZoomToggle
        );
    }

    #[test]
    fn mouse_presses_become_pointer_events_in_pixels() {
        let metrics = CellMetrics {
            cell_width: 8,
            cell_height: 16,
        };
        let mut mapper = EventMapper::new(metrics);
        let now = Instant::now();
        match mapper.map_event_at(mouse_event(MouseEventKind::Down(MouseButton::Left), 10, 4), now)
        {
            UiEvent::Pointer(event) => {
                assert_eq!(event.action, PointerAction::Down);
                assert_eq!((event.x, event.y), (84.0, 72.0));
                assert_eq!(event.time, now);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(matches!(
            mapper.map_event_at(mouse_event(MouseEventKind::Drag(MouseButton::Left), 9, 4), now),
            UiEvent::Pointer(PointerEvent {
                action: PointerAction::Move,
                ..
            })
        ));
        assert_eq!(
            mapper.map_event_at(mouse_event(MouseEventKind::Moved, 9, 4), now),
            UiEvent::None
        );
    }

    #[test]
    fn chooser_mode_maps_list_navigation() {
        let mut mapper = EventMapper::default();
        mapper.map_event(key_event(KeyCode::Char('5')));
        mapper.set_mode(InputMode::Chooser);
        assert!(mapper.pending_input().is_none());
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Char('j'))),
            UiEvent::ListMove { delta: 1 }
        );
        assert_eq!(
            mapper.map_event(key_event(KeyCode::Enter)),
            UiEvent::ListActivate
        );
        assert_eq!(
            mapper.map_event(mouse_event(MouseEventKind::Down(MouseButton::Left), 1, 1)),
            UiEvent::None
        );
    }

    #[test]
    fn metrics_fall_back_when_terminal_reports_no_pixels() {
        let window = WindowSize {
            rows: 40,
            columns: 120,
            width: 0,
            height: 0,
        };
        assert_eq!(CellMetrics::from_window(&window), CellMetrics::default());
        let window = WindowSize {
            rows: 40,
            columns: 120,
            width: 1200,
            height: 800,
        };
        let metrics = CellMetrics::from_window(&window);
        assert_eq!(metrics.viewport(120, 39), Size::new(1200, 780));
    }

    #[test]
    fn canvas_draws_clipped_outline_with_label() {
        let metrics = CellMetrics {
            cell_width: 10,
            cell_height: 10,
        };
        let mut canvas = Canvas::new(20, 6);
        canvas.draw_page(
            &PageOutline {
                index: 0,
                rect: Rect::new(20, 0, 120, 60),
                label: "p1".to_string(),
                settled: false,
            },
            metrics,
        );
        assert_eq!(canvas.row_text(0), "  ┌────────┐        ");
        assert_eq!(canvas.row_text(2), "  │   p1   │        ");
        assert_eq!(canvas.row_text(5), "  └────────┘        ");

        // a page hanging off the right edge loses its right border
        canvas.draw_page(
            &PageOutline {
                index: 1,
                rect: Rect::new(150, 0, 300, 60),
                label: String::new(),
                settled: true,
            },
            metrics,
        );
        assert_eq!(canvas.get(15, 0), Some('╔'));
        assert_eq!(canvas.get(19, 0), Some('═'));
        assert_eq!(canvas.get(19, 3), Some(' '));
    }

    #[test]
    fn present_writes_every_row() {
        let mut renderer = OutlineRenderer::new(Vec::new());
        let canvas = Canvas::new(3, 2);
        renderer.present(&canvas).unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains("\u{1b}[1;1H"));
        assert!(output.contains("\u{1b}[2;1H"));
    }
}
