use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::style::Print;
use crossterm::{cursor, event, terminal};
use notify::{EventKind, RecursiveMode, Watcher};
use readerview_core::{
    ChooserItem, DocumentLister, FsDocumentLister, ItemKind, ListPosition, PositionStore, Purpose,
};
use readerview_tty::{EventMapper, InputMode, OutlineRenderer, UiEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{truncate_with_ellipsis, RawModeGuard};

pub struct ChooserScreen {
    items: Vec<ChooserItem>,
    selected: usize,
    first_visible: usize,
}

impl ChooserScreen {
    /// Opens the list scrolled to `first_visible`, with the first document
    /// from there on selected.
    pub fn new(items: Vec<ChooserItem>, first_visible: usize) -> Self {
        let first_visible = first_visible.min(items.len().saturating_sub(1));
        let selected = items
            .iter()
            .skip(first_visible)
            .position(|item| item.kind == ItemKind::Doc)
            .map(|offset| first_visible + offset)
            .unwrap_or(first_visible);
        Self {
            items,
            selected,
            first_visible,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected_item(&self) -> Option<&ChooserItem> {
        self.items.get(self.selected)
    }

    pub fn position(&self) -> ListPosition {
        ListPosition {
            first_visible: self.first_visible,
        }
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.items.is_empty() {
            return false;
        }
        let len = self.items.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    pub fn ensure_visible(&mut self, viewport_height: usize) {
        if viewport_height == 0 || self.items.is_empty() {
            self.first_visible = 0;
            return;
        }
        let max_offset = self.items.len().saturating_sub(viewport_height);
        if self.first_visible > max_offset {
            self.first_visible = max_offset;
        }
        if self.selected < self.first_visible {
            self.first_visible = self.selected;
            return;
        }
        let bottom = self.first_visible + viewport_height;
        if self.selected >= bottom {
            self.first_visible = self.selected + 1 - viewport_height;
        }
    }

    /// Swaps in a fresh scan, keeping the selection on the same file when it
    /// still exists.
    pub fn replace_items(&mut self, items: Vec<ChooserItem>) {
        let previous = self.selected_item().map(|item| item.full_path.clone());
        self.items = items;
        self.selected = previous
            .and_then(|path| self.items.iter().position(|item| item.full_path == path))
            .unwrap_or_else(|| self.selected.min(self.items.len().saturating_sub(1)));
    }

    pub fn lines(&self, height: usize, width: usize) -> Vec<(String, bool)> {
        self.items
            .iter()
            .enumerate()
            .skip(self.first_visible)
            .take(height)
            .map(|(idx, item)| {
                let text = match item.kind {
                    ItemKind::Dir => format!("{}/", item.name),
                    ItemKind::Doc => format!("    {}", item.name),
                };
                (truncate_with_ellipsis(text, width), idx == self.selected)
            })
            .collect()
    }
}

/// Prints the scan for `root` to stdout, one entry per line.
pub async fn print(root: &Path, purpose: Purpose) -> Result<()> {
    let items = FsDocumentLister.list(root, purpose).await?;
    let mut stdout = io::stdout().lock();
    for item in items {
        match item.kind {
            ItemKind::Dir => writeln!(stdout, "{}/", item.name)?,
            ItemKind::Doc => writeln!(stdout, "    {}", item.name)?,
        }
    }
    Ok(())
}

/// Interactive list. Returns the chosen document, or `None` when the user
/// quits.
pub async fn run(
    root: &Path,
    purpose: Purpose,
    store: Arc<dyn PositionStore>,
    watch: bool,
) -> Result<Option<PathBuf>> {
    let lister = FsDocumentLister;
    let items = lister.list(root, purpose).await?;
    let start = match store.load(root) {
        Ok(position) => position.unwrap_or_default().first_visible,
        Err(err) => {
            warn!(%err, "ignoring unreadable list position");
            0
        }
    };
    let mut screen = ChooserScreen::new(items, start);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let _watcher = if watch {
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                if matches!(event.kind, EventKind::Create(_) | EventKind::Remove(_)) {
                    let _ = tx.send(());
                }
            }
        })
        .context("failed to start directory watcher")?;
        watcher
            .watch(root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {:?}", root))?;
        info!(?root, "watching for new and removed documents");
        Some(watcher)
    } else {
        None
    };

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = OutlineRenderer::new(stdout);
    let mut mapper = EventMapper::default();
    mapper.set_mode(InputMode::Chooser);
    let mut dirty = true;

    let chosen = loop {
        let mut rescan = false;
        while rx.try_recv().is_ok() {
            rescan = true;
        }
        if rescan {
            let items = lister.list(root, purpose).await?;
            debug!(count = items.len(), "rescanned after directory change");
            screen.replace_items(items);
            dirty = true;
        }

        if dirty {
            draw(&mut renderer, &mut screen, root)?;
            dirty = false;
        }

        if event::poll(Duration::from_millis(100))? {
            match mapper.map_event(event::read()?) {
                UiEvent::ListMove { delta } => dirty = screen.move_selection(delta),
                UiEvent::ListActivate => match screen.selected_item() {
                    Some(item) if item.kind == ItemKind::Doc => {
                        break Some(item.full_path.clone());
                    }
                    _ => {}
                },
                UiEvent::Resize { .. } => {
                    renderer.clear_all()?;
                    dirty = true;
                }
                UiEvent::Quit => break None,
                _ => {}
            }
        }
    };

    renderer.clear_all()?;
    store.save(root, screen.position())?;
    Ok(chosen)
}

fn draw<W: Write>(
    renderer: &mut OutlineRenderer<W>,
    screen: &mut ChooserScreen,
    root: &Path,
) -> Result<()> {
    let window = terminal::window_size()?;
    let width = usize::from(window.columns);
    let height = usize::from(window.rows.saturating_sub(1));
    screen.ensure_visible(height);

    renderer.begin_sync_update()?;
    crossterm::queue!(
        renderer.writer(),
        terminal::Clear(terminal::ClearType::All)
    )?;
    if screen.is_empty() {
        crossterm::queue!(
            renderer.writer(),
            cursor::MoveTo(0, 0),
            Print("no documents found")
        )?;
    }
    for (row, (line, selected)) in screen.lines(height, width).into_iter().enumerate() {
        let row = row as u16;
        if selected {
            renderer.print_inverted(0, row, &line)?;
        } else {
            crossterm::queue!(renderer.writer(), cursor::MoveTo(0, row), Print(line))?;
        }
    }
    let status = truncate_with_ellipsis(format!("{}", root.display()), width);
    renderer.status_line(window.rows.saturating_sub(1), &status)?;
    renderer.end_sync_update()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir(name: &str) -> ChooserItem {
        ChooserItem {
            kind: ItemKind::Dir,
            name: name.to_string(),
            full_path: PathBuf::from(name),
        }
    }

    fn doc(dir: &str, name: &str) -> ChooserItem {
        ChooserItem {
            kind: ItemKind::Doc,
            name: name.to_string(),
            full_path: Path::new(dir).join(name),
        }
    }

    fn library() -> Vec<ChooserItem> {
        vec![
            dir("/books"),
            doc("/books", "a.pdf"),
            doc("/books", "b.pdf"),
            dir("/books/comics"),
            doc("/books/comics", "c.cbz"),
        ]
    }

    #[test]
    fn restored_position_selects_the_next_document() {
        let screen = ChooserScreen::new(library(), 3);
        assert_eq!(screen.selected_item().unwrap().name, "c.cbz");
        assert_eq!(screen.position(), ListPosition { first_visible: 3 });

        let screen = ChooserScreen::new(library(), 99);
        assert_eq!(screen.position().first_visible, 4);
    }

    #[test]
    fn selection_scrolls_the_list() {
        let mut screen = ChooserScreen::new(library(), 0);
        assert_eq!(screen.selected_item().unwrap().name, "a.pdf");
        assert!(screen.move_selection(3));
        assert!(!screen.move_selection(5));
        screen.ensure_visible(2);
        assert_eq!(screen.position().first_visible, 3);
        let lines = screen.lines(2, 40);
        assert_eq!(lines[0], ("/books/comics/".to_string() + &" ".repeat(26), false));
        assert!(lines[1].1);
    }

    #[test]
    fn rescan_keeps_the_selected_file() {
        let mut screen = ChooserScreen::new(library(), 0);
        screen.move_selection(1);
        assert_eq!(screen.selected_item().unwrap().name, "b.pdf");

        let mut items = library();
        items.insert(1, doc("/books", "0.pdf"));
        screen.replace_items(items);
        assert_eq!(screen.selected_item().unwrap().name, "b.pdf");

        screen.replace_items(vec![dir("/other"), doc("/other", "z.pdf")]);
        assert_eq!(screen.selected_item().unwrap().name, "z.pdf");
    }
}
