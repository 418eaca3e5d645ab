use std::collections::{BTreeMap, VecDeque};

use crate::geometry::{Rect, Size};

#[derive(Debug)]
pub struct MaterializedPage<C> {
    pub index: usize,
    pub content: C,
    pub natural: Size,
    pub measured: Size,
    pub rect: Rect,
}

impl<C> MaterializedPage<C> {
    /// Rectangle as it would be after the measured size is applied at the
    /// current origin. `rect` can lag behind a scale change until the next
    /// layout pass.
    pub fn measured_rect(&self) -> Rect {
        Rect::new(
            self.rect.left,
            self.rect.top,
            self.rect.left + self.measured.width,
            self.rect.top + self.measured.height,
        )
    }
}

/// Pages currently materialized, keyed by index, plus the pool of shells
/// waiting to be handed back to the content provider.
#[derive(Debug)]
pub struct PageWindow<C> {
    pages: BTreeMap<usize, MaterializedPage<C>>,
    pool: VecDeque<C>,
}

impl<C> Default for PageWindow<C> {
    fn default() -> Self {
        Self {
            pages: BTreeMap::new(),
            pool: VecDeque::new(),
        }
    }
}

impl<C> PageWindow<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.pages.contains_key(&index)
    }

    pub fn get(&self, index: usize) -> Option<&MaterializedPage<C>> {
        self.pages.get(&index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MaterializedPage<C>> {
        self.pages.get_mut(&index)
    }

    pub fn indices(&self) -> Vec<usize> {
        self.pages.keys().copied().collect()
    }

    pub fn pages(&self) -> impl Iterator<Item = &MaterializedPage<C>> {
        self.pages.values()
    }

    pub fn pages_mut(&mut self) -> impl Iterator<Item = &mut MaterializedPage<C>> {
        self.pages.values_mut()
    }

    /// Replaces any page already held for the same index; the displaced
    /// content goes to the pool.
    pub fn insert(&mut self, page: MaterializedPage<C>) {
        if let Some(previous) = self.pages.insert(page.index, page) {
            self.pool.push_back(previous.content);
        }
    }

    pub fn remove(&mut self, index: usize) -> Option<MaterializedPage<C>> {
        self.pages.remove(&index)
    }

    /// Indices that fall outside `center ± 1`.
    pub fn outside_window(&self, center: usize) -> Vec<usize> {
        self.pages
            .keys()
            .copied()
            .filter(|&index| index + 1 < center || index > center + 1)
            .collect()
    }

    pub fn recycle(&mut self, content: C) {
        self.pool.push_back(content);
    }

    pub fn take_recycled(&mut self) -> Option<C> {
        self.pool.pop_front()
    }

    pub fn pool_len(&self) -> usize {
        self.pool.len()
    }

    pub fn clear_pool(&mut self) {
        self.pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(index: usize, content: &'static str) -> MaterializedPage<&'static str> {
        MaterializedPage {
            index,
            content,
            natural: Size::new(100, 100),
            measured: Size::new(100, 100),
            rect: Rect::default(),
        }
    }

    #[test]
    fn outside_window_keeps_neighbors() {
        let mut window = PageWindow::new();
        for (index, name) in [(0, "a"), (3, "b"), (4, "c"), (5, "d"), (7, "e")] {
            window.insert(page(index, name));
        }
        assert_eq!(window.outside_window(4), vec![0, 7]);
        assert_eq!(window.outside_window(0), vec![3, 4, 5, 7]);
    }

    #[test]
    fn pool_reuses_in_fifo_order() {
        let mut window: PageWindow<&str> = PageWindow::new();
        window.recycle("first");
        window.recycle("second");
        assert_eq!(window.take_recycled(), Some("first"));
        assert_eq!(window.take_recycled(), Some("second"));
        assert_eq!(window.take_recycled(), None);
    }

    #[test]
    fn inserting_twice_recycles_the_old_content() {
        let mut window = PageWindow::new();
        window.insert(page(2, "old"));
        window.insert(page(2, "new"));
        assert_eq!(window.len(), 1);
        assert_eq!(window.get(2).map(|p| p.content), Some("new"));
        assert_eq!(window.pool_len(), 1);
    }

    #[test]
    fn measured_rect_follows_new_size() {
        let mut p = page(0, "a");
        p.rect = Rect::new(10, 20, 110, 120);
        p.measured = Size::new(300, 50);
        assert_eq!(p.measured_rect(), Rect::new(10, 20, 310, 70));
    }
}
