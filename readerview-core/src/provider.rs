use crate::geometry::Size;

#[derive(Debug, Clone)]
pub struct PageContent<C> {
    pub content: C,
    pub natural_size: Size,
}

/// Source of per-page content. `recycled` is a shell previously handed out
/// for another index that the provider may reuse instead of allocating.
pub trait ContentProvider {
    type Content;

    fn count(&self) -> usize;

    fn page_content(
        &mut self,
        index: usize,
        recycled: Option<Self::Content>,
    ) -> PageContent<Self::Content>;
}

/// Notifications fired by [`crate::ReaderView`] during layout and
/// interaction. Every method defaults to a no-op.
#[allow(unused_variables)]
pub trait PageHooks<C> {
    fn on_child_setup(&mut self, index: usize, content: &mut C) {}

    fn on_move_to_child(&mut self, index: usize) {}

    fn on_move_off_child(&mut self, index: usize) {}

    /// Motion has stopped and nobody is touching the view.
    fn on_settle(&mut self, index: usize, content: &mut C) {}

    fn on_unsettle(&mut self, index: usize, content: &mut C) {}

    fn on_not_in_use(&mut self, index: usize, content: &mut C) {}

    fn on_scale_child(&mut self, index: usize, content: &mut C, scale: f32) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoHooks;

impl<C> PageHooks<C> for NoHooks {}
