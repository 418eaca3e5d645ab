//! Content-aware stepping through a zoomed page: down a column then across,
//! or across a row then down, before moving on to the adjacent page.
//!
//! Positions here are the viewport's offset within the scaled page, so a page
//! laid out at (-100, -100) is being viewed from (100, 100).

use tracing::instrument;

use super::ReaderView;
use crate::placement::smart_advance_amount;

impl<C> ReaderView<C> {
    #[instrument(skip(self))]
    pub fn smart_advance(&mut self, vertical: bool) {
        let Some(page) = self.window.get(self.current) else {
            return;
        };
        if self.viewport.is_empty() {
            return;
        }
        let screen_w = self.viewport.width;
        let screen_h = self.viewport.height;
        // aim from where any running animation will end
        let remaining = self.driver.remaining();
        let top = -(page.rect.top + self.scroll.y + remaining.y);
        let left = -(page.rect.left + self.scroll.x + remaining.x);
        let right = screen_w + left;
        let bottom = screen_h + top;
        let doc_w = page.measured.width;
        let doc_h = page.measured.height;

        let (x_offset, y_offset);
        if vertical {
            if bottom >= doc_h {
                if right + screen_w / 2 > doc_w {
                    let Some(next) = self.window.get(self.current + 1) else {
                        return;
                    };
                    let next_top = -(next.rect.top + self.scroll.y + remaining.y);
                    let next_left = -(next.rect.left + self.scroll.x + remaining.x);
                    let next_w = next.measured.width;
                    let next_h = next.measured.height;

                    let mut y = if next_h < screen_h {
                        (next_h - screen_h) >> 1
                    } else {
                        0
                    };
                    let mut x = if next_w < screen_w {
                        (next_w - screen_w) >> 1
                    } else {
                        // back to the column matching this one
                        let mut x = right % screen_w;
                        if x > screen_w / 2 {
                            x = 0;
                        }
                        if x + screen_w > next_w {
                            x = next_w - screen_w;
                        }
                        x
                    };
                    x -= next_left;
                    y -= next_top;
                    x_offset = x;
                    y_offset = y;
                } else {
                    // top of the next column
                    let mut x = screen_w;
                    if right + x > doc_w {
                        x = doc_w - right;
                    }
                    x_offset = x;
                    y_offset = screen_h - bottom;
                }
            } else {
                x_offset = 0;
                y_offset = smart_advance_amount(screen_h, doc_h - bottom);
            }
        } else if right >= doc_w {
            if bottom + screen_h > doc_h {
                if bottom < doc_h {
                    // less than a full row left
                    x_offset = -left;
                    y_offset = doc_h - bottom;
                } else {
                    let Some(next) = self.window.get(self.current + 1) else {
                        return;
                    };
                    let next_top = -(next.rect.top + self.scroll.y + remaining.y);
                    let next_left = -(next.rect.left + self.scroll.x + remaining.x);
                    let next_w = next.measured.width;
                    let next_h = next.measured.height;

                    let y = if next_h < screen_h {
                        (next_h - screen_h) >> 1
                    } else {
                        0
                    };
                    let x = if next_w < screen_w {
                        (next_w - screen_w) >> 1
                    } else {
                        0
                    };
                    x_offset = x - next_left;
                    y_offset = y - next_top;
                }
            } else {
                // left edge of the next row
                x_offset = -left;
                y_offset = screen_h;
            }
        } else {
            let mut x = screen_w;
            if right + screen_w > doc_w {
                x += doc_w - (right + screen_w);
            }
            x_offset = x;
            y_offset = 0;
        }

        self.start_scroll(remaining.x - x_offset, remaining.y - y_offset);
    }

    #[instrument(skip(self))]
    pub fn smart_retreat(&mut self, vertical: bool) {
        let Some(page) = self.window.get(self.current) else {
            return;
        };
        if self.viewport.is_empty() {
            return;
        }
        let screen_w = self.viewport.width;
        let screen_h = self.viewport.height;
        let remaining = self.driver.remaining();
        let left = -(page.rect.left + self.scroll.x + remaining.x);
        let top = -(page.rect.top + self.scroll.y + remaining.y);
        let right = screen_w + left;
        let doc_w = page.measured.width;
        let doc_h = page.measured.height;

        let (x_offset, y_offset);
        if vertical {
            if top <= 0 {
                if left < screen_w / 2 {
                    let Some(previous) = self.current.checked_sub(1) else {
                        return;
                    };
                    let Some(prev) = self.window.get(previous) else {
                        return;
                    };
                    let prev_w = prev.measured.width;
                    let prev_h = prev.measured.height;
                    // no in-flight motion for the previous page
                    let prev_left = -(prev.rect.left + self.scroll.x);
                    let prev_top = -(prev.rect.top + self.scroll.y);

                    let mut y = if prev_h < screen_h {
                        (prev_h - screen_h) >> 1
                    } else {
                        0
                    };
                    let mut x = if prev_w < screen_w {
                        (prev_w - screen_w) >> 1
                    } else {
                        let mut x = if left > 0 { left % screen_w } else { 0 };
                        if x + screen_w > prev_w {
                            x = prev_w - screen_w;
                        }
                        while x + screen_w * 2 < prev_w {
                            x += screen_w;
                        }
                        if x < prev_w - (3 * screen_w / 2) {
                            x = prev_w - screen_w;
                        }
                        x
                    };
                    x -= prev_left;
                    y -= prev_top - prev_h + screen_h;
                    x_offset = x;
                    y_offset = y;
                } else {
                    // bottom of the previous column
                    let mut x = -screen_w;
                    if left + x < 0 {
                        x = -left;
                    }
                    x_offset = x;
                    y_offset = doc_h - screen_h + top;
                }
            } else {
                x_offset = 0;
                y_offset = -smart_advance_amount(screen_h, top);
            }
        } else if left <= 0 {
            if top < screen_h {
                if top > 0 {
                    // less than a full row above
                    x_offset = doc_w - right;
                    y_offset = -top;
                } else {
                    let Some(previous) = self.current.checked_sub(1) else {
                        return;
                    };
                    let Some(prev) = self.window.get(previous) else {
                        return;
                    };
                    let prev_w = prev.measured.width;
                    let prev_h = prev.measured.height;
                    let prev_left = -(prev.rect.left + self.scroll.x);
                    let prev_top = -(prev.rect.top + self.scroll.y);

                    let y = if prev_h < screen_h {
                        (prev_h - screen_h) >> 1
                    } else {
                        0
                    };
                    let x = if prev_w < screen_w {
                        (prev_w - screen_w) >> 1
                    } else {
                        prev_w - screen_w
                    };
                    x_offset = x - prev_left;
                    y_offset = y - (prev_top - prev_h + screen_h);
                }
            } else {
                // right edge of the previous row
                x_offset = doc_w - right;
                y_offset = -screen_h;
            }
        } else {
            let mut x = -screen_w;
            if left + x < 0 {
                x = -left;
            }
            x_offset = x;
            y_offset = 0;
        }

        self.start_scroll(remaining.x - x_offset, remaining.y - y_offset);
    }
}
