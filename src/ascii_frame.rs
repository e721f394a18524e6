use crate::palette::ColorId;

/// A single character cell of the video pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlyphCell {
    pub ch: char,
    pub color: ColorId,
    pub bold: bool,
}

/// Row-major grid of glyph cells for one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlyphGrid {
    width: usize,
    height: usize,
    cells: Vec<GlyphCell>,
}

impl GlyphGrid {
    pub(crate) fn from_cells(width: usize, height: usize, cells: Vec<GlyphCell>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self {
            width,
            height,
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn cells(&self) -> &[GlyphCell] {
        &self.cells
    }

    pub fn rows(&self) -> impl Iterator<Item = &[GlyphCell]> {
        // chunks_exact panics on zero, and a zero-width grid has no rows anyway.
        self.cells.chunks_exact(self.width.max(1))
    }

    /// Characters only, one line per row with a trailing newline.
    pub fn to_text(&self) -> String {
        if self.cells.is_empty() {
            return String::new();
        }
        let mut value = String::with_capacity((self.width + 1) * self.height);
        for row in self.rows() {
            value.extend(row.iter().map(|cell| cell.ch));
            value.push('\n');
        }
        value
    }
}
