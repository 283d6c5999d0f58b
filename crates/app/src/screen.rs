//! Character grid the states render into
//!
//! The terminal adapter flushes it once per tick.

use ratelimit_core::{Position, TileMap};

const BASE_GLYPHS: &[char] = &['.', '"', '~', '^', '#', ',', ':', '%'];

pub struct Screen {
    width: usize,
    height: usize,
    cells: Vec<char>,
}

/// A rectangle of cells
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Screen {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![' '; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Blank the grid, resizing it when the terminal changed
    pub fn reset(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells.resize(width * height, ' ');
    }

    pub fn set(&mut self, x: usize, y: usize, c: char) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = c;
        }
    }

    /// Write text from `(x, y)`, clipped at the right edge
    pub fn text(&mut self, x: usize, y: usize, text: &str) {
        for (i, c) in text.chars().enumerate() {
            self.set(x + i, y, c);
        }
    }

    /// Write text flush with the right edge
    pub fn text_right(&mut self, y: usize, text: &str) {
        let len = text.chars().count();
        self.text(self.width.saturating_sub(len), y, text);
    }

    /// Word-wrap text into `width` columns from `(x, y)`; returns rows used
    pub fn paragraph(&mut self, x: usize, y: usize, width: usize, text: &str) -> usize {
        let width = width.max(1);
        let mut row = 0;
        let mut line = String::new();
        for word in text.split_whitespace() {
            if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
                self.text(x, y + row, &line);
                row += 1;
                line.clear();
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(word);
        }
        if !line.is_empty() {
            self.text(x, y + row, &line);
            row += 1;
        }
        row
    }

    pub fn border(&mut self, rect: Rect) {
        if rect.width < 2 || rect.height < 2 {
            return;
        }
        let right = rect.x + rect.width - 1;
        let bottom = rect.y + rect.height - 1;
        for x in rect.x..=right {
            self.set(x, rect.y, '-');
            self.set(x, bottom, '-');
        }
        for y in rect.y..=bottom {
            self.set(rect.x, y, '|');
            self.set(right, y, '|');
        }
        for (x, y) in [(rect.x, rect.y), (right, rect.y), (rect.x, bottom), (right, bottom)] {
            self.set(x, y, '+');
        }
    }

    /// Draw the part of `map` around `focus` that fits in `rect`, then the
    /// markers on top
    pub fn map(&mut self, rect: Rect, map: &TileMap, focus: Position, markers: &[(Position, char)]) {
        let offset_x = viewport_offset(focus.x, rect.width, map.width());
        let offset_y = viewport_offset(focus.y, rect.height, map.height());

        for row in 0..rect.height {
            for col in 0..rect.width {
                let pos = Position::new(offset_x + col as i32, offset_y + row as i32);
                if let Some(tile) = map.get(pos) {
                    self.set(rect.x + col, rect.y + row, tile_glyph(map, tile));
                }
            }
        }

        for &(pos, glyph) in markers {
            let col = pos.x - offset_x;
            let row = pos.y - offset_y;
            if col >= 0 && row >= 0 && (col as usize) < rect.width && (row as usize) < rect.height {
                self.set(rect.x + col as usize, rect.y + row as usize, glyph);
            }
        }
    }

    /// Rows of the grid as strings
    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.cells
            .chunks(self.width.max(1))
            .map(|row| row.iter().collect())
    }
}

/// First map column/row to show so `focus` sits mid-view, clamped to the map
fn viewport_offset(focus: i32, view: usize, size: usize) -> i32 {
    if size <= view {
        return 0;
    }
    let max = (size - view) as i32;
    (focus - view as i32 / 2).clamp(0, max)
}

fn tile_glyph(map: &TileMap, tile: ratelimit_core::Tile) -> char {
    if tile.feature >= 0 {
        return map
            .describe(tile)
            .and_then(|name| name.chars().next())
            .map(|c| c.to_ascii_uppercase())
            .unwrap_or('*');
    }
    usize::try_from(tile.base)
        .ok()
        .map(|i| BASE_GLYPHS[i % BASE_GLYPHS.len()])
        .unwrap_or(' ')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_clips() {
        let mut screen = Screen::new(5, 2);
        screen.text(3, 0, "hello");
        screen.text_right(1, "ab");
        let lines: Vec<String> = screen.lines().collect();
        assert_eq!(lines, vec!["   he", "   ab"]);
    }

    #[test]
    fn test_paragraph_wraps() {
        let mut screen = Screen::new(12, 4);
        let rows = screen.paragraph(0, 0, 10, "the server is hiding again");
        assert_eq!(rows, 3);
        let lines: Vec<String> = screen.lines().collect();
        assert_eq!(lines[0].trim_end(), "the server");
        assert_eq!(lines[1].trim_end(), "is hiding");
        assert_eq!(lines[2].trim_end(), "again");
    }

    #[test]
    fn test_map_centres_on_focus() {
        let map = TileMap::from_response(json!({
            "size": [6, 1],
            "terrains": ["grass", "water"],
            "landmarks": ["tower"],
            "tiles": [[0, -1], [1, -1], [0, -1], [0, 0], [1, -1], [0, -1]]
        }))
        .unwrap();
        let mut screen = Screen::new(3, 1);
        let rect = Rect { x: 0, y: 0, width: 3, height: 1 };

        screen.map(rect, &map, Position::new(3, 0), &[(Position::new(3, 0), '@')]);
        let lines: Vec<String> = screen.lines().collect();
        assert_eq!(lines, vec![".@\""]);

        screen.reset(3, 1);
        screen.map(rect, &map, Position::new(0, 0), &[]);
        let lines: Vec<String> = screen.lines().collect();
        assert_eq!(lines, vec![".\"."]);
    }
}
