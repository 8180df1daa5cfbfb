//! Destructible tile map
//!
//! The battlefield is a 13x13 block grid. Brick blocks carry a 4x4 sub-bitmap
//! of 4-unit cells, steel blocks a 2x2 sub-bitmap of 8-unit cells, so the map
//! state is two flat boolean arrays (52x52 bricks, 26x26 steels) plus the
//! eagle. Destruction only ever flips cells from present to absent.

use smallvec::SmallVec;

use crate::game::constants::field;
use crate::util::rect::Rect;

/// Stage descriptor parse failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageParseError {
    #[error("Expected {expected} rows, got {got}")]
    WrongRowCount { expected: usize, got: usize },
    #[error("Row {row} has {got} tokens, expected {expected}")]
    WrongTokenCount { row: usize, got: usize, expected: usize },
    #[error("Bad token '{token}' at row {row}, col {col}")]
    BadToken { row: usize, col: usize, token: String },
    #[error("More than one eagle block")]
    MultipleEagles,
}

/// The default stage shipped with the server
pub const STAGE_1: &str = "\
.     .     .     .     .     .     .     .     .     .     .     .     .
.     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .
.     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .
.     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .
.     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .     Bffff .
.     .     .     .     .     .     .     .     .     .     .     .     .
Tf    .     .     Bffff .     .     .     .     .     Bffff .     .     Tf
.     .     .     .     .     .     .     .     .     .     .     .     .
.     Bffff .     Bffff .     .     .     .     .     Bffff .     Bffff .
.     Bffff .     Bffff .     .     .     .     .     Bffff .     Bffff .
.     Bffff .     Bffff .     .     .     .     .     Bffff .     Bffff .
.     .     .     .     .     Bffff Bffff Bffff .     .     .     .     .
.     .     .     .     .     Bffff E     Bffff .     .     .     .     .";

/// Id of the built-in stage, reported in `game_state_init`
pub const STAGE_1_ID: u32 = 1;

/// Destructible map state for one room
#[derive(Debug, Clone)]
pub struct TileMap {
    bricks: Vec<bool>,
    steels: Vec<bool>,
    eagle_block: Option<(usize, usize)>,
    eagle_broken: bool,
}

impl TileMap {
    /// Parse a stage descriptor: 13 rows of 13 whitespace-separated tokens.
    ///
    /// Token grammar: `B<hex>` brick block (16-bit row-major 4x4 sub-bitmap,
    /// bit 0 = top-left), `T<hex>` steel block (4-bit row-major 2x2
    /// sub-bitmap), `E` eagle, `.` empty.
    pub fn parse(descriptor: &str) -> Result<Self, StageParseError> {
        let rows: Vec<&str> = descriptor.lines().collect();
        if rows.len() != field::BLOCKS {
            return Err(StageParseError::WrongRowCount {
                expected: field::BLOCKS,
                got: rows.len(),
            });
        }

        let mut map = Self {
            bricks: vec![false; field::BRICK_COLS * field::BRICK_COLS],
            steels: vec![false; field::STEEL_COLS * field::STEEL_COLS],
            eagle_block: None,
            eagle_broken: false,
        };

        for (row, line) in rows.iter().enumerate() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.len() != field::BLOCKS {
                return Err(StageParseError::WrongTokenCount {
                    row,
                    got: tokens.len(),
                    expected: field::BLOCKS,
                });
            }
            for (col, token) in tokens.iter().enumerate() {
                map.apply_token(col, row, token)?;
            }
        }

        Ok(map)
    }

    fn apply_token(&mut self, col: usize, row: usize, token: &str) -> Result<(), StageParseError> {
        let bad = || StageParseError::BadToken {
            row,
            col,
            token: token.to_string(),
        };

        match token.as_bytes()[0] {
            b'B' => {
                let bits = u16::from_str_radix(&token[1..], 16).map_err(|_| bad())?;
                for sub in 0..16 {
                    if bits & (1 << sub) != 0 {
                        let bc = col * 4 + sub % 4;
                        let br = row * 4 + sub / 4;
                        self.bricks[br * field::BRICK_COLS + bc] = true;
                    }
                }
            }
            b'T' => {
                let bits = u8::from_str_radix(&token[1..], 16).map_err(|_| bad())?;
                if bits > 0xf {
                    return Err(bad());
                }
                for sub in 0..4 {
                    if bits & (1 << sub) != 0 {
                        let sc = col * 2 + sub % 2;
                        let sr = row * 2 + sub / 2;
                        self.steels[sr * field::STEEL_COLS + sc] = true;
                    }
                }
            }
            b'E' => {
                if token.len() != 1 {
                    return Err(bad());
                }
                if self.eagle_block.is_some() {
                    return Err(StageParseError::MultipleEagles);
                }
                self.eagle_block = Some((col, row));
            }
            b'.' => {}
            _ => return Err(bad()),
        }
        Ok(())
    }

    pub fn bricks(&self) -> &[bool] {
        &self.bricks
    }

    pub fn steels(&self) -> &[bool] {
        &self.steels
    }

    pub fn brick_at(&self, index: usize) -> bool {
        self.bricks.get(index).copied().unwrap_or(false)
    }

    pub fn steel_at(&self, index: usize) -> bool {
        self.steels.get(index).copied().unwrap_or(false)
    }

    /// Destroy a brick cell. Returns whether the cell was present.
    pub fn destroy_brick(&mut self, index: usize) -> bool {
        match self.bricks.get_mut(index) {
            Some(cell) if *cell => {
                *cell = false;
                true
            }
            _ => false,
        }
    }

    /// Destroy a steel cell. Returns whether the cell was present.
    pub fn destroy_steel(&mut self, index: usize) -> bool {
        match self.steels.get_mut(index) {
            Some(cell) if *cell => {
                *cell = false;
                true
            }
            _ => false,
        }
    }

    pub fn is_eagle_broken(&self) -> bool {
        self.eagle_broken
    }

    pub fn break_eagle(&mut self) {
        self.eagle_broken = true;
    }

    /// World rectangle of the eagle block, if the stage has one
    pub fn eagle_rect(&self) -> Option<Rect> {
        self.eagle_block.map(|(col, row)| {
            Rect::square(
                col as f64 * field::BLOCK_SIZE,
                row as f64 * field::BLOCK_SIZE,
                field::BLOCK_SIZE,
            )
        })
    }

    pub fn brick_rect(index: usize) -> Rect {
        let col = index % field::BRICK_COLS;
        let row = index / field::BRICK_COLS;
        Rect::square(
            col as f64 * field::BRICK_SIZE,
            row as f64 * field::BRICK_SIZE,
            field::BRICK_SIZE,
        )
    }

    pub fn steel_rect(index: usize) -> Rect {
        let col = index % field::STEEL_COLS;
        let row = index / field::STEEL_COLS;
        Rect::square(
            col as f64 * field::STEEL_SIZE,
            row as f64 * field::STEEL_SIZE,
            field::STEEL_SIZE,
        )
    }

    /// Indices of present brick cells overlapping `rect`.
    ///
    /// Only the grid cells intersecting the rect's bounding box are visited,
    /// so the scan is constant-bounded for tank- and bullet-sized rects.
    pub fn bricks_overlapping(&self, rect: &Rect, threshold: f64) -> SmallVec<[usize; 32]> {
        let mut hits = SmallVec::new();
        for index in cell_range(rect, field::BRICK_SIZE, field::BRICK_COLS) {
            if self.bricks[index] && rect.overlaps(&Self::brick_rect(index), threshold) {
                hits.push(index);
            }
        }
        hits
    }

    /// Indices of present steel cells overlapping `rect`
    pub fn steels_overlapping(&self, rect: &Rect, threshold: f64) -> SmallVec<[usize; 8]> {
        let mut hits = SmallVec::new();
        for index in cell_range(rect, field::STEEL_SIZE, field::STEEL_COLS) {
            if self.steels[index] && rect.overlaps(&Self::steel_rect(index), threshold) {
                hits.push(index);
            }
        }
        hits
    }

    /// Whether `rect` collides with any solid map structure.
    ///
    /// The eagle block stays solid even after it is broken; the wreck still
    /// blocks tanks.
    pub fn collides_solid(&self, rect: &Rect, threshold: f64) -> bool {
        if !self.bricks_overlapping(rect, threshold).is_empty() {
            return true;
        }
        if !self.steels_overlapping(rect, threshold).is_empty() {
            return true;
        }
        if let Some(eagle) = self.eagle_rect() {
            if rect.overlaps(&eagle, threshold) {
                return true;
            }
        }
        false
    }
}

/// Grid cell indices whose cells intersect the rect's bounding box
fn cell_range(rect: &Rect, cell_size: f64, cols: usize) -> impl Iterator<Item = usize> {
    let c0 = (rect.x / cell_size).floor().max(0.0) as usize;
    let r0 = (rect.y / cell_size).floor().max(0.0) as usize;
    let c1 = (rect.right() / cell_size).floor().min((cols - 1) as f64).max(0.0) as usize;
    let r1 = (rect.bottom() / cell_size).floor().min((cols - 1) as f64).max(0.0) as usize;
    let valid = c0 <= c1 && r0 <= r1 && c0 < cols && r0 < cols;
    valid
        .then(move || (r0..=r1).flat_map(move |r| (c0..=c1).map(move |c| r * cols + c)))
        .into_iter()
        .flatten()
}
