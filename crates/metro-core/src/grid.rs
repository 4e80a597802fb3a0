//! The tunnel map: a fixed-size grid of tile kinds.
//!
//! # ASCII form
//!
//! | Char      | Tile                 |
//! |-----------|----------------------|
//! | `.`       | `Empty` (track)      |
//! | `#`       | `Wall`               |
//! | `@`       | `Station`            |
//! | `A`..`Z`  | `Agent(AgentId)`     |
//!
//! `GridMap::parse` and `GridMap::render` are inverses for well-formed maps,
//! which keeps test fixtures readable.
//!
//! The live grid is owned by the engine's observer lock; this type has no
//! synchronisation of its own.

use std::fmt;

use crate::{AgentId, Cell, CoreError, CoreResult};

// ── TileKind ──────────────────────────────────────────────────────────────────

/// What occupies a single map tile.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TileKind {
    #[default]
    Empty,
    Wall,
    Station,
    Agent(AgentId),
}

impl TileKind {
    pub fn to_char(self) -> char {
        match self {
            TileKind::Empty    => '.',
            TileKind::Wall     => '#',
            TileKind::Station  => '@',
            TileKind::Agent(a) => a.label(),
        }
    }

    pub fn from_char(c: char) -> Option<TileKind> {
        match c {
            '.' => Some(TileKind::Empty),
            '#' => Some(TileKind::Wall),
            '@' => Some(TileKind::Station),
            _   => AgentId::from_label(c).map(TileKind::Agent),
        }
    }

    /// Track tiles a wagon may stand on.
    #[inline]
    pub fn is_passable(self) -> bool {
        matches!(self, TileKind::Empty | TileKind::Agent(_))
    }
}

// ── GridMap ───────────────────────────────────────────────────────────────────

/// Row-major `width × height` tile array.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GridMap {
    width:  usize,
    height: usize,
    tiles:  Vec<TileKind>,
}

/// The default metro layout: four corner stations joined by perimeter
/// tunnels, a central cross, and one crossing in the middle.
const METRO_LAYOUT: &str = "\
@.........@
.####.####.
.####.####.
.####.####.
.####.####.
.####.####.
.####.####.
.####.####.
...........
.####.####.
.####.####.
.####.####.
.####.####.
.####.####.
.####.####.
.####.####.
@.........@
";

impl GridMap {
    /// A `width × height` map of empty track.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            tiles: vec![TileKind::Empty; width * height],
        }
    }

    /// Parse the ASCII form (see module docs).  Blank lines are skipped and
    /// surrounding whitespace on each line is trimmed.
    pub fn parse(text: &str) -> CoreResult<GridMap> {
        let mut width = 0;
        let mut height = 0;
        let mut tiles = Vec::new();

        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let row_start = tiles.len();
            for ch in line.chars() {
                let tile = TileKind::from_char(ch)
                    .ok_or(CoreError::UnknownTile { line: line_no + 1, ch })?;
                tiles.push(tile);
            }
            let row_width = tiles.len() - row_start;
            if height == 0 {
                width = row_width;
            } else if row_width != width {
                return Err(CoreError::RaggedRow {
                    line:     line_no + 1,
                    expected: width,
                    got:      row_width,
                });
            }
            height += 1;
        }

        if height == 0 {
            return Err(CoreError::EmptyMap);
        }
        Ok(GridMap { width, height, tiles })
    }

    /// The 17 × 11 metro layout with stations at the four corners.
    pub fn metro() -> GridMap {
        let parsed = Self::parse(METRO_LAYOUT);
        debug_assert!(parsed.is_ok(), "metro layout is malformed: {parsed:?}");
        parsed.unwrap_or_else(|_| GridMap::new(11, 17))
    }

    // ── Dimensions ────────────────────────────────────────────────────────

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, cell: Cell) -> bool {
        cell.row >= 0
            && cell.col >= 0
            && (cell.row as usize) < self.height
            && (cell.col as usize) < self.width
    }

    #[inline]
    fn slot(&self, cell: Cell) -> Option<usize> {
        self.in_bounds(cell)
            .then(|| cell.row as usize * self.width + cell.col as usize)
    }

    // ── Tile access ───────────────────────────────────────────────────────

    /// Tile at `cell`, or `None` if out of bounds.
    #[inline]
    pub fn get(&self, cell: Cell) -> Option<TileKind> {
        self.slot(cell).map(|i| self.tiles[i])
    }

    /// Overwrite the tile at `cell`, returning the previous tile.
    pub fn set(&mut self, cell: Cell, tile: TileKind) -> CoreResult<TileKind> {
        let i = self.slot(cell).ok_or(CoreError::OutOfBounds(cell))?;
        Ok(std::mem::replace(&mut self.tiles[i], tile))
    }

    /// `true` if `cell` is in bounds and is track (empty or occupied).
    pub fn is_passable(&self, cell: Cell) -> bool {
        self.get(cell).is_some_and(TileKind::is_passable)
    }

    /// Every cell, row-major, paired with its tile.
    pub fn iter(&self) -> impl Iterator<Item = (Cell, TileKind)> + '_ {
        self.tiles.iter().enumerate().map(|(i, &tile)| {
            let cell = Cell::new((i / self.width) as i32, (i % self.width) as i32);
            (cell, tile)
        })
    }

    /// Cells currently marked with `agent`, row-major.
    pub fn footprint(&self, agent: AgentId) -> Vec<Cell> {
        self.iter()
            .filter(|&(_, tile)| tile == TileKind::Agent(agent))
            .map(|(cell, _)| cell)
            .collect()
    }

    // ── Stations ──────────────────────────────────────────────────────────

    /// Station tiles, row-major.
    pub fn stations(&self) -> Vec<Cell> {
        self.iter()
            .filter(|&(_, tile)| tile == TileKind::Station)
            .map(|(cell, _)| cell)
            .collect()
    }

    /// Entrance tiles of every station.
    ///
    /// An entrance is any non-wall, non-station tile in the 8-neighbour ring
    /// of a station.  Stations are scanned row-major and each ring in
    /// `(-1..=1) × (-1..=1)` order; a tile bordering two stations is listed
    /// once, at its first occurrence.
    pub fn station_entrances(&self) -> Vec<Cell> {
        let mut entrances: Vec<Cell> = Vec::new();
        for station in self.stations() {
            for d_row in -1..=1 {
                for d_col in -1..=1 {
                    if d_row == 0 && d_col == 0 {
                        continue;
                    }
                    let cell = station.offset(d_row, d_col);
                    if self.is_passable(cell) && !entrances.contains(&cell) {
                        entrances.push(cell);
                    }
                }
            }
        }
        entrances
    }

    // ── Rendering ─────────────────────────────────────────────────────────

    /// ASCII form, one line per row, each line terminated by `'\n'`.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        if self.width == 0 {
            return out;
        }
        for row in self.tiles.chunks(self.width) {
            out.extend(row.iter().map(|t| t.to_char()));
            out.push('\n');
        }
        out
    }
}

impl fmt::Display for GridMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
