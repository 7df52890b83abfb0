use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const FIELD_SIZE: usize = 10;

/// The classic fleet: one 4-cell, two 3-cell, three 2-cell and four
/// 1-cell ships.
pub const FLEET: [usize; 10] = [4, 3, 3, 2, 2, 2, 1, 1, 1, 1];

const NEIGHBORS_4: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Empty,
    Ship,
    Hit,
    Miss,
}

impl Cell {
    pub fn as_char(self) -> char {
        match self {
            Cell::Empty => '.',
            Cell::Ship => 'S',
            Cell::Hit => 'H',
            Cell::Miss => 'M',
        }
    }

    pub fn from_char(ch: char) -> Option<Cell> {
        match ch {
            '.' => Some(Cell::Empty),
            'S' => Some(Cell::Ship),
            'H' => Some(Cell::Hit),
            'M' => Some(Cell::Miss),
            _ => None,
        }
    }
}

/// Outcome of a shot, as it travels in SHOOT_STATE payloads.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShootState {
    Unknown,
    Hit,
    Miss,
    AlreadyShot,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("invalid coordinates")]
    InvalidCoordinates,
    #[error("invalid battle field layout: {0}")]
    InvalidLayout(String),
}

/// One player's 10x10 board. A session keeps two of these per player:
/// the board that holds the player's ships and the view that records
/// the results of the player's own shots (the view never contains a
/// ship cell).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleField {
    cells: [[Cell; FIELD_SIZE]; FIELD_SIZE],
}

impl Default for BattleField {
    fn default() -> Self {
        BattleField::new()
    }
}

impl BattleField {
    pub fn new() -> BattleField {
        BattleField {
            cells: [[Cell::Empty; FIELD_SIZE]; FIELD_SIZE],
        }
    }

    /// Builds a board from a client-submitted grid, accepting it only
    /// when the ship cells form the classic fleet as straight,
    /// non-touching ships.
    pub fn from_layout(rows: &[Vec<Cell>]) -> Result<BattleField, FieldError> {
        if rows.len() != FIELD_SIZE || rows.iter().any(|row| row.len() != FIELD_SIZE) {
            return Err(FieldError::InvalidLayout(format!(
                "the battle field must be {FIELD_SIZE} rows of {FIELD_SIZE} cells"
            )));
        }

        let mut cells = [[Cell::Empty; FIELD_SIZE]; FIELD_SIZE];
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                cells[r][c] = *cell;
            }
        }

        validate_layout(&cells)?;
        Ok(BattleField { cells })
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        if row < FIELD_SIZE && col < FIELD_SIZE {
            Some(self.cells[row][col])
        } else {
            None
        }
    }

    /// The grid in the shape it travels on the wire.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        self.cells.iter().map(|row| row.to_vec()).collect()
    }

    /// True iff every cell of the ship fits on the board, lands on an
    /// empty cell, and no cell outside the ship itself 8-neighbors an
    /// existing ship cell.
    pub fn can_place_ship(
        &self,
        len: usize,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> bool {
        let cells = match ship_cells(len, row, col, orientation) {
            Some(cells) => cells,
            None => return false,
        };

        cells.iter().all(|&(r, c)| {
            self.cells[r][c] == Cell::Empty
                && neighbors(r, c, &NEIGHBORS_8)
                    .filter(|pos| !cells.contains(pos))
                    .all(|(nr, nc)| self.cells[nr][nc] != Cell::Ship)
        })
    }

    pub fn place_ship(
        &mut self,
        len: usize,
        row: usize,
        col: usize,
        orientation: Orientation,
    ) -> Result<(), FieldError> {
        if !self.can_place_ship(len, row, col, orientation) {
            return Err(FieldError::InvalidLayout(format!(
                "a ship of length {len} cannot be placed at ({row}, {col})"
            )));
        }

        for (r, c) in ship_cells(len, row, col, orientation).expect("placement already checked") {
            self.cells[r][c] = Cell::Ship;
        }
        Ok(())
    }

    /// Resolves a shot. A ship cell turns into a hit, an empty cell
    /// into a miss; cells shot before are reported without being
    /// touched again.
    pub fn shoot(&mut self, row: usize, col: usize) -> Result<ShootState, FieldError> {
        self.check_coordinates(row, col)?;

        Ok(match self.cells[row][col] {
            Cell::Ship => {
                self.cells[row][col] = Cell::Hit;
                ShootState::Hit
            }
            Cell::Empty => {
                self.cells[row][col] = Cell::Miss;
                ShootState::Miss
            }
            Cell::Hit | Cell::Miss => ShootState::AlreadyShot,
        })
    }

    /// Records a shot result on a view board. Only hits and misses
    /// leave a mark.
    pub fn set(&mut self, row: usize, col: usize, state: ShootState) -> Result<(), FieldError> {
        self.check_coordinates(row, col)?;

        match state {
            ShootState::Hit => self.cells[row][col] = Cell::Hit,
            ShootState::Miss => self.cells[row][col] = Cell::Miss,
            ShootState::AlreadyShot | ShootState::Unknown => {}
        }
        Ok(())
    }

    pub fn is_all_ships_destroyed(&self) -> bool {
        !self
            .cells
            .iter()
            .any(|row| row.iter().any(|cell| *cell == Cell::Ship))
    }

    fn check_coordinates(&self, row: usize, col: usize) -> Result<(), FieldError> {
        if row < FIELD_SIZE && col < FIELD_SIZE {
            Ok(())
        } else {
            Err(FieldError::InvalidCoordinates)
        }
    }
}

fn ship_cells(
    len: usize,
    row: usize,
    col: usize,
    orientation: Orientation,
) -> Option<Vec<(usize, usize)>> {
    if len == 0 {
        return None;
    }

    let mut cells = Vec::with_capacity(len);
    for i in 0..len {
        let (r, c) = match orientation {
            Orientation::Horizontal => (row, col + i),
            Orientation::Vertical => (row + i, col),
        };
        if r >= FIELD_SIZE || c >= FIELD_SIZE {
            return None;
        }
        cells.push((r, c));
    }
    Some(cells)
}

fn neighbors(
    row: usize,
    col: usize,
    deltas: &'static [(i32, i32)],
) -> impl Iterator<Item = (usize, usize)> {
    deltas.iter().filter_map(move |&(dr, dc)| {
        let r = row as i32 + dr;
        let c = col as i32 + dc;
        if (0..FIELD_SIZE as i32).contains(&r) && (0..FIELD_SIZE as i32).contains(&c) {
            Some((r as usize, c as usize))
        } else {
            None
        }
    })
}

/// Connected-component analysis over the ship cells, 4-connectivity.
/// Each component must be a straight contiguous run, the component
/// sizes must form the classic fleet, and no two distinct components
/// may touch, not even diagonally.
fn validate_layout(cells: &[[Cell; FIELD_SIZE]; FIELD_SIZE]) -> Result<(), FieldError> {
    const UNVISITED: usize = usize::MAX;

    let mut component_id = [[UNVISITED; FIELD_SIZE]; FIELD_SIZE];
    let mut sizes: Vec<usize> = Vec::new();

    for row in 0..FIELD_SIZE {
        for col in 0..FIELD_SIZE {
            if cells[row][col] != Cell::Ship || component_id[row][col] != UNVISITED {
                continue;
            }

            let id = sizes.len();
            let mut ship = Vec::new();
            let mut stack = vec![(row, col)];
            while let Some((r, c)) = stack.pop() {
                if component_id[r][c] != UNVISITED {
                    continue;
                }
                component_id[r][c] = id;
                ship.push((r, c));

                for (nr, nc) in neighbors(r, c, &NEIGHBORS_4) {
                    if cells[nr][nc] == Cell::Ship && component_id[nr][nc] == UNVISITED {
                        stack.push((nr, nc));
                    }
                }
            }

            let same_row = ship.iter().all(|&(r, _)| r == ship[0].0);
            let same_col = ship.iter().all(|&(_, c)| c == ship[0].1);
            if !same_row && !same_col {
                return Err(FieldError::InvalidLayout(format!(
                    "ship #{id} is not placed horizontally or vertically"
                )));
            }

            let span = if same_row {
                let min = ship.iter().map(|&(_, c)| c).min().expect("ship is not empty");
                let max = ship.iter().map(|&(_, c)| c).max().expect("ship is not empty");
                max - min + 1
            } else {
                let min = ship.iter().map(|&(r, _)| r).min().expect("ship is not empty");
                let max = ship.iter().map(|&(r, _)| r).max().expect("ship is not empty");
                max - min + 1
            };
            if span != ship.len() {
                return Err(FieldError::InvalidLayout(format!(
                    "ship #{id} cells are not contiguous"
                )));
            }

            sizes.push(ship.len());
        }
    }

    let mut sizes_sorted = sizes;
    sizes_sorted.sort_unstable();
    let mut expected = FLEET.to_vec();
    expected.sort_unstable();
    if sizes_sorted != expected {
        return Err(FieldError::InvalidLayout(format!(
            "ship sizes {sizes_sorted:?} do not match the expected fleet {expected:?}"
        )));
    }

    for row in 0..FIELD_SIZE {
        for col in 0..FIELD_SIZE {
            if cells[row][col] != Cell::Ship {
                continue;
            }
            for (nr, nc) in neighbors(row, col, &NEIGHBORS_8) {
                if cells[nr][nc] == Cell::Ship && component_id[nr][nc] != component_id[row][col] {
                    return Err(FieldError::InvalidLayout(String::from(
                        "ships cannot touch each other, even diagonally",
                    )));
                }
            }
        }
    }

    Ok(())
}
