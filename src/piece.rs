use serde::{Deserialize, Serialize};

/// Cell color token. 1..=7 are piece colors, 8 is garbage.
pub type Color = u8;

pub const GARBAGE_COLOR: Color = 8;

/// Boolean cell matrix; rows of 0/1. Pieces carry their own copy so the
/// canonical catalog is never mutated by rotation.
pub type Shape = Vec<Vec<u8>>;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum PieceKind {
    I,
    O,
    T,
    S,
    Z,
    J,
    L,
}

impl PieceKind {
    pub fn all() -> [PieceKind; 7] {
        [
            PieceKind::I,
            PieceKind::O,
            PieceKind::T,
            PieceKind::S,
            PieceKind::Z,
            PieceKind::J,
            PieceKind::L,
        ]
    }

    pub fn color_id(self) -> Color {
        match self {
            PieceKind::I => 1,
            PieceKind::J => 2,
            PieceKind::L => 3,
            PieceKind::O => 4,
            PieceKind::S => 5,
            PieceKind::Z => 6,
            PieceKind::T => 7,
        }
    }

    /// Canonical rotation-0 shape, deep-copied.
    pub fn base_shape(self) -> Shape {
        let rows: &[&[u8]] = match self {
            PieceKind::I => &[&[1, 1, 1, 1]],
            PieceKind::O => &[&[1, 1], &[1, 1]],
            PieceKind::T => &[&[0, 1, 0], &[1, 1, 1]],
            PieceKind::S => &[&[0, 1, 1], &[1, 1, 0]],
            PieceKind::Z => &[&[1, 1, 0], &[0, 1, 1]],
            PieceKind::J => &[&[1, 0, 0], &[1, 1, 1]],
            PieceKind::L => &[&[0, 0, 1], &[1, 1, 1]],
        };
        rows.iter().map(|r| r.to_vec()).collect()
    }
}

/// Rotate a shape matrix by transposition into swapped dimensions.
/// `dir > 0` is clockwise, anything else counter-clockwise.
pub fn rotate_shape(shape: &[Vec<u8>], dir: i32) -> Shape {
    let rows = shape.len();
    let cols = shape[0].len();
    let mut rotated = vec![vec![0u8; rows]; cols];
    for (r, row) in shape.iter().enumerate() {
        for (c, &cell) in row.iter().enumerate() {
            if dir > 0 {
                rotated[c][rows - 1 - r] = cell;
            } else {
                rotated[cols - 1 - c][r] = cell;
            }
        }
    }
    rotated
}

/// A live piece on the board. The shape is owned because rotation replaces it.
#[derive(Clone, Debug)]
pub struct Piece {
    pub kind: PieceKind,
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    /// Spawn at the top, horizontally centered for the given board width.
    pub fn spawn(kind: PieceKind, cols: usize) -> Self {
        let shape = kind.base_shape();
        let x = spawn_x(&shape, cols);
        Self {
            kind,
            shape,
            x,
            y: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.shape[0].len()
    }

    pub fn color(&self) -> Color {
        self.kind.color_id()
    }
}

pub fn spawn_x(shape: &[Vec<u8>], cols: usize) -> i32 {
    (cols as i32 - shape[0].len() as i32) / 2
}
