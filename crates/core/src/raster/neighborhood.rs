//! Neighborhood definitions shared by the grid algorithms

/// Pixel adjacency used for connected-component labelling and flood fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Edge neighbors only
    Four,
    /// Edge and corner neighbors
    Eight,
}

impl Connectivity {
    /// Relative (row, col) offsets of the neighbors
    pub fn offsets(&self) -> &'static [(isize, isize)] {
        const FOUR: [(isize, isize); 4] = [(-1, 0), (0, -1), (0, 1), (1, 0)];
        const EIGHT: [(isize, isize); 8] = [
            (-1, -1),
            (-1, 0),
            (-1, 1),
            (0, -1),
            (0, 1),
            (1, -1),
            (1, 0),
            (1, 1),
        ];
        match self {
            Connectivity::Four => &FOUR,
            Connectivity::Eight => &EIGHT,
        }
    }

    /// In-bounds neighbors of (row, col) in a grid of `rows` x `cols`
    pub fn neighbors(
        &self,
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    ) -> impl Iterator<Item = (usize, usize)> {
        self.offsets().iter().filter_map(move |&(dr, dc)| {
            let r = row as isize + dr;
            let c = col as isize + dc;
            if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                None
            } else {
                Some((r as usize, c as usize))
            }
        })
    }
}

/// D8 flow directions
pub mod d8 {
    /// Direction offsets (row, col) indexed by code 1..=8, E then counter-clockwise.
    /// Code 0 means no outflow.
    pub const OFFSETS: [(isize, isize); 9] = [
        (0, 0),   // 0: no flow / pit
        (0, 1),   // 1: E
        (-1, 1),  // 2: NE
        (-1, 0),  // 3: N
        (-1, -1), // 4: NW
        (0, -1),  // 5: W
        (1, -1),  // 6: SW
        (1, 0),   // 7: S
        (1, 1),   // 8: SE
    ];

    /// Step length in cells for each code
    pub const DISTANCES: [f64; 9] = [
        0.0,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
    ];

    /// Downstream cell for a direction code, if it lies inside the grid
    pub fn downstream(
        row: usize,
        col: usize,
        dir: u8,
        rows: usize,
        cols: usize,
    ) -> Option<(usize, usize)> {
        if dir == 0 || dir > 8 {
            return None;
        }
        let (dr, dc) = OFFSETS[dir as usize];
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            None
        } else {
            Some((r as usize, c as usize))
        }
    }
}
