//! The three default trains on the metro map.
//!
//! ```text
//!   A: north-west station → east along the top → down the centre column
//!      → bottom-right station
//!   B: bottom-left station → centre column → west along the middle row
//!      → up the left edge → north-west station
//!   C: bottom-right station → up the right edge → west along the middle row
//!      → centre column → north-west station
//! ```
//!
//! A and C share the north-west entrance `(0,1)`, so they alternate.  B
//! crosses both of them at `(8,5)`.

use metro_core::{Cell, CoreResult, Route};

const WAYPOINTS: [&[(i32, i32)]; 3] = [
    &[(0, 1), (0, 5), (16, 5), (16, 9)],
    &[(16, 1), (16, 5), (8, 5), (8, 0), (1, 0)],
    &[(15, 10), (8, 10), (8, 5), (0, 5), (0, 1)],
];

pub fn default_routes() -> CoreResult<Vec<Route>> {
    WAYPOINTS
        .iter()
        .map(|points| {
            let cells: Vec<Cell> = points.iter().map(|&p| p.into()).collect();
            Route::from_waypoints(&cells)
        })
        .collect()
}
