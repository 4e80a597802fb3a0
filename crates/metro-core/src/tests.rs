//! Unit tests for metro-core primitives.

#[cfg(test)]
mod ids {
    use crate::{AgentId, ResourceId};

    #[test]
    fn index_roundtrip() {
        let id = AgentId(2);
        assert_eq!(id.index(), 2);
        assert_eq!(AgentId::try_from(2usize).unwrap(), id);
    }

    #[test]
    fn labels() {
        assert_eq!(AgentId(0).label(), 'A');
        assert_eq!(AgentId(2).label(), 'C');
        assert_eq!(AgentId(40).label(), '?');
        assert_eq!(AgentId::from_label('C'), Some(AgentId(2)));
        assert_eq!(AgentId::from_label('c'), None);
    }

    #[test]
    fn display() {
        assert_eq!(AgentId(1).to_string(), "train-B");
        assert_eq!(ResourceId(4).to_string(), "R4");
    }
}

#[cfg(test)]
mod cell {
    use crate::{Cell, Direction};

    #[test]
    fn move_to_overwrites_in_place() {
        let mut wagon = Cell::new(3, 4);
        wagon.move_to(Cell::new(3, 5));
        assert_eq!(wagon, Cell::new(3, 5));
    }

    #[test]
    fn adjacency_is_orthogonal_only() {
        let c = Cell::new(5, 5);
        assert!(c.is_adjacent(Cell::new(4, 5)));
        assert!(c.is_adjacent(Cell::new(5, 6)));
        assert!(!c.is_adjacent(Cell::new(6, 6)));
        assert!(!c.is_adjacent(c));
    }

    #[test]
    fn ordering_is_row_major() {
        assert!(Cell::new(0, 9) < Cell::new(1, 0));
        assert!(Cell::new(2, 1) < Cell::new(2, 3));
    }

    #[test]
    fn direction_flip() {
        assert_eq!(Direction::Forward.flip(), Direction::Backward);
        assert_eq!(Direction::Backward.flip().flip(), Direction::Backward);
    }
}

#[cfg(test)]
mod grid {
    use crate::{AgentId, Cell, CoreError, GridMap, TileKind};

    const SMALL: &str = "
        @...@
        .###.
        A...B
    ";

    #[test]
    fn parse_and_render_roundtrip() {
        let grid = GridMap::parse(SMALL).unwrap();
        assert_eq!(grid.width(), 5);
        assert_eq!(grid.height(), 3);
        assert_eq!(grid.render(), "@...@\n.###.\nA...B\n");
    }

    #[test]
    fn tile_kinds() {
        let grid = GridMap::parse(SMALL).unwrap();
        assert_eq!(grid.get(Cell::new(0, 0)), Some(TileKind::Station));
        assert_eq!(grid.get(Cell::new(1, 1)), Some(TileKind::Wall));
        assert_eq!(grid.get(Cell::new(2, 4)), Some(TileKind::Agent(AgentId(1))));
        assert_eq!(grid.get(Cell::new(3, 0)), None);
        assert_eq!(grid.get(Cell::new(-1, 0)), None);
    }

    #[test]
    fn ragged_rows_rejected() {
        let err = GridMap::parse("...\n..\n").unwrap_err();
        assert!(matches!(err, CoreError::RaggedRow { line: 2, expected: 3, got: 2 }));
    }

    #[test]
    fn unknown_tile_rejected() {
        let err = GridMap::parse("..x\n").unwrap_err();
        assert!(matches!(err, CoreError::UnknownTile { ch: 'x', .. }));
    }

    #[test]
    fn empty_map_rejected() {
        assert!(matches!(GridMap::parse("\n  \n"), Err(CoreError::EmptyMap)));
    }

    #[test]
    fn set_returns_previous_tile() {
        let mut grid = GridMap::new(3, 3);
        let prev = grid.set(Cell::new(1, 1), TileKind::Agent(AgentId(0))).unwrap();
        assert_eq!(prev, TileKind::Empty);
        assert_eq!(grid.footprint(AgentId(0)), vec![Cell::new(1, 1)]);
        assert!(grid.set(Cell::new(3, 0), TileKind::Wall).is_err());
    }

    #[test]
    fn passability() {
        let grid = GridMap::parse(SMALL).unwrap();
        assert!(grid.is_passable(Cell::new(0, 1)));
        assert!(grid.is_passable(Cell::new(2, 0)), "occupied track is still track");
        assert!(!grid.is_passable(Cell::new(1, 2)));
        assert!(!grid.is_passable(Cell::new(0, 0)));
    }

    #[test]
    fn entrances_ring_stations() {
        let grid = GridMap::parse(SMALL).unwrap();
        // (0,0): neighbours (0,1), (1,0); (1,1) is a wall.
        // (0,4): neighbours (0,3), (1,4); (1,3) is a wall.
        assert_eq!(
            grid.station_entrances(),
            vec![Cell::new(0, 1), Cell::new(1, 0), Cell::new(0, 3), Cell::new(1, 4)],
        );
    }

    #[test]
    fn entrance_shared_by_two_stations_listed_once() {
        let grid = GridMap::parse("@.@\n###\n").unwrap();
        assert_eq!(grid.station_entrances(), vec![Cell::new(0, 1)]);
    }

    #[test]
    fn metro_layout() {
        let grid = GridMap::metro();
        assert_eq!((grid.width(), grid.height()), (11, 17));
        assert_eq!(
            grid.stations(),
            vec![Cell::new(0, 0), Cell::new(0, 10), Cell::new(16, 0), Cell::new(16, 10)],
        );
        // Every corner station has exactly two entrances.
        assert_eq!(grid.station_entrances().len(), 8);
        assert!(grid.is_passable(Cell::new(8, 5)), "central crossing is track");
    }
}

#[cfg(test)]
mod route {
    use crate::{Cell, CoreError, Direction, Route};

    fn c(row: i32, col: i32) -> Cell {
        Cell::new(row, col)
    }

    #[test]
    fn too_short() {
        assert!(matches!(Route::new(vec![c(0, 0)]), Err(CoreError::RouteTooShort { len: 1 })));
        assert!(matches!(Route::new(vec![]), Err(CoreError::RouteTooShort { len: 0 })));
    }

    #[test]
    fn gaps_rejected() {
        let err = Route::new(vec![c(0, 0), c(0, 2)]).unwrap_err();
        assert!(matches!(err, CoreError::RouteNotContiguous { .. }));
    }

    #[test]
    fn revisits_rejected() {
        let err = Route::new(vec![c(0, 0), c(0, 1), c(1, 1), c(1, 0), c(0, 0)]).unwrap_err();
        assert!(matches!(err, CoreError::RouteRevisits(cell) if cell == c(0, 0)));
    }

    #[test]
    fn waypoints_expand_lines() {
        let route = Route::from_waypoints(&[c(0, 1), c(0, 3), c(2, 3)]).unwrap();
        assert_eq!(
            route.cells(),
            &[c(0, 1), c(0, 2), c(0, 3), c(1, 3), c(2, 3)],
        );
        assert_eq!(route.start(), c(0, 1));
        assert_eq!(route.end(), c(2, 3));
        assert_eq!(route.position(c(1, 3)), Some(3));
    }

    #[test]
    fn waypoints_run_backwards() {
        let route = Route::from_waypoints(&[c(4, 4), c(4, 2)]).unwrap();
        assert_eq!(route.cells(), &[c(4, 4), c(4, 3), c(4, 2)]);
    }

    #[test]
    fn diagonal_waypoints_rejected() {
        let err = Route::from_waypoints(&[c(0, 0), c(1, 1)]).unwrap_err();
        assert!(matches!(err, CoreError::DiagonalWaypoints { .. }));
    }

    #[test]
    fn oriented_legs() {
        let route = Route::from_waypoints(&[c(0, 0), c(0, 2)]).unwrap();
        assert_eq!(route.oriented(Direction::Forward), vec![c(0, 0), c(0, 1), c(0, 2)]);
        assert_eq!(route.oriented(Direction::Backward), vec![c(0, 2), c(0, 1), c(0, 0)]);
        assert_eq!(route.termini(Direction::Backward), (c(0, 2), c(0, 0)));
    }
}

#[cfg(test)]
mod cancel {
    use crate::{AgentId, CancelToken, Cancelled};

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new(AgentId(1));
        let other = token.clone();
        assert!(token.check().is_ok());
        other.cancel();
        assert!(token.is_cancelled());
        assert_eq!(token.check(), Err(Cancelled(AgentId(1))));
    }
}

#[cfg(test)]
mod config {
    use crate::EngineConfig;

    #[test]
    fn defaults_match_the_metro_layout() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.wagons_per_agent, 3);
        assert_eq!(cfg.pacing().as_millis(), 200);
        assert!(cfg.start_paused);
    }
}
