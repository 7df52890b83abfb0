use crate::game::battle_field::{
    BattleField, Cell, FieldError, Orientation, ShootState, FIELD_SIZE,
};

fn grid(art: [&str; FIELD_SIZE]) -> Vec<Vec<Cell>> {
    art.iter()
        .map(|row| {
            row.chars()
                .map(|ch| Cell::from_char(ch).expect("valid cell art"))
                .collect()
        })
        .collect()
}

fn classic_layout() -> Vec<Vec<Cell>> {
    grid([
        "SSSS.SSS..",
        "..........",
        "SSS.SS.SS.",
        "..........",
        "SS........",
        "..........",
        "S.S.S.S...",
        "..........",
        "..........",
        "..........",
    ])
}

#[test]
fn accepts_the_classic_fleet() {
    assert!(BattleField::from_layout(&classic_layout()).is_ok());
}

#[test]
fn accepts_vertical_ships() {
    let layout = grid([
        "S.S.S.S.SS",
        "S.S.S.....",
        "S.S.......",
        "S.........",
        "..........",
        "S.S.S.S...",
        "S.S.......",
        "..S.......",
        "..........",
        "S.........",
    ]);
    assert!(BattleField::from_layout(&layout).is_ok());
}

#[test]
fn rejects_wrong_dimensions() {
    let mut layout = classic_layout();
    layout.pop();
    assert!(matches!(
        BattleField::from_layout(&layout),
        Err(FieldError::InvalidLayout(_))
    ));

    let mut layout = classic_layout();
    layout[3].push(Cell::Empty);
    assert!(matches!(
        BattleField::from_layout(&layout),
        Err(FieldError::InvalidLayout(_))
    ));
}

#[test]
fn rejects_a_missing_ship() {
    let mut layout = classic_layout();
    layout[6][6] = Cell::Empty;

    let err = BattleField::from_layout(&layout).unwrap_err();
    match err {
        FieldError::InvalidLayout(reason) => assert!(reason.contains("ship sizes")),
        other => panic!("expected InvalidLayout, got {other:?}"),
    }
}

#[test]
fn rejects_an_l_shaped_ship() {
    let layout = grid([
        "SS........",
        ".S........",
        "..........",
        "..........",
        "..........",
        "..........",
        "..........",
        "..........",
        "..........",
        "..........",
    ]);

    let err = BattleField::from_layout(&layout).unwrap_err();
    match err {
        FieldError::InvalidLayout(reason) => {
            assert!(reason.contains("horizontally or vertically"))
        }
        other => panic!("expected InvalidLayout, got {other:?}"),
    }
}

#[test]
fn rejects_diagonally_touching_ships() {
    let layout = grid([
        "SSSS.SSS..",
        "..........",
        "SSS.SS.SS.",
        "..........",
        "SS........",
        "..S.......",
        "S...S.S...",
        "..........",
        "..........",
        "..........",
    ]);

    let err = BattleField::from_layout(&layout).unwrap_err();
    match err {
        FieldError::InvalidLayout(reason) => assert!(reason.contains("touch")),
        other => panic!("expected InvalidLayout, got {other:?}"),
    }
}

#[test]
fn rejects_a_gapped_ship() {
    // The gap splits the 4-ship into 3 + 1, which breaks the fleet.
    let mut layout = classic_layout();
    layout[0][2] = Cell::Empty;
    layout[0][1] = Cell::Ship;
    layout[0][3] = Cell::Ship;

    assert!(matches!(
        BattleField::from_layout(&layout),
        Err(FieldError::InvalidLayout(_))
    ));
}

#[test]
fn shoot_resolves_hits_and_misses() {
    let mut field = BattleField::from_layout(&classic_layout()).unwrap();

    assert_eq!(field.shoot(0, 0), Ok(ShootState::Hit));
    assert_eq!(field.get(0, 0), Some(Cell::Hit));

    assert_eq!(field.shoot(9, 9), Ok(ShootState::Miss));
    assert_eq!(field.get(9, 9), Some(Cell::Miss));
}

#[test]
fn shoot_is_idempotent_on_fired_cells() {
    let mut field = BattleField::from_layout(&classic_layout()).unwrap();

    field.shoot(0, 0).unwrap();
    field.shoot(9, 9).unwrap();
    let snapshot = field.rows();

    assert_eq!(field.shoot(0, 0), Ok(ShootState::AlreadyShot));
    assert_eq!(field.shoot(9, 9), Ok(ShootState::AlreadyShot));
    assert_eq!(field.rows(), snapshot);
}

#[test]
fn shoot_rejects_out_of_range_coordinates() {
    let mut field = BattleField::new();
    assert_eq!(field.shoot(10, 0), Err(FieldError::InvalidCoordinates));
    assert_eq!(field.shoot(0, 10), Err(FieldError::InvalidCoordinates));
}

#[test]
fn set_records_only_hits_and_misses() {
    let mut view = BattleField::new();

    view.set(1, 1, ShootState::Hit).unwrap();
    view.set(2, 2, ShootState::Miss).unwrap();
    view.set(3, 3, ShootState::AlreadyShot).unwrap();
    view.set(4, 4, ShootState::Unknown).unwrap();

    assert_eq!(view.get(1, 1), Some(Cell::Hit));
    assert_eq!(view.get(2, 2), Some(Cell::Miss));
    assert_eq!(view.get(3, 3), Some(Cell::Empty));
    assert_eq!(view.get(4, 4), Some(Cell::Empty));

    assert_eq!(view.set(10, 10, ShootState::Hit), Err(FieldError::InvalidCoordinates));
}

#[test]
fn destruction_requires_every_ship_cell_hit() {
    let layout = classic_layout();
    let mut field = BattleField::from_layout(&layout).unwrap();
    assert!(!field.is_all_ships_destroyed());

    let ship_cells: Vec<(usize, usize)> = (0..FIELD_SIZE)
        .flat_map(|r| (0..FIELD_SIZE).map(move |c| (r, c)))
        .filter(|&(r, c)| layout[r][c] == Cell::Ship)
        .collect();

    for (i, &(r, c)) in ship_cells.iter().enumerate() {
        assert!(!field.is_all_ships_destroyed(), "destroyed after {i} hits");
        assert_eq!(field.shoot(r, c), Ok(ShootState::Hit));
    }
    assert!(field.is_all_ships_destroyed());

    assert!(BattleField::new().is_all_ships_destroyed());
}

#[test]
fn placement_respects_bounds_and_spacing() {
    let mut field = BattleField::new();

    assert!(!field.can_place_ship(4, 0, 7, Orientation::Horizontal));
    assert!(!field.can_place_ship(4, 7, 0, Orientation::Vertical));
    assert!(!field.can_place_ship(0, 0, 0, Orientation::Horizontal));

    assert!(field.can_place_ship(4, 0, 0, Orientation::Horizontal));
    field.place_ship(4, 0, 0, Orientation::Horizontal).unwrap();

    // overlapping and 8-adjacent positions are refused
    assert!(!field.can_place_ship(2, 0, 2, Orientation::Horizontal));
    assert!(!field.can_place_ship(2, 1, 0, Orientation::Horizontal));
    assert!(!field.can_place_ship(1, 1, 4, Orientation::Horizontal));

    assert!(field.can_place_ship(2, 2, 0, Orientation::Horizontal));
    field.place_ship(2, 2, 0, Orientation::Horizontal).unwrap();

    assert!(matches!(
        field.place_ship(3, 1, 3, Orientation::Horizontal),
        Err(FieldError::InvalidLayout(_))
    ));
}

#[test]
fn placed_fleet_passes_layout_validation() {
    let mut field = BattleField::new();
    field.place_ship(4, 0, 0, Orientation::Horizontal).unwrap();
    field.place_ship(3, 0, 5, Orientation::Horizontal).unwrap();
    field.place_ship(3, 2, 0, Orientation::Horizontal).unwrap();
    field.place_ship(2, 2, 4, Orientation::Horizontal).unwrap();
    field.place_ship(2, 2, 7, Orientation::Horizontal).unwrap();
    field.place_ship(2, 4, 0, Orientation::Vertical).unwrap();
    field.place_ship(1, 4, 2, Orientation::Horizontal).unwrap();
    field.place_ship(1, 4, 4, Orientation::Horizontal).unwrap();
    field.place_ship(1, 4, 6, Orientation::Horizontal).unwrap();
    field.place_ship(1, 4, 8, Orientation::Horizontal).unwrap();

    assert!(BattleField::from_layout(&field.rows()).is_ok());
}
