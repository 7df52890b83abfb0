use sea_battle_common::game::battle_field::{Cell, ShootState, FIELD_SIZE};
use sea_battle_common::packet::{ErrorCode, GameData, Packet, SessionData};

use crate::server::UserId;
use crate::session::{Phase, SessionCore};

const ALICE: UserId = 1;
const BOB: UserId = 2;

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

fn touching_layout() -> Vec<Vec<Cell>> {
    grid([
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
    ])
}

fn ship_cells(layout: &[Vec<Cell>]) -> Vec<(usize, usize)> {
    (0..FIELD_SIZE)
        .flat_map(|r| (0..FIELD_SIZE).map(move |c| (r, c)))
        .filter(|&(r, c)| layout[r][c] == Cell::Ship)
        .collect()
}

fn new_core() -> SessionCore {
    SessionCore::new(
        0,
        vec![(ALICE, String::from("alice")), (BOB, String::from("bob"))],
        0,
    )
}

/// Drives both players through the setup phase; alice attacks first.
fn core_in_battle() -> SessionCore {
    let mut core = new_core();
    core.handle(ALICE, post(field_data(classic_layout())));
    core.handle(BOB, post(field_data(classic_layout())));
    assert_eq!(core.phase(), Phase::Battle);
    core
}

fn post(data: GameData) -> SessionData {
    SessionData::PostData(data)
}

fn field_data(field: Vec<Vec<Cell>>) -> GameData {
    GameData::BattleField {
        field,
        player: None,
    }
}

fn shot(row: usize, col: usize) -> SessionData {
    SessionData::PostData(GameData::Coordinate {
        row: row as u8,
        col: col as u8,
    })
}

fn single(mut replies: Vec<(UserId, Packet)>) -> (UserId, Packet) {
    assert_eq!(replies.len(), 1, "expected exactly one reply: {replies:?}");
    replies.pop().expect("one reply")
}

#[test]
fn setup_walks_players_through_field_submission() {
    let mut core = new_core();
    assert_eq!(core.phase(), Phase::Setup);
    assert_eq!(core.whose_turn(), None);

    let (to, packet) = single(core.handle(ALICE, SessionData::GetData));
    assert_eq!(to, ALICE);
    assert_eq!(
        packet,
        Packet::SessionData(post(GameData::BattleFieldRequired))
    );

    let (to, packet) = single(core.handle(ALICE, post(field_data(classic_layout()))));
    assert_eq!(to, ALICE);
    assert_eq!(packet, Packet::SessionData(SessionData::Complete));
    assert_eq!(core.phase(), Phase::Setup);

    let (_, packet) = single(core.handle(ALICE, SessionData::GetData));
    assert_eq!(
        packet,
        Packet::SessionData(SessionData::Waiting {
            players: Some(String::from("bob")),
        })
    );

    let (to, packet) = single(core.handle(BOB, post(field_data(classic_layout()))));
    assert_eq!(to, BOB);
    assert_eq!(packet, Packet::SessionData(SessionData::Complete));

    assert_eq!(core.phase(), Phase::Battle);
    assert_eq!(core.whose_turn(), Some(ALICE));
}

#[test]
fn setup_rejects_an_invalid_layout() {
    let mut core = new_core();

    let (to, packet) = single(core.handle(ALICE, post(field_data(touching_layout()))));
    assert_eq!(to, ALICE);
    match packet {
        Packet::Error { code, msg } => {
            assert_eq!(code, ErrorCode::UncorrectPacket);
            assert!(msg.expect("a reason is attached").contains("touch"));
        }
        other => panic!("expected an error reply, got {other:?}"),
    }

    // the field stays unset
    let (_, packet) = single(core.handle(ALICE, SessionData::GetData));
    assert_eq!(
        packet,
        Packet::SessionData(post(GameData::BattleFieldRequired))
    );
    assert_eq!(core.phase(), Phase::Setup);
}

#[test]
fn setup_rejects_other_post_data() {
    let mut core = new_core();

    let (_, packet) = single(core.handle(ALICE, post(GameData::NotYourTurn)));
    assert_eq!(packet, Packet::error(ErrorCode::UncorrectPacket));
}

#[test]
fn setup_ignores_unrelated_session_data() {
    let mut core = new_core();
    assert!(core.handle(ALICE, SessionData::Complete).is_empty());
    assert!(core
        .handle(ALICE, SessionData::Waiting { players: None })
        .is_empty());
}

#[test]
fn battle_reports_turns_on_get_data() {
    let mut core = core_in_battle();

    let (_, packet) = single(core.handle(BOB, SessionData::GetData));
    assert_eq!(packet, Packet::SessionData(post(GameData::NotYourTurn)));

    let (_, packet) = single(core.handle(ALICE, SessionData::GetData));
    match packet {
        Packet::SessionData(SessionData::PostData(GameData::BattleField { field, player })) => {
            assert_eq!(player.as_deref(), Some("bob"));
            assert_eq!(field, vec![vec![Cell::Empty; FIELD_SIZE]; FIELD_SIZE]);
        }
        other => panic!("expected the shot view, got {other:?}"),
    }
}

#[test]
fn battle_hit_keeps_the_turn_and_miss_passes_it() {
    let mut core = core_in_battle();

    let (_, packet) = single(core.handle(BOB, shot(0, 0)));
    assert_eq!(packet, Packet::SessionData(post(GameData::NotYourTurn)));

    // (0, 0) holds a ship cell
    let (_, packet) = single(core.handle(ALICE, shot(0, 0)));
    match packet {
        Packet::SessionData(SessionData::PostData(GameData::ShootState { state, field })) => {
            assert_eq!(state, ShootState::Hit);
            let field = field.expect("the view is attached to a hit");
            assert_eq!(field[0][0], Cell::Hit);
        }
        other => panic!("expected a shoot state, got {other:?}"),
    }
    assert_eq!(core.whose_turn(), Some(ALICE));

    // (9, 9) is water; the attacker sees their own board and the turn
    // moves on
    let (_, packet) = single(core.handle(ALICE, shot(9, 9)));
    match packet {
        Packet::SessionData(SessionData::PostData(GameData::ShootState { state, field })) => {
            assert_eq!(state, ShootState::Miss);
            assert_eq!(field.expect("the board is attached to a miss"), classic_layout());
        }
        other => panic!("expected a shoot state, got {other:?}"),
    }
    assert_eq!(core.whose_turn(), Some(BOB));

    let (_, packet) = single(core.handle(BOB, shot(9, 9)));
    match packet {
        Packet::SessionData(SessionData::PostData(GameData::ShootState { state, .. })) => {
            assert_eq!(state, ShootState::Miss);
        }
        other => panic!("expected a shoot state, got {other:?}"),
    }
    assert_eq!(core.whose_turn(), Some(ALICE));
}

#[test]
fn battle_already_shot_keeps_the_turn() {
    let mut core = core_in_battle();

    core.handle(ALICE, shot(0, 0));
    let (_, packet) = single(core.handle(ALICE, shot(0, 0)));
    match packet {
        Packet::SessionData(SessionData::PostData(GameData::ShootState { state, field })) => {
            assert_eq!(state, ShootState::AlreadyShot);
            assert!(field.is_none());
        }
        other => panic!("expected a shoot state, got {other:?}"),
    }
    assert_eq!(core.whose_turn(), Some(ALICE));
}

#[test]
fn battle_rejects_out_of_range_coordinates() {
    let mut core = core_in_battle();

    let (_, packet) = single(core.handle(ALICE, shot(12, 0)));
    match packet {
        Packet::Error { code, .. } => assert_eq!(code, ErrorCode::UncorrectPacket),
        other => panic!("expected an error reply, got {other:?}"),
    }
    assert_eq!(core.whose_turn(), Some(ALICE));
    assert_eq!(core.phase(), Phase::Battle);
}

#[test]
fn battle_rejects_other_post_data() {
    let mut core = core_in_battle();

    let (_, packet) = single(core.handle(ALICE, post(GameData::Results {
        winner: String::from("me"),
    })));
    assert_eq!(packet, Packet::error(ErrorCode::UncorrectPacket));
}

#[test]
fn victory_lands_on_the_exact_final_ship_cell() {
    let mut core = core_in_battle();
    let targets = ship_cells(&classic_layout());
    assert_eq!(targets.len(), 20);

    for &(row, col) in &targets[..targets.len() - 1] {
        let (_, packet) = single(core.handle(ALICE, shot(row, col)));
        match packet {
            Packet::SessionData(SessionData::PostData(GameData::ShootState { state, .. })) => {
                assert_eq!(state, ShootState::Hit);
            }
            other => panic!("expected a shoot state, got {other:?}"),
        }
        assert_eq!(core.phase(), Phase::Battle);
        assert_eq!(core.winner(), None);
    }

    let &(row, col) = targets.last().expect("the fleet is not empty");
    let (_, packet) = single(core.handle(ALICE, shot(row, col)));
    assert_eq!(
        packet,
        Packet::SessionData(post(GameData::Results {
            winner: String::from("you"),
        }))
    );
    assert_eq!(core.phase(), Phase::Finished);
    assert_eq!(core.winner(), Some(ALICE));
    assert!(!core.is_over());

    // the loser picks up the result with their next event
    let (to, packet) = single(core.handle(BOB, SessionData::GetData));
    assert_eq!(to, BOB);
    assert_eq!(
        packet,
        Packet::SessionData(post(GameData::Results {
            winner: String::from("alice"),
        }))
    );
    assert!(core.is_over());

    // the winner keeps being told they won
    let (_, packet) = single(core.handle(ALICE, SessionData::GetData));
    assert_eq!(
        packet,
        Packet::SessionData(post(GameData::Results {
            winner: String::from("you"),
        }))
    );
}

#[test]
fn tallies_count_hits_and_misses_per_player() {
    let mut core = core_in_battle();

    core.handle(ALICE, shot(0, 0)); // hit
    core.handle(ALICE, shot(0, 0)); // already shot, not tallied
    core.handle(ALICE, shot(9, 9)); // miss, turn passes
    core.handle(BOB, shot(9, 9)); // miss

    let alice = core.tally(ALICE);
    assert_eq!((alice.hits, alice.misses), (1, 1));
    let bob = core.tally(BOB);
    assert_eq!((bob.hits, bob.misses), (0, 1));
}

#[test]
fn first_attacker_index_is_respected() {
    let mut core = SessionCore::new(
        7,
        vec![(ALICE, String::from("alice")), (BOB, String::from("bob"))],
        1,
    );
    core.handle(ALICE, post(field_data(classic_layout())));
    core.handle(BOB, post(field_data(classic_layout())));

    assert_eq!(core.whose_turn(), Some(BOB));

    let (_, packet) = single(core.handle(ALICE, SessionData::GetData));
    assert_eq!(packet, Packet::SessionData(post(GameData::NotYourTurn)));
}
