use courtview::frame::{Entity, Frame};
use courtview::state::{AppState, ConnectionStatus, Delta, apply_delta};

fn entity(id: &str, leg: Option<(f64, f64)>, transformed: Option<(f64, f64)>) -> Entity {
    Entity {
        id: id.to_string(),
        bbox: [10.0, 20.0, 30.0, 40.0],
        conf: 0.9,
        color: None,
        leg,
        transformed_leg: transformed,
    }
}

fn frame(id: &str, persons: Vec<Entity>) -> Frame {
    Frame {
        id: id.to_string(),
        ts: 1718031622.0,
        persons,
    }
}

#[test]
fn frames_are_stored_most_recent_first() {
    let mut state = AppState::new();
    apply_delta(&mut state, Delta::Frame(frame("1", Vec::new())));
    apply_delta(&mut state, Delta::Frame(frame("2", Vec::new())));
    apply_delta(&mut state, Delta::Frame(frame("3", Vec::new())));

    let ids: Vec<&str> = state.frames.iter().map(|f| f.id.as_str()).collect();
    assert_eq!(ids, ["3", "2", "1"]);
}

#[test]
fn unique_entities_count_spans_all_frames() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::Frame(frame("1", vec![entity("a", None, None), entity("b", None, None)])),
    );
    apply_delta(
        &mut state,
        Delta::Frame(frame("2", vec![entity("b", None, None), entity("c", None, None)])),
    );

    assert_eq!(state.unique_entities, 3);
}

#[test]
fn sighting_with_transformed_leg_registers_player() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::Frame(frame(
            "1",
            vec![entity("7", Some((0.4, 1.1)), Some((0.5, 1.0)))],
        )),
    );

    let player = state.players.get("7").expect("player should be registered");
    assert_eq!(player.positions.len(), 1);
    assert_eq!(player.leg_positions.len(), 1);
    // (0.5, 1.0) is the center of the source plane.
    assert_eq!(player.positions[0].x, 600);
    assert_eq!(player.positions[0].y, 300);
    assert_eq!(
        player.positions[0].timestamp_ms,
        player.leg_positions[0].timestamp_ms
    );
}

#[test]
fn sighting_without_transformed_leg_skips_trail_update() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::Frame(frame("1", vec![entity("7", Some((0.4, 1.1)), None)])),
    );

    assert!(state.players.is_empty());
    assert_eq!(state.frames.len(), 1);
    assert_eq!(state.unique_entities, 1);
}

#[test]
fn trails_append_and_color_is_stable() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::Frame(frame("1", vec![entity("7", None, Some((0.1, 0.2)))])),
    );
    let color = state.players.get("7").expect("registered").color;

    apply_delta(
        &mut state,
        Delta::Frame(frame("2", vec![entity("7", None, Some((0.2, 0.3)))])),
    );
    let player = state.players.get("7").expect("registered");
    assert_eq!(player.positions.len(), 2);
    assert_eq!(player.leg_positions.len(), 2);
    assert_eq!(player.color, color);
}

#[test]
fn clear_trails_keeps_registrations() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::Frame(frame("1", vec![entity("7", None, Some((0.1, 0.2)))])),
    );
    let color = state.players.get("7").expect("registered").color;

    state.clear_trails();

    let player = state.players.get("7").expect("still registered");
    assert!(player.positions.is_empty());
    assert!(player.leg_positions.is_empty());
    assert_eq!(player.color, color);
}

#[test]
fn status_transitions_are_logged_once() {
    let mut state = AppState::new();
    apply_delta(&mut state, Delta::Status(ConnectionStatus::Connected));
    apply_delta(&mut state, Delta::Status(ConnectionStatus::Connected));
    apply_delta(&mut state, Delta::Status(ConnectionStatus::Error));

    assert_eq!(state.status, ConnectionStatus::Error);
    let transitions = state
        .logs
        .iter()
        .filter(|line| line.contains("Stream status"))
        .count();
    assert_eq!(transitions, 2);
}

#[test]
fn log_ring_is_bounded() {
    let mut state = AppState::new();
    for i in 0..300 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {i}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 100"));
    assert_eq!(state.logs.back().map(String::as_str), Some("[INFO] line 299"));
}
