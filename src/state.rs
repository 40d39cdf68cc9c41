use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::court::{self, CourtPoint};
use crate::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Table,
    Histogram,
    Court,
}

/// Liveness of the push stream, driven by the feed worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPosition {
    pub x: i32,
    pub y: i32,
    pub timestamp_ms: i64,
}

/// One tracked subject across frames. Created on first sighting; the color is
/// assigned at creation and never changes. Both trails grow for the lifetime
/// of the process and are always appended to together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedPlayer {
    pub id: String,
    pub color: (u8, u8, u8),
    pub positions: Vec<DisplayPosition>,
    pub leg_positions: Vec<DisplayPosition>,
}

/// One flattened table row: a single detection joined with its frame header.
#[derive(Debug, Clone)]
pub struct DetectionRow {
    pub frame_id: String,
    pub ts: f64,
    pub person_id: String,
    pub color: Option<(u8, u8, u8)>,
    pub bbox: [f64; 4],
    pub conf: f64,
}

#[derive(Debug, Clone)]
pub enum Delta {
    Status(ConnectionStatus),
    Frame(Frame),
    Log(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub status: ConnectionStatus,
    /// Received frames, most-recent-first. Unbounded for the view's lifetime.
    pub frames: Vec<Frame>,
    /// Distinct entity ids across all stored frames; rescanned per arrival.
    pub unique_entities: usize,
    pub players: HashMap<String, TrackedPlayer>,
    pub selected_player_id: Option<String>,
    pub logs: VecDeque<String>,
    pub table_scroll: usize,
    pub help_overlay: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            screen: Screen::Table,
            status: ConnectionStatus::Disconnected,
            frames: Vec::with_capacity(256),
            unique_entities: 0,
            players: HashMap::with_capacity(16),
            selected_player_id: None,
            logs: VecDeque::with_capacity(200),
            table_scroll: 0,
            help_overlay: false,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    /// Appends one sample to a player's trails, registering the player on
    /// first sighting. The display point goes into `positions`; the raw leg
    /// point is mapped into court pixels for `leg_positions`. Both entries
    /// carry the same wall-clock stamp so the trails stay in lockstep.
    pub fn update_player_position(&mut self, id: &str, display: CourtPoint, raw_leg: (f64, f64)) {
        let timestamp_ms = Utc::now().timestamp_millis();
        let player = self
            .players
            .entry(id.to_string())
            .or_insert_with(|| TrackedPlayer {
                id: id.to_string(),
                color: random_trail_color(),
                positions: Vec::new(),
                leg_positions: Vec::new(),
            });

        let leg = court::to_court_point(raw_leg.0, raw_leg.1);
        player.positions.push(DisplayPosition {
            x: display.x,
            y: display.y,
            timestamp_ms,
        });
        player.leg_positions.push(DisplayPosition {
            x: leg.x,
            y: leg.y,
            timestamp_ms,
        });
    }

    /// Sets the render filter. Ids that were never sighted are accepted; the
    /// court view simply draws nothing for them. Storage is untouched.
    pub fn select_player(&mut self, id: Option<String>) {
        self.selected_player_id = id;
    }

    pub fn cycle_selection_next(&mut self) {
        let ids = self.sorted_player_ids();
        if ids.is_empty() {
            return;
        }
        let next = match &self.selected_player_id {
            Some(current) => match ids.iter().position(|id| id == current) {
                Some(pos) => ids[(pos + 1) % ids.len()].clone(),
                None => ids[0].clone(),
            },
            None => ids[0].clone(),
        };
        self.selected_player_id = Some(next);
    }

    pub fn cycle_selection_prev(&mut self) {
        let ids = self.sorted_player_ids();
        if ids.is_empty() {
            return;
        }
        let prev = match &self.selected_player_id {
            Some(current) => match ids.iter().position(|id| id == current) {
                Some(0) | None => ids[ids.len() - 1].clone(),
                Some(pos) => ids[pos - 1].clone(),
            },
            None => ids[ids.len() - 1].clone(),
        };
        self.selected_player_id = Some(prev);
    }

    /// Empties every player's trails while keeping the registrations and
    /// their colors. Both vectors are cleared as a pair.
    pub fn clear_trails(&mut self) {
        for player in self.players.values_mut() {
            player.positions.clear();
            player.leg_positions.clear();
        }
    }

    /// Player ids in numeric-ish order ("2" before "10"), used for selection
    /// cycling and stable draw order.
    pub fn sorted_player_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.players.keys().cloned().collect();
        ids.sort_by(|a, b| (a.len(), a.as_str()).cmp(&(b.len(), b.as_str())));
        ids
    }

    /// Players the court view draws trails for, honoring the selection filter.
    pub fn trail_players(&self) -> Vec<&TrackedPlayer> {
        self.sorted_player_ids()
            .iter()
            .filter(|id| match &self.selected_player_id {
                Some(selected) => *id == selected,
                None => true,
            })
            .filter_map(|id| self.players.get(id))
            .collect()
    }

    /// Flattened detection rows for the table, newest frame first, preserving
    /// entity order within each frame.
    pub fn detection_rows(&self) -> Vec<DetectionRow> {
        let mut rows = Vec::new();
        for frame in &self.frames {
            for person in &frame.persons {
                rows.push(DetectionRow {
                    frame_id: frame.id.clone(),
                    ts: frame.ts,
                    person_id: person.id.clone(),
                    color: person.color,
                    bbox: person.bbox,
                    conf: person.conf,
                });
            }
        }
        rows
    }

    /// Detection counts for the histogram: the `limit` most recent frames,
    /// returned oldest-to-newest so the chart reads left to right.
    pub fn persons_per_frame(&self, limit: usize) -> Vec<(String, u64)> {
        self.frames
            .iter()
            .take(limit)
            .map(|frame| (frame.id.clone(), frame.persons.len() as u64))
            .rev()
            .collect()
    }

    pub fn scroll_table_down(&mut self) {
        let total = self.detection_rows().len();
        if total == 0 {
            self.table_scroll = 0;
            return;
        }
        if self.table_scroll < total - 1 {
            self.table_scroll += 1;
        }
    }

    pub fn scroll_table_up(&mut self) {
        self.table_scroll = self.table_scroll.saturating_sub(1);
    }

    fn recount_unique_entities(&self) -> usize {
        let mut ids: HashSet<&str> = HashSet::new();
        for frame in &self.frames {
            for person in &frame.persons {
                ids.insert(person.id.as_str());
            }
        }
        ids.len()
    }
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::Status(status) => {
            if state.status != status {
                state.push_log(format!("[INFO] Stream status: {}", status.label()));
            }
            state.status = status;
        }
        Delta::Frame(frame) => {
            for person in &frame.persons {
                let Some((x, y)) = person.transformed_leg else {
                    continue;
                };
                let display = court::to_court_point(x, y);
                let raw_leg = person.leg.unwrap_or((x, y));
                state.update_player_position(&person.id, display, raw_leg);
            }
            state.frames.insert(0, frame);
            state.unique_entities = state.recount_unique_entities();
        }
        Delta::Log(line) => state.push_log(line),
    }
}

fn random_trail_color() -> (u8, u8, u8) {
    let mut rng = rand::thread_rng();
    (
        rng.gen_range(40..=255),
        rng.gen_range(40..=255),
        rng.gen_range(40..=255),
    )
}
