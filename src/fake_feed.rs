use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::frame::{Entity, Frame};
use crate::state::{ConnectionStatus, Delta};

const TICK: Duration = Duration::from_millis(400);
const PLAYER_COUNT: usize = 4;

/// Spawns an offline provider that emits wire-shaped frames from a small set
/// of random-walking players. Selected with `APP_FEED=demo`; exits when the
/// UI drops its receiver.
pub fn spawn_demo_feed(tx: Sender<Delta>) {
    thread::spawn(move || {
        let mut rng = rand::thread_rng();
        if tx.send(Delta::Status(ConnectionStatus::Connected)).is_err() {
            return;
        }
        let _ = tx.send(Delta::Log("[INFO] Demo feed active".to_string()));

        // Positions live in the producer's court plane: x in 0..1, y in 0..2.
        let mut positions: Vec<(f64, f64)> = (0..PLAYER_COUNT)
            .map(|_| (rng.gen_range(0.1..0.9), rng.gen_range(0.2..1.8)))
            .collect();
        let mut frame_id: u64 = 0;

        loop {
            frame_id += 1;
            let mut persons = Vec::with_capacity(PLAYER_COUNT);
            for (idx, pos) in positions.iter_mut().enumerate() {
                pos.0 = (pos.0 + rng.gen_range(-0.03..0.03)).clamp(0.0, 1.0);
                pos.1 = (pos.1 + rng.gen_range(-0.05..0.05)).clamp(0.0, 2.0);

                // Nominal camera-plane box so the table has plausible numbers.
                let cx = pos.0 * 1920.0;
                let cy = (pos.1 / 2.0) * 1080.0;
                persons.push(Entity {
                    id: (idx + 1).to_string(),
                    bbox: [cx - 40.0, cy - 120.0, cx + 40.0, cy],
                    conf: rng.gen_range(0.55..0.99),
                    color: None,
                    leg: Some(*pos),
                    transformed_leg: Some(*pos),
                });
            }

            let frame = Frame {
                id: frame_id.to_string(),
                ts: Utc::now().timestamp_millis() as f64 / 1000.0,
                persons,
            };
            if tx.send(Delta::Frame(frame)).is_err() {
                return;
            }
            thread::sleep(TICK);
        }
    });
}
