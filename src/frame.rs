use anyhow::{Context, Result, bail};
use serde_json::Value;

/// One timestamped batch of detections as pushed by the producer. Immutable
/// once received; frames are kept in arrival order, never reordered.
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: String,
    pub ts: f64,
    pub persons: Vec<Entity>,
}

/// A single detection within one frame. Entity ids are unique within a frame;
/// across frames the only identity is string equality of the tracker id.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub bbox: [f64; 4],
    pub conf: f64,
    pub color: Option<(u8, u8, u8)>,
    pub leg: Option<(f64, f64)>,
    pub transformed_leg: Option<(f64, f64)>,
}

/// Parses one websocket text payload into a `Frame`.
///
/// The producer is loose with types: ids arrive as JSON numbers or strings,
/// `transformed_leg_coordinates` is sometimes `[x, y]` and sometimes
/// `[[x, y]]`, and the perspective transform can yield null. Optional fields
/// degrade to defaults; an absent `persons` list means zero detections.
/// Anything that is not a JSON object is an error and the caller drops it.
pub fn parse_frame_json(raw: &str) -> Result<Frame> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("empty payload");
    }

    let root: Value = serde_json::from_str(trimmed).context("invalid frame json")?;
    if !root.is_object() {
        bail!("frame payload is not an object");
    }

    let id = pick_id(&root, "id").unwrap_or_default();
    let ts = root.get("ts").and_then(Value::as_f64).unwrap_or(0.0);
    let persons = parse_entities(root.get("persons"));

    Ok(Frame { id, ts, persons })
}

fn parse_entities(value: Option<&Value>) -> Vec<Entity> {
    let mut out = Vec::new();
    let Some(list) = value.and_then(Value::as_array) else {
        return out;
    };
    for entry in list {
        if let Some(entity) = parse_entity(entry) {
            out.push(entity);
        }
    }
    out
}

fn parse_entity(value: &Value) -> Option<Entity> {
    let id = pick_id(value, "id")?;
    let bbox = parse_bbox(value.get("bbox")).unwrap_or([0.0; 4]);
    let conf = value.get("conf").and_then(Value::as_f64).unwrap_or(0.0);
    let color = parse_color(value.get("color"));
    let leg = parse_pair(value.get("leg_coordinates"));
    let transformed_leg = parse_pair(value.get("transformed_leg_coordinates"));

    Some(Entity {
        id,
        bbox,
        conf,
        color,
        leg,
        transformed_leg,
    })
}

fn pick_id(value: &Value, key: &str) -> Option<String> {
    match value.get(key) {
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_bbox(value: Option<&Value>) -> Option<[f64; 4]> {
    let list = value?.as_array()?;
    if list.len() < 4 {
        return None;
    }
    let mut bbox = [0.0; 4];
    for (slot, entry) in bbox.iter_mut().zip(list.iter()) {
        *slot = entry.as_f64()?;
    }
    Some(bbox)
}

fn parse_color(value: Option<&Value>) -> Option<(u8, u8, u8)> {
    let list = value?.as_array()?;
    if list.len() < 3 {
        return None;
    }
    let channel = |v: &Value| v.as_u64().map(|n| n.min(255) as u8);
    Some((channel(&list[0])?, channel(&list[1])?, channel(&list[2])?))
}

/// Accepts `[x, y]` or the producer's nested `[[x, y]]` form.
fn parse_pair(value: Option<&Value>) -> Option<(f64, f64)> {
    let list = value?.as_array()?;
    if let Some(inner) = list.first().and_then(Value::as_array) {
        return pair_from(inner);
    }
    pair_from(list)
}

fn pair_from(list: &[Value]) -> Option<(f64, f64)> {
    if list.len() < 2 {
        return None;
    }
    Some((list[0].as_f64()?, list[1].as_f64()?))
}
