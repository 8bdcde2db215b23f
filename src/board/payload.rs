//! Helpers over the open element payload document

use serde_json::{Map, Value};

/// Payload keys holding absolute line endpoint coordinates
pub const LINE_ENDPOINT_KEYS: [&str; 4] = ["startX", "startY", "endX", "endY"];

/// Shallow merge-patch: keys present in `patch` overwrite the target,
/// every other key is preserved.
///
/// A non-object target is replaced wholesale; a non-object patch is ignored.
pub fn merge_patch(target: &mut Value, patch: &Value) {
    let Some(patch_map) = patch.as_object() else {
        return;
    };
    match target.as_object_mut() {
        Some(target_map) => {
            for (key, value) in patch_map {
                target_map.insert(key.clone(), value.clone());
            }
        }
        None => *target = Value::Object(patch_map.clone()),
    }
}

/// Parse a JSON value as a number, accepting numeric strings.
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Read a numeric field from a payload document.
pub fn number_field(data: &Value, key: &str) -> Option<f64> {
    data.get(key).and_then(parse_number)
}

/// Normalize a rotation in degrees into [0, 360).
pub fn normalize_rotation(rotation: f64) -> f64 {
    ((rotation % 360.0) + 360.0) % 360.0
}

/// Read the four absolute line endpoint coordinates, if all are present
/// and numeric.
pub fn line_endpoints(data: &Value) -> Option<(f64, f64, f64, f64)> {
    Some((
        number_field(data, "startX")?,
        number_field(data, "startY")?,
        number_field(data, "endX")?,
        number_field(data, "endY")?,
    ))
}

/// Write absolute line endpoint coordinates into the payload.
pub fn set_line_endpoints(data: &mut Value, sx: f64, sy: f64, ex: f64, ey: f64) {
    if !data.is_object() {
        *data = Value::Object(Map::new());
    }
    if let Some(map) = data.as_object_mut() {
        map.insert("startX".into(), sx.into());
        map.insert("startY".into(), sy.into());
        map.insert("endX".into(), ex.into());
        map.insert("endY".into(), ey.into());
    }
}

/// Translate stored line endpoints by a delta.
///
/// Returns false without touching the payload when any endpoint field is
/// missing or malformed - the caller's position move still applies, only the
/// derived update is skipped.
pub fn translate_line_endpoints(data: &mut Value, dx: f64, dy: f64) -> bool {
    let Some((sx, sy, ex, ey)) = line_endpoints(data) else {
        return false;
    };
    set_line_endpoints(data, sx + dx, sy + dy, ex + dx, ey + dy);
    true
}
