//! Small shared helpers.

use std::time::Duration;

use uuid::Uuid;

/// Short unique suffix for generated container names.
pub fn name_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Parse a human-friendly duration: `10s`, `500ms`, `2m`, `1h`, or a bare
/// number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("empty duration".to_string());
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let split = input
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .ok_or_else(|| format!("invalid duration '{input}'"))?;
    let (value, unit) = input.split_at(split);
    let value: f64 = value
        .parse()
        .map_err(|_| format!("invalid duration '{input}'"))?;
    let unit_secs = match unit {
        "ms" => 0.001,
        "s" => 1.0,
        "m" => 60.0,
        "h" => 3600.0,
        _ => return Err(format!("invalid duration unit '{unit}'")),
    };
    Ok(Duration::from_secs_f64(value * unit_secs))
}
