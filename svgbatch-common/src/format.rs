//! Human readable sizes and durations for reports.

const UNITS: [&str; 5] = ["KiB", "MiB", "GiB", "TiB", "PiB"];

pub fn prepare_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub fn prepare_time(ms: u64) -> String {
    let secs = ms / 1000;
    if secs == 0 {
        return format!("{:03}ms", ms);
    }
    if secs < 60 {
        return format!("{}s {:03}ms", secs, ms % 1000);
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m {:02}s", mins, secs % 60);
    }
    format!("{}h {:02}m {:02}s", mins / 60, mins % 60, secs % 60)
}

pub fn prepare_percent(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v),
        None => "-".to_string(),
    }
}
