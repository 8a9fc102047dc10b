//! Byte size helpers.

/// Kilobytes to bytes.
#[inline]
pub const fn kb(n: usize) -> usize {
    n << 10
}

/// Megabytes to bytes.
#[inline]
pub const fn mb(n: usize) -> usize {
    n << 20
}

/// Human-readable byte count, used by the stats report.
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 3] = ["KB", "MB", "GB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}
