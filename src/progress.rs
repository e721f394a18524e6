use std::time::Duration;

pub const SCRUBBER: char = 'O';
pub const ELAPSED_FILL: char = '=';
pub const REMAINING_FILL: char = '-';

/// `MM:SS`, with minutes allowed to run past 59 for long media.
pub fn format_timestamp(value: Duration) -> String {
    let total = value.as_secs();
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Renders `MM:SS [===O----] MM:SS` into exactly `width` characters when there
/// is room for a bar. When the two timestamps alone fill the width, only the
/// timestamps are returned.
pub fn render(position: Duration, total: Duration, width: usize) -> String {
    let elapsed = format_timestamp(position);
    let length = format_timestamp(total);
    let prefix = format!("{elapsed} [");
    let suffix = format!("] {length}");

    let interior = width
        .checked_sub(prefix.len() + suffix.len())
        .filter(|interior| *interior > 0);
    let Some(interior) = interior else {
        return format!("{elapsed} {length}");
    };

    let scrubber = scrubber_column(position, total, interior);
    let mut bar = String::with_capacity(width);
    bar.push_str(&prefix);
    for col in 0..interior {
        bar.push(if col < scrubber {
            ELAPSED_FILL
        } else if col == scrubber {
            SCRUBBER
        } else {
            REMAINING_FILL
        });
    }
    bar.push_str(&suffix);
    bar
}

/// `floor(position / total * interior)`, kept on the last cell so the scrubber
/// stays visible at the very end (and when the position overshoots the
/// reported duration).
fn scrubber_column(position: Duration, total: Duration, interior: usize) -> usize {
    if total.is_zero() {
        return 0;
    }
    let fraction = position.as_secs_f64() / total.as_secs_f64();
    let column = (fraction * interior as f64).floor();
    if column <= 0.0 {
        0
    } else {
        (column as usize).min(interior - 1)
    }
}
