//! Text for action notifications.

/// `m:ss`, or `h:mm:ss` from one hour up. Non-finite input renders as `--:--`.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() {
        return "--:--".to_string();
    }
    let total = seconds.max(0.0).floor() as u64;
    let (hours, minutes, secs) = (total / 3600, (total % 3600) / 60, total % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{minutes}:{secs:02}")
    }
}

/// `1:40 / 3:20 (50%)`
pub fn position_summary(current: f64, duration: f64) -> String {
    let percent = if duration > 0.0 { (current / duration * 100.0).round() } else { 0.0 };
    format!("{} / {} ({}%)", format_time(current), format_time(duration), percent)
}

/// `Forward 5s` / `Back 10s`
pub fn seek_title(delta: f64) -> String {
    let magnitude = delta.abs();
    let amount = if magnitude.fract() == 0.0 {
        format!("{magnitude:.0}s")
    } else {
        format!("{magnitude:.1}s")
    };
    if delta < 0.0 {
        format!("Back {amount}")
    } else {
        format!("Forward {amount}")
    }
}

pub fn volume_percent(volume: f64) -> String {
    format!("{:.0}%", (volume * 100.0).round())
}
