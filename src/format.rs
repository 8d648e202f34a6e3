// src/format.rs
//! Human-readable renderings for CLI output.

/// `850ms`, `12s`, `3m 5s`, `1h 2m`.
pub fn format_duration(millis: i64) -> String {
    if millis < 1000 {
        return format!("{}ms", millis);
    }
    let seconds = millis / 1000;
    if seconds < 60 {
        return format!("{}s", seconds);
    }
    let (minutes, seconds) = (seconds / 60, seconds % 60);
    if minutes < 60 {
        return match seconds {
            0 => format!("{}m", minutes),
            s => format!("{}m {}s", minutes, s),
        };
    }
    let (hours, minutes) = (minutes / 60, minutes % 60);
    match minutes {
        0 => format!("{}h", hours),
        m => format!("{}h {}m", hours, m),
    }
}

/// Review interval at the coarsest unit that still reads naturally.
pub fn format_interval(days: i64) -> String {
    match days {
        d if d < 14 => format!("{}d", d),
        d if d < 60 => format!("{}w", d / 7),
        d if d < 365 => format!("{}mo", d / 30),
        d => format!("{}y", d / 365),
    }
}

/// `0.9` renders as `90.0%`. Values outside [0, 1] are clamped.
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value.clamp(0.0, 1.0) * 100.0)
}

pub fn format_challenge_count(count: usize) -> String {
    match count {
        0 => "No challenges".to_string(),
        1 => "1 challenge".to_string(),
        n => format!("{} challenges", n),
    }
}

/// Cuts `text` to at most `max_chars` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(850), "850ms");
        assert_eq!(format_duration(12_400), "12s");
        assert_eq!(format_duration(185_000), "3m 5s");
        assert_eq!(format_duration(120_000), "2m");
        assert_eq!(format_duration(3_720_000), "1h 2m");
        assert_eq!(format_duration(7_200_000), "2h");
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(0), "0d");
        assert_eq!(format_interval(3), "3d");
        assert_eq!(format_interval(14), "2w");
        assert_eq!(format_interval(120), "4mo");
        assert_eq!(format_interval(400), "1y");
    }

    #[test]
    fn test_format_percentage_and_counts() {
        assert_eq!(format_percentage(0.9), "90.0%");
        assert_eq!(format_percentage(1.7), "100.0%");
        assert_eq!(format_challenge_count(0), "No challenges");
        assert_eq!(format_challenge_count(1), "1 challenge");
        assert_eq!(format_challenge_count(12), "12 challenges");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Two Sum", 10), "Two Sum");
        assert_eq!(truncate("Longest Palindromic Substring", 10), "Longest...");
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
