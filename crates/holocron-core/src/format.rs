//! Display formatting helpers for runtimes and ratings.

/// `"2h 15m"`, `"45m"`, `"2h"`; empty for zero or negative input.
pub fn format_runtime(minutes: i64) -> String {
    if minutes <= 0 {
        return String::new();
    }
    let (hours, mins) = (minutes / 60, minutes % 60);
    match (hours, mins) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// Watched / total text for the runtime progress line.
pub fn progress_runtime_text(watched_minutes: i64, total_minutes: i64) -> String {
    let watched = format_runtime(watched_minutes);
    let total = format_runtime(total_minutes);
    match (watched.is_empty(), total.is_empty()) {
        (true, true) => String::new(),
        (false, true) => format!("{watched} watched"),
        (true, false) => format!("0m / {total}"),
        (false, false) => format!("{watched} / {total}"),
    }
}

/// One decimal place; empty when there is no rating.
pub fn format_rating(rating: f64) -> String {
    if rating > 0.0 {
        format!("{rating:.1}")
    } else {
        String::new()
    }
}

/// Filled stars out of five for a 0-10 rating.
pub fn star_rating(rating: f64) -> u8 {
    if rating > 0.0 {
        (rating / 10.0 * 5.0).round().clamp(0.0, 5.0) as u8
    } else {
        0
    }
}

pub fn stars(rating: f64) -> String {
    let filled = usize::from(star_rating(rating));
    format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RatingTier {
    Excellent,
    Good,
    Decent,
    Poor,
    None,
}

impl RatingTier {
    pub fn of(rating: f64) -> Self {
        match rating {
            r if r.is_nan() || r <= 0.0 => Self::None,
            r if r >= 8.0 => Self::Excellent,
            r if r >= 7.0 => Self::Good,
            r if r >= 6.0 => Self::Decent,
            _ => Self::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Decent => "decent",
            Self::Poor => "poor",
            Self::None => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_runtime() {
        assert_eq!(format_runtime(0), "");
        assert_eq!(format_runtime(-3), "");
        assert_eq!(format_runtime(45), "45m");
        assert_eq!(format_runtime(120), "2h");
        assert_eq!(format_runtime(135), "2h 15m");
    }

    #[test]
    fn test_progress_runtime_text() {
        assert_eq!(progress_runtime_text(0, 0), "");
        assert_eq!(progress_runtime_text(30, 0), "30m watched");
        assert_eq!(progress_runtime_text(0, 2700), "0m / 45h");
        assert_eq!(progress_runtime_text(750, 2715), "12h 30m / 45h 15m");
    }

    #[test]
    fn test_ratings() {
        assert_eq!(format_rating(0.0), "");
        assert_eq!(format_rating(8.24), "8.2");
        assert_eq!(format_rating(7.0), "7.0");
        assert_eq!(star_rating(0.0), 0);
        assert_eq!(star_rating(8.1), 4);
        assert_eq!(star_rating(10.0), 5);
        assert_eq!(stars(6.0), "★★★☆☆");
    }

    #[test]
    fn test_rating_tier() {
        assert_eq!(RatingTier::of(0.0), RatingTier::None);
        assert_eq!(RatingTier::of(8.0), RatingTier::Excellent);
        assert_eq!(RatingTier::of(7.9), RatingTier::Good);
        assert_eq!(RatingTier::of(6.0), RatingTier::Decent);
        assert_eq!(RatingTier::of(5.9), RatingTier::Poor);
        assert_eq!(RatingTier::Good.as_str(), "good");
    }
}
