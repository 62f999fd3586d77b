//! Duration rendering for the `tlong`, `tlonga`, `tshort1` and `tshort2` tokens

const UNITS: [(i64, &str, &str, &str); 4] = [
    (86_400, "day", "days", "d"),
    (3_600, "hour", "hours", "h"),
    (60, "minute", "minutes", "m"),
    (1, "second", "seconds", "s"),
];

/// "3 minutes and 4 seconds"; zero renders as "0 seconds"
pub fn long(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let parts: Vec<String> = split(seconds)
        .map(|(amount, singular, plural, _)| {
            format!("{} {}", amount, if amount == 1 { singular } else { plural })
        })
        .collect();

    match parts.len() {
        0 => "0 seconds".to_string(),
        1 => parts[0].clone(),
        n => format!("{} and {}", parts[..n - 1].join(", "), parts[n - 1]),
    }
}

/// "3m 4s"; zero renders as "0s"
pub fn long_abbreviated(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let parts: Vec<String> = split(seconds)
        .map(|(amount, _, _, short)| format!("{}{}", amount, short))
        .collect();

    if parts.is_empty() {
        "0s".to_string()
    } else {
        parts.join(" ")
    }
}

/// `mm:ss`, minutes are not capped at 59
pub fn minutes_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// `hh:mm:ss`, hours are not capped at 23
pub fn hours_minutes_seconds(seconds: i64) -> String {
    let seconds = seconds.max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3_600,
        (seconds % 3_600) / 60,
        seconds % 60
    )
}

fn split(
    mut seconds: i64,
) -> impl Iterator<Item = (i64, &'static str, &'static str, &'static str)> {
    UNITS.iter().filter_map(move |&(size, singular, plural, short)| {
        let amount = seconds / size;
        seconds %= size;
        (amount > 0).then_some((amount, singular, plural, short))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long() {
        assert_eq!(long(184), "3 minutes and 4 seconds");
        assert_eq!(long(60), "1 minute");
        assert_eq!(long(90_061), "1 day, 1 hour, 1 minute and 1 second");
        assert_eq!(long(0), "0 seconds");
        assert_eq!(long(-5), "0 seconds");
    }

    #[test]
    fn test_long_abbreviated() {
        assert_eq!(long_abbreviated(184), "3m 4s");
        assert_eq!(long_abbreviated(7_200), "2h");
        assert_eq!(long_abbreviated(0), "0s");
    }

    #[test]
    fn test_short_forms() {
        assert_eq!(minutes_seconds(184), "03:04");
        assert_eq!(minutes_seconds(3_725), "62:05");
        assert_eq!(hours_minutes_seconds(3_725), "01:02:05");
        assert_eq!(hours_minutes_seconds(0), "00:00:00");
    }
}
