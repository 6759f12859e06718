/// Convert an ISO 8601 duration (as used by schema.org) to whole minutes.
///
/// Handles `PT1H30M`, `P1DT2H`, fractional seconds (`PT5400.0S`) and the
/// non-standard ranges some sites emit (`PT15-20M`, upper bound wins).
pub fn iso8601_minutes(duration: &str) -> Option<u32> {
    let duration = duration.trim().to_ascii_uppercase();
    let body = duration.strip_prefix('P')?;

    let mut total_seconds = 0f64;
    let mut in_time = false;
    let mut number = String::new();
    let mut saw_component = false;

    for c in body.chars() {
        match c {
            'T' if number.is_empty() => in_time = true,
            '0'..='9' | '.' | ',' | '-' => number.push(if c == ',' { '.' } else { c }),
            'W' | 'D' | 'H' | 'M' | 'S' => {
                let value = upper_bound(&number)?;
                number.clear();
                let seconds_per_unit = match (c, in_time) {
                    ('W', false) => 7.0 * 86_400.0,
                    ('D', false) => 86_400.0,
                    ('H', true) => 3_600.0,
                    ('M', true) => 60.0,
                    ('S', true) => 1.0,
                    _ => return None,
                };
                total_seconds += value * seconds_per_unit;
                saw_component = true;
            }
            _ => return None,
        }
    }

    if !saw_component || !number.is_empty() {
        return None;
    }
    Some((total_seconds / 60.0).round() as u32)
}

fn upper_bound(number: &str) -> Option<f64> {
    let upper = number.rsplit('-').next()?;
    let value: f64 = upper.parse().ok()?;
    if value.is_sign_negative() || !value.is_finite() {
        return None;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_conversion() {
        assert_eq!(iso8601_minutes("PT30M"), Some(30));
        assert_eq!(iso8601_minutes("PT1H"), Some(60));
        assert_eq!(iso8601_minutes("PT1H30M"), Some(90));
        assert_eq!(iso8601_minutes("PT90M"), Some(90));
        assert_eq!(iso8601_minutes("pt2h15m"), Some(135));
        assert_eq!(iso8601_minutes("P1DT2H"), Some(26 * 60));
        assert_eq!(iso8601_minutes("P0DT0H25M"), Some(25));
    }

    #[test]
    fn test_ranges_and_seconds() {
        assert_eq!(iso8601_minutes("PT15-20M"), Some(20));
        assert_eq!(iso8601_minutes("PT5400S"), Some(90));
        assert_eq!(iso8601_minutes("PT5400.0S"), Some(90));
        assert_eq!(iso8601_minutes("PT300S"), Some(5));
    }

    #[test]
    fn test_invalid_durations() {
        assert_eq!(iso8601_minutes("invalid"), None);
        assert_eq!(iso8601_minutes("30 minutes"), None);
        assert_eq!(iso8601_minutes("PT"), None);
        assert_eq!(iso8601_minutes("PT30"), None);
        assert_eq!(iso8601_minutes("P2H"), None);
        assert_eq!(iso8601_minutes(""), None);
    }
}
