//! Wall-clock access for the quiet-hours check

use chrono::Timelike;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// Source of the current local time of day.
pub trait Clock {
    /// Minutes since local midnight, `0..1440`
    fn minute_of_day(&self) -> u16;
}

/// Reads the system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn minute_of_day(&self) -> u16 {
        let now = chrono::Local::now();
        (now.hour() * 60 + now.minute()) as u16
    }
}

/// Always reports the same minute. Used for replays and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u16);

impl Clock for FixedClock {
    fn minute_of_day(&self) -> u16 {
        self.0 % MINUTES_PER_DAY
    }
}

/// Parse a `HH:MM` time of day into minutes since midnight
pub fn parse_minute_of_day(value: &str) -> Result<u16, String> {
    let (hours, minutes) = value
        .trim()
        .split_once(':')
        .ok_or_else(|| format!("expected HH:MM, got '{}'", value))?;
    let hours: u16 = hours
        .parse()
        .map_err(|_| format!("invalid hour in '{}'", value))?;
    let minutes: u16 = minutes
        .parse()
        .map_err(|_| format!("invalid minute in '{}'", value))?;
    if hours > 23 || minutes > 59 {
        return Err(format!("time of day out of range: '{}'", value));
    }
    Ok(hours * 60 + minutes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minute_of_day() {
        assert_eq!(parse_minute_of_day("00:00"), Ok(0));
        assert_eq!(parse_minute_of_day("07:30"), Ok(450));
        assert_eq!(parse_minute_of_day(" 23:59 "), Ok(1439));
        assert!(parse_minute_of_day("24:00").is_err());
        assert!(parse_minute_of_day("12:60").is_err());
        assert!(parse_minute_of_day("noon").is_err());
        assert!(parse_minute_of_day("12:xx").is_err());
    }

    #[test]
    fn test_clocks_stay_in_range() {
        assert!(LocalClock.minute_of_day() < MINUTES_PER_DAY);
        assert_eq!(FixedClock(1500).minute_of_day(), 60);
    }
}
