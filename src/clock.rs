//! Time-of-day codec: `hh:mm [am|pm]` text to minutes since midnight.

/// Minutes since midnight — the only time-of-day type.
pub type Minutes = u32;

pub fn parse(text: &str) -> Result<Minutes, TimeError> {
    let tokens: Vec<&str> = text
        .split([':', ' '])
        .filter(|t| !t.is_empty())
        .collect();
    if tokens.len() < 2 {
        return Err(TimeError::Format);
    }
    let hour_text = tokens[0];
    let minute_text = tokens[1];

    if !hour_text.chars().all(|c| c.is_ascii_digit())
        || !minute_text.chars().all(|c| c.is_ascii_digit())
    {
        return Err(TimeError::NonDigit);
    }

    let mut hour: Minutes = hour_text.parse().map_err(|_| TimeError::NonDigit)?;
    let minute: Minutes = minute_text.parse().map_err(|_| TimeError::NonDigit)?;

    if hour > 24 {
        return Err(TimeError::HourTooLarge(hour));
    }
    if minute > 59 {
        return Err(TimeError::MinuteTooLarge(minute));
    }

    // Missing suffix means am. Anything that is not "pm" is treated as am.
    let suffix = tokens.get(2).map(|t| t.to_lowercase());
    if suffix.as_deref() == Some("pm") {
        if hour > 12 {
            return Err(TimeError::PmHourTooLarge(hour));
        }
        hour += 12;
    }

    Ok(hour * 60 + minute)
}

/// Render minutes-since-midnight back to text.
///
/// In am/pm mode hours above 12 are reduced by 12 and the suffix is
/// always "pm", even for morning values. That matches the stored-data
/// producers this crate has to stay byte-compatible with.
pub fn format(minutes: Minutes, use_ampm: bool) -> String {
    let mut hour = minutes / 60;
    let minute = minutes % 60;
    if use_ampm {
        if hour > 12 {
            hour -= 12;
        }
        format!("{hour}:{minute} pm")
    } else {
        format!("{hour}:{minute}")
    }
}

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub enum TimeError {
    Format,
    NonDigit,
    HourTooLarge(Minutes),
    MinuteTooLarge(Minutes),
    PmHourTooLarge(Minutes),
}

impl std::fmt::Display for TimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeError::Format => {
                write!(f, "time format is invalid, should be: hh:mm [am|pm]")
            }
            TimeError::NonDigit => {
                write!(f, "time values should only contain numbers, example: hh:mm [am|pm]")
            }
            TimeError::HourTooLarge(h) => write!(f, "hour cannot be greater than 24, got {h}"),
            TimeError::MinuteTooLarge(m) => {
                write!(f, "minute value is greater than 59, got {m}")
            }
            TimeError::PmHourTooLarge(h) => {
                write!(f, "pm passed in but hour value is greater than 12, got {h}")
            }
        }
    }
}

impl std::error::Error for TimeError {}
