//! Time-on-ice strings ("M:SS") to seconds and back.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToiError {
    #[error("time on ice is empty")]
    Empty,

    #[error("'{0}' is not in M:SS format")]
    Format(String),

    #[error("seconds must be below 60 in '{0}'")]
    SecondsOutOfRange(String),
}

/// Parse `"M:SS"` (minutes 0-99, zero-padded seconds) into total seconds
pub fn parse_toi(raw: &str) -> Result<u32, ToiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ToiError::Empty);
    }

    let (minutes, seconds) = trimmed
        .split_once(':')
        .ok_or_else(|| ToiError::Format(trimmed.to_string()))?;

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(minutes) || minutes.len() > 2 || !all_digits(seconds) || seconds.len() != 2 {
        return Err(ToiError::Format(trimmed.to_string()));
    }

    let minutes: u32 = minutes
        .parse()
        .map_err(|_| ToiError::Format(trimmed.to_string()))?;
    let seconds: u32 = seconds
        .parse()
        .map_err(|_| ToiError::Format(trimmed.to_string()))?;

    if seconds >= 60 {
        return Err(ToiError::SecondsOutOfRange(trimmed.to_string()));
    }

    Ok(minutes * 60 + seconds)
}

pub fn format_toi(total_seconds: u32) -> String {
    format!("{}:{:02}", total_seconds / 60, total_seconds % 60)
}
