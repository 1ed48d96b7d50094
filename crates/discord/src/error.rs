use std::time::Duration;

use {songbird::error::JoinError, tether_keeper::PlatformError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Serenity(#[from] serenity::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Map a songbird join/leave error onto the keeper's error kinds.
///
/// `timeout` is the bound the failed operation ran under.
pub(crate) fn from_join_error(err: JoinError, timeout: Duration) -> PlatformError {
    match err {
        JoinError::TimedOut => PlatformError::TimedOut(timeout),
        JoinError::NoCall => PlatformError::message("no voice call for guild"),
        JoinError::Driver(driver) => {
            let text = driver.to_string();
            match close_code(&text) {
                Some(code) => PlatformError::abnormal_closure(code, text),
                None => PlatformError::message(format!("voice driver: {text}")),
            }
        },
        other => PlatformError::message(format!("voice join: {other}")),
    }
}

/// First voice gateway close code (4000..=4999) mentioned in an error
/// message.
pub(crate) fn close_code(text: &str) -> Option<u16> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|token| token.len() == 4)
        .filter_map(|token| token.parse::<u16>().ok())
        .find(|code| (4000..=4999).contains(code))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("websocket closed with code 4006: Session no longer valid", Some(4006))]
    #[case("WsClosed(Some(CloseFrame { code: Library(4014), reason: \"\" }))", Some(4014))]
    #[case("connection reset by peer (os error 104)", None)]
    #[case("port 40060 refused", None)]
    #[case("code 1006", None)]
    fn extracts_close_codes(#[case] text: &str, #[case] expected: Option<u16>) {
        assert_eq!(close_code(text), expected);
    }

    #[test]
    fn join_timeout_keeps_the_bound() {
        assert!(matches!(
            from_join_error(JoinError::TimedOut, Duration::from_secs(60)),
            PlatformError::TimedOut(d) if d == Duration::from_secs(60)
        ));
    }

    #[test]
    fn missing_call_is_not_transient() {
        assert!(matches!(
            from_join_error(JoinError::NoCall, Duration::from_secs(60)),
            PlatformError::Message { .. }
        ));
    }
}
