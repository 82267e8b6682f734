use crate::error::{Result, VerifyError};
use crate::probes::host::Host;
use regex::RegexBuilder;

/// Any panic, in any casing.
pub const PANIC_PATTERN: &str = "panic";

/// A sequencer response status other than 200, e.g. `Sequencer responded with status=500`.
///
/// The `regex` crate has no look-ahead, so "digits not starting with 200" is spelled out:
/// a first digit other than 2, or `2`/`20` followed by something that is not `0`. The status
/// digits are the first group, so a reported match stops at them.
pub const NON_200_SEQUENCER_STATUS_PATTERN: &str =
    r"Sequencer responded with status=([013-9]\d*|2(?:[1-9]\d*)?|20(?:[1-9]\d*)?)(?:\D|$)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMatch {
    pub matched_text: String,
    /// 1-based line of the match start.
    pub line_number: usize,
}

/// Case-insensitive, multi-line search of `text` for `pattern`.
/// With a capture group, the reported text ends where the first group ends.
pub fn find_unwanted_pattern(text: &str, pattern: &str) -> Result<Option<LogMatch>> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .multi_line(true)
        .build()
        .map_err(|e| VerifyError::InvalidConfig(format!("bad log pattern `{pattern}`: {e}")))?;

    Ok(re.captures(text).and_then(|caps| {
        let whole = caps.get(0)?;
        let end = caps.get(1).map_or(whole.end(), |group| group.end());
        Some(LogMatch {
            matched_text: text[whole.start()..end].trim_end().to_string(),
            line_number: text[..whole.start()].matches('\n').count() + 1,
        })
    }))
}

/// Negative assertion over the whole journal of `service`: finding `pattern` is the failure.
/// The log is fetched once; there is no retry.
pub async fn scan_log_for_pattern(host: &dyn Host, service: &str, pattern: &str) -> Result<()> {
    let log = host.journal(service).await?;
    if let Some(found) = find_unwanted_pattern(&log, pattern)? {
        return Err(VerifyError::UnwantedLogPattern {
            service: service.to_string(),
            pattern: pattern.to_string(),
            matched_text: found.matched_text,
            line_number: found.line_number,
        });
    }
    tracing::info!(
        "[CONVERGE] ✓ no unwanted pattern '{}' found in {} logs",
        pattern,
        service
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probes::host::tests::ScriptedHost;
    use std::collections::HashMap;

    const JOURNAL: &str = "Oct 18 10:00:01 vm reporter[42]: starting reporter\n\
                           Oct 18 10:00:02 vm reporter[42]: posted batch\n\
                           Oct 18 10:00:03 vm reporter[42]: PANIC: nil pointer dereference\n\
                           Oct 18 10:00:04 vm systemd[1]: reporter.service: Main process exited\n";

    #[test]
    fn panic_is_found_case_insensitively_with_line_number() {
        let found = find_unwanted_pattern(JOURNAL, PANIC_PATTERN)
            .expect("valid pattern")
            .expect("panic present");
        assert_eq!(found.matched_text, "PANIC");
        assert_eq!(found.line_number, 3);
    }

    #[test]
    fn scanning_is_idempotent() {
        let first = find_unwanted_pattern(JOURNAL, PANIC_PATTERN).expect("valid");
        let second = find_unwanted_pattern(JOURNAL, PANIC_PATTERN).expect("valid");
        assert_eq!(first, second);
        assert_eq!(
            find_unwanted_pattern("all good\n", PANIC_PATTERN).expect("valid"),
            None
        );
    }

    #[test]
    fn non_200_status_pattern_matches_only_failures() {
        let hit = |status: &str| {
            let line = format!("INFO Sequencer responded with status={status}\n");
            find_unwanted_pattern(&line, NON_200_SEQUENCER_STATUS_PATTERN)
                .expect("valid pattern")
                .is_some()
        };
        for bad in ["500", "404", "201", "2", "20", "210", "2010", "0200", "302"] {
            assert!(hit(bad), "status={bad} should match");
        }
        for ok in ["200", "2000", "2005"] {
            assert!(!hit(ok), "status={ok} should not match");
        }
        let at_end_of_text = "Sequencer responded with status=20";
        assert!(find_unwanted_pattern(at_end_of_text, NON_200_SEQUENCER_STATUS_PATTERN)
            .expect("valid")
            .is_some());
    }

    #[test]
    fn non_200_match_reports_full_status() {
        let log = "ok line\nWARN sequencer responded with STATUS=503 body=busy\n";
        let found = find_unwanted_pattern(log, NON_200_SEQUENCER_STATUS_PATTERN)
            .expect("valid")
            .expect("503 matches");
        assert_eq!(found.line_number, 2);
        assert_eq!(found.matched_text, "sequencer responded with STATUS=503");
    }

    #[test]
    fn non_200_match_stops_at_the_status_digits() {
        for (log, expected) in [
            (
                "Sequencer responded with status=204, retrying\n",
                "Sequencer responded with status=204",
            ),
            (
                "Sequencer responded with status=210 after 3 tries\n",
                "Sequencer responded with status=210",
            ),
            (
                "Sequencer responded with status=2;\n",
                "Sequencer responded with status=2",
            ),
        ] {
            let found = find_unwanted_pattern(log, NON_200_SEQUENCER_STATUS_PATTERN)
                .expect("valid")
                .expect("non-200 matches");
            assert_eq!(found.matched_text, expected);
        }
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        let err = find_unwanted_pattern("x", "(").expect_err("unbalanced group");
        assert!(matches!(err, VerifyError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn scan_fails_on_match_and_passes_on_clean_log() {
        let host = ScriptedHost {
            journals: HashMap::from([
                ("reporter".to_string(), JOURNAL.to_string()),
                ("sequencer".to_string(), "listening on 0.0.0.0:5556\n".to_string()),
            ]),
            ..Default::default()
        };

        let err = scan_log_for_pattern(&host, "reporter", PANIC_PATTERN)
            .await
            .expect_err("panic in reporter log");
        match err {
            VerifyError::UnwantedLogPattern {
                service,
                matched_text,
                line_number,
                ..
            } => {
                assert_eq!(service, "reporter");
                assert_eq!(matched_text, "PANIC");
                assert_eq!(line_number, 3);
            }
            other => panic!("unexpected error: {other}"),
        }

        scan_log_for_pattern(&host, "sequencer", PANIC_PATTERN)
            .await
            .expect("clean log passes");
    }
}
