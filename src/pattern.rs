//! Load patterns in blitz.io's command-line grammar
//!
//! A rush is described the way the blitz CLI describes it:
//!
//! ```text
//! --region virginia --pattern 1-250:30 --status 200 http://app.herokuapp.com
//! ```
//!
//! The pattern is a comma-separated list of `start-end:duration` ramps, where
//! `start` and `end` are concurrent users and `duration` is in seconds.
//! [`LoadPattern`] renders this form with `Display`, parses it with `FromStr`,
//! and converts into the JSON body the execute endpoint expects.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::BlitzerError;

/// One linear ramp from `start` to `end` users over `duration_secs`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: u64,
    pub end: u64,
    pub duration_secs: u64,
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}:{}", self.start, self.end, self.duration_secs)
    }
}

impl FromStr for Interval {
    type Err = BlitzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BlitzerError::Pattern(format!("expected start-end:duration, got {s:?}"));

        let (range, duration) = s.split_once(':').ok_or_else(invalid)?;
        let (start, end) = range.split_once('-').ok_or_else(invalid)?;

        let start: u64 = start.trim().parse().map_err(|_| invalid())?;
        let end: u64 = end.trim().parse().map_err(|_| invalid())?;
        let duration_secs: u64 = duration.trim().parse().map_err(|_| invalid())?;

        if start == 0 || end == 0 {
            return Err(BlitzerError::Pattern(format!(
                "ramp {s:?} needs at least one user at each end"
            )));
        }
        if duration_secs == 0 {
            return Err(BlitzerError::Pattern(format!(
                "ramp {s:?} must last at least one second"
            )));
        }

        Ok(Interval {
            start,
            end,
            duration_secs,
        })
    }
}

/// A complete rush description. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPattern {
    region: String,
    intervals: Vec<Interval>,
    status: u16,
    url: String,
}

impl LoadPattern {
    /// Ramp from a single user up to `target` users over `duration_secs`
    pub fn ramp(
        region: impl Into<String>,
        target: u64,
        duration_secs: u64,
        status: u16,
        url: impl Into<String>,
    ) -> Self {
        LoadPattern {
            region: region.into(),
            intervals: vec![Interval {
                start: 1,
                end: target,
                duration_secs,
            }],
            status,
            url: url.into(),
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Peak concurrency reached by any interval
    pub fn peak_users(&self) -> u64 {
        self.intervals
            .iter()
            .map(|i| i.start.max(i.end))
            .max()
            .unwrap_or(0)
    }

    /// Total ramp time in seconds
    pub fn total_duration_secs(&self) -> u64 {
        self.intervals.iter().map(|i| i.duration_secs).sum()
    }

    /// Body for `POST /api/1/curl/execute`
    pub fn to_request(&self) -> RushRequest {
        RushRequest {
            region: self.region.clone(),
            status: self.status,
            url: self.url.clone(),
            pattern: PatternRequest {
                iterations: 1,
                intervals: self
                    .intervals
                    .iter()
                    .map(|i| IntervalRequest {
                        iterations: 1,
                        start: i.start,
                        end: i.end,
                        duration: i.duration_secs,
                    })
                    .collect(),
            },
        }
    }
}

impl fmt::Display for LoadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pattern = self
            .intervals
            .iter()
            .map(Interval::to_string)
            .collect::<Vec<_>>()
            .join(",");

        write!(
            f,
            "--region {} --pattern {} --status {} {}",
            self.region, pattern, self.status, self.url
        )
    }
}

impl FromStr for LoadPattern {
    type Err = BlitzerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut region = None;
        let mut intervals = None;
        let mut status = 200;
        let mut url: Option<String> = None;

        let mut tokens = s.split_whitespace();
        while let Some(token) = tokens.next() {
            let mut value = |flag: &str| {
                tokens
                    .next()
                    .ok_or_else(|| BlitzerError::Pattern(format!("{flag} needs a value")))
            };

            match token {
                "--region" | "-r" => region = Some(value(token)?.to_string()),
                "--pattern" | "-p" => {
                    let parsed = value(token)?
                        .split(',')
                        .map(str::parse)
                        .collect::<Result<Vec<Interval>, _>>()?;
                    intervals = Some(parsed);
                }
                "--status" | "-s" => {
                    let raw = value(token)?;
                    status = raw.parse().map_err(|_| {
                        BlitzerError::Pattern(format!("invalid status code {raw:?}"))
                    })?;
                }
                flag if flag.starts_with('-') => {
                    return Err(BlitzerError::Pattern(format!("unknown option {flag}")));
                }
                target => {
                    if let Some(existing) = &url {
                        return Err(BlitzerError::Pattern(format!(
                            "more than one URL given: {existing} and {target}"
                        )));
                    }
                    url = Some(target.to_string());
                }
            }
        }

        Ok(LoadPattern {
            region: region.ok_or_else(|| BlitzerError::Pattern("missing --region".into()))?,
            intervals: intervals
                .ok_or_else(|| BlitzerError::Pattern("missing --pattern".into()))?,
            status,
            url: url.ok_or_else(|| BlitzerError::Pattern("missing target URL".into()))?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RushRequest {
    pub region: String,
    pub status: u16,
    pub url: String,
    pub pattern: PatternRequest,
}

#[derive(Debug, Clone, Serialize)]
pub struct PatternRequest {
    pub iterations: u32,
    pub intervals: Vec<IntervalRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IntervalRequest {
    pub iterations: u32,
    pub start: u64,
    pub end: u64,
    pub duration: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_renders_cli_grammar() {
        let pattern = LoadPattern::ramp("virginia", 250, 30, 200, "http://demo.herokuapp.com");

        assert_eq!(
            pattern.to_string(),
            "--region virginia --pattern 1-250:30 --status 200 http://demo.herokuapp.com"
        );
        assert_eq!(pattern.peak_users(), 250);
        assert_eq!(pattern.total_duration_secs(), 30);
    }

    #[test]
    fn test_parse_short_flags_and_multiple_ramps() {
        let pattern: LoadPattern = "-r ireland -p 1-100:10,100-100:20 -s 302 http://x.io"
            .parse()
            .unwrap();

        assert_eq!(pattern.region(), "ireland");
        assert_eq!(pattern.status(), 302);
        assert_eq!(pattern.url(), "http://x.io");
        assert_eq!(
            pattern.intervals(),
            &[
                Interval {
                    start: 1,
                    end: 100,
                    duration_secs: 10
                },
                Interval {
                    start: 100,
                    end: 100,
                    duration_secs: 20
                },
            ]
        );
        assert_eq!(pattern.total_duration_secs(), 30);
    }

    #[test]
    fn test_parse_defaults_status_to_200() {
        let pattern: LoadPattern = "--region virginia --pattern 1-5:5 http://x.io"
            .parse()
            .unwrap();
        assert_eq!(pattern.status(), 200);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("--pattern 1-5:5 http://x.io".parse::<LoadPattern>().is_err());
        assert!("--region virginia http://x.io".parse::<LoadPattern>().is_err());
        assert!("--region virginia --pattern 1-5:5".parse::<LoadPattern>().is_err());
        assert!(
            "--region virginia --pattern 1-5 http://x.io"
                .parse::<LoadPattern>()
                .is_err()
        );
        assert!(
            "--region virginia --pattern 1-5:0 http://x.io"
                .parse::<LoadPattern>()
                .is_err()
        );
        assert!(
            "--region virginia --pattern 0-5:5 http://x.io"
                .parse::<LoadPattern>()
                .is_err()
        );
        assert!(
            "--region virginia --pattern 1-5:5 --timeout 9 http://x.io"
                .parse::<LoadPattern>()
                .is_err()
        );
        assert!(
            "--region virginia --pattern 1-5:5 http://a.io http://b.io"
                .parse::<LoadPattern>()
                .is_err()
        );
        assert!("--region".parse::<LoadPattern>().is_err());
    }

    #[test]
    fn test_rendered_pattern_parses_back() {
        let pattern = LoadPattern::ramp("virginia", 64, 30, 200, "http://demo.herokuapp.com");
        let reparsed: LoadPattern = pattern.to_string().parse().unwrap();
        assert_eq!(reparsed, pattern);
    }

    #[test]
    fn test_execute_request_body() {
        let pattern = LoadPattern::ramp("virginia", 250, 30, 200, "http://demo.herokuapp.com");
        let json = serde_json::to_value(pattern.to_request()).unwrap();

        assert_eq!(json["region"], "virginia");
        assert_eq!(json["status"], 200);
        assert_eq!(json["url"], "http://demo.herokuapp.com");
        assert_eq!(json["pattern"]["iterations"], 1);
        assert_eq!(json["pattern"]["intervals"][0]["start"], 1);
        assert_eq!(json["pattern"]["intervals"][0]["end"], 250);
        assert_eq!(json["pattern"]["intervals"][0]["duration"], 30);
    }
}
