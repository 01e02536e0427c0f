//! Parsing of `key=value` statistics lines.

use crate::core::RawSample;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static FIELD_RE: Lazy<Regex> = Lazy::new(|| {
    // ASCII digits only; the tool never prints anything else.
    Regex::new(r"([a-z_]+)=([0-9]+)").expect("field pattern is valid")
});

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("field '{key}' has a value that is not a u64 ({value}) in line {line:?}")]
    InvalidValue {
        key: String,
        value: String,
        line: String,
    },
}

/// Extracts every `key=value` pair from `line`, scanning left to right.
///
/// Lines without any pair yield an empty sample. A key seen twice keeps its
/// last value.
pub fn parse_line(line: &str) -> Result<RawSample, ParseError> {
    let mut sample = RawSample::new();
    for caps in FIELD_RE.captures_iter(line) {
        let (_, [key, value]) = caps.extract();
        let parsed = value.parse::<u64>().map_err(|_| ParseError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            line: line.to_string(),
        })?;
        sample.insert(key.to_string(), parsed);
    }
    Ok(sample)
}

/// Parses every line, stopping at the first malformed one.
pub fn parse_lines<I, S>(lines: I) -> Result<Vec<RawSample>, ParseError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines
        .into_iter()
        .map(|line| parse_line(line.as_ref()))
        .collect()
}
