//! Strict extraction of `ID: <identifier> | Prob: <probability>` lines.
//!
//! A response is accepted only when it yields exactly one well-formed line per
//! record of the batch, in batch order. Anything else rejects the whole batch.

use crate::batcher::Batch;
use crate::errors::ParseError;
use crate::types::ScoredResult;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

/// One result line. Probabilities are `0`, `0.<digits>`, `1` or `1.<zeros>`,
/// so values above one (`1.5`) never match.
///
/// The pattern is anchored to whole lines: only surrounding spaces, tabs and
/// a trailing `\r` are tolerated. Wrapped lines such as `- ID: 1 | Prob: 0.9`,
/// `**ID: 1 | Prob: 0.9**` or `ID: 1 | Prob: 0.9.` do not count.
static RESULT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^[ \t]*ID:[ \t]*([^\s|]+)[ \t]*\|[ \t]*Prob:[ \t]*(0(?:\.[0-9]+)?|1(?:\.0+)?)[ \t]*\r?$",
    )
    .expect("result line pattern is valid")
});

/// Every well-formed `(identifier, probability text)` pair in order of appearance.
pub fn extract_matches(raw: &str) -> Vec<(&str, &str)> {
    RESULT_LINE
        .captures_iter(raw)
        .filter_map(|caps| {
            let identifier = caps.get(1)?.as_str();
            let probability = caps.get(2)?.as_str();
            Some((identifier, probability))
        })
        .collect()
}

/// Validate `raw` against `batch` and assign results positionally.
///
/// Rejects on a count mismatch and on any line whose identifier differs from
/// the batch identifier at the same position. The raw text is logged on
/// rejection.
pub fn parse_response(raw: &str, batch: &Batch<'_>) -> Result<Vec<ScoredResult>, ParseError> {
    let matches = extract_matches(raw);

    if matches.len() != batch.len() {
        warn!("Model output was:\n{}", raw);
        return Err(ParseError::CountMismatch {
            expected: batch.len(),
            actual: matches.len(),
        });
    }

    let mut results = Vec::with_capacity(matches.len());
    for (position, ((identifier, probability), record)) in
        matches.into_iter().zip(batch.iter()).enumerate()
    {
        if identifier != record.identifier {
            warn!("Model output was:\n{}", raw);
            return Err(ParseError::IdentifierMismatch {
                position: position + 1,
                expected: record.identifier.clone(),
                actual: identifier.to_string(),
            });
        }

        let probability = parse_probability(probability)?;
        results.push(ScoredResult {
            identifier: record.identifier.clone(),
            probability,
        });
    }

    Ok(results)
}

fn parse_probability(text: &str) -> Result<f64, ParseError> {
    match text.parse::<f64>() {
        Ok(value) if (0.0..=1.0).contains(&value) => Ok(value),
        _ => Err(ParseError::InvalidProbability(text.to_string())),
    }
}
