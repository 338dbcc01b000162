//! Parsing of second counts given on the command line.

use thiserror::Error;

/// The failure class of a [`ParseError`], without the offending input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    NoConversion,
    Overflow,
    Underflow,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("no conversion of '{0}' into a number could be performed")]
    NoConversion(String),
    /// `saturated` is the largest finite value with the sign of the input.
    #[error("value '{input}' causes overflow")]
    Overflow { input: String, saturated: f64 },
    #[error("value '{0}' causes underflow")]
    Underflow(String),
}

impl ParseError {
    pub fn kind(&self) -> ParseErrorKind {
        match self {
            Self::NoConversion(_) => ParseErrorKind::NoConversion,
            Self::Overflow { .. } => ParseErrorKind::Overflow,
            Self::Underflow(_) => ParseErrorKind::Underflow,
        }
    }
}

/// Parses `text` as a signed number of seconds.
///
/// Surrounding ASCII whitespace is ignored, everything else must form a
/// single decimal literal. `inf`/`infinity`/`nan` are accepted when spelled
/// out; a finite literal whose magnitude does not fit in an `f64` is an
/// overflow, and a literal with a non-zero mantissa that rounds to zero is an
/// underflow. Subnormal results are kept.
pub fn parse(text: &str) -> Result<f64, ParseError> {
    let literal = text.trim_matches(|c: char| c.is_ascii_whitespace());
    let value: f64 = literal
        .parse()
        .map_err(|_| ParseError::NoConversion(text.to_owned()))?;

    if value.is_infinite() && !spells_infinity(literal) {
        return Err(ParseError::Overflow {
            input: text.to_owned(),
            saturated: f64::MAX.copysign(value),
        });
    }

    if value == 0.0 && has_nonzero_mantissa(literal) {
        return Err(ParseError::Underflow(text.to_owned()));
    }

    Ok(value)
}

fn spells_infinity(literal: &str) -> bool {
    let unsigned = literal.trim_start_matches(['+', '-']);
    unsigned.eq_ignore_ascii_case("inf") || unsigned.eq_ignore_ascii_case("infinity")
}

fn has_nonzero_mantissa(literal: &str) -> bool {
    literal
        .split(['e', 'E'])
        .next()
        .is_some_and(|mantissa| mantissa.bytes().any(|b| matches!(b, b'1'..=b'9')))
}
