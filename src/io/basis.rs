//! # Basis files
//!
//! A plain text snapshot of a simplex basis, enough to warm start a later solve from the same
//! vertex. One record per variable:
//!
//! ```text
//! <kind> <index> <status> [value]
//! ```
//!
//! with kind `c` for a column or `r` for a row, status one of `b` (basic), `l` (at lower
//! bound), `u` (at upper bound), `x` (fixed) or `f` (free), and the value present for basic
//! records. Blank lines and lines starting with `#` are skipped. Records may appear in any
//! order; missing records default to at-lower.
use std::io::{self, BufRead, BufReader, Read, Write};

use thiserror::Error;

use crate::data::linear_program::elements::BasisStatus;
use crate::data::linear_program::solution::Solution;

/// Why a basis file could not be read.
#[derive(Debug, Error)]
pub enum BasisFileError {
    /// The underlying reader failed.
    #[error("i/o failure: {0}")]
    Io(#[from] io::Error),
    /// A line did not match `<kind> <index> <status> [value]`.
    #[error("line {line}: expected `<kind> <index> <status> [value]`, found {found:?}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// The offending line.
        found: String,
    },
    /// The status token was not one of `b`, `l`, `u`, `x`, `f`.
    #[error("line {line}: unknown status token {token:?}")]
    UnknownStatus {
        /// One-based line number.
        line: usize,
        /// The offending token.
        token: String,
    },
}

/// A saved basis: per-variable statuses with values for the basic ones.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct BasisState {
    /// Status and optional value per structural variable.
    pub columns: Vec<(BasisStatus, Option<f64>)>,
    /// Status and optional value per row (the row's logical variable).
    pub rows: Vec<(BasisStatus, Option<f64>)>,
}

impl BasisState {
    /// Capture the basis of a solved problem.
    #[must_use]
    pub fn from_solution(solution: &Solution) -> Self {
        let columns = solution
            .column_status
            .iter()
            .zip(&solution.primal_columns)
            .map(|(&status, &value)| (status, status.is_basic().then_some(value)))
            .collect();
        let rows = solution
            .row_status
            .iter()
            .zip(&solution.primal_rows)
            .map(|(&status, &value)| (status, status.is_basic().then_some(value)))
            .collect();
        Self { columns, rows }
    }

    /// Statuses in internal variable order, structurals followed by logicals.
    #[must_use]
    pub fn statuses(&self) -> Vec<BasisStatus> {
        self.columns
            .iter()
            .chain(&self.rows)
            .map(|&(status, _)| status)
            .collect()
    }

    /// Parse a basis file.
    pub fn read(reader: impl Read) -> Result<Self, BasisFileError> {
        let mut state = Self::default();
        for (number, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let line_nr = number + 1;
            let malformed = || BasisFileError::Malformed {
                line: line_nr,
                found: trimmed.to_string(),
            };

            let mut fields = trimmed.split_whitespace();
            let kind = fields.next().ok_or_else(malformed)?;
            let index: usize = fields
                .next()
                .and_then(|token| token.parse().ok())
                .ok_or_else(malformed)?;
            let token = fields.next().ok_or_else(malformed)?;
            let status = parse_status(token).ok_or_else(|| BasisFileError::UnknownStatus {
                line: line_nr,
                token: token.to_string(),
            })?;
            let value = match fields.next() {
                Some(token) => Some(token.parse().map_err(|_| malformed())?),
                None => None,
            };
            if fields.next().is_some() {
                return Err(malformed());
            }

            let records = match kind {
                "c" => &mut state.columns,
                "r" => &mut state.rows,
                _ => return Err(malformed()),
            };
            if records.len() <= index {
                records.resize(index + 1, (BasisStatus::AtLower, None));
            }
            records[index] = (status, value);
        }
        Ok(state)
    }

    /// Write the basis in the format `read` accepts.
    pub fn write(&self, mut writer: impl Write) -> io::Result<()> {
        for (kind, records) in [("c", &self.columns), ("r", &self.rows)] {
            for (index, &(status, value)) in records.iter().enumerate() {
                match value {
                    Some(value) => {
                        writeln!(writer, "{kind} {index} {} {value}", status_token(status))?;
                    },
                    None => writeln!(writer, "{kind} {index} {}", status_token(status))?,
                }
            }
        }
        Ok(())
    }
}

fn status_token(status: BasisStatus) -> &'static str {
    match status {
        BasisStatus::Basic => "b",
        BasisStatus::AtLower => "l",
        BasisStatus::AtUpper => "u",
        BasisStatus::Fixed => "x",
        BasisStatus::Free => "f",
    }
}

fn parse_status(token: &str) -> Option<BasisStatus> {
    Some(match token {
        "b" => BasisStatus::Basic,
        "l" => BasisStatus::AtLower,
        "u" => BasisStatus::AtUpper,
        "x" => BasisStatus::Fixed,
        "f" => BasisStatus::Free,
        _ => return None,
    })
}

#[cfg(test)]
mod test {
    use super::*;

    fn example() -> BasisState {
        BasisState {
            columns: vec![
                (BasisStatus::Basic, Some(2.5)),
                (BasisStatus::AtLower, None),
                (BasisStatus::Fixed, None),
            ],
            rows: vec![(BasisStatus::AtUpper, None), (BasisStatus::Basic, Some(-1.0))],
        }
    }

    #[test]
    fn round_trip() {
        let mut buffer = Vec::new();
        example().write(&mut buffer).unwrap();
        let read = BasisState::read(buffer.as_slice()).unwrap();
        assert_eq!(read, example());
    }

    #[test]
    fn comments_blanks_and_out_of_order_records() {
        let text = "# saved basis\n\nr 1 b -1\nc 2 x\nc 0 b 2.5\nr 0 u\nc 1 l\n";
        let read = BasisState::read(text.as_bytes()).unwrap();
        assert_eq!(read, example());
    }

    #[test]
    fn malformed_line_is_reported_with_its_number() {
        let text = "c 0 b 1.0\nc one l\n";
        match BasisState::read(text.as_bytes()) {
            Err(BasisFileError::Malformed { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected a malformed error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_status_is_rejected() {
        match BasisState::read("c 0 q".as_bytes()) {
            Err(BasisFileError::UnknownStatus { line, token }) => {
                assert_eq!(line, 1);
                assert_eq!(token, "q");
            },
            other => panic!("expected an unknown status error, got {other:?}"),
        }
    }
}
