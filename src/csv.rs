use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{Caller, Command};

/// Errors that can occur when reading command csv rows
#[derive(Debug, Error)]
pub enum CsvError {
    #[error("cannot open {path}: {source}")]
    Open { path: PathBuf, source: csv::Error },

    #[error("line {line}: failed to parse row: {source}")]
    Parse { line: usize, source: csv::Error },

    #[error("line {line}: unrecognized command type '{kind}'")]
    UnrecognizedType { line: usize, kind: String },

    #[error("line {line}: {kind} missing target")]
    MissingTarget { line: usize, kind: String },

    #[error("line {line}: {kind} missing amount")]
    MissingAmount { line: usize, kind: String },
}

#[derive(Debug, Deserialize)]
struct InputRow {
    r#type: String,
    user: String,
    target: Option<String>,
    amount: Option<i64>,
}

impl InputRow {
    fn into_command(self, line: usize) -> Result<Command, CsvError> {
        match self.r#type.as_str() {
            "register" => Ok(Command::Register {
                username: self.user,
            }),
            "send" => {
                let recipient = self.target.ok_or_else(|| CsvError::MissingTarget {
                    line,
                    kind: "send".to_string(),
                })?;
                let amount = self.amount.ok_or_else(|| CsvError::MissingAmount {
                    line,
                    kind: "send".to_string(),
                })?;
                Ok(Command::SendCoin {
                    caller: Caller::new(self.user),
                    recipient,
                    amount,
                })
            }
            "buy" => {
                let item = self.target.ok_or_else(|| CsvError::MissingTarget {
                    line,
                    kind: "buy".to_string(),
                })?;
                Ok(Command::Buy {
                    caller: Caller::new(self.user),
                    item,
                })
            }
            other => Err(CsvError::UnrecognizedType {
                line,
                kind: other.to_string(),
            }),
        }
    }
}

/// Read commands from a csv file with a `type,user,target,amount` header.
///
/// Rows are parsed lazily; a bad row yields an error without ending the
/// iteration.
pub fn read_commands(
    path: impl AsRef<Path>,
) -> Result<impl Iterator<Item = Result<Command, CsvError>>, CsvError> {
    let path = path.as_ref();
    let reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| CsvError::Open {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(reader
        .into_deserialize::<InputRow>()
        .enumerate()
        .map(|(idx, result)| {
            let line = idx + 2; // 1-indexed, skip header
            let row = result.map_err(|source| CsvError::Parse { line, source })?;
            row.into_command(line)
        }))
}
