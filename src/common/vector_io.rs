// Copyright 2024 The embedding-parity Authors
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Plain-text vector interchange
//!
//! Embeddings are exchanged between runtimes as plain text with one value per line, the
//! format emitted by the reference embedding scripts (`{:.15e}`). Producers that stream a
//! whole vector on a single line may separate values with `|`. Hidden-state matrices use one
//! token row per line, and token id / mask lists are comma-separated integers.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use crate::pipelines::sentence_embeddings::{Embedding, HiddenStateMatrix};
use crate::ParityError;

fn parse_float(value: &str, line: usize) -> Result<f32, ParityError> {
    value.parse::<f32>().map_err(|error| ParityError::ParseError {
        line,
        message: format!("invalid float `{value}`: {error}"),
    })
}

/// Reads an embedding, one value per line or `|`-delimited. Blank lines are skipped.
pub fn read_vector<R: BufRead>(reader: R) -> Result<Embedding, ParityError> {
    let mut values = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        for value in line.split('|').map(str::trim).filter(|v| !v.is_empty()) {
            values.push(parse_float(value, idx + 1)?);
        }
    }
    Ok(values)
}

/// Reads an embedding from a file, see [`read_vector`].
pub fn read_vector_file<P: AsRef<Path>>(path: P) -> Result<Embedding, ParityError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|error| {
        ParityError::IOError(format!("could not open {}: {error}", path.display()))
    })?;
    read_vector(BufReader::new(file))
}

/// Writes an embedding with one value per line in scientific notation.
pub fn write_vector<W: Write>(mut writer: W, vector: &[f32]) -> Result<(), ParityError> {
    for value in vector {
        writeln!(writer, "{value:.15e}")?;
    }
    writer.flush()?;
    Ok(())
}

/// Reads a hidden-state matrix with one token row per line.
///
/// Values within a row may be separated by whitespace, commas or `|`. All rows must have
/// the same width.
pub fn read_hidden_states<R: BufRead>(reader: R) -> Result<HiddenStateMatrix, ParityError> {
    let mut rows: Vec<Vec<f32>> = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let row = line
            .split(|c: char| c.is_whitespace() || c == ',' || c == '|')
            .filter(|v| !v.is_empty())
            .map(|v| parse_float(v, idx + 1))
            .collect::<Result<Vec<f32>, _>>()?;
        if row.is_empty() {
            continue;
        }
        if let Some(first) = rows.first() {
            if first.len() != row.len() {
                return Err(ParityError::ParseError {
                    line: idx + 1,
                    message: format!(
                        "row has {} values, previous rows have {}",
                        row.len(),
                        first.len()
                    ),
                });
            }
        }
        rows.push(row);
    }
    HiddenStateMatrix::from_rows(rows)
}

/// Parses a comma or whitespace separated list of integers, e.g. `101,7592,102,0`.
///
/// Surrounding brackets are tolerated so that Python list reprs can be pasted directly.
pub fn parse_int_list(input: &str) -> Result<Vec<i64>, ParityError> {
    input
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<i64>().map_err(|error| ParityError::ParseError {
                line: 1,
                message: format!("invalid integer `{v}`: {error}"),
            })
        })
        .collect()
}

/// Joins integers with commas and no spaces.
pub fn format_int_list<T: ToString>(values: &[T]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn reads_one_value_per_line() {
        let input = "1.000000000000000e0\n-2.5e-1\n\n3\n";
        let vector = read_vector(input.as_bytes()).unwrap();
        assert_eq!(vector, vec![1.0, -0.25, 3.0]);
    }

    #[test]
    fn reads_pipe_delimited_stream() {
        let input = "0.5|0.25|\n0.125\n";
        let vector = read_vector(input.as_bytes()).unwrap();
        assert_eq!(vector, vec![0.5, 0.25, 0.125]);
    }

    #[test]
    fn reports_line_of_invalid_value() {
        let input = "0.5\nabc\n";
        match read_vector(input.as_bytes()) {
            Err(ParityError::ParseError { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn written_vector_reads_back() {
        let vector = vec![0.70710677f32, -1.5e-7, 0.0];
        let mut buffer = Vec::new();
        write_vector(&mut buffer, &vector).unwrap();
        let text = String::from_utf8(buffer.clone()).unwrap();
        assert_eq!(text.lines().count(), 3);
        assert_eq!(read_vector(buffer.as_slice()).unwrap(), vector);
    }

    #[test]
    fn reads_hidden_state_rows() {
        let input = "1 0\n0, 1\n5|5\n9 9\n";
        let hidden = read_hidden_states(input.as_bytes()).unwrap();
        assert_eq!(hidden.seq_len(), 4);
        assert_eq!(hidden.hidden_size(), 2);
        assert_eq!(hidden.row(2), &[5.0, 5.0]);
    }

    #[test]
    fn rejects_ragged_hidden_states() {
        let input = "1 0\n0 1 2\n";
        assert!(matches!(
            read_hidden_states(input.as_bytes()),
            Err(ParityError::ParseError { line: 2, .. })
        ));
    }

    #[test]
    fn int_lists() {
        assert_eq!(parse_int_list("101,7592,102,0").unwrap(), vec![101, 7592, 102, 0]);
        assert_eq!(parse_int_list("[1, 1, 0]").unwrap(), vec![1, 1, 0]);
        assert!(parse_int_list("1,x").is_err());
        assert_eq!(format_int_list(&[101i64, 102, 0]), "101,102,0");
    }
}
