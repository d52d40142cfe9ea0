use crate::core::io::traits::SchemeFile;
use crate::core::models::scheme::{Direction, Scheme};
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::debug;

const WRITE_PRECISION: usize = 10;

/// How the coordinates of a bvec file are arranged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BvecLayout {
    /// One direction per line: `x y z`.
    #[default]
    Rows,
    /// FSL layout: three lines holding the x, y and z coordinates of every direction.
    FslGrad,
}

impl BvecLayout {
    pub fn from_fslgrad_flag(fslgrad: bool) -> Self {
        if fslgrad { Self::FslGrad } else { Self::Rows }
    }
}

#[derive(Debug, Error)]
pub enum BvecError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Parse error on line {line}: {kind}")]
    Parse {
        line: usize,
        kind: BvecParseErrorKind,
    },
    #[error("Inconsistent data: {0}")]
    Inconsistency(String),
    #[error("No directions found in input")]
    Empty,
}

#[derive(Debug, Error)]
pub enum BvecParseErrorKind {
    #[error("Invalid float in column {column} (value: '{value}')")]
    InvalidFloat { column: usize, value: String },
    #[error("Expected {expected} values but found {found}")]
    WrongValueCount { expected: usize, found: usize },
}

/// A bvec file reader/writer for one layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BvecFile {
    layout: BvecLayout,
}

impl BvecFile {
    pub fn new(layout: BvecLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> BvecLayout {
        self.layout
    }
}

struct NumericLine {
    line: usize,
    values: Vec<f64>,
}

fn read_numeric_lines(reader: &mut impl BufRead) -> Result<Vec<NumericLine>, BvecError> {
    let mut lines = Vec::new();
    for (line_num, line_res) in reader.lines().enumerate() {
        let line = line_res?;
        let line_num = line_num + 1;

        let content = line.trim();
        if content.is_empty() || content.starts_with('#') {
            continue;
        }

        let values = content
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|field| !field.is_empty())
            .enumerate()
            .map(|(column, field)| {
                field.parse::<f64>().map_err(|_| BvecError::Parse {
                    line: line_num,
                    kind: BvecParseErrorKind::InvalidFloat {
                        column: column + 1,
                        value: field.to_string(),
                    },
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        lines.push(NumericLine {
            line: line_num,
            values,
        });
    }
    Ok(lines)
}

fn directions_from_rows(lines: Vec<NumericLine>) -> Result<Vec<Direction>, BvecError> {
    lines
        .into_iter()
        .map(|NumericLine { line, values }| match values.as_slice() {
            &[x, y, z] => Ok(Direction::new(x, y, z)),
            _ => Err(BvecError::Parse {
                line,
                kind: BvecParseErrorKind::WrongValueCount {
                    expected: 3,
                    found: values.len(),
                },
            }),
        })
        .collect()
}

fn directions_from_fslgrad(lines: Vec<NumericLine>) -> Result<Vec<Direction>, BvecError> {
    let [xs, ys, zs]: [NumericLine; 3] = lines.try_into().map_err(|lines: Vec<NumericLine>| {
        BvecError::Inconsistency(format!(
            "fslgrad layout expects 3 coordinate rows, found {}",
            lines.len()
        ))
    })?;

    let count = xs.values.len();
    for row in [&ys, &zs] {
        if row.values.len() != count {
            return Err(BvecError::Parse {
                line: row.line,
                kind: BvecParseErrorKind::WrongValueCount {
                    expected: count,
                    found: row.values.len(),
                },
            });
        }
    }

    Ok((0..count)
        .map(|k| Direction::new(xs.values[k], ys.values[k], zs.values[k]))
        .collect())
}

/// Three lines of equal length other than three can only be a direction-per-column
/// table. A 3x3 table stays ambiguous and is read as rows.
fn is_column_table(lines: &[NumericLine]) -> bool {
    match lines {
        [xs, ys, zs] => {
            let count = xs.values.len();
            count != 3 && ys.values.len() == count && zs.values.len() == count
        }
        _ => false,
    }
}

fn write_values(writer: &mut impl Write, values: impl Iterator<Item = f64>) -> io::Result<()> {
    let line = values
        .map(|v| format!("{:.*}", WRITE_PRECISION, v))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", line)
}

impl SchemeFile for BvecFile {
    type Error = BvecError;

    fn read_from(&self, reader: &mut impl BufRead) -> Result<Scheme, Self::Error> {
        let lines = read_numeric_lines(reader)?;
        if lines.is_empty() {
            return Err(BvecError::Empty);
        }

        let directions = match self.layout {
            BvecLayout::Rows if is_column_table(&lines) => {
                debug!("Row layout requested but the file holds one direction per column.");
                directions_from_fslgrad(lines)?
            }
            BvecLayout::Rows => directions_from_rows(lines)?,
            BvecLayout::FslGrad => directions_from_fslgrad(lines)?,
        };
        if directions.is_empty() {
            return Err(BvecError::Empty);
        }
        Ok(Scheme::new(directions))
    }

    fn write_to(&self, scheme: &Scheme, writer: &mut impl Write) -> Result<(), Self::Error> {
        match self.layout {
            BvecLayout::Rows => {
                for d in scheme.iter() {
                    write_values(writer, d.iter().copied())?;
                }
            }
            BvecLayout::FslGrad => {
                for axis in 0..3 {
                    write_values(writer, scheme.iter().map(|d| d[axis]))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const TOLERANCE: f64 = 1e-9;

    fn read(layout: BvecLayout, content: &str) -> Result<Scheme, BvecError> {
        BvecFile::new(layout).read_from(&mut Cursor::new(content))
    }

    fn sample_scheme() -> Scheme {
        Scheme::from_rows(&[
            [0.267_261_241_9, 0.534_522_483_8, 0.801_783_725_7],
            [-0.707_106_781_2, 0.0, 0.707_106_781_2],
            [0.0, -1.0, 0.0],
        ])
    }

    fn assert_schemes_close(a: &Scheme, b: &Scheme) {
        assert_eq!(a.len(), b.len());
        for (p, q) in a.iter().zip(b.iter()) {
            assert!((p - q).norm() < TOLERANCE, "{p:?} != {q:?}");
        }
    }

    #[test]
    fn reads_row_layout_with_comments_blank_lines_and_commas() {
        let content = "# gradient table\n1 0 0\n\n0.0, 1.0, 0.0\n  0 0 1  \n";
        let scheme = read(BvecLayout::Rows, content).unwrap();
        assert_eq!(scheme.len(), 3);
        assert_eq!(scheme.directions()[1], Direction::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn reads_fslgrad_layout_column_by_column() {
        let content = "1 0 0 0.6\n0 1 0 0.8\n0 0 1 0\n";
        let scheme = read(BvecLayout::FslGrad, content).unwrap();
        assert_eq!(scheme.len(), 4);
        assert_eq!(scheme.directions()[3], Direction::new(0.6, 0.8, 0.0));
    }

    #[test]
    fn row_layout_rejects_lines_without_three_values() {
        let result = read(BvecLayout::Rows, "1 0 0\n0 1\n");
        match result {
            Err(BvecError::Parse {
                line: 2,
                kind: BvecParseErrorKind::WrongValueCount { expected: 3, found: 2 },
            }) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn row_layout_accepts_a_direction_per_column_table() {
        let content = "1 0 0 0.6\n0 1 0 0.8\n0 0 1 0\n";
        let as_rows = read(BvecLayout::Rows, content).unwrap();
        let as_columns = read(BvecLayout::FslGrad, content).unwrap();

        assert_eq!(as_rows.len(), 4);
        assert_schemes_close(&as_rows, &as_columns);
    }

    #[test]
    fn row_layout_still_rejects_ragged_three_line_files() {
        assert!(matches!(
            read(BvecLayout::Rows, "1 0 0 0.6\n0 1 0\n0 0 1 0\n"),
            Err(BvecError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn invalid_float_reports_line_and_column() {
        let result = read(BvecLayout::Rows, "1 0 0\n0 abc 0\n");
        match result {
            Err(BvecError::Parse {
                line: 2,
                kind: BvecParseErrorKind::InvalidFloat { column: 2, value },
            }) => assert_eq!(value, "abc"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn fslgrad_layout_requires_three_rows_of_equal_length() {
        assert!(matches!(
            read(BvecLayout::FslGrad, "1 0\n0 1\n"),
            Err(BvecError::Inconsistency(_))
        ));
        assert!(matches!(
            read(BvecLayout::FslGrad, "1 0\n0 1\n0\n"),
            Err(BvecError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            read(BvecLayout::Rows, "# nothing here\n\n"),
            Err(BvecError::Empty)
        ));
    }

    #[test]
    fn row_layout_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bvec.txt");
        let file = BvecFile::new(BvecLayout::Rows);

        file.write_to_path(&sample_scheme(), &path).unwrap();
        let read_back = file.read_from_path(&path).unwrap();

        assert_schemes_close(&sample_scheme(), &read_back);
    }

    #[test]
    fn fslgrad_layout_round_trips_through_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bvecs");
        let file = BvecFile::new(BvecLayout::FslGrad);

        file.write_to_path(&sample_scheme(), &path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 3);

        let read_back = file.read_from_path(&path).unwrap();
        assert_schemes_close(&sample_scheme(), &read_back);
    }

    #[test]
    fn layouts_are_not_interchangeable() {
        let mut buffer = Vec::new();
        BvecFile::new(BvecLayout::FslGrad)
            .write_to(&sample_scheme(), &mut buffer)
            .unwrap();
        let content = String::from_utf8(buffer).unwrap();

        // Three rows of three values also parse as rows, but transposed.
        let as_rows = read(BvecLayout::Rows, &content).unwrap();
        assert!((as_rows.directions()[0] - sample_scheme().directions()[0]).norm() > 0.1);
    }

    #[test]
    fn layout_follows_fslgrad_flag() {
        assert_eq!(BvecLayout::from_fslgrad_flag(true), BvecLayout::FslGrad);
        assert_eq!(BvecLayout::from_fslgrad_flag(false), BvecLayout::Rows);
    }
}
