//! ## Dataset and Query Files
//!
//! Readers, writers, and random generators for the plain-text test data
//! format: one record per line, whitespace-separated integer fields, every
//! record in a file sharing the same dimension. Range-query files prefix each
//! record with an integer radius; k-NN query files prefix each record with an
//! integer `k`.
//!
//! ```text
//! data:   1 2 3
//! range:  10 1 2 3
//! knn:    5 1 2 3
//! ```

use crate::geometry::Point;
use rand::Rng;
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Errors produced while reading or writing dataset files.
#[derive(Debug)]
pub enum DatasetError {
    /// An underlying I/O failure.
    Io(io::Error),
    /// A malformed record; `line` is 1-based.
    InvalidRecord { line: usize, reason: String },
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatasetError::Io(err) => write!(f, "I/O error: {err}"),
            DatasetError::InvalidRecord { line, reason } => {
                write!(f, "Invalid record on line {line}: {reason}")
            }
        }
    }
}

impl Error for DatasetError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DatasetError::Io(err) => Some(err),
            DatasetError::InvalidRecord { .. } => None,
        }
    }
}

impl From<io::Error> for DatasetError {
    fn from(err: io::Error) -> Self {
        DatasetError::Io(err)
    }
}

/// A range query record: all points within `radius` of `point`.
#[derive(Debug, Clone, PartialEq)]
pub struct RangeQuery {
    pub radius: f64,
    pub point: Point<()>,
}

/// A k-NN query record: the `k` points closest to `point`.
#[derive(Debug, Clone, PartialEq)]
pub struct KnnQuery {
    pub k: usize,
    pub point: Point<()>,
}

/// Reads a dataset file into points.
pub fn read_dataset<P: AsRef<Path>>(path: P) -> Result<Vec<Point<()>>, DatasetError> {
    let file = File::open(path)?;
    parse_dataset(BufReader::new(file))
}

/// Reads a range-query file.
pub fn read_range_queries<P: AsRef<Path>>(path: P) -> Result<Vec<RangeQuery>, DatasetError> {
    let file = File::open(path)?;
    parse_range_queries(BufReader::new(file))
}

/// Reads a k-NN query file.
pub fn read_knn_queries<P: AsRef<Path>>(path: P) -> Result<Vec<KnnQuery>, DatasetError> {
    let file = File::open(path)?;
    parse_knn_queries(BufReader::new(file))
}

/// Parses dataset records from a reader. Blank lines are skipped; every
/// record must have the same number of fields.
pub fn parse_dataset<R: BufRead>(reader: R) -> Result<Vec<Point<()>>, DatasetError> {
    let mut points = Vec::new();
    let mut dims: Option<usize> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let fields = parse_fields(&line?, line_no)?;
        if fields.is_empty() {
            continue;
        }
        check_dims(&mut dims, fields.len(), line_no)?;
        points.push(Point::from_ints(&fields, None));
    }
    Ok(points)
}

/// Parses range-query records from a reader.
pub fn parse_range_queries<R: BufRead>(reader: R) -> Result<Vec<RangeQuery>, DatasetError> {
    let mut queries = Vec::new();
    let mut dims: Option<usize> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let fields = parse_fields(&line?, line_no)?;
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 2 {
            return Err(DatasetError::InvalidRecord {
                line: line_no,
                reason: "expected a radius followed by coordinates".to_string(),
            });
        }
        check_dims(&mut dims, fields.len() - 1, line_no)?;
        queries.push(RangeQuery {
            radius: fields[0] as f64,
            point: Point::from_ints(&fields[1..], None),
        });
    }
    Ok(queries)
}

/// Parses k-NN query records from a reader.
pub fn parse_knn_queries<R: BufRead>(reader: R) -> Result<Vec<KnnQuery>, DatasetError> {
    let mut queries = Vec::new();
    let mut dims: Option<usize> = None;
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let fields = parse_fields(&line?, line_no)?;
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 2 {
            return Err(DatasetError::InvalidRecord {
                line: line_no,
                reason: "expected a neighbor count followed by coordinates".to_string(),
            });
        }
        let k = usize::try_from(fields[0]).map_err(|_| DatasetError::InvalidRecord {
            line: line_no,
            reason: format!("neighbor count {} is not a valid k", fields[0]),
        })?;
        check_dims(&mut dims, fields.len() - 1, line_no)?;
        queries.push(KnnQuery {
            k,
            point: Point::from_ints(&fields[1..], None),
        });
    }
    Ok(queries)
}

fn parse_fields(line: &str, line_no: usize) -> Result<Vec<i64>, DatasetError> {
    line.split_whitespace()
        .map(|token| {
            token.parse::<i64>().map_err(|_| DatasetError::InvalidRecord {
                line: line_no,
                reason: format!("invalid integer field '{token}'"),
            })
        })
        .collect()
}

fn check_dims(dims: &mut Option<usize>, actual: usize, line_no: usize) -> Result<(), DatasetError> {
    match *dims {
        Some(expected) if expected != actual => Err(DatasetError::InvalidRecord {
            line: line_no,
            reason: format!("expected {expected} coordinates, got {actual}"),
        }),
        _ => {
            *dims = Some(actual);
            Ok(())
        }
    }
}

/// Generates `count` random points with integer coordinates in
/// `[val_min, val_max]`.
pub fn generate_points<R: Rng>(
    rng: &mut R,
    count: usize,
    dims: usize,
    val_min: i64,
    val_max: i64,
) -> Vec<Point<()>> {
    (0..count)
        .map(|_| {
            let coords: Vec<i64> = (0..dims).map(|_| rng.gen_range(val_min..=val_max)).collect();
            Point::from_ints(&coords, None)
        })
        .collect()
}

/// Generates random range queries. The radius is drawn from
/// `0..=(val_max - val_min) / 10`; querying most of the space at once is not
/// a realistic workload.
pub fn generate_range_queries<R: Rng>(
    rng: &mut R,
    count: usize,
    dims: usize,
    val_min: i64,
    val_max: i64,
) -> Vec<RangeQuery> {
    let radius_max = (val_max - val_min).abs() / 10;
    generate_points(rng, count, dims, val_min, val_max)
        .into_iter()
        .map(|point| RangeQuery {
            radius: rng.gen_range(0..=radius_max) as f64,
            point,
        })
        .collect()
}

/// Generates random k-NN queries with `k` drawn from `[k_min, k_max]`.
pub fn generate_knn_queries<R: Rng>(
    rng: &mut R,
    count: usize,
    dims: usize,
    k_min: usize,
    k_max: usize,
    val_min: i64,
    val_max: i64,
) -> Vec<KnnQuery> {
    generate_points(rng, count, dims, val_min, val_max)
        .into_iter()
        .map(|point| KnnQuery {
            k: rng.gen_range(k_min..=k_max),
            point,
        })
        .collect()
}

/// Writes points as dataset records. Coordinates are written as integers,
/// which is what the file format stores.
pub fn write_dataset<P: AsRef<Path>>(path: P, points: &[Point<()>]) -> Result<(), DatasetError> {
    let mut writer = BufWriter::new(File::create(&path)?);
    for point in points {
        writeln!(writer, "{}", format_coords(point))?;
    }
    writer.flush()?;
    info!(
        "Dataset written: {:?} ({} records)",
        path.as_ref(),
        points.len()
    );
    Ok(())
}

/// Writes range queries in the `radius x1 x2 ...` format.
pub fn write_range_queries<P: AsRef<Path>>(
    path: P,
    queries: &[RangeQuery],
) -> Result<(), DatasetError> {
    let mut writer = BufWriter::new(File::create(&path)?);
    for query in queries {
        writeln!(
            writer,
            "{} {}",
            query.radius as i64,
            format_coords(&query.point)
        )?;
    }
    writer.flush()?;
    info!(
        "Range queries written: {:?} ({} records)",
        path.as_ref(),
        queries.len()
    );
    Ok(())
}

/// Writes k-NN queries in the `k x1 x2 ...` format.
pub fn write_knn_queries<P: AsRef<Path>>(
    path: P,
    queries: &[KnnQuery],
) -> Result<(), DatasetError> {
    let mut writer = BufWriter::new(File::create(&path)?);
    for query in queries {
        writeln!(writer, "{} {}", query.k, format_coords(&query.point))?;
    }
    writer.flush()?;
    info!(
        "kNN queries written: {:?} ({} records)",
        path.as_ref(),
        queries.len()
    );
    Ok(())
}

fn format_coords(point: &Point<()>) -> String {
    point
        .coords
        .iter()
        .map(|c| (c.into_inner() as i64).to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
