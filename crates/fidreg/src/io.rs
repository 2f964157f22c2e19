//! Point-set file formats.
//!
//! - `.fcsv`: markups fiducial CSV as written by sphere detectors and
//!   landmark editors. Lines starting with `#` are comments; each data row is
//!   `id,x,y,z,...` and only the coordinates are read.
//! - `.json`: `{ "points": [[x, y, z], ...] }`.

use std::fmt::Write as _;
use std::path::Path;

use crate::point::{Point3, PointSet};

const FCSV_HEADER: &str = "# Markups fiducial file version = 4.4\n\
# CoordinateSystem = 0\n\
# columns = id,x,y,z,ow,ox,oy,oz,vis,sel,lock,label,desc,associatedNodeID\n";

#[derive(Debug)]
pub enum PointSetIoError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Parse { line: usize, message: String },
    UnsupportedFormat(String),
}

impl std::fmt::Display for PointSetIoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Json(e) => write!(f, "json error: {}", e),
            Self::Parse { line, message } => write!(f, "line {}: {}", line, message),
            Self::UnsupportedFormat(ext) => {
                write!(f, "unsupported point-set format '{}' (expected .fcsv or .json)", ext)
            }
        }
    }
}

impl std::error::Error for PointSetIoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PointSetIoError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PointSetIoError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Fcsv,
    Json,
}

fn format_of(path: &Path) -> Result<Format, PointSetIoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "fcsv" | "csv" => Ok(Format::Fcsv),
        "json" => Ok(Format::Json),
        _ => Err(PointSetIoError::UnsupportedFormat(ext)),
    }
}

/// Parse markups CSV text.
pub fn parse_fcsv(text: &str) -> Result<PointSet, PointSetIoError> {
    let mut points = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 4 {
            return Err(PointSetIoError::Parse {
                line: idx + 1,
                message: format!("expected at least 4 columns, found {}", fields.len()),
            });
        }
        let mut p: Point3 = [0.0; 3];
        for (k, field) in fields[1..4].iter().enumerate() {
            p[k] = field.trim().parse::<f64>().map_err(|e| PointSetIoError::Parse {
                line: idx + 1,
                message: format!("bad coordinate '{}': {}", field.trim(), e),
            })?;
        }
        points.push(p);
    }
    Ok(PointSet::new(points))
}

/// Render markups CSV text; labels are `{label_prefix}-{n}` starting at 1.
pub fn format_fcsv(points: &PointSet, label_prefix: &str) -> String {
    let mut out = String::from(FCSV_HEADER);
    for (i, p) in points.iter().enumerate() {
        let _ = writeln!(
            out,
            "vtkMRMLMarkupsFiducialNode_{i},{},{},{},0,0,0,1,1,1,0,{label_prefix}-{},,",
            p[0],
            p[1],
            p[2],
            i + 1
        );
    }
    out
}

/// Load a point set, choosing the format from the file extension.
pub fn load_point_set(path: &Path) -> Result<PointSet, PointSetIoError> {
    let format = format_of(path)?;
    let text = std::fs::read_to_string(path)?;
    match format {
        Format::Fcsv => parse_fcsv(&text),
        Format::Json => Ok(serde_json::from_str(&text)?),
    }
}

/// Save a point set, choosing the format from the file extension.
pub fn save_point_set(path: &Path, points: &PointSet) -> Result<(), PointSetIoError> {
    let text = match format_of(path)? {
        Format::Fcsv => format_fcsv(points, "F"),
        Format::Json => serde_json::to_string_pretty(points)?,
    };
    std::fs::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "# Markups fiducial file version = 4.4\n\
# CoordinateSystem = 0\n\
# columns = id,x,y,z,ow,ox,oy,oz,vis,sel,lock,label,desc,associatedNodeID\n\
vtkMRMLMarkupsFiducialNode_0,-12.5,30.25,4,0,0,0,1,1,1,0,F-1,,\n\
\n\
vtkMRMLMarkupsFiducialNode_1,1e1, -2 ,0.5,0,0,0,1,1,1,0,F-2,,\n";

    #[test]
    fn parses_markups_rows_and_skips_comments() {
        let set = parse_fcsv(SAMPLE).unwrap();
        assert_eq!(set.points, vec![[-12.5, 30.25, 4.0], [10.0, -2.0, 0.5]]);
    }

    #[test]
    fn reports_line_of_bad_coordinate() {
        let err = parse_fcsv("# c\nid,1,two,3\n").unwrap_err();
        match err {
            PointSetIoError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn short_rows_are_rejected() {
        assert!(matches!(
            parse_fcsv("id,1,2\n"),
            Err(PointSetIoError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn formatted_markups_parse_back() {
        let set = PointSet::new(vec![[1.5, -2.0, 3.25], [0.0, 0.0, 100.0]]);
        let text = format_fcsv(&set, "D");
        assert!(text.contains(",D-2,"));
        assert_eq!(parse_fcsv(&text).unwrap(), set);
    }

    #[test]
    fn unknown_extension_is_rejected() {
        assert!(matches!(
            format_of(Path::new("points.txt")),
            Err(PointSetIoError::UnsupportedFormat(_))
        ));
        assert_eq!(format_of(Path::new("a/B.FCSV")).unwrap(), Format::Fcsv);
    }
}
