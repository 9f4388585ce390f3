//! Bead list ingest.
//!
//! A bead list is a CSV with `z`, `y`, `x` columns holding voxel indices (any
//! other columns are ignored, so an exported bead CSV can be fed back in).
//!
//! - header names are matched case-insensitively, a UTF-8 BOM is stripped
//! - a row that does not parse aborts the load with its line number
//! - discarded rows of an exported bead CSV are skipped

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use csv::StringRecord;
use log::debug;

use crate::domain::Bead;
use crate::error::AppError;

pub fn read_beads_csv(path: &Path) -> Result<Vec<Bead>, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open bead CSV '{}': {e}", path.display())))?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);
    for column in ["z", "y", "x"] {
        if !header_map.contains_key(column) {
            return Err(AppError::new(2, format!("Missing required column: `{column}`")));
        }
    }

    let mut beads = Vec::new();
    let mut skipped = 0usize;
    for (idx, result) in reader.records().enumerate() {
        // +2: records() starts after the header, lines are 1-based.
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;

        if let Some(status) = get_optional(&record, &header_map, "status") {
            if status != "accepted" {
                skipped += 1;
                continue;
            }
        }
        let bead = parse_bead(&record, &header_map).map_err(|e| AppError::new(2, format!("Line {line}: {e}")))?;
        beads.push(bead);
    }

    debug!("read {} beads from {} ({skipped} skipped)", beads.len(), path.display());
    Ok(beads)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    header_map
        .get(name)
        .and_then(|&idx| record.get(idx))
        .filter(|s| !s.is_empty())
}

fn parse_bead(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<Bead, String> {
    let coord = |name: &str| -> Result<usize, String> {
        let raw = get_optional(record, header_map, name).ok_or_else(|| format!("missing `{name}` value"))?;
        raw.parse::<usize>()
            .map_err(|_| format!("invalid `{name}` value '{raw}' (expected a voxel index)"))
    };
    Ok(Bead::new(coord("z")?, coord("y")?, coord("x")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_csv(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("psf-beads-{}-{name}.csv", std::process::id()));
        let mut file = File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn reads_beads_with_bom_and_extra_columns() {
        let path = temp_csv("bom", "\u{feff}Z,Y,X,note\n16,32,32,first\n 10 , 20 , 30 ,\n");
        let beads = read_beads_csv(&path).unwrap();
        assert_eq!(beads, vec![Bead::new(16, 32, 32), Bead::new(10, 20, 30)]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn skips_discarded_rows_of_an_export() {
        let path = temp_csv(
            "status",
            "z,y,x,status,reason\n16,32,32,accepted,\n2,10,10,discarded,z_border\n",
        );
        assert_eq!(read_beads_csv(&path).unwrap(), vec![Bead::new(16, 32, 32)]);
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn reports_bad_rows_and_missing_columns() {
        let path = temp_csv("bad", "z,y,x\n1,2,3\n4,-5,6\n");
        let err = read_beads_csv(&path).unwrap_err();
        assert!(err.to_string().contains("Line 3"), "{err}");
        assert_eq!(err.exit_code(), 2);
        let _ = std::fs::remove_file(path);

        let path = temp_csv("cols", "z,y\n1,2\n");
        let err = read_beads_csv(&path).unwrap_err();
        assert!(err.to_string().contains("`x`"), "{err}");
        let _ = std::fs::remove_file(path);
    }
}
