use sha2::{Digest, Sha256};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::{write::SimpleFileOptions, ZipArchive, ZipWriter};

use crate::error::{Result, WorkflowError};
use crate::model::DecimalVector;

/// CAD bytes ready for upload.
#[derive(Debug, Clone)]
pub struct CadPayload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub sha256: String,
    /// True when a directory was zipped into the payload.
    pub packaged: bool,
}

/// Read a CAD file, or zip a CAD directory, into an upload payload.
pub async fn load_cad(path: &Path) -> Result<CadPayload> {
    let metadata = tokio::fs::metadata(path).await?;
    let base_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "geometry".to_string());

    let (bytes, file_name, packaged) = if metadata.is_dir() {
        let dir = path.to_path_buf();
        let bytes = tokio::task::spawn_blocking(move || zip_directory(&dir))
            .await
            .map_err(|e| WorkflowError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        (bytes, format!("{}.zip", base_name), true)
    } else {
        (tokio::fs::read(path).await?, base_name, false)
    };

    Ok(CadPayload {
        sha256: sha256_hex(&bytes),
        bytes,
        file_name,
        packaged,
    })
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn collect_files(root: &Path, dir: &Path, out: &mut Vec<(String, PathBuf)>) -> Result<()> {
    let mut entries = std::fs::read_dir(dir)?
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .map_err(|e| WorkflowError::Parse(e.to_string()))?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            out.push((relative, path));
        }
    }
    Ok(())
}

/// Zip every file below `dir` into an in-memory archive, paths relative to `dir`.
pub fn zip_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut files = Vec::new();
    collect_files(dir, dir, &mut files)?;

    let mut archive_data = Vec::new();
    {
        let mut zip = ZipWriter::new(Cursor::new(&mut archive_data));
        let options = SimpleFileOptions::default();
        for (name, path) in files {
            zip.start_file(name, options)?;
            zip.write_all(&std::fs::read(&path)?)?;
        }
        zip.finish()?;
    }
    Ok(archive_data)
}

/// Names of the entries in a zip archive, in archive order.
pub fn list_zip_entries(bytes: &[u8]) -> Result<Vec<String>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index(i)?.name().to_string());
    }
    Ok(names)
}

/// Contents of a single zip entry.
pub fn read_zip_entry(bytes: &[u8], name: &str) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut file = archive.by_name(name)?;
    let mut content = Vec::new();
    file.read_to_end(&mut content)?;
    Ok(content)
}

/// A row of a labeled point table.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPoint {
    pub label: String,
    pub position: DecimalVector,
}

/// Parse a whitespace-delimited table with a `Label X Y Z` header.
///
/// Columns are located by header name, so extra columns are ignored.
pub fn parse_point_table(text: &str) -> Result<Vec<LabeledPoint>> {
    let mut lines = text
        .lines()
        .map(str::trim)
        .enumerate()
        .filter(|(_, line)| !line.is_empty());

    let (_, header) = lines
        .next()
        .ok_or_else(|| WorkflowError::Parse("point table is empty".to_string()))?;
    let columns: Vec<&str> = header.split_whitespace().collect();
    let column = |name: &str| {
        columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
            .ok_or_else(|| WorkflowError::Parse(format!("point table has no '{}' column", name)))
    };
    let (label_col, x_col, y_col, z_col) = (column("Label")?, column("X")?, column("Y")?, column("Z")?);

    let mut points = Vec::new();
    for (line_no, line) in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let field = |col: usize| {
            fields.get(col).copied().ok_or_else(|| {
                WorkflowError::Parse(format!("line {}: expected {} columns", line_no + 1, columns.len()))
            })
        };
        let coordinate = |col: usize| -> Result<f64> {
            let raw = field(col)?;
            raw.parse::<f64>().map_err(|_| {
                WorkflowError::Parse(format!("line {}: '{}' is not a number", line_no + 1, raw))
            })
        };
        points.push(LabeledPoint {
            label: field(label_col)?.to_string(),
            position: DecimalVector::new(coordinate(x_col)?, coordinate(y_col)?, coordinate(z_col)?),
        });
    }
    Ok(points)
}

pub async fn read_point_table(path: &Path) -> Result<Vec<LabeledPoint>> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_point_table(&text)
}

/// Write bytes, creating missing parent directories.
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await?;
    Ok(())
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render a header row and data rows as CSV text.
pub fn to_csv<S: AsRef<str>>(headers: &[S], rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    let line = |fields: Vec<&str>| fields.into_iter().map(csv_field).collect::<Vec<_>>().join(",");
    out.push_str(&line(headers.iter().map(|h| h.as_ref()).collect()));
    out.push_str("\r\n");
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push_str("\r\n");
    }
    out
}

pub async fn write_csv<S: AsRef<str>>(path: &Path, headers: &[S], rows: &[Vec<String>]) -> Result<()> {
    write_bytes(path, to_csv(headers, rows).as_bytes()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_table_by_header() {
        let text = "Label X Y Z\nP1 0.1 0.2 0.3\n\n  P2 1 2 3  \n";
        let points = parse_point_table(text).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].label, "P1");
        assert_eq!(points[1].position, DecimalVector::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_point_table_errors_name_the_line() {
        let err = parse_point_table("Label X Y Z\nP1 0.1 oops 0.3\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));

        assert!(parse_point_table("Name X Y Z\nP1 0 0 0\n").is_err());
        assert!(parse_point_table("").is_err());
    }

    #[test]
    fn test_csv_quoting() {
        let text = to_csv(&["time", "a,b"], &[vec!["0".to_string(), "say \"hi\"".to_string()]]);
        assert_eq!(text, "time,\"a,b\"\r\n0,\"say \"\"hi\"\"\"\r\n");
    }

    #[test]
    fn test_zip_directory_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("parts")).unwrap();
        std::fs::write(dir.path().join("assembly.x_t"), b"assembly").unwrap();
        std::fs::write(dir.path().join("parts").join("fin.x_t"), b"fin").unwrap();

        let bytes = zip_directory(dir.path()).unwrap();
        assert_eq!(
            list_zip_entries(&bytes).unwrap(),
            vec!["assembly.x_t".to_string(), "parts/fin.x_t".to_string()]
        );
        assert_eq!(read_zip_entry(&bytes, "parts/fin.x_t").unwrap(), b"fin".to_vec());
    }

    #[tokio::test]
    async fn test_load_cad_hashes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.step");
        std::fs::write(&path, b"abc").unwrap();

        let payload = load_cad(&path).await.unwrap();
        assert_eq!(payload.file_name, "part.step");
        assert!(!payload.packaged);
        assert_eq!(
            payload.sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
