// ── CSV log codec ──
//
// Append-mode CSV log: one header row per session (registry names), then
// one row of values per persistence cycle. Values render as plain text
// for strings, JSON text for everything else, and an empty field for null.

use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::Read;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

use crate::error::Error;

/// Render one value as a CSV field.
pub fn render_field(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null => Cow::Borrowed(""),
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

/// Parse a CSV field back into a value.
///
/// Empty fields are null; anything that parses as JSON is taken as JSON;
/// the rest is a string. Strings that look like JSON (`"5"`, `"true"`)
/// therefore come back as numbers or booleans.
pub fn parse_field(field: &str) -> Value {
    if field.is_empty() {
        return Value::Null;
    }
    serde_json::from_str(field).unwrap_or_else(|_| Value::String(field.to_owned()))
}

// ── Writer ───────────────────────────────────────────────────────────

/// Append-only CSV log writer. Every record is flushed as it is written.
#[derive(Debug)]
pub struct LogWriter {
    path: PathBuf,
    inner: csv::Writer<File>,
}

impl LogWriter {
    /// Open `path` for appending, creating it and its parent directories.
    pub fn open_append(path: &Path) -> Result<Self, Error> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_header<S: AsRef<str>>(&mut self, names: &[S]) -> Result<(), Error> {
        self.inner
            .write_record(names.iter().map(|n| n.as_ref().as_bytes()))?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn write_row<'v, I>(&mut self, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = &'v Value>,
    {
        let fields: Vec<Cow<'v, str>> = values.into_iter().map(render_field).collect();
        self.inner
            .write_record(fields.iter().map(|f| f.as_bytes()))?;
        self.inner.flush()?;
        Ok(())
    }

    /// Flush buffered output and sync the file to disk.
    pub fn close(self) -> Result<(), Error> {
        let file = self
            .inner
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))?;
        file.sync_all()?;
        Ok(())
    }
}

// ── Reader ───────────────────────────────────────────────────────────

/// One session's worth of log: its header and the rows that follow it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogSection {
    pub header: Vec<String>,
    pub rows: Vec<IndexMap<String, Value>>,
}

/// Read a log file written by [`LogWriter`].
pub fn read_log(path: &Path) -> Result<Vec<LogSection>, Error> {
    parse_log(File::open(path)?)
}

/// Parse log text into sections.
///
/// A record starts a new session section when its width differs from the
/// current header or when it reads as a header itself: every session's
/// header begins with the same first column name, and no header field
/// parses as a number, boolean, or JSON value.
pub fn parse_log<R: Read>(reader: R) -> Result<Vec<LogSection>, Error> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut sections: Vec<LogSection> = Vec::new();
    for record in csv.records() {
        let record = record?;
        let fields: Vec<&str> = record.iter().collect();

        let starts_section = sections.last().is_none_or(|current| {
            current.header.len() != fields.len() || is_header(&current.header, &fields)
        });

        if starts_section {
            sections.push(LogSection {
                header: fields.iter().map(|f| (*f).to_owned()).collect(),
                rows: Vec::new(),
            });
        } else if let Some(current) = sections.last_mut() {
            let row = current
                .header
                .iter()
                .cloned()
                .zip(fields.iter().map(|f| parse_field(f)))
                .collect();
            current.rows.push(row);
        }
    }
    Ok(sections)
}

fn is_header(current: &[String], fields: &[&str]) -> bool {
    current.first().map(String::as_str) == fields.first().copied()
        && fields.iter().all(|f| parse_field(f).is_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn renders_fields() {
        assert_eq!(render_field(&json!(1000.0)), "1000.0");
        assert_eq!(render_field(&json!(5)), "5");
        assert_eq!(render_field(&json!("idle")), "idle");
        assert_eq!(render_field(&Value::Null), "");
        assert_eq!(render_field(&json!(true)), "true");
        assert_eq!(render_field(&json!([1, 2])), "[1,2]");
    }

    #[test]
    fn parses_fields() {
        assert_eq!(parse_field("1000.0"), json!(1000.0));
        assert_eq!(parse_field("5"), json!(5));
        assert_eq!(parse_field("idle"), json!("idle"));
        assert_eq!(parse_field(""), Value::Null);
        assert_eq!(parse_field("[1,2]"), json!([1, 2]));
    }

    #[test]
    fn writes_header_and_row() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut writer = LogWriter::open_append(&path).unwrap();
        writer.write_header(&["timestamp", "x"]).unwrap();
        writer.write_row(&[json!(1000.0), json!(5)]).unwrap();
        writer.close().unwrap();

        insta::assert_snapshot!(fs::read_to_string(&path).unwrap().trim_end(), @r"
        timestamp,x
        1000.0,5
        ");
    }

    #[test]
    fn quotes_fields_with_delimiters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.csv");

        let mut writer = LogWriter::open_append(&path).unwrap();
        writer.write_header(&["pos"]).unwrap();
        writer.write_row(&[json!([1.5, 2])]).unwrap();
        writer.close().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "pos\n\"[1.5,2]\"\n");
        let sections = read_log(&path).unwrap();
        assert_eq!(sections[0].rows[0]["pos"], json!([1.5, 2]));
    }

    #[test]
    fn round_trips_a_snapshot() {
        let text = "timestamp,x\n1000.0,5\n";
        let sections = parse_log(text.as_bytes()).unwrap();

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].header, vec!["timestamp", "x"]);
        let expected: IndexMap<String, Value> =
            [("timestamp".to_owned(), json!(1000.0)), ("x".to_owned(), json!(5))]
                .into_iter()
                .collect();
        assert_eq!(sections[0].rows, vec![expected]);
    }

    #[test]
    fn splits_sessions_on_repeated_or_wider_header() {
        let text = "timestamp,x\n1.0,1\ntimestamp,x\n2.0,2\n3.0,3\ntimestamp,x,y\n4.0,4,4\n";
        let sections = parse_log(text.as_bytes()).unwrap();

        let shape: Vec<(usize, usize)> = sections
            .iter()
            .map(|s| (s.header.len(), s.rows.len()))
            .collect();
        assert_eq!(shape, vec![(2, 1), (2, 2), (3, 1)]);
    }

    #[test]
    fn splits_sessions_with_same_width_different_names() {
        let text = "timestamp,bed_temp\n1.0,60.1\ntimestamp,nozzle_temp\n2.0,210.5\n3.0,210.7\n";
        let sections = parse_log(text.as_bytes()).unwrap();

        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].header, vec!["timestamp", "bed_temp"]);
        assert_eq!(sections[0].rows.len(), 1);
        assert_eq!(sections[1].header, vec!["timestamp", "nozzle_temp"]);
        assert_eq!(sections[1].rows[1]["nozzle_temp"], json!(210.7));
    }

    #[test]
    fn string_rows_stay_in_their_section() {
        let text = "timestamp,status\n1.0,idle\n2.0,printing\n";
        let sections = parse_log(text.as_bytes()).unwrap();

        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].rows[1]["status"], json!("printing"));
    }

    #[test]
    fn appends_instead_of_truncating() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/log.csv");

        for value in [1, 2] {
            let mut writer = LogWriter::open_append(&path).unwrap();
            writer.write_header(&["v"]).unwrap();
            writer.write_row(&[json!(value)]).unwrap();
            writer.close().unwrap();
        }

        let sections = read_log(&path).unwrap();
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[1].rows[0]["v"], json!(2));
    }
}
