//! Human readable append log, one line per accepted result:
//! `[2024-05-01 13:37:00] PLATE: 12가3456`.

use chrono::{ DateTime, Local };

use std::fs::{ File, OpenOptions };
use std::io::{ BufWriter, Write };
use std::path::{ Path, PathBuf };

use crate::error::LprError;
use crate::matcher::PlateResult;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn timestamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_line(at: &DateTime<Local>, result: &PlateResult) -> String {
    format!("[{}] {}: {}", timestamp(at), result.kind, result.plate)
}

pub struct ResultLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ResultLog {

    pub fn open(path: impl AsRef<Path>) -> Result<Self, LprError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, at: &DateTime<Local>, result: &PlateResult) -> Result<(), LprError> {
        writeln!(self.writer, "{}", format_line(at, result))?;
        self.writer.flush()?;
        Ok(())
    }
}


#[cfg(test)]
mod test {

    use chrono::TimeZone;

    use crate::matcher::ResultKind;

    use super::*;

    fn result(plate: &str, kind: ResultKind) -> PlateResult {
        PlateResult {
            plate: plate.to_string(),
            confidence: 0.9,
            raw_text: plate.to_string(),
            source_region: None,
            kind,
        }
    }

    #[test]
    fn line_schema() {
        let at = Local.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap();
        assert_eq!(format_line(&at, &result("12가3456", ResultKind::Plate)), "[2024-05-01 13:37:00] PLATE: 12가3456");
        assert_eq!(format_line(&at, &result("EXIT", ResultKind::Text)), "[2024-05-01 13:37:00] TEXT: EXIT");
    }

    #[test]
    fn appends_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plates.log");
        let at = Local.with_ymd_and_hms(2024, 5, 1, 13, 37, 0).unwrap();
        ResultLog::open(&path).unwrap().append(&at, &result("12가3456", ResultKind::Plate)).unwrap();
        ResultLog::open(&path).unwrap().append(&at, &result("34나5678", ResultKind::Plate)).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with("PLATE: 34나5678\n"));
    }
}
