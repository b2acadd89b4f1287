//! Per-session bookkeeping on top of the per-frame pipeline.

use chrono::{ DateTime, Local };
use tracing::{ debug, warn };

use crate::dedup::DedupTracker;
use crate::matcher::PlateResult;
use crate::report::ResultLog;

#[derive(Default)]
pub struct Session {
    dedup: DedupTracker,
    log: Option<ResultLog>,
    frames: u64,
}

impl Session {

    pub fn new(log: Option<ResultLog>) -> Self {
        Self { dedup: DedupTracker::new(), log, frames: 0 }
    }

    /// Keep the results not reported before in this session and append them
    /// to the log. A failing log write is reported but does not drop results.
    pub fn accept(&mut self, at: &DateTime<Local>, results: Vec<PlateResult>) -> Vec<PlateResult> {
        self.frames += 1;
        let fresh: Vec<PlateResult> = results.into_iter()
            .filter(|r| self.dedup.should_emit(&r.plate))
            .collect();
        if let Some(log) = self.log.as_mut() {
            for result in &fresh {
                if let Err(e) = log.append(at, result) {
                    warn!(error = %e, path = %log.path().display(), "could not write result log");
                }
            }
        }
        debug!(frame = self.frames, accepted = fresh.len(), "session update");
        fresh
    }

    pub fn plates(&self) -> &[String] {
        self.dedup.seen()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}


#[cfg(test)]
mod test {

    use crate::matcher::ResultKind;

    use super::*;

    fn plate(p: &str) -> PlateResult {
        PlateResult {
            plate: p.to_string(),
            confidence: 0.8,
            raw_text: p.to_string(),
            source_region: None,
            kind: ResultKind::Plate,
        }
    }

    #[test]
    fn repeated_plate_across_frames_is_logged_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plates.log");
        let mut session = Session::new(Some(ResultLog::open(&path).unwrap()));
        let now = Local::now();

        assert_eq!(session.accept(&now, vec![plate("12가3456")]).len(), 1);
        assert!(session.accept(&now, vec![plate("12가3456")]).is_empty());
        assert_eq!(session.frames(), 2);
        assert_eq!(session.plates(), ["12가3456".to_string()]);
        assert_eq!(std::fs::read_to_string(&path).unwrap().lines().count(), 1);
    }

    #[test]
    fn duplicates_within_one_frame_collapse() {
        let mut session = Session::new(None);
        let fresh = session.accept(&Local::now(), vec![plate("12가3456"), plate("12가3456"), plate("서울12가3456")]);
        let plates: Vec<&str> = fresh.iter().map(|r| r.plate.as_str()).collect();
        assert_eq!(plates, vec!["12가3456", "서울12가3456"]);
    }
}
