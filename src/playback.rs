//! CSV playback/recorder communicators: a file-backed stand-in for a live
//! sensor feed and a results sink. Real sockets and a dynamic factory
//! loader remain out of scope; a file is enough to drive the CLI
//! end-to-end.

use std::fs::{File, OpenOptions};
use std::path::Path;

use crate::error::{PrognosticsError, Result};
use crate::model::{DataMap, Datum, Event, Prediction};

/// Replays rows of a CSV file as `DataMap`s, one per `next` call.
///
/// Expects a header row `time,<name1>,<name2>,...` where each named column
/// is bound to the symbolic sensor id used by the model's input/output
/// names.
pub struct PlaybackCommunicator {
    reader: csv::Reader<File>,
    headers: Vec<String>,
}

impl PlaybackCommunicator {
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .map_err(|e| PrognosticsError::Config(format!("could not open {}: {e}", path.display())))?;
        let headers = reader
            .headers()
            .map_err(|e| PrognosticsError::Config(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect();
        Ok(PlaybackCommunicator { reader, headers })
    }

    /// Reads the next row into a `DataMap`, or `None` at end of file.
    pub fn next(&mut self) -> Result<Option<DataMap>> {
        let mut record = csv::StringRecord::new();
        if !self
            .reader
            .read_record(&mut record)
            .map_err(|e| PrognosticsError::Config(e.to_string()))?
        {
            return Ok(None);
        }
        let mut fields = record.iter();
        let time: f64 = fields
            .next()
            .ok_or_else(|| PrognosticsError::Config("row missing time column".into()))?
            .parse()
            .map_err(|_| PrognosticsError::Config("time column is not numeric".into()))?;

        let mut data = DataMap::new();
        for (name, value) in self.headers.iter().skip(1).zip(fields) {
            let v: f64 = value
                .parse()
                .map_err(|_| PrognosticsError::Config(format!("column {name} is not numeric")))?;
            data.insert(name.clone(), Datum::new(v, time));
        }
        Ok(Some(data))
    }
}

/// Appends one row per predicted event's sample mean to a CSV file,
/// creating it with a header on first use.
pub struct RecorderCommunicator {
    writer: csv::Writer<File>,
    event_names: Vec<String>,
}

impl RecorderCommunicator {
    pub fn create(path: &Path, event_names: &[&str]) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| PrognosticsError::Config(format!("could not create {}: {e}", path.display())))?;
        let mut writer = csv::Writer::from_writer(file);
        let mut header = vec!["time".to_string()];
        header.extend(event_names.iter().map(|n| format!("{n}_eod_mean")));
        writer
            .write_record(&header)
            .map_err(|e| PrognosticsError::Config(e.to_string()))?;
        Ok(RecorderCommunicator {
            writer,
            event_names: event_names.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Records the mean time-of-event for each event in `prediction`,
    /// stamped with `t`. Events absent from the prediction (e.g. an empty
    /// step result) are written as empty cells.
    pub fn record(&mut self, t: f64, prediction: &Prediction) -> Result<()> {
        let mut row = vec![t.to_string()];
        for name in &self.event_names {
            let cell = find_event(prediction, name)
                .and_then(|e| e.time_of_event.mean().ok())
                .map(|m| m.to_string())
                .unwrap_or_default();
            row.push(cell);
        }
        self.writer
            .write_record(&row)
            .map_err(|e| PrognosticsError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().map_err(|e| PrognosticsError::Config(e.to_string()))
    }
}

fn find_event<'a>(prediction: &'a Prediction, name: &str) -> Option<&'a Event> {
    prediction.events.iter().find(|e| e.name == name)
}
