use crate::error::Result;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::{debug, warn};

const ENVELOPE_OPEN: &[u8] = b"{\"forecast\": [\n";
const ENVELOPE_CLOSE: &[u8] = b"\n]}\n";

#[derive(Serialize)]
struct Entry<'a, T: Serialize> {
    #[serde(with = "crate::models::timestamp_format")]
    time: NaiveDateTime,
    data: &'a T,
}

/// Appends one JSON entry per forecast poll inside a `{"forecast": [...]}` envelope.
///
/// The envelope is opened on creation and closed by [`FileSink::close`], or on
/// drop as a fallback.
pub struct FileSink<W: Write> {
    writer: Option<W>,
    entries: usize,
}

impl FileSink<BufWriter<File>> {
    /// Opens `path` for appending, creating it if needed.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        debug!("Forecast file opened: {}", path.display());
        Self::from_writer(BufWriter::new(file))
    }
}

impl<W: Write> FileSink<W> {
    pub fn from_writer(mut writer: W) -> Result<Self> {
        writer.write_all(ENVELOPE_OPEN)?;
        writer.flush()?;
        Ok(Self {
            writer: Some(writer),
            entries: 0,
        })
    }

    /// Writes `{"time": measured_at, "data": data}` and flushes.
    pub fn append<T: Serialize>(&mut self, measured_at: NaiveDateTime, data: &T) -> Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                format!("forecast file already closed, entry for {} not written", measured_at),
            )
            .into());
        };
        if self.entries > 0 {
            writer.write_all(b",\n")?;
        }
        serde_json::to_writer(
            &mut *writer,
            &Entry {
                time: measured_at,
                data,
            },
        )?;
        writer.flush()?;
        self.entries += 1;
        Ok(())
    }

    #[cfg(test)]
    pub fn entries(&self) -> usize {
        self.entries
    }

    /// Closes the envelope. Calling it again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.write_all(ENVELOPE_CLOSE)?;
            writer.flush()?;
            debug!("Forecast file closed after {} entries", self.entries);
        }
        Ok(())
    }

    /// Closes the envelope and hands back the underlying writer.
    #[cfg(test)]
    fn into_inner(mut self) -> Option<W> {
        if let Some(writer) = self.writer.as_mut() {
            writer.write_all(ENVELOPE_CLOSE).ok()?;
        }
        self.writer.take()
    }
}

impl<W: Write> Drop for FileSink<W> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Could not close forecast file: {}", e);
        }
    }
}
