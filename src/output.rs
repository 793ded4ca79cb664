use std::io::{self, Write};

use serde::Serialize;

use crate::app::{PipelineReport, ProgressEvent, ProgressSink};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(result: &PipelineReport) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, event: ProgressEvent) {
        match event.progress {
            Some(progress) => tracing::trace!(
                stage = %event.stage,
                done = progress.done,
                total = ?progress.total,
                "{}",
                event.message
            ),
            None => tracing::debug!(stage = %event.stage, "{}", event.message),
        }
    }
}
