use crate::models::{LiveEvent, StreamStats};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Output handler for live events
pub struct OutputHandler {
    format: OutputFormat,
    writer: Option<Box<dyn Write + Send>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
    Console,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "jsonl" => OutputFormat::Jsonl,
            "console" => OutputFormat::Console,
            other => {
                log::warn!("Unknown output format '{}', using console", other);
                OutputFormat::Console
            }
        }
    }
}

impl OutputHandler {
    /// Create a new output handler
    pub fn new(format: OutputFormat, file_path: Option<PathBuf>) -> Result<Self, Box<dyn std::error::Error>> {
        let writer: Option<Box<dyn Write + Send>> = match (&format, file_path) {
            (OutputFormat::Console, _) => None,
            (_, Some(path)) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)?;
                Some(Box::new(BufWriter::new(file)))
            }
            (_, None) => None,
        };

        Ok(OutputHandler {
            format,
            writer,
        })
    }

    /// Write to an arbitrary sink instead of a file or stdout
    pub fn with_writer(format: OutputFormat, writer: Box<dyn Write + Send>) -> Self {
        OutputHandler {
            format,
            writer: Some(writer),
        }
    }

    /// Write one event
    pub fn write_event(&mut self, event: &LiveEvent) -> Result<(), Box<dyn std::error::Error>> {
        let line = match &self.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(event)?),
            OutputFormat::Jsonl => format!("{}\n", serde_json::to_string(event)?),
            OutputFormat::Console => format!("{}\n", Self::console_line(event)),
        };
        self.write_output(&line)
    }

    /// Write a stream statistics summary
    pub fn write_stats(&mut self, stats: &StreamStats) -> Result<(), Box<dyn std::error::Error>> {
        let output = match &self.format {
            OutputFormat::Json => format!("{}\n", serde_json::to_string_pretty(stats)?),
            OutputFormat::Jsonl => format!("{}\n", serde_json::to_string(stats)?),
            OutputFormat::Console => format!(
                "Total: {} ({:.1} events/s) | network {} | file {} | process {} | memory {} | registry {} | other {}\n",
                stats.total_events,
                stats.events_per_second,
                stats.network_events,
                stats.file_events,
                stats.process_events,
                stats.memory_events,
                stats.registry_events,
                stats.event_events
            ),
        };
        self.write_output(&output)
    }

    /// One-line, human readable rendering of an event
    pub fn console_line(event: &LiveEvent) -> String {
        format!(
            "{} [{:<8}] {:<8} {} ({} via {}) {}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.severity.as_str().to_uppercase(),
            event.event_type,
            event.message,
            event.agent,
            event.source,
            event.id
        )
    }

    fn write_output(&mut self, data: &str) -> Result<(), Box<dyn std::error::Error>> {
        match &mut self.writer {
            Some(writer) => {
                writer.write_all(data.as_bytes())?;
                writer.flush()?;
            }
            None => {
                print!("{}", data);
                std::io::stdout().flush()?;
            }
        }
        Ok(())
    }

    /// Flush any buffered output
    pub fn flush(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(writer) = &mut self.writer {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::normalize;
    use crate::models::EventOrigin;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    /// Shared in-memory sink so tests can read back what was written
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn sample_event() -> LiveEvent {
        normalize(
            &json!({
                "id": "evt-1",
                "timestamp": "2024-06-01T12:00:00Z",
                "source": "Sysmon",
                "type": "process",
                "severity": "critical",
                "message": "lsass access",
                "agent": "WS-01"
            }),
            EventOrigin::LiveStream,
        )
    }

    #[test]
    fn test_format_parse() {
        assert_eq!(OutputFormat::parse("JSONL"), OutputFormat::Jsonl);
        assert_eq!(OutputFormat::parse("json"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("whatever"), OutputFormat::Console);
    }

    #[test]
    fn test_format_parse_typo_falls_back_to_console() {
        assert_eq!(OutputFormat::parse("jsonn"), OutputFormat::Console);
        assert_eq!(OutputFormat::parse(" Console "), OutputFormat::Console);
    }

    #[test]
    fn test_jsonl_output() {
        let buf = SharedBuf::default();
        let mut handler = OutputHandler::with_writer(OutputFormat::Jsonl, Box::new(buf.clone()));
        handler.write_event(&sample_event()).unwrap();
        handler.write_event(&sample_event()).unwrap();

        let text = buf.text();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["type"], "process");
        assert_eq!(parsed["severity"], "critical");
    }

    #[test]
    fn test_console_line() {
        let line = OutputHandler::console_line(&sample_event());
        assert!(line.starts_with("2024-06-01 12:00:00 [CRITICAL]"));
        assert!(line.contains("lsass access (WS-01 via Sysmon)"));
    }

    #[test]
    fn test_stats_output() {
        let buf = SharedBuf::default();
        let mut handler = OutputHandler::with_writer(OutputFormat::Console, Box::new(buf.clone()));
        let mut stats = StreamStats::new();
        stats.record(crate::models::EventType::Network);
        handler.write_stats(&stats).unwrap();
        assert!(buf.text().starts_with("Total: 1 "));
    }

    #[test]
    fn test_file_output_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");

        for _ in 0..2 {
            let mut handler = OutputHandler::new(OutputFormat::Jsonl, Some(path.clone())).unwrap();
            handler.write_event(&sample_event()).unwrap();
            handler.flush().unwrap();
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
