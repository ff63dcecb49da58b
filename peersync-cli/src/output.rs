//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`], which keeps
//! format-specific logic out of command handlers.

use std::io::Write;

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Writes command payloads in the selected format.
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.write_to(&mut handle, payload)
    }

    /// Render a payload to any writer.
    ///
    /// `Text` delegates to [`Render::render_text`], `Json` serialises via `serde_json`.
    pub fn write_to<T: Render + Serialize>(
        &self,
        w: &mut dyn Write,
        payload: &T,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct TestPayload {
        router: String,
        sessions: u32,
    }

    impl Render for TestPayload {
        fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
            writeln!(w, "Router: {}", self.router)?;
            writeln!(w, "Sessions: {}", self.sessions)?;
            Ok(())
        }
    }

    fn payload() -> TestPayload {
        TestPayload {
            router: "CHCGILDTcor51".to_owned(),
            sessions: 42,
        }
    }

    #[test]
    fn test_text_format_uses_render() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Text)
            .write_to(&mut buffer, &payload())
            .expect("text rendering should succeed");

        let output = String::from_utf8(buffer).expect("valid UTF-8");
        assert!(output.contains("Router: CHCGILDTcor51"));
        assert!(output.contains("Sessions: 42"));
    }

    #[test]
    fn test_json_format_is_parseable() {
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .write_to(&mut buffer, &payload())
            .expect("json rendering should succeed");

        let parsed: serde_json::Value =
            serde_json::from_slice(&buffer).expect("should parse back to JSON");
        assert_eq!(parsed["router"].as_str(), Some("CHCGILDTcor51"));
        assert_eq!(parsed["sessions"].as_u64(), Some(42));
        assert!(buffer.ends_with(b"\n"), "json output ends with newline");
    }
}
