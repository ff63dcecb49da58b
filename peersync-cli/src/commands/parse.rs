//! `peersync parse` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use peersync_core::types::NeighborObservation;

use crate::cli::ParseArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `parse` command.
///
/// Reads a saved capture and prints the neighbors the dialect parser extracts.
/// Needs neither configuration nor credentials.
pub async fn execute(args: ParseArgs, writer: &OutputWriter) -> Result<(), CliError> {
    let raw = tokio::fs::read_to_string(&args.file).await?;
    let neighbors = peersync_parser::parse(&raw, args.dialect, &args.router);

    info!(
        path = %args.file.display(),
        dialect = %args.dialect,
        neighbors = neighbors.len(),
        "capture parsed"
    );

    let report = ParseReport {
        source: args.file.display().to_string(),
        dialect: args.dialect.name().to_owned(),
        neighbors,
    };
    writer.render(&report)?;
    Ok(())
}

#[derive(Serialize)]
pub struct ParseReport {
    pub source: String,
    pub dialect: String,
    pub neighbors: Vec<NeighborObservation>,
}

impl Render for ParseReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(
            w,
            "{} ({}): {} neighbors",
            self.source.bold(),
            self.dialect,
            self.neighbors.len()
        )?;
        if self.neighbors.is_empty() {
            return Ok(());
        }

        writeln!(
            w,
            "{:<40} {:>10} {:<14} {:>10}",
            "Neighbor", "Remote AS", "State", "Prefixes"
        )?;
        writeln!(w, "{}", "-".repeat(77))?;
        for n in &self.neighbors {
            writeln!(
                w,
                "{:<40} {:>10} {:<14} {:>10}",
                n.neighbor_ip,
                n.remote_as,
                n.state.to_string(),
                n.prefixes_received
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use peersync_core::types::{Dialect, SessionState};

    use super::*;
    use crate::cli::OutputFormat;

    const IOS_CAPTURE: &str = "\
Neighbor        V           AS MsgRcvd MsgSent   TblVer  InQ OutQ Up/Down  State/PfxRcd
64.50.230.2     4         4150  123456  654321   999999    0    0 3w2d         512
64.50.230.6     4         4150       0       0        1    0    0 never    Idle
";

    #[tokio::test]
    async fn test_parse_capture_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("ios.txt");
        std::fs::write(&path, IOS_CAPTURE).expect("write capture");

        let args = ParseArgs {
            dialect: Dialect::Ios,
            router: "CHCGILDTcor51".to_owned(),
            file: path,
        };
        execute(args, &OutputWriter::new(OutputFormat::Json))
            .await
            .expect("parse succeeds");
    }

    #[tokio::test]
    async fn test_missing_capture_is_io_error() {
        let args = ParseArgs {
            dialect: Dialect::Ios,
            router: "-".to_owned(),
            file: PathBuf::from("/nonexistent/capture.txt"),
        };
        let err = execute(args, &OutputWriter::new(OutputFormat::Text))
            .await
            .expect_err("file is missing");
        assert_eq!(err.exit_code(), 10);
    }

    #[test]
    fn test_render_text_table() {
        let report = ParseReport {
            source: "ios.txt".to_owned(),
            dialect: "cisco_ios".to_owned(),
            neighbors: peersync_parser::parse(IOS_CAPTURE, Dialect::Ios, "CHCGILDTcor51"),
        };
        assert_eq!(report.neighbors.len(), 2);
        assert_eq!(report.neighbors[1].state, SessionState::Idle);

        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("2 neighbors"));
        assert!(output.contains("64.50.230.2"));
        assert!(output.contains("Established"));
        assert!(output.contains("Idle"));
    }

    #[test]
    fn test_render_text_empty() {
        let report = ParseReport {
            source: "empty.txt".to_owned(),
            dialect: "nokia_sros".to_owned(),
            neighbors: Vec::new(),
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("0 neighbors"));
        assert!(!output.contains("Remote AS"));
    }
}
