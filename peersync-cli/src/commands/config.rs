//! `peersync config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use peersync_core::config::{PeersyncConfig, RouterConfig};
use peersync_core::credentials::{
    ENV_INVENTORY_TOKEN, ENV_INVENTORY_URL, ENV_ROUTER_PASSWORD, ENV_ROUTER_USERNAME,
};

use crate::cli::{ConfigAction, ConfigArgs};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

const SECTIONS: [&str; 7] = [
    "general",
    "inventory",
    "device",
    "retry",
    "reconcile",
    "report",
    "routers",
];

const CREDENTIAL_VARS: [&str; 4] = [
    ENV_INVENTORY_URL,
    ENV_INVENTORY_TOKEN,
    ENV_ROUTER_USERNAME,
    ENV_ROUTER_PASSWORD,
];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Load and validate the configuration file, reporting any errors.
///
/// # Errors
///
/// Returns `CliError::Config` if validation fails.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = match PeersyncConfig::load(config_path).await {
        Ok(config) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: true,
            routers: config.routers.len(),
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source: config_path.display().to_string(),
            valid: false,
            routers: 0,
            errors: vec![e.to_string()],
        },
    };

    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

/// Display the effective configuration (file + env overrides + defaults).
///
/// Credentials never live in the file; only whether each variable is set is shown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = PeersyncConfig::load(config_path).await?;
    let config_toml = render_section(&config, section.as_deref())?;

    let report = ConfigReport {
        source: config_path.display().to_string(),
        section,
        config_toml,
        credentials: credential_status(|var| std::env::var(var).ok()),
    };
    writer.render(&report)?;
    Ok(())
}

#[derive(Serialize)]
struct RouterList<'a> {
    routers: &'a [RouterConfig],
}

fn render_section(config: &PeersyncConfig, section: Option<&str>) -> Result<String, CliError> {
    let rendered = match section {
        None => toml::to_string_pretty(config),
        Some("general") => toml::to_string_pretty(&config.general),
        Some("inventory") => toml::to_string_pretty(&config.inventory),
        Some("device") => toml::to_string_pretty(&config.device),
        Some("retry") => toml::to_string_pretty(&config.retry),
        Some("reconcile") => toml::to_string_pretty(&config.reconcile),
        Some("report") => toml::to_string_pretty(&config.report),
        Some("routers") => toml::to_string_pretty(&RouterList {
            routers: &config.routers,
        }),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };
    Ok(rendered.unwrap_or_else(|e| format!("(serialization error: {})", e)))
}

fn credential_status<F>(lookup: F) -> Vec<CredentialStatus>
where
    F: Fn(&str) -> Option<String>,
{
    CREDENTIAL_VARS
        .iter()
        .map(|var| CredentialStatus {
            var: (*var).to_owned(),
            set: lookup(var).is_some_and(|v| !v.trim().is_empty()),
        })
        .collect()
}

/// Whether one credential variable is present. The value is never shown.
#[derive(Serialize)]
pub struct CredentialStatus {
    pub var: String,
    pub set: bool,
}

/// Configuration display report.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration file path
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    /// Serialized TOML configuration, text output only
    #[serde(skip)]
    pub config_toml: String,
    pub credentials: Vec<CredentialStatus>,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        if let Some(ref section) = self.section {
            let section_label = format!("[{}]", section);
            writeln!(
                w,
                "Configuration {} (source: {})",
                section_label.bold(),
                self.source
            )?;
        } else {
            writeln!(w, "Configuration (source: {})", self.source.bold())?;
        }

        writeln!(w)?;
        write!(w, "{}", self.config_toml)?;

        writeln!(w)?;
        writeln!(w, "Credentials (environment):")?;
        for c in &self.credentials {
            let state = if c.set { "set".green() } else { "missing".red() };
            writeln!(w, "  {:<18} {}", c.var, state)?;
        }
        Ok(())
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    /// Configuration file path
    pub source: String,
    pub valid: bool,
    /// Number of configured routers
    pub routers: usize,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        writeln!(w, "Config Validation: {}", self.source.bold())?;

        if self.valid {
            writeln!(w, "  Result: {}", "VALID".green().bold())?;
            writeln!(w, "  Routers: {}", self.routers)?;
        } else {
            writeln!(w, "  Result: {}", "INVALID".red().bold())?;
            for err in &self.errors {
                writeln!(w, "  Error: {}", err.red())?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;

    fn sample() -> PeersyncConfig {
        PeersyncConfig::parse(
            r#"
[reconcile]
local_asn = 4181

[[routers]]
hostname = "CHCGILDTcor51"
dialect = "cisco_ios"
"#,
        )
        .expect("valid config")
    }

    #[test]
    fn test_render_full_config() {
        let toml = render_section(&sample(), None).expect("render");
        assert!(toml.contains("[general]"));
        assert!(toml.contains("local_asn = 4181"));
        assert!(toml.contains("CHCGILDTcor51"));
    }

    #[test]
    fn test_render_routers_section() {
        let toml = render_section(&sample(), Some("routers")).expect("render");
        assert!(toml.contains("[[routers]]"));
        assert!(toml.contains("dialect = \"cisco_ios\""));
    }

    #[test]
    fn test_render_single_section() {
        let toml = render_section(&sample(), Some("retry")).expect("render");
        assert!(toml.contains("max_attempts = 3"));
        assert!(!toml.contains("[general]"));
    }

    #[test]
    fn test_unknown_section_is_command_error() {
        let err = render_section(&sample(), Some("ebpf")).expect_err("unknown section");
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("reconcile"));
    }

    #[test]
    fn test_credential_status_never_exposes_values() {
        let status = credential_status(|var| match var {
            "NETBOX_TOKEN" => Some("0123456789abcdef".to_owned()),
            "ROUTER_PASSWORD" => Some("   ".to_owned()),
            _ => None,
        });
        assert_eq!(status.len(), 4);
        let token = status.iter().find(|c| c.var == "NETBOX_TOKEN").expect("token row");
        assert!(token.set);
        let password = status
            .iter()
            .find(|c| c.var == "ROUTER_PASSWORD")
            .expect("password row");
        assert!(!password.set, "blank value counts as missing");

        let report = ConfigReport {
            source: "peersync.toml".to_owned(),
            section: None,
            config_toml: String::new(),
            credentials: status,
        };
        let mut buffer = Vec::new();
        OutputWriter::new(OutputFormat::Json)
            .write_to(&mut buffer, &report)
            .expect("json");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(!output.contains("0123456789abcdef"));
    }

    #[test]
    fn test_validation_report_render_invalid() {
        let report = ConfigValidationReport {
            source: "bad.toml".to_owned(),
            valid: false,
            routers: 0,
            errors: vec!["invalid config value for 'retry.max_attempts'".to_owned()],
        };
        let mut buffer = Vec::new();
        report.render_text(&mut buffer).expect("render");
        let output = String::from_utf8(buffer).expect("utf-8");
        assert!(output.contains("INVALID"));
        assert!(output.contains("retry.max_attempts"));
    }

    #[tokio::test]
    async fn test_validate_missing_file_is_config_error() {
        let writer = OutputWriter::new(OutputFormat::Json);
        let err = execute_validate(Path::new("/nonexistent/peersync.toml"), &writer)
            .await
            .expect_err("missing file");
        assert_eq!(err.exit_code(), 2);
    }
}
