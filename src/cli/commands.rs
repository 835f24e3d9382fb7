//! CLI command definitions

use clap::Args;
use std::path::PathBuf;

/// Run a job
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Path to job YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Repository that triggered the run (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY", default_value = "")]
    pub repository: String,

    /// Target branch of a pull request; empty for a push
    #[arg(long, env = "GITHUB_BASE_REF", default_value = "")]
    pub base_ref: String,

    /// Variable overrides (key=value)
    #[arg(long, value_parser = parse_key_value)]
    pub variable: Vec<(String, String)>,

    /// Directory artifacts are published to
    #[arg(long)]
    pub artifact_dir: Option<PathBuf>,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,
}

/// Validate a job configuration
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Path to job YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Print the runner class for an event
#[derive(Debug, Args, Clone)]
pub struct SelectCommand {
    /// Path to job YAML file
    #[arg(short, long)]
    pub file: PathBuf,

    /// Repository that triggered the run (owner/name)
    #[arg(long, env = "GITHUB_REPOSITORY", default_value = "")]
    pub repository: String,

    /// Target branch of a pull request; empty for a push
    #[arg(long, env = "GITHUB_BASE_REF", default_value = "")]
    pub base_ref: String,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Job name to filter by
    #[arg(short, long)]
    pub job: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,

    /// Show a specific run
    #[arg(long)]
    pub execution_id: Option<String>,
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("image=alpine:3.20").unwrap(),
            ("image".to_string(), "alpine:3.20".to_string())
        );
        assert_eq!(
            parse_key_value("flags=a=b").unwrap(),
            ("flags".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_key_value("empty=").unwrap().1, "");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=value").is_err());
    }
}
