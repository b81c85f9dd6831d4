//! Conversion and site build through external command-line tools.

use super::{ProjectConverter, SiteBuilder};
use crate::error::Jats2SiteError;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info};

/// Placeholder in [`MystCommands::convert`] replaced with the input file name.
pub const INPUT_PLACEHOLDER: &str = "{input}";

/// Keep at most this many bytes of a failed command's stderr.
const STDERR_TAIL: usize = 4096;

/// Argument vectors for the three external steps. The first element of each
/// is the program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MystCommands {
    pub convert: Vec<String>,
    pub init: Vec<String>,
    pub build: Vec<String>,
}

impl Default for MystCommands {
    fn default() -> Self {
        let v = |args: &[&str]| -> Vec<String> { args.iter().map(|s| s.to_string()).collect() };
        Self {
            convert: v(&[
                "jats",
                "convert",
                INPUT_PLACEHOLDER,
                "--frontmatter",
                "project",
                "--bibtex",
            ]),
            init: v(&["myst", "init", "--project", "--site"]),
            build: v(&["myst", "build", "--site"]),
        }
    }
}

/// Runs [`MystCommands`] as child processes rooted in the job workspace.
#[derive(Debug, Clone, Default)]
pub struct MystCli {
    commands: MystCommands,
}

impl MystCli {
    pub fn new(commands: MystCommands) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl ProjectConverter for MystCli {
    async fn convert(&self, workspace: &Path, input: &Path) -> Result<(), Jats2SiteError> {
        let input = input.strip_prefix(workspace).unwrap_or(input);
        let input = input.to_string_lossy();
        let args: Vec<String> = self
            .commands
            .convert
            .iter()
            .map(|a| a.replace(INPUT_PLACEHOLDER, &input))
            .collect();
        run(workspace, &args).await
    }
}

#[async_trait]
impl SiteBuilder for MystCli {
    async fn init(&self, workspace: &Path) -> Result<(), Jats2SiteError> {
        run(workspace, &self.commands.init).await
    }

    async fn build(&self, workspace: &Path) -> Result<(), Jats2SiteError> {
        run(workspace, &self.commands.build).await
    }
}

/// Run `args` with `workspace` as the child's working directory.
async fn run(workspace: &Path, args: &[String]) -> Result<(), Jats2SiteError> {
    let (program, rest) = args
        .split_first()
        .ok_or_else(|| Jats2SiteError::InvalidConfig("empty command".to_string()))?;

    info!("Running {} in {}", args.join(" "), workspace.display());
    let output = Command::new(program)
        .args(rest)
        .current_dir(workspace)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| Jats2SiteError::CommandSpawn {
            program: program.clone(),
            source,
        })?;

    if !output.stdout.is_empty() {
        debug!("{}: {}", program, String::from_utf8_lossy(&output.stdout).trim_end());
    }
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let start = stderr.len().saturating_sub(STDERR_TAIL);
    let start = (start..stderr.len())
        .find(|&i| stderr.is_char_boundary(i))
        .unwrap_or(stderr.len());
    Err(Jats2SiteError::CommandFailed {
        program: program.clone(),
        status: output.status.to_string(),
        stderr: stderr[start..].trim_end().to_string(),
    })
}
