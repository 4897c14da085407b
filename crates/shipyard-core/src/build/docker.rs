//! [`ImageTool`] backed by the `docker` CLI.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::Context;
use tracing::debug;

use super::ImageTool;
use crate::types::ImageReference;

#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self {
            program: "docker".to_string(),
        }
    }
}

impl DockerCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that docker is installed and answers `--version`.
    pub fn ensure_available(&self) -> anyhow::Result<String> {
        let output = Command::new(&self.program)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to invoke {} --version", self.program))?;
        if !output.status.success() {
            anyhow::bail!("{} --version exited with {}", self.program, output.status);
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn run(&self, args: &[&str], cwd: Option<&Path>) -> anyhow::Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        debug!(?args, "invoking docker");
        let output = cmd
            .output()
            .with_context(|| format!("Failed to run {} {:?}", self.program, args))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "{} {} exited with {}: {}",
                self.program,
                args.first().copied().unwrap_or_default(),
                output.status,
                last_lines(stderr.trim(), 20)
            );
        }
        Ok(())
    }
}

impl ImageTool for DockerCli {
    fn build(&self, context: &Path, image: &ImageReference, platform: &str) -> anyhow::Result<()> {
        let tag = image.to_string();
        self.run(
            &["build", "--platform", platform, "--tag", &tag, "."],
            Some(context),
        )
    }

    fn login(&self, registry_host: &str, password: &str) -> anyhow::Result<()> {
        let mut child = Command::new(&self.program)
            .args(["login", "--username", "AWS", "--password-stdin", registry_host])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to run {} login", self.program))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(password.as_bytes())
                .context("Failed to pass registry password to docker login")?;
        }
        let output = child
            .wait_with_output()
            .context("Failed to wait for docker login")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("docker login to {} failed: {}", registry_host, stderr.trim());
        }
        Ok(())
    }

    fn push(&self, image: &ImageReference) -> anyhow::Result<()> {
        let tag = image.to_string();
        self.run(&["push", &tag], None)
    }
}

/// Build output is long; keep only the tail for error messages.
fn last_lines(text: &str, count: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(count);
    lines[start..].join("\n")
}
