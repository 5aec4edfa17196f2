//! Document Compiler: runs the sandboxed LaTeX toolchain on rendered source.
//!
//! Each compilation gets its own temp directory (`resume-{millis}-{random}`).
//! The artifact's existence is the only success signal: pdflatex routinely
//! exits non-zero on warnings while still producing a usable PDF.
//!
//! On success the artifact is handed to the `ArtifactStore` and the temp dir is
//! deleted. On failure the temp dir is kept and its path logged.
//!
//! Killing the `docker` client does not stop the container it started, so each
//! pass runs under a unique container name and an interrupted pass runs the
//! configured cleanup command against that name.

pub mod artifacts;
pub mod sanitize;

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::compiler::artifacts::ArtifactStore;
use crate::compiler::sanitize::sanitize_source;

const SOURCE_FILE: &str = "resume.tex";
const ARTIFACT_FILE: &str = "resume.pdf";
const READ_CHUNK: usize = 8 * 1024;

const SANDBOX_DOWN_MARKERS: &[&str] = &[
    "Cannot connect to the Docker daemon",
    "Is the docker daemon running",
    "docker: command not found",
    "docker: Error response from daemon",
    "Unable to find image",
];

/// `docker run` exit codes for daemon errors (125), a command that cannot be
/// invoked (126) or a command that does not exist (127).
const SANDBOX_EXIT_CODES: std::ops::RangeInclusive<i32> = 125..=127;

/// Content error categories recognised in toolchain output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileFailure {
    UndefinedCommand,
    MathMode,
    MissingFile,
    FatalStop,
    Generic,
}

impl CompileFailure {
    pub fn from_log(log: &str) -> Self {
        if log.contains("Undefined control sequence") {
            Self::UndefinedCommand
        } else if log.contains("Missing $ inserted") {
            Self::MathMode
        } else if log.contains("not found") {
            Self::MissingFile
        } else if log.contains("Emergency stop") || log.contains("Fatal error") {
            Self::FatalStop
        } else {
            Self::Generic
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::UndefinedCommand => {
                "The template uses a command that is not defined. \
                 Check the template for typos or missing packages."
            }
            Self::MathMode => {
                "A special character was interpreted as math. \
                 Check for unescaped symbols such as $ or _ in the template."
            }
            Self::MissingFile => {
                "The template references a package or file that is not available."
            }
            Self::FatalStop => {
                "The document could not be compiled because of a fatal error in the template."
            }
            Self::Generic => "The document failed to compile.",
        }
    }
}

impl fmt::Display for CompileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UndefinedCommand => "undefined command",
            Self::MathMode => "math mode error",
            Self::MissingFile => "missing file",
            Self::FatalStop => "fatal stop",
            Self::Generic => "compiler error",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("compilation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("compilation failed ({failure})")]
    Failed { failure: CompileFailure, log: String },

    #[error("compiler sandbox unavailable: {0}")]
    SandboxUnavailable(String),

    #[error("compiler I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact storage failed: {0}")]
    Storage(String),
}

impl CompileError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout { seconds } => format!(
                "Document compilation timed out after {seconds} seconds. \
                 Try shortening the content or simplifying the template."
            ),
            Self::Failed { failure, .. } => failure.user_message().to_string(),
            Self::SandboxUnavailable(_) => {
                "The document compiler is currently unavailable. Please try again later."
                    .to_string()
            }
            Self::Io(_) => "The compiler workspace could not be prepared.".to_string(),
            Self::Storage(_) => "The compiled document could not be stored.".to_string(),
        }
    }

    /// Content errors fail the same way every time; everything else may not.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Failed { .. })
    }
}

/// How the external toolchain is invoked.
///
/// `args` may contain `{workdir}` (absolute temp dir), `{source}` (the source
/// file name) and `{name}` (unique per pass). The process always runs with the
/// temp dir as cwd.
///
/// `cleanup_args` run with the same program when a pass times out or is
/// cancelled. They may contain `{name}`. Empty means no cleanup.
#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub program: String,
    pub args: Vec<String>,
    pub cleanup_args: Vec<String>,
    pub work_root: PathBuf,
    pub timeout: Duration,
    pub max_output_bytes: usize,
    pub passes: u32,
}

impl CompilerConfig {
    /// pdflatex inside a throwaway container with no network and shell escape off.
    /// The container also enforces the timeout itself, so a pass whose client
    /// was dropped before cleanup ran still ends.
    pub fn docker(
        program: impl Into<String>,
        image: &str,
        work_root: PathBuf,
        timeout: Duration,
        max_output_bytes: usize,
    ) -> Self {
        let limit = timeout.as_secs().max(1).to_string();
        let args = [
            "run",
            "--rm",
            "--name",
            "{name}",
            "--network",
            "none",
            "-v",
            "{workdir}:/data",
            "-w",
            "/data",
            image,
            "timeout",
            "-s",
            "KILL",
            limit.as_str(),
            "pdflatex",
            "-interaction=nonstopmode",
            "-halt-on-error",
            "-no-shell-escape",
            "{source}",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            program: program.into(),
            args,
            cleanup_args: vec!["rm".to_string(), "-f".to_string(), "{name}".to_string()],
            work_root,
            timeout,
            max_output_bytes,
            passes: 2,
        }
    }
}

/// Where a successful compilation ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub file_name: String,
    pub file_path: String,
}

struct PassOutput {
    success: bool,
    code: Option<i32>,
    log: String,
}

/// Runs the cleanup command for a pass unless disarmed first. Dropping an
/// armed guard (timeout or a cancelled future) spawns it without waiting.
struct PassCleanup<'a> {
    program: &'a str,
    args: Vec<String>,
    armed: bool,
}

impl<'a> PassCleanup<'a> {
    fn new(config: &'a CompilerConfig, name: &str) -> Self {
        Self {
            program: &config.program,
            args: config.cleanup_args.iter().map(|a| a.replace("{name}", name)).collect(),
            armed: !config.cleanup_args.is_empty(),
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PassCleanup<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let spawned = Command::new(self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(_) => debug!("Started compiler cleanup: {} {}", self.program, self.args.join(" ")),
            Err(e) => warn!("Compiler cleanup '{}' failed to start: {e}", self.args.join(" ")),
        }
    }
}

#[derive(Clone)]
pub struct DocumentCompiler {
    config: CompilerConfig,
    artifacts: Arc<dyn ArtifactStore>,
}

impl DocumentCompiler {
    pub fn new(config: CompilerConfig, artifacts: Arc<dyn ArtifactStore>) -> Self {
        Self { config, artifacts }
    }

    /// Compiles `source` and stores the artifact as `resume_{resume_id}.pdf`.
    pub async fn compile(
        &self,
        source: &str,
        resume_id: Uuid,
    ) -> Result<CompiledArtifact, CompileError> {
        let (source, removed) = sanitize_source(source);
        if removed > 0 {
            warn!("Stripped {removed} denylisted command(s) from resume {resume_id} source");
        }

        tokio::fs::create_dir_all(&self.config.work_root).await?;
        let workdir = tempfile::Builder::new()
            .prefix(&format!("resume-{}-", Utc::now().timestamp_millis()))
            .tempdir_in(&self.config.work_root)?;

        let outcome = match self.run_passes(workdir.path(), &source).await {
            Ok(artifact_path) => {
                let file_name = format!("resume_{resume_id}.pdf");
                match self.artifacts.store(&artifact_path, &file_name).await {
                    Ok(file_path) => Ok(CompiledArtifact { file_name, file_path }),
                    Err(e) => Err(CompileError::Storage(format!("{e:#}"))),
                }
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(artifact) => {
                info!("Compiled resume {resume_id} to {}", artifact.file_path);
                Ok(artifact)
            }
            Err(e) => {
                let kept = workdir.keep();
                warn!(
                    "Compilation of resume {resume_id} failed ({e}); keeping {} for inspection",
                    kept.display()
                );
                Err(e)
            }
        }
    }

    /// Writes the source and runs the configured passes. Returns the artifact path.
    async fn run_passes(&self, workdir: &Path, source: &str) -> Result<PathBuf, CompileError> {
        tokio::fs::write(workdir.join(SOURCE_FILE), source).await?;
        let artifact = workdir.join(ARTIFACT_FILE);

        let mut last = None;
        for pass in 1..=self.config.passes.max(1) {
            let output = self.run_pass(workdir, pass).await?;
            debug!(
                "Compiler pass {pass} finished (success={}, {} bytes of output)",
                output.success,
                output.log.len()
            );
            let failed = !output.success;
            last = Some(output);

            // A second pass can't recover a first pass that produced nothing.
            if failed && !artifact_exists(&artifact).await {
                break;
            }
        }

        if artifact_exists(&artifact).await {
            return Ok(artifact);
        }

        let PassOutput { code, log, .. } = last.unwrap_or(PassOutput {
            success: false,
            code: None,
            log: String::new(),
        });
        if let Some(marker) = SANDBOX_DOWN_MARKERS.iter().find(|m| log.contains(**m)) {
            return Err(CompileError::SandboxUnavailable((*marker).to_string()));
        }
        if let Some(code) = code.filter(|c| SANDBOX_EXIT_CODES.contains(c)) {
            return Err(CompileError::SandboxUnavailable(format!(
                "'{}' exited with status {code}",
                self.config.program
            )));
        }

        Err(CompileError::Failed {
            failure: CompileFailure::from_log(&log),
            log,
        })
    }

    async fn run_pass(&self, workdir: &Path, pass: u32) -> Result<PassOutput, CompileError> {
        let workdir_arg = workdir.to_string_lossy();
        let name = match workdir.file_name() {
            Some(dir) => format!("{}-p{pass}", dir.to_string_lossy()),
            None => format!("resume-{}-p{pass}", Uuid::new_v4()),
        };
        let args = self.config.args.iter().map(|a| {
            a.replace("{workdir}", &workdir_arg)
                .replace("{source}", SOURCE_FILE)
                .replace("{name}", &name)
        });

        let mut child = Command::new(&self.config.program)
            .args(args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => CompileError::SandboxUnavailable(format!(
                    "compiler program '{}' not found",
                    self.config.program
                )),
                _ => CompileError::Io(e),
            })?;

        let mut cleanup = PassCleanup::new(&self.config, &name);
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.config.max_output_bytes;

        let run = async {
            let (out, err, status) = tokio::join!(
                read_bounded(stdout, limit),
                read_bounded(stderr, limit),
                child.wait()
            );
            let status = status?;
            let mut log = String::from_utf8_lossy(&out?).into_owned();
            log.push_str(&String::from_utf8_lossy(&err?));
            Ok::<_, CompileError>(PassOutput {
                success: status.success(),
                code: status.code(),
                log,
            })
        };

        // On timeout `child` is dropped, which kills the local client only.
        // The armed cleanup then removes the container by name.
        match tokio::time::timeout(self.config.timeout, run).await {
            Ok(output) => {
                cleanup.disarm();
                output
            }
            Err(_) => Err(CompileError::Timeout {
                seconds: self.config.timeout.as_secs(),
            }),
        }
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Reads a pipe to EOF, keeping at most `limit` bytes. Keeps draining past the
/// limit so the child never blocks on a full pipe.
async fn read_bounded<R: AsyncRead + Unpin>(
    reader: Option<R>,
    limit: usize,
) -> std::io::Result<Vec<u8>> {
    let Some(mut reader) = reader else {
        return Ok(Vec::new());
    };
    let mut kept = Vec::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&chunk[..n.min(room)]);
    }
    Ok(kept)
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use crate::compiler::artifacts::LocalArtifactStore;

    /// A compiler that runs `sh -c <script>` in the temp dir.
    pub fn stub_compiler(
        script: &str,
        work_root: &Path,
        artifact_root: &Path,
        timeout: Duration,
    ) -> DocumentCompiler {
        let config = CompilerConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            cleanup_args: Vec::new(),
            work_root: work_root.to_path_buf(),
            timeout,
            max_output_bytes: 64 * 1024,
            passes: 2,
        };
        DocumentCompiler::new(config, Arc::new(LocalArtifactStore::new(artifact_root)))
    }

    /// Writes a fake PDF and exits non-zero, like pdflatex with warnings.
    pub const WRITES_PDF_EXITS_NONZERO: &str = "printf '%%PDF-1.5 stub' > resume.pdf; \
        echo 'LaTeX Warning: Label(s) may have changed.'; exit 1";
}
