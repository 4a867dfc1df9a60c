//! Abstracts over actually invoking the compiler subprocess, so the state
//! machine in [`crate::direct`]/[`crate::nodirect`] can be exercised against
//! a stub in tests without a real `cl.exe` on the host.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};

use crate::error::CompileError;

/// The result of running the compiler once.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// The process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: Vec<u8>,
    /// Captured standard error.
    pub stderr: Vec<u8>,
}

/// Runs a compiler invocation and captures its output.
///
/// Implemented by [`RealCompiler`] for production use and by test-only
/// closures/stubs for the pipeline's unit tests.
pub trait CompilerRunner: Send + Sync {
    /// Invokes `compiler` with `args` in `cwd`, with `env` applied on top
    /// of the current process environment.
    fn run(
        &self,
        compiler: &Path,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<RunOutput, CompileError>;
}

/// Runs the real MSVC `cl.exe` as a subprocess, capturing stdout/stderr via
/// temporary files rather than in-process pipes — avoiding the
/// buffering-thread complexity a pipe-based capture would otherwise need,
/// and matching how the cache observes output identically to a shell
/// redirect.
pub struct RealCompiler;

impl CompilerRunner for RealCompiler {
    fn run(
        &self,
        compiler: &Path,
        args: &[String],
        cwd: &Path,
        env: &HashMap<String, String>,
    ) -> Result<RunOutput, CompileError> {
        let mut stdout_file = tempfile::tempfile().map_err(|source| CompileError::Spawn {
            compiler: compiler.to_path_buf(),
            source,
        })?;
        let mut stderr_file = tempfile::tempfile().map_err(|source| CompileError::Spawn {
            compiler: compiler.to_path_buf(),
            source,
        })?;

        let mut command = Command::new(compiler);
        command
            .args(args)
            .current_dir(cwd)
            .env_remove("VS_UNICODE_OUTPUT")
            .stdout(Stdio::from(stdout_file.try_clone().map_err(|source| {
                CompileError::Spawn {
                    compiler: compiler.to_path_buf(),
                    source,
                }
            })?))
            .stderr(Stdio::from(stderr_file.try_clone().map_err(|source| {
                CompileError::Spawn {
                    compiler: compiler.to_path_buf(),
                    source,
                }
            })?));
        for (key, value) in env {
            command.env(key, value);
        }

        let status = command.status().map_err(|source| CompileError::Spawn {
            compiler: compiler.to_path_buf(),
            source,
        })?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        use std::io::Seek;
        stdout_file
            .seek(std::io::SeekFrom::Start(0))
            .and_then(|_| stdout_file.read_to_end(&mut stdout))
            .map_err(|source| CompileError::Spawn {
                compiler: compiler.to_path_buf(),
                source,
            })?;
        stderr_file
            .seek(std::io::SeekFrom::Start(0))
            .and_then(|_| stderr_file.read_to_end(&mut stderr))
            .map_err(|source| CompileError::Spawn {
                compiler: compiler.to_path_buf(),
                source,
            })?;

        Ok(RunOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubCompiler {
        output: RunOutput,
    }

    impl CompilerRunner for StubCompiler {
        fn run(
            &self,
            _compiler: &Path,
            _args: &[String],
            _cwd: &Path,
            _env: &HashMap<String, String>,
        ) -> Result<RunOutput, CompileError> {
            Ok(self.output.clone())
        }
    }

    #[test]
    fn stub_runner_returns_configured_output() {
        let stub = StubCompiler {
            output: RunOutput {
                exit_code: 0,
                stdout: b"ok".to_vec(),
                stderr: Vec::new(),
            },
        };
        let result = stub
            .run(Path::new("cl.exe"), &[], Path::new("."), &HashMap::new())
            .unwrap();
        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, b"ok");
    }
}
