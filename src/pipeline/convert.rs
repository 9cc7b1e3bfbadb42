// src/pipeline/convert.rs

// --- Imports ---
use crate::utils::error::ConvertError;
use std::io::{self, Write};
use std::process::{Command, Stdio};

/// Whole-text transformation the markers have to survive.
///
/// Input and output are single newline-joined strings. Implementations must
/// leave a line consisting only of a placeholder untouched.
pub trait Converter {
    fn convert(&self, input: &str) -> Result<String, ConvertError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "converter"
    }
}

impl<F> Converter for F
where
    F: Fn(&str) -> Result<String, ConvertError>,
{
    fn convert(&self, input: &str) -> Result<String, ConvertError> {
        self(input)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Converter for Passthrough {
    fn convert(&self, input: &str) -> Result<String, ConvertError> {
        Ok(input.to_string())
    }

    fn name(&self) -> &str {
        "passthrough"
    }
}

/// Runs an external program, feeding the text on stdin and reading stdout.
#[derive(Debug, Clone)]
pub struct CommandConverter {
    program: String,
    args: Vec<String>,
}

impl CommandConverter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Pandoc with line wrapping pinned to `preserve`, so marker lines are
    /// never joined with their neighbours.
    pub fn pandoc(mut args: Vec<String>) -> Self {
        if !args.iter().any(|a| a.starts_with("--wrap")) {
            args.push("--wrap=preserve".to_string());
        }
        Self::new("pandoc", args)
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }
}

impl Converter for CommandConverter {
    fn convert(&self, input: &str) -> Result<String, ConvertError> {
        tracing::debug!("Running converter: {} {:?}", self.program, self.args);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConvertError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "converter stdin unavailable"))?;

        // Feed stdin from a second thread; a large document would otherwise
        // deadlock once the child's stdout pipe fills up.
        let (written, output) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(input.as_bytes()));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(io::Error::new(io::ErrorKind::Other, "stdin writer panicked")));
            (written, output)
        });

        let output = output?;
        if !output.status.success() {
            return Err(ConvertError::Failed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;

        let text = String::from_utf8(output.stdout)?;
        tracing::debug!("Converter produced {} bytes", text.len());
        Ok(text)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
