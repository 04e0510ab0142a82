//! External editor collaborator for interactive note editing.
//!
//! # Responsibility
//! - Seed a scoped temporary buffer with existing notes.
//! - Block on the configured editor process and read the buffer back.
//!
//! # Invariants
//! - The temporary buffer is removed on every exit path, including launch
//!   failure and non-zero editor exit.
//! - No timeout is imposed on the editor process.

use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;

/// Errors from the editor round trip.
#[derive(Debug)]
pub enum EditorError {
    /// Editor command is empty.
    EmptyCommand,
    /// Temporary buffer could not be created, written or read.
    Buffer(std::io::Error),
    /// Editor process could not be started.
    Launch {
        command: String,
        source: std::io::Error,
    },
    /// Editor exited unsuccessfully.
    ExitStatus { command: String, status: String },
}

impl Display for EditorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCommand => write!(f, "editor command is empty"),
            Self::Buffer(err) => write!(f, "note buffer i/o failed: {err}"),
            Self::Launch { command, source } => {
                write!(f, "failed to run editor `{command}`: {source}")
            }
            Self::ExitStatus { command, status } => {
                write!(f, "editor `{command}` exited with {status}")
            }
        }
    }
}

impl Error for EditorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Buffer(err) => Some(err),
            Self::Launch { source, .. } => Some(source),
            Self::EmptyCommand | Self::ExitStatus { .. } => None,
        }
    }
}

impl From<std::io::Error> for EditorError {
    fn from(value: std::io::Error) -> Self {
        Self::Buffer(value)
    }
}

/// Something that lets the user rewrite a block of text.
pub trait NoteEditor {
    /// Returns the edited text, untrimmed.
    fn edit(&mut self, initial: &str) -> Result<String, EditorError>;
}

/// Runs an external program (e.g. `$EDITOR`) on a temporary file.
pub struct ExternalEditor {
    command: String,
    temp_dir: Option<PathBuf>,
}

impl ExternalEditor {
    /// `command` may carry arguments separated by whitespace, e.g. `code -w`.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            temp_dir: None,
        }
    }

    /// Places temporary buffers in `dir` instead of the system temp dir.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }
}

impl NoteEditor for ExternalEditor {
    fn edit(&mut self, initial: &str) -> Result<String, EditorError> {
        let mut parts = self.command.split_whitespace();
        let program = parts.next().ok_or(EditorError::EmptyCommand)?;
        let args: Vec<&str> = parts.collect();

        let mut builder = tempfile::Builder::new();
        builder.prefix("wip-note-").suffix(".txt");
        let mut buffer = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        buffer.write_all(initial.as_bytes())?;
        buffer.flush()?;

        let started_at = Instant::now();
        info!("event=editor_run module=editor status=start");
        let status = Command::new(program)
            .args(&args)
            .arg(buffer.path())
            .status()
            .map_err(|source| EditorError::Launch {
                command: self.command.clone(),
                source,
            })?;
        if !status.success() {
            error!(
                "event=editor_run module=editor status=error duration_ms={} exit={}",
                started_at.elapsed().as_millis(),
                status
            );
            return Err(EditorError::ExitStatus {
                command: self.command.clone(),
                status: status.to_string(),
            });
        }
        info!(
            "event=editor_run module=editor status=ok duration_ms={}",
            started_at.elapsed().as_millis()
        );

        Ok(fs::read_to_string(buffer.path())?)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::{EditorError, ExternalEditor, NoteEditor};
    use std::fs;
    use std::path::Path;

    fn write_script(dir: &Path, body: &str) -> String {
        let path = dir.join("fake-editor.sh");
        fs::write(&path, format!("{body}\n")).unwrap();
        format!("sh {}", path.to_str().unwrap())
    }

    fn buffer_count(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|entry| {
                entry
                    .as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .starts_with("wip-note-")
            })
            .count()
    }

    #[test]
    fn edit_returns_rewritten_buffer_and_removes_it() {
        let scripts = tempfile::tempdir().unwrap();
        let buffers = tempfile::tempdir().unwrap();
        let script = write_script(scripts.path(), "printf '  rewritten\\n' > \"$1\"");

        let mut editor = ExternalEditor::new(script).with_temp_dir(buffers.path());
        let edited = editor.edit("old text").unwrap();

        assert_eq!(edited, "  rewritten\n");
        assert_eq!(buffer_count(buffers.path()), 0);
    }

    #[test]
    fn edit_seeds_buffer_with_initial_text() {
        let scripts = tempfile::tempdir().unwrap();
        let buffers = tempfile::tempdir().unwrap();
        let script = write_script(scripts.path(), "printf ' more' >> \"$1\"");

        let mut editor = ExternalEditor::new(script).with_temp_dir(buffers.path());
        assert_eq!(editor.edit("seed").unwrap(), "seed more");
    }

    #[test]
    fn failing_editor_still_removes_buffer() {
        let scripts = tempfile::tempdir().unwrap();
        let buffers = tempfile::tempdir().unwrap();
        let script = write_script(scripts.path(), "exit 3");

        let mut editor = ExternalEditor::new(script).with_temp_dir(buffers.path());
        let err = editor.edit("seed").unwrap_err();

        assert!(matches!(err, EditorError::ExitStatus { .. }));
        assert_eq!(buffer_count(buffers.path()), 0);
    }

    #[test]
    fn missing_editor_program_is_a_launch_error() {
        let buffers = tempfile::tempdir().unwrap();
        let mut editor =
            ExternalEditor::new("/nonexistent/wip-editor").with_temp_dir(buffers.path());
        let err = editor.edit("seed").unwrap_err();

        assert!(matches!(err, EditorError::Launch { .. }));
        assert_eq!(buffer_count(buffers.path()), 0);
    }

    #[test]
    fn blank_command_is_rejected() {
        let mut editor = ExternalEditor::new("   ");
        assert!(matches!(
            editor.edit("x").unwrap_err(),
            EditorError::EmptyCommand
        ));
    }
}
