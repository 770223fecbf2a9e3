use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};

/// Where the tool's output goes: always stdout, plus the `--log` file when one is given.
///
/// Log events and the `--json` run reports share the file, so a saved log holds the
/// whole run.
pub(crate) struct OutputSinks {
    file: Option<File>,
}

impl OutputSinks {
    pub(crate) fn open(path: Option<&Path>) -> io::Result<Self> {
        let file = path.map(File::create).transpose()?;
        Ok(Self { file })
    }

    /// Writer for the tracing subscriber. The file side is line-buffered so every event
    /// reaches disk as a whole line.
    pub(crate) fn event_writer(&self) -> io::Result<BoxMakeWriter> {
        Ok(match &self.file {
            Some(file) => {
                let file = Mutex::new(LineWriter::new(file.try_clone()?));
                BoxMakeWriter::new(io::stdout.and(file))
            }
            None => BoxMakeWriter::new(io::stdout),
        })
    }

    /// Print rendered run reports and append them to the log file.
    pub(crate) fn emit_reports(&self, rendered: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{rendered}")?;
        stdout.flush()?;
        if let Some(mut file) = self.file.as_ref() {
            writeln!(file, "{rendered}")?;
            file.flush()?;
        }
        Ok(())
    }
}
