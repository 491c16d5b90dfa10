//! Writers that serialize finished roots as they arrive.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};

use crate::{cli::OutputFormat, io_utils, item::Item, yaml_provider};

pub struct RootWriter {
    sink: Box<dyn Write>,
    format: OutputFormat,
    written: usize,
}

impl RootWriter {
    pub fn new(sink: Box<dyn Write>, format: OutputFormat) -> Self {
        RootWriter {
            sink,
            format,
            written: 0,
        }
    }

    /// Opens `path`, or stdout for `None` / `-`.
    pub fn open(path: Option<&Path>, format: OutputFormat) -> Result<Self> {
        let sink: Box<dyn Write> = match path {
            Some(p) if !io_utils::is_dash(p) => Box::new(BufWriter::new(
                File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
            )),
            _ => Box::new(std::io::stdout()),
        };
        Ok(RootWriter::new(sink, format))
    }

    pub fn write_root(&mut self, root: Item) -> Result<()> {
        match self.format {
            OutputFormat::Jsonl => {
                serde_json::to_writer(&mut self.sink, &root).context("Writing root as JSON")?;
                self.sink.write_all(b"\n")?;
            }
            OutputFormat::Json => {
                self.sink
                    .write_all(if self.written == 0 { b"[\n" } else { b",\n" })?;
                serde_json::to_writer_pretty(&mut self.sink, &root)
                    .context("Writing root as JSON")?;
            }
            OutputFormat::Yaml => {
                // One-element sequences concatenate into a single YAML sequence.
                let rendered = yaml_provider::to_string(&[root])?;
                self.sink.write_all(rendered.as_bytes())?;
            }
        }
        self.written += 1;
        Ok(())
    }

    /// Closes any open document and flushes. Returns the number of roots written.
    pub fn finish(mut self) -> Result<usize> {
        match self.format {
            OutputFormat::Jsonl => {}
            OutputFormat::Json if self.written == 0 => self.sink.write_all(b"[]\n")?,
            OutputFormat::Json => self.sink.write_all(b"\n]\n")?,
            OutputFormat::Yaml if self.written == 0 => self.sink.write_all(b"[]\n")?,
            OutputFormat::Yaml => {}
        }
        self.sink.flush().context("Flushing output")?;
        Ok(self.written)
    }
}
