//! Per-iteration trace file output.
//!
//! When a trace file is configured, the solver appends one block per
//! active-set iteration in a MATLAB-ish layout (each quantity indexed by
//! iteration so the file can be sourced for plotting). Tracing is purely
//! diagnostic: a write error disables further output and never affects the
//! solve.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DVector;

/// Buffered append-mode writer that turns itself off on the first error.
#[derive(Debug)]
pub struct TraceWriter {
    out: Option<BufWriter<File>>,
}

impl TraceWriter {
    /// Truncate `path` and open it for appending.
    pub fn create(path: &Path) -> Self {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path);
        match file {
            Ok(f) => Self {
                out: Some(BufWriter::new(f)),
            },
            Err(e) => {
                log::warn!("trace file {} could not be opened: {e}", path.display());
                Self { out: None }
            }
        }
    }

    pub fn writeln(&mut self, line: std::fmt::Arguments<'_>) {
        if let Some(out) = self.out.as_mut() {
            if writeln!(out, "{line}").is_err() {
                log::warn!("trace output failed; disabling tracing");
                self.out = None;
            }
        }
    }

    /// Write `name(:,col) = [ ... ]';`
    pub fn write_vector(&mut self, name: &str, col: usize, v: &DVector<f64>) {
        if self.out.is_none() {
            return;
        }
        let mut line = format!("{name}(:,{col}) = [ ");
        for k in 0..v.len() {
            line.push_str(&format!("{:.15e} ", v[k]));
        }
        line.push_str("]';");
        self.writeln(format_args!("{line}"));
    }

    /// Write an integer-valued array in the same layout.
    pub fn write_codes(&mut self, name: &str, col: usize, codes: &[usize]) {
        if self.out.is_none() {
            return;
        }
        let mut line = format!("{name}(:,{col}) = [ ");
        for c in codes {
            line.push_str(&format!("{c} "));
        }
        line.push_str("]';");
        self.writeln(format_args!("{line}"));
    }

    pub fn flush(&mut self) {
        if let Some(out) = self.out.as_mut() {
            let _ = out.flush();
        }
    }
}
