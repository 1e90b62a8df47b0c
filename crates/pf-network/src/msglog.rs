//! The per-project status log reproduced in the report file.

/// An append-only line buffer. Engines write status messages here; the
/// report writer copies them out verbatim.
#[derive(Debug, Clone, Default)]
pub struct MsgLog {
    lines: Vec<String>,
}

impl MsgLog {
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl std::fmt::Display for MsgLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for line in &self.lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
