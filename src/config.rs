//! Configuration handling for tablestream

/// Layout of encoded documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputStyle {
    #[default]
    Compact,
    Pretty,
}

impl std::str::FromStr for OutputStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(OutputStyle::Compact),
            "pretty" => Ok(OutputStyle::Pretty),
            _ => Err(format!("Unknown output style: {}", s)),
        }
    }
}

/// Configuration for encode operations
#[derive(Debug, Clone)]
pub struct Config {
    /// Output layout
    pub style: OutputStyle,
    /// Flush the sink after each table's columns and after each table
    pub flush_at_boundaries: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            style: OutputStyle::default(),
            flush_at_boundaries: true,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set output style
    pub fn with_style(mut self, style: OutputStyle) -> Self {
        self.style = style;
        self
    }

    /// Enable or disable flushing at structural boundaries
    pub fn with_flush_at_boundaries(mut self, flush: bool) -> Self {
        self.flush_at_boundaries = flush;
        self
    }
}
