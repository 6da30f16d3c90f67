/// Engine configuration, built once at startup and passed into each table
/// constructor. Values are read-only for the life of the process.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// The size of a page in bytes.
    pub page_size: usize,

    /// The minimum a node must be filled before it is consolidated.
    pub min_fill_percent: f32,

    /// The maximum a node can be filled before it is split.
    pub max_fill_percent: f32,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            page_size: page_size::get(),
            min_fill_percent: 0.5,
            max_fill_percent: 0.95,
        }
    }
}

impl Options {
    pub fn new(page_size: usize, min_fill_percent: f32, max_fill_percent: f32) -> Self {
        Self {
            page_size,
            min_fill_percent,
            max_fill_percent,
        }
    }

    /// Bytes a node must hold to not be consolidated.
    pub fn min_threshold(&self) -> f32 {
        self.min_fill_percent * self.page_size as f32
    }

    /// Bytes a node may hold before it is split.
    pub fn max_threshold(&self) -> f32 {
        self.max_fill_percent * self.page_size as f32
    }
}
