pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    edge_line, error, header, info, muted, phase, section, status, success, summary_row,
    timing, vertex_line, warn,
};
pub use progress::{IngestProgress, Spinner};
pub use table::{stats_table, TableBuilder};
pub use theme::{theme, Theme};
