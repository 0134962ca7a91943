#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod geometry;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod text_metrics;

pub use config::{LayoutConfig, load_config};
pub use ir::{DiagramBuilder, DiagramInput, ModelError, ReactionDiagram};
pub use layout::{compute_layout, compute_layout_default};
pub use text_metrics::{ApproximateMetrics, FontMetrics, TextMeasure};

#[cfg(feature = "cli")]
pub use cli::run;
