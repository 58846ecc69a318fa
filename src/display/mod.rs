//! External consumption formats for evaluated graphs.
pub mod serialize;
pub mod trace;

pub use serialize::{serialize_for_display, EdgeView, GraphView, NodeType, NodeView};
pub use trace::format_trace;
