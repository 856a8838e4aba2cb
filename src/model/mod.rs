//! Native SVG document model exposed to scripts through the bridge.

mod arena;
mod document;
mod parse;
mod serialize;
mod types;
mod values;

pub use arena::NativeHandle;
pub use document::{
    Document, ElementData, EventData, ModelError, ModelResult, MouseData, NodeContent,
};
pub use types::{NativeType, SVG_NAMESPACE};
pub use values::{
    format_declarations, parse_declarations, Length, LengthUnit, Matrix, Point, RectValue,
};
