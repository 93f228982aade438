//! Concrete algorithms

mod event_builder_filter;
mod z_vertex_filter;

pub use event_builder_filter::EventBuilderFilter;
pub use z_vertex_filter::ZVertexFilter;
