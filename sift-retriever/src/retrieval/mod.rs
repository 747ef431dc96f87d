pub mod change_tracker;
pub mod chunker;
pub mod engine;
pub mod vector_index;
