pub mod completions;
pub mod members;
pub mod tap;
