pub mod text;
pub mod trend;
