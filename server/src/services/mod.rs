pub mod doc;
pub mod persistence;
