pub mod reader;
pub mod renamer;
pub mod writer;

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFile;
