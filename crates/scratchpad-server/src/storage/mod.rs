mod file;

pub use file::FileContentStore;
