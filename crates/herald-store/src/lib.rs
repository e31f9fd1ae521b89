pub mod file_store;

pub use file_store::{FileResultStore, FileStoreFactory, STATE_FILE_NAME};
