pub mod media_storage;
