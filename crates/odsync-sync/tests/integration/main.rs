//! Integration tests for the sync engine against an in-memory drive

mod test_engine;
mod test_upload;
mod test_upload_session;
