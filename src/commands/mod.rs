pub mod ask;
pub mod embed;
pub mod ingest;
pub mod init;
pub mod status;
