//! Stream I/O and output encoding services

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
