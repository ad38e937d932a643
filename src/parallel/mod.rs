pub mod batch;
pub mod pool;

pub use batch::parse_files;
pub use pool::WorkerPool;
