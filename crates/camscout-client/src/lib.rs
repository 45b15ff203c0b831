pub mod transport;
pub mod writer;

pub use transport::ReqwestTransport;
pub use writer::{JsonFileSink, read_dataset};
