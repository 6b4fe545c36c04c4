pub mod errors;
pub mod fetcher;
pub mod retry;


pub use errors::FetchError;
pub use fetcher::{Endpoint, JsonFetcher};
pub use retry::RetryPolicy;
