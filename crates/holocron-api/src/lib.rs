pub mod error;
pub mod proxy;
pub mod traits;

pub use error::MetadataError;
pub use proxy::ProxyClient;
pub use traits::{MetadataService, MovieDetails, ResolveQuery, Resolved};
