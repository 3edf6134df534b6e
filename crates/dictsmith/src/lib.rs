pub mod builder;
pub mod fetch;
pub mod manifest;

pub use builder::{BuildError, SourceCorpus, build_all, build_dict};
pub use fetch::{CorpusFetcher, FetchError};
pub use manifest::{BuildJob, ManifestError, load_manifest, parse_manifest};
