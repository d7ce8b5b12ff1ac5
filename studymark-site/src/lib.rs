pub mod error;
pub mod manifest;
pub mod resolver;
pub mod source;

pub use error::SiteError;
pub use manifest::{DocumentDescriptor, Manifest, default_documents, format_title};
pub use resolver::{
    BuiltinStrategy, FileListStrategy, ManifestResolver, ManifestStrategy, Resolution,
    ResolutionSource, ResolutionStrategy,
};
pub use source::{DirectorySource, HttpSource, SiteSource, open_source};
