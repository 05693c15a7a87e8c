//! External collaborators: remote store, media host, and the pipelines
//! built on them

pub mod media_host;
pub mod media_pipeline;
pub mod media_sync;
pub mod remote_store;

pub use media_host::{CloudinaryHost, MediaError, MediaHost, UploadedMedia};
pub use media_pipeline::{ImageSource, MediaLimits, MediaPipeline, ProcessedImage};
pub use media_sync::{DeletionNotice, MediaSync, SweepReport};
pub use remote_store::{PostgrestStore, RemoteStore, StoreError};
