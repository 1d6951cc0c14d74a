pub mod change_detection;
pub mod discovery;
pub mod fingerprint;
pub mod metadata;

pub use change_detection::{ChangeDetector, Ledger, ROOT_KEY};
pub use discovery::{discover_files, has_image_extension, is_hidden, list_directory, DirListing};
pub use fingerprint::fingerprint;
pub use metadata::{extract_metadata, Orientation, PhotoMetadata, SENTINEL_CREATED};
