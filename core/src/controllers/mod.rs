pub mod busy;
pub mod gallery;
pub mod generation;
pub mod traffic;
pub mod upload;

pub use busy::{BusyFlag, BusyGuard};
pub use gallery::{GalleryController, GallerySource, GalleryState};
pub use generation::{Generation, Stamped};
pub use traffic::{FetchOutcome, RefreshReport, TrafficController, TrafficMount, TrafficState};
pub use upload::{UploadController, UploadState};
