//! Vendor client implementations

pub mod gallery;

// Re-export for convenience
pub use gallery::{
  GalleryApi, GalleryChatReq, GalleryChatResp, HttpGalleryClient,
  LoggingStreamCallback, StreamCallback,
};
