//! # imgpost
//!
//! Takes a captured bitmap, turns it upright, encodes it, stores it at a
//! fixed location on disk and posts the stored file to an HTTP endpoint as
//! `multipart/form-data`.
//!
//! # Architecture: Save, Then Upload
//!
//! ```text
//! 1. Orient   CapturedImage  →  upright pixels     (transform)
//! 2. Save     pixels         →  <dir>/cache/IMG.jpeg (encoder + persist)
//! 3. Upload   stored file    →  POST response body (upload)
//! ```
//!
//! The upload always reads the file back from disk rather than reusing the
//! encoded bytes, so what the server receives is exactly what is stored.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`capture`] | The input: pixels plus the orientation they were captured in |
//! | [`imaging`] | Rotation, format and quality types; rotate; encode to JPEG/WEBP/PNG |
//! | [`persist`] | Fixed-path resolution and atomic replace of the stored image |
//! | [`upload`] | Multipart body construction and the blocking HTTP uploader |
//! | [`pipeline`] | Sequencing of save and upload, with the save-failure policy |
//! | [`cancel`] | Cooperative cancellation flag shared with a worker thread |
//! | [`config`] | `imgpost.toml` loading, merging onto stock defaults, validation |
//! | [`error`] | Error classes shared by every module's error enum |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## One File Per Directory
//!
//! Whatever name the caller asks for, the image lands at
//! `<parent>/<cache_dir>/<file_name>`. Downstream consumers poll a single
//! well-known path. Writes go to a temporary file in the same directory and
//! are renamed over the target, so a reader never sees a half-written image
//! and concurrent saves resolve to the last rename.
//!
//! ## Blocking I/O
//!
//! There is no async runtime. The pipeline runs on whatever thread calls
//! it, and long uploads are interrupted through a [`cancel::CancelToken`]
//! that the body reader checks between chunks.
//!
//! ## Fixed Wire Format
//!
//! The multipart body is rendered by hand rather than with a form builder,
//! because receivers depend on its exact layout (boundary shape, part order,
//! the `image/jpeg` label on the file part).

pub mod cancel;
pub mod capture;
pub mod config;
pub mod error;
pub mod imaging;
pub mod output;
pub mod persist;
pub mod pipeline;
pub mod upload;
