//! A client for uploading files to object storage through a signed URL backend.
//!
//! The flow has two halves.  A [`Session`] holds the identity the user signed
//! in with and persists it between runs.  An [`UploadWorkflow`] holds the
//! selected file and drives the upload:
//!
//! 1. ask the backend for a signed file URL and a signed metadata URL
//! 2. `PUT` the raw file to the file URL
//! 3. `PUT` a small JSON document (location, timestamp, filename) to the
//!    metadata URL
//!
//! [`Session`]: crate::session::Session
//! [`UploadWorkflow`]: crate::workflow::UploadWorkflow
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! let config = AppConfig::from_env();
//! let store = Arc::new(FileSessionStore::new(&config.data_dir));
//! let session = Session::restore(store);
//!
//! if select_view(&config, &session) == View::Uploader {
//!     let client = UploadClient::from_config(&config)
//!         .with_credential(session.credential().map(str::to_string));
//!
//!     let mut workflow = UploadWorkflow::new();
//!     workflow.select(SelectedFile::open("photo.png")?);
//!     workflow.set_location("greenhouse 3");
//!     workflow.upload(&client, &ConsoleNotifier).await;
//! }
//! ```
//!
//! The backend itself is not part of this crate.  Anything that speaks the
//! same contract can be plugged in by implementing [`UploadApi`].
//!
//! [`UploadApi`]: crate::client::UploadApi

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod file;
pub mod notify;
pub mod session;
pub mod workflow;
