//! Selecting, previewing and uploading a single file
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use chrono::{SecondsFormat, Utc};
use tracing::{debug, info, warn};

use crate::{
    client::{SignedUrlRequest, UploadApi, UploadMetadata},
    error::{CactusError, Result},
    file::{Preview, SelectedFile},
    notify::{Notice, Notifier},
};

/// How an upload attempt ended
#[derive(Debug)]
pub enum UploadOutcome {
    /// Nothing was sent because no file was selected or an upload was in flight
    Skipped,
    Succeeded,
    /// One of the steps failed.  Earlier steps are not rolled back.
    Failed(CactusError),
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Succeeded)
    }
}

/// A read-only view of the uploading flag that outlives borrows of the form,
/// e.g. for a spinner while `upload` holds the workflow.
#[derive(Clone, Debug)]
pub struct UploadingHandle(Arc<AtomicBool>);

impl UploadingHandle {
    pub fn is_uploading(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Sets the uploading flag for its lifetime.  Dropping the upload future
/// part way through still clears the flag.
struct UploadingGuard(Arc<AtomicBool>);

impl UploadingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag.clone())
    }
}

impl Drop for UploadingGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The uploader form.
///
/// Tracks at most one selected file.  While an upload is in flight every
/// mutating operation is ignored.
#[derive(Debug, Default)]
pub struct UploadWorkflow {
    file: Option<SelectedFile>,
    preview: Option<Preview>,
    location: String,
    uploading: Arc<AtomicBool>,
    zoom_open: bool,
}

impl UploadWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(&self) -> Option<&SelectedFile> {
        self.file.as_ref()
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn is_uploading(&self) -> bool {
        self.uploading.load(Ordering::SeqCst)
    }

    pub fn uploading_handle(&self) -> UploadingHandle {
        UploadingHandle(self.uploading.clone())
    }

    pub fn is_zoom_open(&self) -> bool {
        self.zoom_open
    }

    /// Replaces the selected file.  Returns false when ignored.
    pub fn select(&mut self, file: SelectedFile) -> bool {
        if self.is_uploading() {
            return false;
        }
        debug!(name = %file.name(), content_type = %file.content_type(), "file selected");
        self.preview = Some(Preview::for_file(&file));
        self.file = Some(file);
        self.zoom_open = false;
        true
    }

    /// Drops the selected file and its preview.  Returns false when ignored.
    pub fn remove(&mut self) -> bool {
        if self.is_uploading() {
            return false;
        }
        self.clear_selection();
        true
    }

    pub fn set_location(&mut self, location: impl Into<String>) -> bool {
        if self.is_uploading() {
            return false;
        }
        self.location = location.into();
        true
    }

    /// Opens the zoomed preview.  Only images can be zoomed.
    pub fn open_zoom(&mut self) -> bool {
        self.zoom_open = self
            .preview
            .as_ref()
            .map(Preview::is_zoomable)
            .unwrap_or(false);
        self.zoom_open
    }

    pub fn close_zoom(&mut self) {
        self.zoom_open = false;
    }

    pub fn can_submit(&self) -> bool {
        self.file.is_some() && !self.is_uploading()
    }

    fn clear_selection(&mut self) {
        self.file = None;
        self.preview = None;
        self.zoom_open = false;
    }

    /// Runs the signed URL handoff for the selected file.
    ///
    /// Each step is awaited before the next one starts.  On success the form
    /// is reset; on failure the file stays selected so it can be retried.
    pub async fn upload(&mut self, api: &dyn UploadApi, notifier: &dyn Notifier) -> UploadOutcome {
        let file = match (&self.file, self.is_uploading()) {
            (Some(file), false) => file.clone(),
            _ => return UploadOutcome::Skipped,
        };

        let guard = UploadingGuard::acquire(&self.uploading);
        let result = Self::transfer(api, &file, &self.location).await;
        drop(guard);

        match result {
            Ok(()) => {
                info!(name = %file.name(), "upload complete");
                notifier.notify(Notice::UploadSucceeded);
                self.clear_selection();
                UploadOutcome::Succeeded
            }
            Err(err) => {
                warn!(name = %file.name(), %err, "upload failed");
                notifier.notify(Notice::UploadFailed);
                UploadOutcome::Failed(err)
            }
        }
    }

    async fn transfer(api: &dyn UploadApi, file: &SelectedFile, location: &str) -> Result<()> {
        let urls = api
            .get_signed_url(&SignedUrlRequest {
                filename: file.name().to_string(),
                file_type: file.content_type().to_string(),
                location: location.to_string(),
            })
            .await?;

        let body = file.read().await?;
        api.put_file(&urls.url, body, file.content_type()).await?;

        match urls.metadata_url {
            Some(metadata_url) => {
                let metadata = UploadMetadata {
                    location: location.to_string(),
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                    filename: file.name().to_string(),
                };
                api.put_metadata(&metadata_url, &metadata).await
            }
            None => {
                debug!("backend issued no metadata url");
                Ok(())
            }
        }
    }
}
