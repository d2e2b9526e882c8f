//! User-facing notifications
use std::sync::Mutex;

/// Something the user has to acknowledge
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    UploadSucceeded,
    UploadFailed,
    LoginFailed(String),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::UploadSucceeded => "Upload successful!".to_string(),
            Notice::UploadFailed => "Upload failed!".to_string(),
            Notice::LoginFailed(reason) => format!("Login failed: {}", reason),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to stderr
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notice: Notice) {
        eprintln!("{}", notice.message());
    }
}

/// Keeps every notice in memory
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|notices| notices.clone())
            .unwrap_or_default()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice);
        }
    }
}
