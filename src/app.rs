//! Decides which screen the shell shows
use crate::{config::AppConfig, session::Session};

pub const APP_TITLE: &str = "GCP Cactus AI";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum View {
    /// Only the login affordance is shown
    Login,
    /// The uploader is mounted
    Uploader,
}

/// The uploader is mounted when login is not enforced or a valid session exists
pub fn select_view(config: &AppConfig, session: &Session) -> View {
    if !config.login_required() || session.is_authenticated() {
        View::Uploader
    } else {
        View::Login
    }
}
