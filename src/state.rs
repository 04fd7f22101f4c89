use std::sync::Arc;

use crate::auth::{PasswordHasher, SessionManager};
use crate::images::ImageStore;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub sessions: Arc<SessionManager>,
    pub passwords: PasswordHasher,
    pub images: Arc<ImageStore>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        sessions: Arc<SessionManager>,
        passwords: PasswordHasher,
        images: Arc<ImageStore>,
    ) -> Self {
        Self {
            store,
            sessions,
            passwords,
            images,
        }
    }
}
