use std::sync::Arc;

use log::Logger;

use crate::store::Store;

pub type SafeStore = dyn Store + Send + Sync;

/// Everything a request handler needs. Cloning is cheap; all clones
/// share the same store client.
#[derive(Clone)]
pub struct Environment {
    pub logger: Arc<Logger>,
    pub store: Arc<SafeStore>,
}

impl Environment {
    pub fn new(logger: Arc<Logger>, store: Arc<SafeStore>) -> Self {
        Self { logger, store }
    }
}
