use std::sync::Arc;

use crate::mailer::Mailer;
use crate::payments::PaymentGateway;
use crate::store::Db;

/// Shared application state, constructed once in `main` and cloned into
/// every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub gateway: Arc<PaymentGateway>,
    pub mailer: Arc<dyn Mailer>,
    pub jwt_secret: Arc<str>,
    pub frontend_url: Arc<str>,
}
