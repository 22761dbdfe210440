use tokio::sync::Mutex;

use crate::config::AdminConfig;
use crate::login::brute_force::AttemptTracker;

pub struct AppState {
    pub login_tracker: Mutex<AttemptTracker>,
    pub admin_config: AdminConfig,
}
