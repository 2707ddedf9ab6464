use serde::Deserialize;
use serde::Serialize;

/// Bearer secrets, one per role boundary
///
/// The controller accepts `admin_secret` and `controller_secret`; the worker
/// accepts `worker_secret` and `client_secret`. Agents present
/// `controller_secret` to the controller and `worker_secret` to the worker.
/// An empty secret never authenticates anyone.
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub admin_secret: String,

    #[serde(default)]
    pub controller_secret: String,

    #[serde(default)]
    pub worker_secret: String,

    #[serde(default)]
    pub client_secret: String,
}
