use std::time::Duration;

/// Timeouts for the gateway. Loaded by the server binary; the gateway never
/// reads the environment.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Read deadline for each frame before authentication succeeds.
    pub handshake_timeout: Duration,
    /// How long a direct delivery waits for the recipient's ack.
    pub ack_timeout: Duration,
    /// Steady-state read deadline. `None` lets idle connections block forever.
    pub idle_timeout: Option<Duration>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(30),
            ack_timeout: Duration::from_secs(10),
            idle_timeout: None,
        }
    }
}
