/// Lifecycle of the streaming session. Transport errors land in `Disconnected`
/// and go through the same reconnect path as a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    AwaitingAuth,
    Subscribed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::AwaitingAuth => "awaiting-auth",
            ConnectionState::Subscribed => "subscribed",
        };
        f.write_str(label)
    }
}
