use h2p::SettingId;

/// Knobs for one client run. `Default` gives the behaviour of the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// SETTINGS entries advertised after the preface, in order.
    pub settings: Vec<(SettingId, u32)>,
    /// Value of the `user-agent` request header.
    pub user_agent: String,
    /// Largest single read from the socket.
    pub read_chunk_size: usize,
    /// Stream the request is sent on. Client streams are odd.
    pub stream_id: u32,
    /// Also stop receiving once the request stream has ended, instead of
    /// waiting for the peer to close the connection.
    pub stop_on_stream_end: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            settings: vec![
                (SettingId::MaxConcurrentStreams, 100),
                (SettingId::EnablePush, 0),
            ],
            user_agent: concat!("h2p-client/", env!("CARGO_PKG_VERSION")).to_string(),
            read_chunk_size: 4096,
            stream_id: 1,
            stop_on_stream_end: false,
        }
    }
}
