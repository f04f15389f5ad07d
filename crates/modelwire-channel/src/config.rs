use modelwire_frame::FrameConfig;

/// Channel behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct ChannelConfig {
    /// Framing limits. `frame.max_msg_size` is the channel's maximum
    /// message size.
    pub frame: FrameConfig,
    /// Prefix of generated message and request ids. Defaults to `msg`.
    pub id_prefix: Option<String>,
}

impl ChannelConfig {
    pub(crate) fn id_prefix(&self) -> &str {
        self.id_prefix.as_deref().unwrap_or("msg")
    }
}
