/// Generic configuration for initializing a real-time session with any provider.
/// Replies are always text-only and their length is left to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericSessionConfig {
    pub instructions: String,
    pub temperature: f64,
}

/// The content of one outbound turn, before it is mapped onto a provider's
/// wire format. A provider sends it as a content message followed by a
/// response trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericTurn {
    /// Text placed in the user content message.
    pub content: String,
    /// Instructions overriding the session's for this response only.
    pub instructions: Option<String>,
}
