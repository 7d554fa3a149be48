use crate::engine::Strategy;

/// Errors raised while configuring the hash engine.
///
/// Hashing itself never fails; these only surface when a caller asks for a
/// specific transform strategy.
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// The name matches no [`Strategy`].
    #[error("unknown SHA-256 implementation: {0}")]
    UnknownStrategy(String),

    /// The CPU lacks an instruction set the strategy needs.
    #[error("SHA-256 implementation {0} is not supported by this CPU")]
    Unsupported(Strategy),

    /// The transforms disagreed with the known-answer vectors.
    #[error("SHA-256 self-test failed for {0}")]
    SelfTestFailed(&'static str),
}
