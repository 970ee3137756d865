/// Errors produced by the `keel-core` crate.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CoreError {
    /// An operational fault was given a status outside the HTTP error range.
    #[error("invalid fault status {status}: must be in [400, 599]")]
    InvalidStatus { status: u16 },
}
