use std::net::Ipv4Addr;

use thiserror::Error;

/// Fatal errors. Everything else the monitor absorbs locally with a log
/// line and a safe default, so a single bad probe, lookup, or store read
/// never halts the monitoring loop.
#[derive(Debug, Error)]
pub enum LanError {
    #[error("could not determine a local IPv4 address and MAC from any interface")]
    IdentityUnavailable,

    #[error("anchor address {0} has no sweepable /24 range")]
    InvalidAnchor(Ipv4Addr),

    #[error("device registry error: {0}")]
    Registry(#[from] rusqlite::Error),

    #[error("vendor service client could not be built: {0}")]
    VendorClient(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LanError {
    /// Configuration errors abort startup with a distinct exit code.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            LanError::IdentityUnavailable | LanError::InvalidAnchor(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, LanError>;
