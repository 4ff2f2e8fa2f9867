use std::fmt;

/// Why an inbound packet or connection was dropped without any reply.
///
/// Nothing in this crate ever NACKs a malformed peer — every rejection path
/// ends here, and the only difference between reasons is which `tracing`
/// level they're logged at.
#[derive(Debug, Clone, Copy)]
pub enum DropReason {
    Malformed,
    PolicyDenied,
    Unreachable,
    ProtocolViolation,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::Malformed => "malformed input",
            DropReason::PolicyDenied => "policy denied",
            DropReason::Unreachable => "reachability check failed",
            DropReason::ProtocolViolation => "client protocol violation",
        };
        f.write_str(s)
    }
}

/// Logs a drop at the level its category calls for — malformed input is
/// never logged above `debug`, since it's the expected shape of internet
/// noise and not something an operator should be paged for.
pub fn log_drop(reason: DropReason, detail: &str) {
    match reason {
        DropReason::Malformed => tracing::debug!(%reason, detail, "dropping packet"),
        DropReason::PolicyDenied => tracing::info!(%reason, detail, "dropping packet"),
        DropReason::Unreachable => tracing::debug!(%reason, detail, "dropping candidate"),
        DropReason::ProtocolViolation => tracing::debug!(%reason, detail, "closing connection"),
    }
}
