use std::net::Ipv4Addr;
use std::time::Duration;

use crate::expiration::ExpirationSet;

/// Throttles repeated registrations from the same source `(ip, port)` within
/// a fixed window. Registration handlers consult this before doing any real
/// parsing work; query handlers and unregistration never do.
pub struct RecentEndpointFilter {
    seen: ExpirationSet<(Ipv4Addr, u16)>,
}

impl RecentEndpointFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            seen: ExpirationSet::new(window),
        }
    }

    /// Returns `true` if `(ip, port)` was already seen within the window —
    /// the caller should drop the packet without processing it further.
    /// Otherwise records the endpoint and returns `false`.
    pub fn check_and_record(&mut self, ip: Ipv4Addr, port: u16) -> bool {
        if self.seen.contains(&(ip, port)) {
            return true;
        }
        self.seen.add((ip, port));
        false
    }
}
