/// Transport security settled on for a target.
///
/// `Unknown` covers two states on purpose: negotiation has not run yet, or the
/// caller pinned a port and negotiation was skipped entirely. In the second
/// case the channel stays `Unknown` for the whole session and every
/// connection goes out plaintext on the pinned port, whatever the service
/// actually requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsChannel {
    #[default]
    Unknown,
    Tls12,
    Tls11,
    Plaintext,
}

impl TlsChannel {
    pub fn is_encrypted(self) -> bool {
        matches!(self, TlsChannel::Tls12 | TlsChannel::Tls11)
    }
}

/// A remote directory service. Written once by transport negotiation (unless
/// the caller supplied a port), read-only for every operation afterwards.
#[derive(Debug, Clone)]
pub struct Target {
    pub remote: String,
    pub method_port: Option<u16>,
    pub tls: TlsChannel,
}

impl Target {
    pub fn new(remote: &str, port: Option<u16>) -> Self {
        Target {
            remote: remote.to_string(),
            method_port: port,
            tls: TlsChannel::Unknown,
        }
    }

    pub fn use_tls(&self) -> bool {
        self.tls.is_encrypted()
    }
}
