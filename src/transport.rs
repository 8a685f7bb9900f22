//! Finds a usable (port, transport-security) pair for a target.
//!
//! Candidates are probed in a fixed order: TLS1.2 on 636, TLS1.1 on 636,
//! plaintext on 389. The first usable one wins and is written back into the
//! [`Target`]. A caller-pinned port skips probing altogether.

use crate::debug::debug_log;
use crate::error::ReconError;
use crate::target::{Target, TlsChannel};
use ldap3::{LdapConn, LdapConnSettings, LdapError, LdapResult};
use native_tls::{Protocol, TlsConnector};
use std::time::Duration;

pub const LDAPS_PORT: u16 = 636;
pub const LDAP_PORT: u16 = 389;
const CONNECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub port: u16,
    pub channel: TlsChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// The service answered, or at least accepted the handshake before the
    /// channel died. Either way the transport carries LDAP.
    Usable,
    /// The socket or TLS handshake could not be established at all.
    HandshakeFailed,
}

pub fn negotiate(target: &mut Target) -> Result<(), ReconError> {
    negotiate_with(target, probe)
}

/// Probe seam: `probe` is the single network touchpoint, injected so the
/// fallback order and stop-at-first-success behavior can be exercised
/// without a live server.
pub fn negotiate_with<F>(target: &mut Target, mut probe: F) -> Result<(), ReconError>
where
    F: FnMut(&Target, Candidate) -> ProbeOutcome,
{
    if target.method_port.is_some() {
        // Caller pinned the port: no probing, the channel stays Unknown and
        // every connection goes out plaintext.
        debug_log(1, "Port supplied by caller, skipping transport negotiation");
        return Ok(());
    }

    let candidates = [
        Candidate {
            port: LDAPS_PORT,
            channel: TlsChannel::Tls12,
        },
        Candidate {
            port: LDAPS_PORT,
            channel: TlsChannel::Tls11,
        },
        Candidate {
            port: LDAP_PORT,
            channel: TlsChannel::Plaintext,
        },
    ];

    for candidate in candidates {
        if candidate.channel == TlsChannel::Plaintext {
            debug_log(1, "LDAPS failed, trying with LDAP.");
        }
        if probe(target, candidate) == ProbeOutcome::Usable {
            target.method_port = Some(candidate.port);
            target.tls = candidate.channel;
            return Ok(());
        }
    }

    Err(ReconError::TransportUnavailable {
        remote: target.remote.clone(),
    })
}

fn probe(target: &Target, candidate: Candidate) -> ProbeOutcome {
    debug_log(
        1,
        format!(
            "Probing {}:{} ({:?})",
            target.remote, candidate.port, candidate.channel
        ),
    );

    let settings = match connection_settings(candidate.channel) {
        Ok(settings) => settings,
        Err(e) => {
            debug_log(1, format!("TLS connector setup failed: {e}"));
            return ProbeOutcome::HandshakeFailed;
        }
    };
    let url = ldap_url(&target.remote, candidate.port, candidate.channel);

    let mut conn = match LdapConn::with_settings(settings, &url) {
        Ok(conn) => conn,
        Err(e) => {
            debug_log(2, format!("Handshake with {url} failed: {e}"));
            return ProbeOutcome::HandshakeFailed;
        }
    };

    // Anonymous bind. The result code does not matter, only whether the
    // exchange got far enough to prove the transport carries LDAP.
    classify_bind(conn.simple_bind("", ""))
}

/// AD commonly accepts the handshake and then closes or garbles the channel
/// for anonymous binds; the transport is still usable in that case.
pub fn classify_bind(result: Result<LdapResult, LdapError>) -> ProbeOutcome {
    match result {
        Ok(_) => ProbeOutcome::Usable,
        Err(LdapError::Io { .. }) | Err(LdapError::EndOfStream) => ProbeOutcome::Usable,
        Err(_) => ProbeOutcome::HandshakeFailed,
    }
}

/// Connection settings shared by the probe and the authenticator.
///
/// For TLS channels the protocol version is pinned and certificate
/// validation is disabled, ciphers permissive. Reconnaissance targets rarely
/// present a trustable chain; this is never acceptable client behavior
/// outside that setting.
pub fn connection_settings(channel: TlsChannel) -> Result<LdapConnSettings, native_tls::Error> {
    let mut settings = LdapConnSettings::new()
        .set_conn_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
        .set_no_tls_verify(true);

    let protocol = match channel {
        TlsChannel::Tls12 => Some(Protocol::Tlsv12),
        TlsChannel::Tls11 => Some(Protocol::Tlsv11),
        TlsChannel::Plaintext | TlsChannel::Unknown => None,
    };
    if let Some(protocol) = protocol {
        let connector = TlsConnector::builder()
            .min_protocol_version(Some(protocol))
            .max_protocol_version(Some(protocol))
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()?;
        settings = settings.set_connector(connector);
    }

    Ok(settings)
}

pub fn ldap_url(remote: &str, port: u16, channel: TlsChannel) -> String {
    if channel.is_encrypted() {
        format!("ldaps://{remote}:{port}")
    } else {
        format!("ldap://{remote}:{port}")
    }
}
