//! Boundary to the external Kerberos ticket machinery.
//!
//! Ticket acquisition itself (the KDC exchange) happens outside this crate:
//! the GSSAPI layer picks the credential up from the cache named by
//! `KRB5CCNAME` (or the platform default) and wraps it into the SPNEGO token
//! carried by the SASL bind. This module only locates the cache and drives
//! the bind.

use crate::credentials::Credentials;
#[cfg(not(target_os = "macos"))]
use crate::debug::debug_log;
use crate::error::ReconError;
use crate::target::Target;
use ldap3::{LdapConn, LdapResult};

const RC_INVALID_CREDENTIALS: u32 = 49;

pub fn configured_ccache() -> Option<String> {
    std::env::var("KRB5CCNAME").ok()
}

/// rc 0 passes, and so does rc 49: the common bind check turns that one into
/// the invalid-credentials failure shared by every mechanism. Anything else
/// is a mechanism-level rejection carrying the raw response.
fn classify_sasl_result(result: LdapResult) -> Result<LdapResult, ReconError> {
    match result.rc {
        0 | RC_INVALID_CREDENTIALS => Ok(result),
        _ => Err(ReconError::KerberosBind { result }),
    }
}

/// GSS-SPNEGO SASL bind against an already-open connection. The target host
/// doubles as the KDC address. Exactly one SASL round trip is expected; a
/// non-zero result is fatal and carries the raw response for diagnostics.
#[cfg(not(target_os = "macos"))]
pub fn sasl_spnego_bind(
    conn: &mut LdapConn,
    target: &Target,
    credentials: &Credentials,
) -> Result<LdapResult, ReconError> {
    match configured_ccache() {
        Some(ccache) => debug_log(2, format!("Using credential cache {ccache}")),
        None => debug_log(
            1,
            "KRB5CCNAME is not set, relying on the default credential cache",
        ),
    }
    debug_log(
        1,
        format!(
            "SASL GSS-SPNEGO bind to {} as {}@{} (KDC {})",
            target.remote, credentials.username, credentials.domain, target.remote
        ),
    );

    let result = conn.sasl_gssapi_bind(&target.remote)?;
    classify_sasl_result(result)
}

#[cfg(target_os = "macos")]
pub fn sasl_spnego_bind(
    _conn: &mut LdapConn,
    _target: &Target,
    _credentials: &Credentials,
) -> Result<LdapResult, ReconError> {
    Err(ReconError::Ldap(ldap3::LdapError::Io {
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "kerberos authentication is not supported on this platform",
        ),
    }))
}
