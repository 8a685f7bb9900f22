use ldap3::{LdapError, LdapResult};
use thiserror::Error;

/// Failure taxonomy of the directory layer. Nothing here is retried; the
/// driver prints the message and exits with `exit_code`.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("impossible to communicate with the target {remote} !")]
    TransportUnavailable { remote: String },

    #[error("invalid credentials !")]
    InvalidCredentials,

    #[error("can't connect using NTLM, try with --simple-bind")]
    MechanismRejected,

    #[error("kerberos SASL bind rejected: {result:?}")]
    KerberosBind { result: LdapResult },

    #[error("malformed directory response: expected {expected} {attribute} values, got {got}")]
    MalformedResponse {
        attribute: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("invalid NT hash `{0}`")]
    InvalidNtHash(String),

    #[error(transparent)]
    Ldap(#[from] LdapError),

    #[error(transparent)]
    Tls(#[from] native_tls::Error),
}

impl ReconError {
    pub fn exit_code(&self) -> i32 {
        match self {
            ReconError::TransportUnavailable { .. } => 2,
            ReconError::InvalidCredentials => 3,
            ReconError::MechanismRejected => 4,
            ReconError::KerberosBind { .. } => 5,
            ReconError::MalformedResponse { .. } => 6,
            _ => 1,
        }
    }
}
