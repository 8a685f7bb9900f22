use crate::error::ReconError;

/// How the bind is performed. Chosen by the caller, never auto-detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMethod {
    Simple,
    #[default]
    Ntlm,
    Kerberos,
}

/// Account material for one session. Immutable once built.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub domain: String,
    pub username: String,
    pub password: Option<String>,
    pub nt_hash: Option<String>,
    /// Consumed by the external ticket tooling when priming the credential
    /// cache; the GSSAPI bind path itself never reads it.
    pub aes_key: Option<String>,
    pub method: AuthMethod,
}

impl Credentials {
    pub fn new(
        domain: &str,
        username: &str,
        password: Option<String>,
        hashes: Option<&str>,
        aes_key: Option<String>,
        method: AuthMethod,
    ) -> Result<Self, ReconError> {
        let nt_hash = hashes.map(parse_nt_hash).transpose()?;
        Ok(Credentials {
            domain: domain.to_string(),
            username: username.to_string(),
            password,
            nt_hash,
            aes_key,
            method,
        })
    }

    /// Down-level logon name, `DOMAIN\user`.
    pub fn bind_name(&self) -> String {
        format!("{}\\{}", self.domain, self.username)
    }

    /// The secret handed to the bind: password when present, NT hash
    /// otherwise.
    pub fn authentication_secret(&self) -> &str {
        self.password
            .as_deref()
            .or(self.nt_hash.as_deref())
            .unwrap_or("")
    }
}

/// Accepts `LM:NT` or a bare NT hash and keeps only the NT half.
pub fn parse_nt_hash(hashes: &str) -> Result<String, ReconError> {
    let nt = hashes.rsplit(':').next().unwrap_or(hashes);
    if nt.len() != 32 || hex::decode(nt).is_err() {
        return Err(ReconError::InvalidNtHash(hashes.to_string()));
    }
    Ok(nt.to_ascii_lowercase())
}
