use crate::credentials::AuthMethod;
use clap::Parser;

/// Harvest naming contexts and account names from an AD-style directory.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Target host (domain controller address)
    #[arg(short = 'i', long)]
    pub dc_ip: String,

    /// Explicit LDAP port; skips transport negotiation and assumes plaintext
    #[arg(long)]
    pub port: Option<u16>,

    /// Account domain
    #[arg(short, long)]
    pub domain: String,

    /// Account name
    #[arg(short, long)]
    pub username: String,

    /// Account password
    #[arg(short, long)]
    pub password: Option<String>,

    /// NTLM hashes, `LM:NT` or bare NT
    #[arg(short = 'H', long)]
    pub hashes: Option<String>,

    /// AES key for Kerberos authentication
    #[arg(long)]
    pub aes_key: Option<String>,

    /// Authenticate with a simple bind instead of NTLM
    #[arg(long)]
    pub simple_bind: bool,

    /// Authenticate with Kerberos (GSS-SPNEGO)
    #[arg(short = 'k', long)]
    pub kerberos: bool,

    /// Debug verbosity (repeat for more)
    #[arg(long, action = clap::ArgAction::Count)]
    pub debug: u8,
}

impl Args {
    /// Kerberos wins over simple bind; NTLM is the default.
    pub fn auth_method(&self) -> AuthMethod {
        if self.kerberos {
            AuthMethod::Kerberos
        } else if self.simple_bind {
            AuthMethod::Simple
        } else {
            AuthMethod::Ntlm
        }
    }
}
