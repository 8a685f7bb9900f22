pub mod args;
pub mod credentials;
pub mod debug;
pub mod error;
pub mod kerberos;
pub mod ldap;
pub mod target;
pub mod transport;
