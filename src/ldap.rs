//! Authenticated, paginated directory access.
//!
//! Every operation binds a fresh connection: there is no connection reuse,
//! including between pages of one search. Credential-validity failures can
//! therefore surface mid-pagination, not only at the start.

use crate::credentials::{AuthMethod, Credentials};
use crate::debug::debug_log;
use crate::error::ReconError;
use crate::kerberos;
use crate::target::Target;
use crate::transport::{connection_settings, ldap_url};
use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{LdapConn, LdapError, LdapResult, ResultEntry, Scope, SearchEntry, SearchResult};

pub const SAM_NORMAL_USER_ACCOUNT: u32 = 805306368;
pub const SAM_MACHINE_ACCOUNT: u32 = 805306369;

const PAGE_SIZE: i32 = 5000;
const RC_INVALID_CREDENTIALS: u32 = 49;

const SD_FLAGS_CONTROL_OID: &str = "1.2.840.113556.1.4.801";
/// SEQUENCE { INTEGER 7 }: owner (1) + group (2) + DACL (4). Makes the
/// server return security-descriptor attributes to unprivileged readers.
const SD_FLAGS_OWNER_GROUP_DACL: [u8; 5] = [0x30, 0x03, 0x02, 0x01, 0x07];

/// One round trip's worth of results plus the continuation cookie from the
/// paged-results control, if the server sent one.
pub struct SearchPage<E> {
    pub entries: Vec<E>,
    pub cookie: Option<Vec<u8>>,
}

/// Drives `fetch` until the server stops returning a non-empty cookie,
/// concatenating pages strictly in order. An explicit loop, so directories
/// with very many pages cannot exhaust the stack.
pub fn collect_paged<E, F>(mut fetch: F) -> Result<Vec<E>, ReconError>
where
    F: FnMut(Option<Vec<u8>>) -> Result<SearchPage<E>, ReconError>,
{
    let mut entries = Vec::new();
    let mut cookie: Option<Vec<u8>> = None;

    loop {
        let page = fetch(cookie.take())?;
        entries.extend(page.entries);
        match page.cookie {
            Some(next) if !next.is_empty() => cookie = Some(next),
            _ => return Ok(entries),
        }
    }
}

/// The five partitions AD publishes on the root DSE, positionally ordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingContexts {
    pub default: String,
    pub configuration: String,
    pub schema: String,
    pub domain_dns_zones: String,
    pub forest_dns_zones: String,
}

impl NamingContexts {
    pub fn from_entries(entries: &[SearchEntry]) -> Result<Self, ReconError> {
        // An empty response here almost always means the bind silently
        // failed to authenticate.
        let first = entries.first().ok_or(ReconError::InvalidCredentials)?;
        let values = first
            .attrs
            .get("namingContexts")
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        if values.len() < 5 {
            return Err(ReconError::MalformedResponse {
                attribute: "namingContexts",
                expected: 5,
                got: values.len(),
            });
        }
        Ok(NamingContexts {
            default: values[0].clone(),
            configuration: values[1].clone(),
            schema: values[2].clone(),
            domain_dns_zones: values[3].clone(),
            forest_dns_zones: values[4].clone(),
        })
    }
}

pub struct LdapSession<'a> {
    credentials: &'a Credentials,
    target: &'a Target,
    pub naming_contexts: Option<NamingContexts>,
}

impl<'a> LdapSession<'a> {
    /// Binds once to verify the credentials, then reads the naming contexts.
    /// AD answers the root-DSE search even for binds it silently ignored, so
    /// the context read is the actual authentication check.
    pub fn open(credentials: &'a Credentials, target: &'a Target) -> Result<Self, ReconError> {
        let mut session = LdapSession {
            credentials,
            target,
            naming_contexts: None,
        };
        session.authenticate()?;
        session.get_naming_contexts()?;
        debug_log(1, "Authentication success !");
        Ok(session)
    }

    /// Fresh connection plus bind, one per call. The mechanism comes from the
    /// credentials; the transport from what negotiation wrote into the
    /// target.
    fn authenticate(&self) -> Result<LdapConn, ReconError> {
        let Some(port) = self.target.method_port else {
            return Err(ReconError::TransportUnavailable {
                remote: self.target.remote.clone(),
            });
        };
        debug_log(
            1,
            format!("Trying to connect to {}:{}", self.target.remote, port),
        );

        let settings = connection_settings(self.target.tls)?;
        let url = ldap_url(&self.target.remote, port, self.target.tls);
        let mut conn = LdapConn::with_settings(settings, &url)?;

        let result = match self.credentials.method {
            AuthMethod::Kerberos => {
                kerberos::sasl_spnego_bind(&mut conn, self.target, self.credentials)?
            }
            AuthMethod::Simple => conn.simple_bind(
                &self.credentials.bind_name(),
                self.credentials.authentication_secret(),
            )?,
            AuthMethod::Ntlm => ntlm_bind_result(conn.simple_bind(
                &self.credentials.bind_name(),
                self.credentials.authentication_secret(),
            ))?,
        };

        check_bind_result(result)?;
        Ok(conn)
    }

    /// One logical search across as many pages as the server needs. Each
    /// page re-authenticates and carries the security-descriptor control.
    /// The returned entries still contain protocol markers; filtering is the
    /// caller's job.
    pub fn search(
        &self,
        base: &str,
        filter: &str,
        scope: Scope,
        attributes: &[&str],
    ) -> Result<Vec<ResultEntry>, ReconError> {
        collect_paged(|cookie| self.fetch_page(base, filter, scope, attributes, cookie))
    }

    fn fetch_page(
        &self,
        base: &str,
        filter: &str,
        scope: Scope,
        attributes: &[&str],
        cookie: Option<Vec<u8>>,
    ) -> Result<SearchPage<ResultEntry>, ReconError> {
        let mut conn = self.authenticate()?;

        let sd_flags = RawControl {
            ctype: SD_FLAGS_CONTROL_OID.to_string(),
            crit: true,
            val: Some(SD_FLAGS_OWNER_GROUP_DACL.to_vec()),
        };
        let paging: RawControl = PagedResults {
            size: PAGE_SIZE,
            cookie: cookie.unwrap_or_default(),
        }
        .into();

        let SearchResult(entries, result) = conn
            .with_controls(vec![sd_flags, paging])
            .search(base, scope, filter, attributes.to_vec())?;

        debug_log(
            2,
            format!("Page of {} entries, rc={}", entries.len(), result.rc),
        );

        Ok(SearchPage {
            cookie: paged_cookie(&result),
            entries,
        })
    }

    pub fn get_naming_contexts(&mut self) -> Result<NamingContexts, ReconError> {
        let entries = self.search("", "(objectClass=*)", Scope::Base, &["namingContexts"])?;
        let entries: Vec<SearchEntry> = entries.into_iter().map(SearchEntry::construct).collect();
        let contexts = NamingContexts::from_entries(&entries)?;
        debug_log(2, format!("Default naming context: {}", contexts.default));
        self.naming_contexts = Some(contexts.clone());
        Ok(contexts)
    }

    /// All user and machine principals under the default naming context, in
    /// server order.
    pub fn get_all_accounts(&mut self) -> Result<Vec<String>, ReconError> {
        let base = match &self.naming_contexts {
            Some(contexts) => contexts.default.clone(),
            None => self.get_naming_contexts()?.default,
        };
        let entries = self.search(
            &base,
            &account_filter(),
            Scope::Subtree,
            &["sAMAccountName"],
        )?;
        let entries: Vec<SearchEntry> = entries.into_iter().map(SearchEntry::construct).collect();
        Ok(sam_account_names(&entries))
    }
}

/// The server tearing the channel down instead of answering the bind means
/// the mechanism is rejected outright, not the credentials.
fn ntlm_bind_result(result: Result<LdapResult, LdapError>) -> Result<LdapResult, ReconError> {
    match result {
        Ok(result) => Ok(result),
        Err(LdapError::Io { .. }) | Err(LdapError::EndOfStream) => {
            Err(ReconError::MechanismRejected)
        }
        Err(e) => Err(e.into()),
    }
}

/// invalidCredentials is fatal no matter which mechanism produced it.
fn check_bind_result(result: LdapResult) -> Result<LdapResult, ReconError> {
    if result.rc == RC_INVALID_CREDENTIALS {
        return Err(ReconError::InvalidCredentials);
    }
    Ok(result)
}

pub fn account_filter() -> String {
    format!(
        "(|(sAMAccountType={})(sAMAccountType={}))",
        SAM_NORMAL_USER_ACCOUNT, SAM_MACHINE_ACCOUNT
    )
}

/// Pulls the continuation cookie out of the response's paged-results
/// control. `None` when the control is absent.
fn paged_cookie(result: &LdapResult) -> Option<Vec<u8>> {
    result.ctrls.iter().find_map(|ctrl| match ctrl {
        Control(Some(ControlType::PagedResults), raw) => {
            Some(raw.parse::<PagedResults>().cookie)
        }
        _ => None,
    })
}

/// Decoded `sAMAccountName` values, raw bytes preferred over the pre-decoded
/// form, entries without the attribute (protocol markers, referrals)
/// skipped. Server order is preserved.
pub fn sam_account_names(entries: &[SearchEntry]) -> Vec<String> {
    let mut names = Vec::with_capacity(entries.len());
    for entry in entries {
        if let Some(raw) = entry
            .bin_attrs
            .get("sAMAccountName")
            .and_then(|values| values.first())
        {
            names.push(String::from_utf8_lossy(raw).into_owned());
        } else if let Some(value) = entry
            .attrs
            .get("sAMAccountName")
            .and_then(|values| values.first())
        {
            names.push(value.clone());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn entry_with(attrs: &[(&str, &[&str])]) -> SearchEntry {
        SearchEntry {
            dn: "CN=test".to_string(),
            attrs: attrs
                .iter()
                .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
                .collect(),
            bin_attrs: HashMap::new(),
        }
    }

    #[test]
    fn two_pages_concatenate_in_order() {
        let mut cookies_seen = Vec::new();
        let combined = collect_paged(|cookie| {
            cookies_seen.push(cookie.clone());
            match cookie {
                None => Ok(SearchPage {
                    entries: vec!["a", "b", "c"],
                    cookie: Some(b"C1".to_vec()),
                }),
                Some(c) if c == b"C1" => Ok(SearchPage {
                    entries: vec!["d", "e"],
                    cookie: None,
                }),
                Some(other) => panic!("unexpected cookie {other:?}"),
            }
        })
        .unwrap();

        assert_eq!(combined, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(cookies_seen, vec![None, Some(b"C1".to_vec())]);
    }

    #[test]
    fn empty_cookie_ends_pagination() {
        let mut calls = 0;
        let combined = collect_paged(|_| {
            calls += 1;
            Ok(SearchPage {
                entries: vec![1, 2],
                cookie: Some(Vec::new()),
            })
        })
        .unwrap();
        assert_eq!(calls, 1);
        assert_eq!(combined, vec![1, 2]);
    }

    #[test]
    fn page_error_aborts_with_partial_results_dropped() {
        let mut calls = 0;
        let result: Result<Vec<i32>, _> = collect_paged(|cookie| {
            calls += 1;
            match cookie {
                None => Ok(SearchPage {
                    entries: vec![1],
                    cookie: Some(b"next".to_vec()),
                }),
                Some(_) => Err(ReconError::InvalidCredentials),
            }
        });
        assert_eq!(calls, 2);
        assert!(matches!(result, Err(ReconError::InvalidCredentials)));
    }

    #[test]
    fn naming_contexts_are_positional() {
        let entry = entry_with(&[(
            "namingContexts",
            &[
                "DC=corp,DC=local",
                "CN=Configuration,DC=corp,DC=local",
                "CN=Schema,CN=Configuration,DC=corp,DC=local",
                "DC=DomainDnsZones,DC=corp,DC=local",
                "DC=ForestDnsZones,DC=corp,DC=local",
            ],
        )]);
        let contexts = NamingContexts::from_entries(&[entry]).unwrap();
        assert_eq!(contexts.default, "DC=corp,DC=local");
        assert_eq!(contexts.configuration, "CN=Configuration,DC=corp,DC=local");
        assert_eq!(
            contexts.schema,
            "CN=Schema,CN=Configuration,DC=corp,DC=local"
        );
        assert_eq!(contexts.domain_dns_zones, "DC=DomainDnsZones,DC=corp,DC=local");
        assert_eq!(contexts.forest_dns_zones, "DC=ForestDnsZones,DC=corp,DC=local");
    }

    #[test]
    fn empty_response_reads_as_invalid_credentials() {
        let err = NamingContexts::from_entries(&[]).unwrap_err();
        assert!(matches!(err, ReconError::InvalidCredentials));
    }

    #[test]
    fn short_context_list_is_malformed() {
        let entry = entry_with(&[("namingContexts", &["DC=corp,DC=local", "CN=Configuration"])]);
        let err = NamingContexts::from_entries(&[entry]).unwrap_err();
        assert!(
            matches!(err, ReconError::MalformedResponse { attribute: "namingContexts", expected: 5, got: 2 })
        );
    }

    #[test]
    fn missing_attribute_is_malformed_not_a_panic() {
        let entry = entry_with(&[("objectClass", &["top"])]);
        let err = NamingContexts::from_entries(&[entry]).unwrap_err();
        assert!(matches!(err, ReconError::MalformedResponse { got: 0, .. }));
    }

    #[test]
    fn account_filter_names_both_type_codes() {
        let filter = account_filter();
        assert_eq!(
            filter,
            "(|(sAMAccountType=805306368)(sAMAccountType=805306369))"
        );
    }

    #[test]
    fn sam_names_prefer_raw_bytes_and_keep_order() {
        let mut raw = entry_with(&[]);
        raw.bin_attrs
            .insert("sAMAccountName".to_string(), vec![b"WS01$".to_vec()]);
        let decoded = entry_with(&[("sAMAccountName", &["alice"])]);
        let marker = entry_with(&[("objectClass", &["top"])]);

        let names = sam_account_names(&[raw, marker, decoded]);
        assert_eq!(names, vec!["WS01$".to_string(), "alice".to_string()]);
    }

    fn bind_result(rc: u32) -> LdapResult {
        LdapResult {
            rc,
            matched: String::new(),
            text: String::new(),
            refs: Vec::new(),
            ctrls: Vec::new(),
        }
    }

    #[test]
    fn socket_level_ntlm_failure_is_mechanism_rejection() {
        let io = LdapError::Io {
            source: std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        };
        assert!(matches!(
            ntlm_bind_result(Err(io)),
            Err(ReconError::MechanismRejected)
        ));
        assert!(matches!(
            ntlm_bind_result(Err(LdapError::EndOfStream)),
            Err(ReconError::MechanismRejected)
        ));
        // A protocol-level answer passes through to the common check.
        assert_eq!(ntlm_bind_result(Ok(bind_result(49))).unwrap().rc, 49);
    }

    #[test]
    fn rc_49_is_always_invalid_credentials() {
        assert!(matches!(
            check_bind_result(bind_result(49)),
            Err(ReconError::InvalidCredentials)
        ));
        assert!(check_bind_result(bind_result(0)).is_ok());
    }

    #[test]
    fn sd_flags_control_requests_owner_group_dacl() {
        // DER for SEQUENCE { INTEGER 7 }
        assert_eq!(SD_FLAGS_OWNER_GROUP_DACL, [48, 3, 2, 1, 7]);
        assert_eq!(SD_FLAGS_CONTROL_OID, "1.2.840.113556.1.4.801");
    }
}
