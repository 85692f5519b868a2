use crate::DomainError;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

/// Hostname suffix of first-party store domains
pub const FIRST_PARTY_SUFFIX: &str = ".myshopify.com";

/// How a syntactically valid hostname is treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainKind {
    /// `<store>.myshopify.com`: trusted by shape, never resolved
    FirstParty,
    /// Any other hostname: must resolve to public addresses only
    Custom,
}

/// Name resolution used by [`DomainValidator`]
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Returns every address the host resolves to
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the system's `getaddrinfo` via tokio
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn resolve(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 443)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Decides whether a hostname may be used as a fetch target
///
/// # Examples
///
/// ```no_run
/// use sitemap_relay::url::DomainValidator;
///
/// # async fn example() {
/// let validator = DomainValidator::new();
/// assert!(validator.is_valid("my-store.myshopify.com").await);
/// assert!(!validator.is_valid("localhost").await);
/// # }
/// ```
#[derive(Clone)]
pub struct DomainValidator {
    resolver: Arc<dyn Resolve>,
}

impl std::fmt::Debug for DomainValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainValidator").finish_non_exhaustive()
    }
}

impl Default for DomainValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl DomainValidator {
    /// Creates a validator that resolves through the system resolver
    pub fn new() -> Self {
        Self::with_resolver(SystemResolver)
    }

    /// Creates a validator with a custom resolver
    pub fn with_resolver<R: Resolve + 'static>(resolver: R) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }

    /// Validates a hostname and returns its normalized form
    ///
    /// Scheme prefixes and a trailing slash are stripped first. First-party
    /// hosts are accepted on shape alone; custom domains must resolve, and
    /// every resolved address must be publicly routable.
    pub async fn validate(&self, hostname: &str) -> Result<String, DomainError> {
        let (host, kind) = check_syntax(hostname)?;

        if kind == DomainKind::FirstParty {
            return Ok(host);
        }

        self.public_addrs(&host).await?;
        Ok(host)
    }

    /// Resolves a host and returns its addresses if every one is public
    ///
    /// The HTTP client connects through this too, so a connection only ever
    /// uses addresses that passed the check.
    pub async fn public_addrs(&self, host: &str) -> Result<Vec<IpAddr>, DomainError> {
        let addrs = self
            .resolver
            .resolve(host)
            .await
            .map_err(|e| DomainError::Unresolvable(format!("{}: {}", host, e)))?;

        if addrs.is_empty() {
            return Err(DomainError::Unresolvable(host.to_string()));
        }

        if let Some(addr) = addrs.iter().find(|addr| !is_public_ip(addr)) {
            return Err(DomainError::NonPublic {
                host: host.to_string(),
                addr: *addr,
            });
        }

        Ok(addrs)
    }

    /// Boolean form of [`DomainValidator::validate`]
    pub async fn is_valid(&self, hostname: &str) -> bool {
        self.validate(hostname).await.is_ok()
    }
}

/// Strips an `http://`/`https://` prefix and a trailing slash, lowercases
pub fn normalize_host(input: &str) -> String {
    let trimmed = input.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    without_scheme.trim_end_matches('/').to_string()
}

/// Checks hostname shape without touching the network
///
/// Returns the normalized host and whether it is a first-party or custom
/// domain.
pub fn check_syntax(hostname: &str) -> Result<(String, DomainKind), DomainError> {
    let host = normalize_host(hostname);

    if host.is_empty() {
        return Err(DomainError::Empty);
    }

    if host.parse::<IpAddr>().is_ok() {
        return Err(DomainError::IpLiteral(host));
    }

    let valid_chars = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    let valid_edges = host
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphanumeric())
        && host
            .chars()
            .last()
            .map_or(false, |c| c.is_ascii_alphanumeric());

    if !valid_chars || !valid_edges || host.contains("..") {
        return Err(DomainError::Syntax(host));
    }

    if host.ends_with(FIRST_PARTY_SUFFIX) {
        return if is_first_party(&host) {
            Ok((host, DomainKind::FirstParty))
        } else {
            Err(DomainError::FirstParty(host))
        };
    }

    // Custom domains need a dot and an alphabetic TLD of two letters or more
    let tld_ok = host
        .rsplit_once('.')
        .map(|(_, tld)| tld.len() >= 2 && tld.chars().all(|c| c.is_ascii_alphabetic()))
        .unwrap_or(false);

    if !tld_ok {
        return Err(DomainError::Syntax(host));
    }

    Ok((host, DomainKind::Custom))
}

/// One or more store labels in front of the first-party suffix
fn is_first_party(host: &str) -> bool {
    match host.strip_suffix(FIRST_PARTY_SUFFIX) {
        Some(prefix) if !prefix.is_empty() => prefix.split('.').all(|label| {
            label
                .chars()
                .next()
                .map_or(false, |c| c.is_ascii_alphanumeric())
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        }),
        _ => false,
    }
}

/// Returns true if the address is globally routable
pub fn is_public_ip(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => is_public_ipv4(v4),
        IpAddr::V6(v6) => is_public_ipv6(v6),
    }
}

fn is_public_ipv4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();

    if ip.is_loopback()
        || ip.is_private()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || ip.is_documentation()
        || ip.is_multicast()
    {
        return false;
    }

    // 0.0.0.0/8 "this network"
    if octets[0] == 0 {
        return false;
    }
    // 100.64.0.0/10 (Carrier-Grade NAT)
    if octets[0] == 100 && (64..=127).contains(&octets[1]) {
        return false;
    }
    // 192.0.0.0/24 (IETF protocol assignments)
    if octets[0] == 192 && octets[1] == 0 && octets[2] == 0 {
        return false;
    }
    // 198.18.0.0/15 (benchmarking)
    if octets[0] == 198 && (18..=19).contains(&octets[1]) {
        return false;
    }
    // 240.0.0.0/4 (reserved)
    if octets[0] >= 240 {
        return false;
    }

    true
}

fn is_public_ipv6(ip: &Ipv6Addr) -> bool {
    if let Some(mapped) = ip.to_ipv4_mapped() {
        return is_public_ipv4(&mapped);
    }

    if ip.is_loopback() || ip.is_unspecified() || ip.is_multicast() {
        return false;
    }

    let segments = ip.segments();

    // fc00::/7 (unique local)
    if (segments[0] & 0xfe00) == 0xfc00 {
        return false;
    }
    // fe80::/10 (link-local)
    if (segments[0] & 0xffc0) == 0xfe80 {
        return false;
    }
    // 2001:db8::/32 (documentation)
    if segments[0] == 0x2001 && segments[1] == 0x0db8 {
        return false;
    }

    true
}
