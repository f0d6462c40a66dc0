//! Certificate profiles
//!
//! A [`CertificateProfile`] is the fully resolved description of one
//! certificate in the chain: who it is for, what it may be used for, how long
//! it is valid and where its key, CSR and certificate live on disk. The role
//! is a closed enum so that only chained roles carry parent paths.
//!
//! ```text
//! Root          (self-signed, no parent)
//!   └── Intermediate  (parent = root)
//!       ├── Server    (parent = intermediate)
//!       └── Client    (parent = intermediate)
//! ```

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{CertError, Result};

/// The four positions a certificate can take in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Root,
    Intermediate,
    Server,
    Client,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Root, Role::Intermediate, Role::Server, Role::Client];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Root => "root",
            Role::Intermediate => "intermediate",
            Role::Server => "server",
            Role::Client => "client",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "root" => Ok(Role::Root),
            "intermediate" => Ok(Role::Intermediate),
            "server" => Ok(Role::Server),
            "client" => Ok(Role::Client),
            other => Err(CertError::invalid(format!("unknown certificate role '{}'", other))),
        }
    }
}

// ================= Key Usage =================

/// Key usage bits, numbered the same way as the `keyUsage` integers found in
/// existing profile files (digitalSignature = bit 0 ... decipherOnly = bit 8).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "KeyUsageRepr")]
pub struct KeyUsageSet(u16);

impl KeyUsageSet {
    pub const DIGITAL_SIGNATURE: KeyUsageSet = KeyUsageSet(1 << 0);
    pub const CONTENT_COMMITMENT: KeyUsageSet = KeyUsageSet(1 << 1);
    pub const KEY_ENCIPHERMENT: KeyUsageSet = KeyUsageSet(1 << 2);
    pub const DATA_ENCIPHERMENT: KeyUsageSet = KeyUsageSet(1 << 3);
    pub const KEY_AGREEMENT: KeyUsageSet = KeyUsageSet(1 << 4);
    pub const CERT_SIGN: KeyUsageSet = KeyUsageSet(1 << 5);
    pub const CRL_SIGN: KeyUsageSet = KeyUsageSet(1 << 6);
    pub const ENCIPHER_ONLY: KeyUsageSet = KeyUsageSet(1 << 7);
    pub const DECIPHER_ONLY: KeyUsageSet = KeyUsageSet(1 << 8);

    const ALL_BITS: u16 = (1 << 9) - 1;

    const NAMES: [(&'static str, KeyUsageSet); 9] = [
        ("digitalsignature", Self::DIGITAL_SIGNATURE),
        ("contentcommitment", Self::CONTENT_COMMITMENT),
        ("keyencipherment", Self::KEY_ENCIPHERMENT),
        ("dataencipherment", Self::DATA_ENCIPHERMENT),
        ("keyagreement", Self::KEY_AGREEMENT),
        ("certsign", Self::CERT_SIGN),
        ("crlsign", Self::CRL_SIGN),
        ("encipheronly", Self::ENCIPHER_ONLY),
        ("decipheronly", Self::DECIPHER_ONLY),
    ];

    pub const fn empty() -> Self {
        KeyUsageSet(0)
    }

    pub fn from_bits(bits: u16) -> Option<Self> {
        if bits & !Self::ALL_BITS == 0 {
            Some(KeyUsageSet(bits))
        } else {
            None
        }
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn contains(&self, other: KeyUsageSet) -> bool {
        self.0 & other.0 == other.0
    }

    fn from_name(name: &str) -> Option<Self> {
        let normalized = name.to_ascii_lowercase().replace(['_', '-'], "");
        // "nonRepudiation" is the older name for contentCommitment
        if normalized == "nonrepudiation" {
            return Some(Self::CONTENT_COMMITMENT);
        }
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == normalized)
            .map(|(_, usage)| *usage)
    }
}

impl std::ops::BitOr for KeyUsageSet {
    type Output = KeyUsageSet;

    fn bitor(self, rhs: KeyUsageSet) -> KeyUsageSet {
        KeyUsageSet(self.0 | rhs.0)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum KeyUsageRepr {
    Bits(u16),
    Names(Vec<String>),
}

impl TryFrom<KeyUsageRepr> for KeyUsageSet {
    type Error = String;

    fn try_from(repr: KeyUsageRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            KeyUsageRepr::Bits(bits) => KeyUsageSet::from_bits(bits)
                .ok_or_else(|| format!("key usage bits {:#x} out of range", bits)),
            KeyUsageRepr::Names(names) => names.iter().try_fold(KeyUsageSet::empty(), |acc, n| {
                KeyUsageSet::from_name(n)
                    .map(|usage| acc | usage)
                    .ok_or_else(|| format!("unknown key usage '{}'", n))
            }),
        }
    }
}

// ================= Extended Key Usage =================

/// Extended key usage purposes. The numeric codes match the `extKeyUsage`
/// integers of existing profile files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "ExtKeyUsageRepr")]
pub enum ExtKeyUsage {
    Any,
    ServerAuth,
    ClientAuth,
    CodeSigning,
    EmailProtection,
    IpsecEndSystem,
    IpsecTunnel,
    IpsecUser,
    TimeStamping,
    OcspSigning,
}

impl ExtKeyUsage {
    const BY_CODE: [ExtKeyUsage; 10] = [
        ExtKeyUsage::Any,
        ExtKeyUsage::ServerAuth,
        ExtKeyUsage::ClientAuth,
        ExtKeyUsage::CodeSigning,
        ExtKeyUsage::EmailProtection,
        ExtKeyUsage::IpsecEndSystem,
        ExtKeyUsage::IpsecTunnel,
        ExtKeyUsage::IpsecUser,
        ExtKeyUsage::TimeStamping,
        ExtKeyUsage::OcspSigning,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        Self::BY_CODE.get(code as usize).copied()
    }

    fn from_name(name: &str) -> Option<Self> {
        let usage = match name.to_ascii_lowercase().replace(['_', '-'], "").as_str() {
            "any" | "anyextendedkeyusage" => ExtKeyUsage::Any,
            "serverauth" => ExtKeyUsage::ServerAuth,
            "clientauth" => ExtKeyUsage::ClientAuth,
            "codesigning" => ExtKeyUsage::CodeSigning,
            "emailprotection" => ExtKeyUsage::EmailProtection,
            "ipsecendsystem" => ExtKeyUsage::IpsecEndSystem,
            "ipsectunnel" => ExtKeyUsage::IpsecTunnel,
            "ipsecuser" => ExtKeyUsage::IpsecUser,
            "timestamping" => ExtKeyUsage::TimeStamping,
            "ocspsigning" => ExtKeyUsage::OcspSigning,
            _ => return None,
        };
        Some(usage)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ExtKeyUsageRepr {
    Code(u8),
    Name(String),
}

impl TryFrom<ExtKeyUsageRepr> for ExtKeyUsage {
    type Error = String;

    fn try_from(repr: ExtKeyUsageRepr) -> std::result::Result<Self, Self::Error> {
        match repr {
            ExtKeyUsageRepr::Code(code) => ExtKeyUsage::from_code(code)
                .ok_or_else(|| format!("unknown extended key usage code {}", code)),
            ExtKeyUsageRepr::Name(name) => ExtKeyUsage::from_name(&name)
                .ok_or_else(|| format!("unknown extended key usage '{}'", name)),
        }
    }
}

// ================= Validity =================

/// Validity duration as a calendar offset from the moment of issuance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Validity {
    pub years: u32,
    pub months: u32,
    pub days: u32,
}

impl Validity {
    pub fn new(years: u32, months: u32, days: u32) -> Self {
        Self { years, months, days }
    }

    /// End of the validity window for a certificate issued at `not_before`.
    ///
    /// The offset is applied to the calendar fields and then normalized: a
    /// day number past the end of the target month rolls into the next one,
    /// so Jan 31 plus one month lands on Mar 2 or Mar 3.
    pub fn not_after(&self, not_before: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let overflow = || CertError::invalid("validity period overflows");
        let start = not_before.date_naive();

        let month_index = i64::from(start.year()) * 12
            + i64::from(start.month0())
            + i64::from(self.years) * 12
            + i64::from(self.months);
        let year = i32::try_from(month_index.div_euclid(12)).map_err(|_| overflow())?;
        let month = u32::try_from(month_index.rem_euclid(12) + 1).map_err(|_| overflow())?;
        let day_offset = u64::from(start.day0()) + u64::from(self.days);

        NaiveDate::from_ymd_opt(year, month, 1)
            .and_then(|first| first.checked_add_days(Days::new(day_offset)))
            .map(|date| date.and_time(not_before.time()).and_utc())
            .ok_or_else(overflow)
    }
}

// ================= Profile =================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    pub organization: String,
    pub common_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubjectAltNames {
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<IpAddr>,
    pub uris: Vec<String>,
}

impl SubjectAltNames {
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ip_addresses.is_empty() && self.uris.is_empty()
    }
}

/// Where a profile's own artifacts are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub key: PathBuf,
    pub csr: PathBuf,
    pub cert: PathBuf,
}

/// Where the signing parent of a chained profile was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentPaths {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Everything common to all four roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSpec {
    pub subject: Subject,
    pub alt_names: SubjectAltNames,
    pub key_usage: KeyUsageSet,
    pub ext_key_usage: Vec<ExtKeyUsage>,
    pub is_ca: bool,
    pub validity: Validity,
    pub paths: ArtifactPaths,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedProfile {
    pub spec: ProfileSpec,
    pub parent: ParentPaths,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CertificateProfile {
    Root(ProfileSpec),
    Intermediate(ChainedProfile),
    Server(ChainedProfile),
    Client(ChainedProfile),
}

impl CertificateProfile {
    /// Build a chained profile for one of the three non-root roles.
    pub fn chained(role: Role, spec: ProfileSpec, parent: ParentPaths) -> Result<Self> {
        let chained = ChainedProfile { spec, parent };
        match role {
            Role::Root => Err(CertError::invalid("a root profile has no parent")),
            Role::Intermediate => Ok(CertificateProfile::Intermediate(chained)),
            Role::Server => Ok(CertificateProfile::Server(chained)),
            Role::Client => Ok(CertificateProfile::Client(chained)),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            CertificateProfile::Root(_) => Role::Root,
            CertificateProfile::Intermediate(_) => Role::Intermediate,
            CertificateProfile::Server(_) => Role::Server,
            CertificateProfile::Client(_) => Role::Client,
        }
    }

    pub fn spec(&self) -> &ProfileSpec {
        match self {
            CertificateProfile::Root(spec) => spec,
            CertificateProfile::Intermediate(c)
            | CertificateProfile::Server(c)
            | CertificateProfile::Client(c) => &c.spec,
        }
    }

    /// Parent paths, `None` for the self-signed root.
    pub fn parent(&self) -> Option<&ParentPaths> {
        match self {
            CertificateProfile::Root(_) => None,
            CertificateProfile::Intermediate(c)
            | CertificateProfile::Server(c)
            | CertificateProfile::Client(c) => Some(&c.parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_role_parse() {
        assert_eq!("Server".parse::<Role>().unwrap(), Role::Server);
        assert!("leaf".parse::<Role>().is_err());
    }

    #[test]
    fn test_key_usage_from_bits_and_names() {
        let from_bits: KeyUsageSet = serde_yaml::from_str("97").unwrap();
        assert!(from_bits.contains(KeyUsageSet::DIGITAL_SIGNATURE));
        assert!(from_bits.contains(KeyUsageSet::CERT_SIGN));
        assert!(from_bits.contains(KeyUsageSet::CRL_SIGN));

        let from_names: KeyUsageSet =
            serde_yaml::from_str("[digitalSignature, certSign, cRLSign]").unwrap();
        assert_eq!(from_bits, from_names);

        assert!(serde_yaml::from_str::<KeyUsageSet>("[teleport]").is_err());
        assert!(serde_yaml::from_str::<KeyUsageSet>("1024").is_err());
    }

    #[test]
    fn test_ext_key_usage_codes_and_names() {
        let usages: Vec<ExtKeyUsage> =
            serde_yaml::from_str("[1, clientAuth, OCSPSigning]").unwrap();
        assert_eq!(
            usages,
            vec![ExtKeyUsage::ServerAuth, ExtKeyUsage::ClientAuth, ExtKeyUsage::OcspSigning]
        );
        assert!(serde_yaml::from_str::<ExtKeyUsage>("42").is_err());
    }

    #[test]
    fn test_validity_calendar_offset() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();

        let end = Validity::new(0, 0, 10).not_after(start).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 2, 10, 12, 0, 0).unwrap());

        let end = Validity::new(10, 0, 0).not_after(start).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2034, 1, 31, 12, 0, 0).unwrap());

        let end = Validity::new(0, 11, 1).not_after(start).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_validity_rolls_day_overflow_forward() {
        let jan_31 = Utc.with_ymd_and_hms(2025, 1, 31, 0, 0, 0).unwrap();
        let end = Validity::new(0, 1, 0).not_after(jan_31).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap());

        let leap_day = Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap();
        let end = Validity::new(1, 0, 0).not_after(leap_day).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 1, 8, 30, 0).unwrap());

        let start = Utc.with_ymd_and_hms(2024, 1, 31, 12, 0, 0).unwrap();
        let end = Validity::new(1, 1, 0).not_after(start).unwrap();
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_root_profile_has_no_parent() {
        let spec = ProfileSpec {
            subject: Subject::default(),
            alt_names: SubjectAltNames::default(),
            key_usage: KeyUsageSet::empty(),
            ext_key_usage: Vec::new(),
            is_ca: true,
            validity: Validity::default(),
            paths: ArtifactPaths {
                key: "k".into(),
                csr: "r".into(),
                cert: "c".into(),
            },
        };
        let parent = ParentPaths {
            cert: "pc".into(),
            key: "pk".into(),
        };
        assert!(CertificateProfile::chained(Role::Root, spec.clone(), parent.clone()).is_err());

        let server = CertificateProfile::chained(Role::Server, spec.clone(), parent).unwrap();
        assert_eq!(server.role(), Role::Server);
        assert!(server.parent().is_some());
        assert!(CertificateProfile::Root(spec).parent().is_none());
    }
}
