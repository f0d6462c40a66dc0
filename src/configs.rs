use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CertError, Result};
use crate::profile::{
    ArtifactPaths, CertificateProfile, ExtKeyUsage, KeyUsageSet, ParentPaths, ProfileSpec, Role,
    Subject, SubjectAltNames, Validity,
};

/// Top level of a profile file: everything lives under `ca`.
#[derive(Debug, Deserialize, Clone)]
pub struct CaConfig {
    pub ca: CaProfiles,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaProfiles {
    pub root: Option<ProfileConfig>,
    pub intermediate: Option<ProfileConfig>,
    pub server: Option<ProfileConfig>,
    pub client: Option<ProfileConfig>,
}

/// One certificate section as written in the file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileConfig {
    /// Informational only; the section name decides the role.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub common_name: String,
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub validity_years: u32,
    #[serde(default)]
    pub validity_month: u32,
    #[serde(default)]
    pub validity_day: u32,
    #[serde(default)]
    pub dns_names: Vec<String>,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
    #[serde(default)]
    pub uris: Vec<String>,
    #[serde(default)]
    pub key_usage: KeyUsageSet,
    #[serde(default)]
    pub ext_key_usage: Vec<ExtKeyUsage>,
    #[serde(rename = "isCA", default)]
    pub is_ca: bool,
    pub key_file_path: PathBuf,
    pub csr_file_path: PathBuf,
    pub cert_file_path: PathBuf,
    #[serde(default)]
    pub parent_cert_path: Option<PathBuf>,
    #[serde(default)]
    pub parent_key_path: Option<PathBuf>,
}

impl CaConfig {
    /// Load a profile file. `.toml` files are parsed as TOML, anything else
    /// as YAML.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let config_str = fs::read_to_string(path).map_err(|e| CertError::ConfigFailure {
            path: path.to_path_buf(),
            message: format!("failed to read config file: {}", e),
        })?;

        let is_toml = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("toml"))
            .unwrap_or(false);
        let parsed = if is_toml {
            Self::from_toml_str(&config_str)
        } else {
            Self::from_yaml_str(&config_str)
        };
        parsed.map_err(|message| CertError::ConfigFailure {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_yaml_str(s: &str) -> std::result::Result<Self, String> {
        serde_yaml::from_str(s).map_err(|e| format!("failed to parse YAML: {}", e))
    }

    pub fn from_toml_str(s: &str) -> std::result::Result<Self, String> {
        toml::from_str(s).map_err(|e| format!("failed to parse TOML: {}", e))
    }

    pub fn section(&self, role: Role) -> Option<&ProfileConfig> {
        match role {
            Role::Root => self.ca.root.as_ref(),
            Role::Intermediate => self.ca.intermediate.as_ref(),
            Role::Server => self.ca.server.as_ref(),
            Role::Client => self.ca.client.as_ref(),
        }
    }

    /// Resolve the section for `role` into a typed profile.
    pub fn profile(&self, role: Role) -> Result<CertificateProfile> {
        let section = self
            .section(role)
            .ok_or_else(|| CertError::invalid(format!("no '{}' section under 'ca'", role)))?;
        section.to_profile(role)
    }
}

impl ProfileConfig {
    pub fn to_profile(&self, role: Role) -> Result<CertificateProfile> {
        let spec = self.to_spec(role)?;
        if role == Role::Root {
            return Ok(CertificateProfile::Root(spec));
        }

        let missing =
            |field: &str| CertError::invalid(format!("{} profile is missing '{}'", role, field));
        let parent = ParentPaths {
            cert: self
                .parent_cert_path
                .clone()
                .ok_or_else(|| missing("parentCertPath"))?,
            key: self
                .parent_key_path
                .clone()
                .ok_or_else(|| missing("parentKeyPath"))?,
        };
        CertificateProfile::chained(role, spec, parent)
    }

    fn to_spec(&self, role: Role) -> Result<ProfileSpec> {
        let ip_addresses = self
            .ip_addresses
            .iter()
            .map(|ip| {
                ip.trim().parse::<IpAddr>().map_err(|_| {
                    CertError::invalid(format!("{} profile has invalid IP address '{}'", role, ip))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ProfileSpec {
            subject: Subject {
                organization: self.organization.clone(),
                common_name: self.common_name.clone(),
            },
            alt_names: SubjectAltNames {
                dns_names: self.dns_names.clone(),
                ip_addresses,
                uris: self.uris.iter().map(|u| uri_entry(u)).collect(),
            },
            key_usage: self.key_usage,
            ext_key_usage: self.ext_key_usage.clone(),
            is_ca: self.is_ca,
            validity: Validity::new(self.validity_years, self.validity_month, self.validity_day),
            paths: ArtifactPaths {
                key: self.key_file_path.clone(),
                csr: self.csr_file_path.clone(),
                cert: self.cert_file_path.clone(),
            },
        })
    }
}

/// `uris` entries are host names unless they already carry a scheme; a bare
/// host becomes a scheme-relative reference (`//host`).
fn uri_entry(value: &str) -> String {
    if value.contains("://") || value.starts_with("//") {
        value.to_string()
    } else {
        format!("//{}", value)
    }
}
