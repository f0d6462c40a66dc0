//! Issued certificates
//!
//! [`IssuedCertificate`] is what the issuer hands back: the certificate as
//! parsed from the PEM bytes that were written to disk, with accessors for
//! the fields callers usually want to look at.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use openssl::asn1::Asn1TimeRef;
use openssl::bn::BigNum;
use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, PKeyRef};
use openssl::x509::{X509NameRef, X509VerifyResult, X509};

#[derive(Clone)]
pub struct IssuedCertificate {
    certificate: X509,
}

impl IssuedCertificate {
    pub fn new(certificate: X509) -> Self {
        Self { certificate }
    }

    pub fn from_pem(pem: &[u8]) -> Result<Self, ErrorStack> {
        X509::from_pem(pem).map(Self::new)
    }

    pub fn to_pem(&self) -> Result<Vec<u8>, ErrorStack> {
        self.certificate.to_pem()
    }

    pub fn certificate(&self) -> &X509 {
        &self.certificate
    }

    pub fn into_inner(self) -> X509 {
        self.certificate
    }

    pub fn serial_number(&self) -> Result<BigNum, ErrorStack> {
        self.certificate.serial_number().to_bn()
    }

    /// Serial number as upper-case hex.
    pub fn serial_hex(&self) -> Result<String, ErrorStack> {
        Ok(self.serial_number()?.to_hex_str()?.to_string())
    }

    pub fn not_before(&self) -> &Asn1TimeRef {
        self.certificate.not_before()
    }

    pub fn not_after(&self) -> &Asn1TimeRef {
        self.certificate.not_after()
    }

    pub fn common_name(&self) -> Option<String> {
        name_entry(self.certificate.subject_name(), Nid::COMMONNAME)
    }

    pub fn organization(&self) -> Option<String> {
        name_entry(self.certificate.subject_name(), Nid::ORGANIZATIONNAME)
    }

    pub fn issuer_common_name(&self) -> Option<String> {
        name_entry(self.certificate.issuer_name(), Nid::COMMONNAME)
    }

    pub fn dns_names(&self) -> Vec<String> {
        self.certificate
            .subject_alt_names()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.dnsname().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn ip_addresses(&self) -> Vec<IpAddr> {
        self.certificate
            .subject_alt_names()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.ipaddress().and_then(ip_from_octets))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn uris(&self) -> Vec<String> {
        self.certificate
            .subject_alt_names()
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| n.uri().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// True when the issuer name matches the subject and the signature
    /// verifies against the certificate's own public key.
    pub fn is_self_signed(&self) -> Result<bool, ErrorStack> {
        if self.certificate.issued(&self.certificate) != X509VerifyResult::OK {
            return Ok(false);
        }
        let public_key = self.certificate.public_key()?;
        self.certificate.verify(&public_key)
    }

    pub fn verify_signed_by<T: HasPublic>(&self, key: &PKeyRef<T>) -> Result<bool, ErrorStack> {
        self.certificate.verify(key)
    }
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("subject", &self.common_name())
            .field("issuer", &self.issuer_common_name())
            .field("serial", &self.serial_hex().ok())
            .field("not_before", &self.not_before().to_string())
            .field("not_after", &self.not_after().to_string())
            .finish()
    }
}

fn name_entry(name: &X509NameRef, nid: Nid) -> Option<String> {
    name.entries_by_nid(nid)
        .next()
        .and_then(|entry| std::str::from_utf8(entry.data().as_slice()).ok())
        .map(str::to_string)
}

fn ip_from_octets(octets: &[u8]) -> Option<IpAddr> {
    match octets.len() {
        4 => {
            let v4: [u8; 4] = octets.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(v4)))
        }
        16 => {
            let v6: [u8; 16] = octets.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(v6)))
        }
        _ => None,
    }
}
