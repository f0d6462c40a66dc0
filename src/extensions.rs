//! X.509 name and extension builders shared by the CSR and certificate paths.

use openssl::error::ErrorStack;
use openssl::nid::Nid;
use openssl::x509::extension::{
    BasicConstraints, ExtendedKeyUsage, KeyUsage, SubjectAlternativeName,
};
use openssl::x509::{X509Extension, X509Name, X509v3Context};

use crate::profile::{ExtKeyUsage, KeyUsageSet, Subject, SubjectAltNames};

/// Distinguished name with the organization followed by the common name.
/// Empty values are left out since OpenSSL rejects a zero-length O or CN.
pub(crate) fn subject_name(subject: &Subject) -> Result<X509Name, ErrorStack> {
    let mut name_builder = X509Name::builder()?;
    if !subject.organization.is_empty() {
        name_builder.append_entry_by_nid(Nid::ORGANIZATIONNAME, &subject.organization)?;
    }
    if !subject.common_name.is_empty() {
        name_builder.append_entry_by_nid(Nid::COMMONNAME, &subject.common_name)?;
    }
    Ok(name_builder.build())
}

/// SAN extension, or `None` when the profile lists no alternative names.
pub(crate) fn alt_names(
    alt_names: &SubjectAltNames,
    ctx: &X509v3Context<'_>,
) -> Result<Option<X509Extension>, ErrorStack> {
    if alt_names.is_empty() {
        return Ok(None);
    }
    let mut san = SubjectAlternativeName::new();
    for dns in &alt_names.dns_names {
        san.dns(dns);
    }
    for ip in &alt_names.ip_addresses {
        san.ip(&ip.to_string());
    }
    for uri in &alt_names.uris {
        san.uri(uri);
    }
    san.build(ctx).map(Some)
}

pub(crate) fn basic_constraints(is_ca: bool) -> Result<X509Extension, ErrorStack> {
    let mut bc = BasicConstraints::new();
    bc.critical();
    if is_ca {
        bc.ca();
    }
    bc.build()
}

/// Critical key usage extension, or `None` for an empty set.
pub(crate) fn key_usage(usage: KeyUsageSet) -> Result<Option<X509Extension>, ErrorStack> {
    if usage.is_empty() {
        return Ok(None);
    }
    let mut ku = KeyUsage::new();
    ku.critical();
    if usage.contains(KeyUsageSet::DIGITAL_SIGNATURE) {
        ku.digital_signature();
    }
    if usage.contains(KeyUsageSet::CONTENT_COMMITMENT) {
        ku.non_repudiation();
    }
    if usage.contains(KeyUsageSet::KEY_ENCIPHERMENT) {
        ku.key_encipherment();
    }
    if usage.contains(KeyUsageSet::DATA_ENCIPHERMENT) {
        ku.data_encipherment();
    }
    if usage.contains(KeyUsageSet::KEY_AGREEMENT) {
        ku.key_agreement();
    }
    if usage.contains(KeyUsageSet::CERT_SIGN) {
        ku.key_cert_sign();
    }
    if usage.contains(KeyUsageSet::CRL_SIGN) {
        ku.crl_sign();
    }
    if usage.contains(KeyUsageSet::ENCIPHER_ONLY) {
        ku.encipher_only();
    }
    if usage.contains(KeyUsageSet::DECIPHER_ONLY) {
        ku.decipher_only();
    }
    ku.build().map(Some)
}

pub(crate) fn ext_key_usage(usages: &[ExtKeyUsage]) -> Result<Option<X509Extension>, ErrorStack> {
    if usages.is_empty() {
        return Ok(None);
    }
    let mut eku = ExtendedKeyUsage::new();
    for usage in usages {
        match usage {
            ExtKeyUsage::Any => eku.other("anyExtendedKeyUsage"),
            ExtKeyUsage::ServerAuth => eku.server_auth(),
            ExtKeyUsage::ClientAuth => eku.client_auth(),
            ExtKeyUsage::CodeSigning => eku.code_signing(),
            ExtKeyUsage::EmailProtection => eku.email_protection(),
            ExtKeyUsage::IpsecEndSystem => eku.other("ipsecEndSystem"),
            ExtKeyUsage::IpsecTunnel => eku.other("ipsecTunnel"),
            ExtKeyUsage::IpsecUser => eku.other("ipsecUser"),
            ExtKeyUsage::TimeStamping => eku.time_stamping(),
            ExtKeyUsage::OcspSigning => eku.other("OCSPSigning"),
        };
    }
    eku.build().map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_name_order() {
        let name = subject_name(&Subject {
            organization: "ACME".to_string(),
            common_name: "ACME Root".to_string(),
        })
        .unwrap();
        let nids: Vec<Nid> = name.entries().map(|e| e.object().nid()).collect();
        assert_eq!(nids, vec![Nid::ORGANIZATIONNAME, Nid::COMMONNAME]);
    }

    #[test]
    fn test_empty_organization_is_left_out() {
        let name = subject_name(&Subject {
            organization: String::new(),
            common_name: "client".to_string(),
        })
        .unwrap();
        let nids: Vec<Nid> = name.entries().map(|e| e.object().nid()).collect();
        assert_eq!(nids, vec![Nid::COMMONNAME]);
    }

    #[test]
    fn test_empty_sets_produce_no_extension() {
        assert!(key_usage(KeyUsageSet::empty()).unwrap().is_none());
        assert!(ext_key_usage(&[]).unwrap().is_none());
        assert!(key_usage(KeyUsageSet::CERT_SIGN).unwrap().is_some());
        assert!(ext_key_usage(&[ExtKeyUsage::OcspSigning, ExtKeyUsage::Any])
            .unwrap()
            .is_some());
    }
}
