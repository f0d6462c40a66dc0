//! End-to-end issuance of a full chain from a profile file.

use std::fs;
use std::path::{Path, PathBuf};

use cert_chain::configs::CaConfig;
use cert_chain::observer::NoopObserver;
use cert_chain::storage::{FileStorage, PersistenceGateway};
use cert_chain::{
    sign_client_certificate, sign_intermediate_certificate, sign_root_certificate,
    sign_server_certificate, Artifact, CertError, CertificateIssuer, IssuedCertificate, Role,
};
use openssl::hash::MessageDigest;
use openssl::stack::Stack;
use openssl::x509::store::X509StoreBuilder;
use openssl::x509::{X509ReqBuilder, X509StoreContext, X509};
use tempfile::TempDir;

fn write_profile_file(dir: &Path) -> PathBuf {
    let d = dir.display();
    let yaml = format!(
        r#"
ca:
  root:
    type: root
    certFilePath: {d}/cert/root.pem
    keyFilePath: {d}/private/root.key
    csrFilePath: {d}/csr/root.csr
    organization: ACME
    commonName: Test Root
    validityYears: 10
    keyUsage: [certSign, cRLSign, digitalSignature]
    isCA: true
  intermediate:
    type: intermediate
    certFilePath: {d}/cert/intermediate.pem
    keyFilePath: {d}/private/intermediate.key
    csrFilePath: {d}/csr/intermediate.csr
    parentCertPath: {d}/cert/root.pem
    parentKeyPath: {d}/private/root.key
    organization: ACME
    commonName: Test Intermediate
    validityYears: 5
    keyUsage: 97
    isCA: true
  server:
    type: server
    certFilePath: {d}/cert/server.pem
    keyFilePath: {d}/private/server.key
    csrFilePath: {d}/csr/server.csr
    parentCertPath: {d}/cert/intermediate.pem
    parentKeyPath: {d}/private/intermediate.key
    organization: ACME
    commonName: example.com
    validityYears: 1
    dnsNames: [example.com]
    ipAddresses: [127.0.0.1]
    uris: [example.com]
    keyUsage: [digitalSignature, keyEncipherment]
    extKeyUsage: [serverAuth]
  client:
    type: client
    certFilePath: {d}/cert/client.pem
    keyFilePath: {d}/private/client.key
    csrFilePath: {d}/csr/client.csr
    parentCertPath: {d}/cert/intermediate.pem
    parentKeyPath: {d}/private/intermediate.key
    organization: ACME
    commonName: Test Client
    validityMonth: 6
    keyUsage: [digitalSignature]
    extKeyUsage: [2]
"#
    );
    let path = dir.join("ca.yaml");
    fs::write(&path, yaml).unwrap();
    path
}

fn chain_verifies(leaf: &X509, intermediates: &[&X509], root: &X509) -> bool {
    let mut store = X509StoreBuilder::new().unwrap();
    store.add_cert(root.clone()).unwrap();
    let store = store.build();

    let mut chain = Stack::new().unwrap();
    for cert in intermediates {
        chain.push((*cert).clone()).unwrap();
    }

    let mut ctx = X509StoreContext::new().unwrap();
    ctx.init(&store, leaf, &chain, |c| c.verify_cert()).unwrap()
}

#[test]
fn test_full_chain_verifies() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());

    let root = sign_root_certificate(&config, false).unwrap();
    let intermediate = sign_intermediate_certificate(&config, false).unwrap();
    let server = sign_server_certificate(&config, false).unwrap();
    let client = sign_client_certificate(&config, false).unwrap();

    assert!(root.is_self_signed().unwrap());
    assert!(chain_verifies(intermediate.certificate(), &[], root.certificate()));
    assert!(chain_verifies(
        server.certificate(),
        &[intermediate.certificate()],
        root.certificate()
    ));
    assert!(chain_verifies(
        client.certificate(),
        &[intermediate.certificate()],
        root.certificate()
    ));

    assert_eq!(server.issuer_common_name().as_deref(), Some("Test Intermediate"));
    assert_eq!(client.issuer_common_name().as_deref(), Some("Test Intermediate"));
}

#[test]
fn test_root_scenario_ten_years_and_ca() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());

    let root = sign_root_certificate(&config, false).unwrap();
    assert_eq!(root.common_name().as_deref(), Some("Test Root"));
    assert_eq!(root.issuer_common_name().as_deref(), Some("Test Root"));

    let text = String::from_utf8(root.certificate().to_text().unwrap()).unwrap();
    assert!(text.contains("CA:TRUE"));

    let diff = root.not_before().diff(root.not_after()).unwrap();
    assert!((3650..=3653).contains(&diff.days), "got {} days", diff.days);
}

#[test]
fn test_server_scenario_creates_prerequisites() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());
    sign_root_certificate(&config, false).unwrap();
    sign_intermediate_certificate(&config, false).unwrap();

    assert!(!tmp.path().join("private/server.key").exists());
    assert!(!tmp.path().join("csr/server.csr").exists());

    let server = sign_server_certificate(&config, false).unwrap();
    assert!(tmp.path().join("private/server.key").exists());
    assert!(tmp.path().join("csr/server.csr").exists());
    assert_eq!(server.dns_names(), vec!["example.com".to_string()]);
    assert_eq!(server.ip_addresses(), vec!["127.0.0.1".parse::<std::net::IpAddr>().unwrap()]);
    assert_eq!(server.uris(), vec!["//example.com".to_string()]);
}

#[test]
fn test_refusal_leaves_file_untouched() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());
    sign_root_certificate(&config, false).unwrap();
    let cert_path = tmp.path().join("cert/root.pem");
    let before = fs::read(&cert_path).unwrap();

    let err = sign_root_certificate(&config, false).unwrap_err();
    assert!(matches!(
        err,
        CertError::AlreadyExists {
            artifact: Artifact::Certificate,
            ..
        }
    ));
    assert_eq!(fs::read(&cert_path).unwrap(), before);
}

#[test]
fn test_overwrite_replaces_with_new_serial() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());
    let first = sign_root_certificate(&config, false).unwrap();
    let before = fs::read(tmp.path().join("cert/root.pem")).unwrap();

    let second = sign_root_certificate(&config, true).unwrap();
    let after = fs::read(tmp.path().join("cert/root.pem")).unwrap();

    assert_ne!(before, after);
    assert_ne!(first.serial_hex().unwrap(), second.serial_hex().unwrap());
    assert_eq!(after, second.to_pem().unwrap());
}

#[test]
fn test_pem_round_trip_preserves_fields() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());
    sign_root_certificate(&config, false).unwrap();
    sign_intermediate_certificate(&config, false).unwrap();
    let server = sign_server_certificate(&config, false).unwrap();

    let decoded = IssuedCertificate::from_pem(&server.to_pem().unwrap()).unwrap();
    assert_eq!(decoded.serial_hex().unwrap(), server.serial_hex().unwrap());
    assert_eq!(decoded.not_before().to_string(), server.not_before().to_string());
    assert_eq!(decoded.not_after().to_string(), server.not_after().to_string());
    assert_eq!(decoded.common_name(), server.common_name());
    assert_eq!(decoded.organization(), server.organization());
    assert_eq!(decoded.dns_names(), server.dns_names());
    assert_eq!(decoded.ip_addresses(), server.ip_addresses());
    assert_eq!(decoded.uris(), server.uris());

    let on_disk = FileStorage
        .read_certificate(&tmp.path().join("cert/server.pem"))
        .unwrap();
    assert_eq!(on_disk.to_pem().unwrap(), server.to_pem().unwrap());
}

#[test]
fn test_tampered_csr_is_rejected_without_write() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_profile_file(tmp.path());
    sign_root_certificate(&config_path, false).unwrap();
    sign_intermediate_certificate(&config_path, false).unwrap();

    // A CSR that names the client's key but was signed by somebody else.
    let config = CaConfig::from_file(&config_path).unwrap();
    let client = config.profile(Role::Client).unwrap();
    let csr =
        cert_chain::csr::create_csr(&FileStorage, &NoopObserver, client.spec(), false).unwrap();
    let intruder = cert_chain::private_key::create_private_key(
        &FileStorage,
        &NoopObserver,
        &tmp.path().join("private/intruder.key"),
        false,
    )
    .unwrap();
    let mut forged = X509ReqBuilder::new().unwrap();
    forged.set_subject_name(csr.subject_name()).unwrap();
    forged.set_pubkey(&csr.public_key().unwrap()).unwrap();
    forged.sign(&intruder, MessageDigest::sha256()).unwrap();
    fs::write(&client.spec().paths.csr, forged.build().to_pem().unwrap()).unwrap();

    let issuer = CertificateIssuer::new(&FileStorage, &NoopObserver);
    let err = issuer.issue(&client, false).unwrap_err();
    assert!(matches!(err, CertError::SignatureVerificationFailure { .. }));
    assert!(!client.spec().paths.cert.exists());
}

#[test]
fn test_chained_issue_without_parent_fails() {
    let tmp = TempDir::new().unwrap();
    let config = write_profile_file(tmp.path());

    let err = sign_server_certificate(&config, false).unwrap_err();
    assert!(matches!(
        err,
        CertError::MissingDependency {
            artifact: Artifact::ParentCertificate,
            ..
        }
    ));
    assert!(!tmp.path().join("cert/server.pem").exists());
    assert!(!tmp.path().join("cert/intermediate.pem").exists());
}
