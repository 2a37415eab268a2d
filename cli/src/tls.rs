use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

/// Returns the default TLS directory within the caliper data directory.
pub fn tls_dir() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("", "", "caliper")
        .context("Could not determine home directory")?;
    let dir = proj_dirs.data_dir().join("tls");
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create TLS directory: {}", dir.display()))?;
    Ok(dir)
}

/// Default certificate path.
pub fn default_cert_path() -> Result<PathBuf> {
    Ok(tls_dir()?.join("cert.pem"))
}

/// Default key path.
pub fn default_key_path() -> Result<PathBuf> {
    Ok(tls_dir()?.join("key.pem"))
}

/// Generate a self-signed certificate and private key, writing them to the
/// given paths. `lan_ip` adds a SAN so phones on the same network can pin the
/// certificate. Returns the SHA-256 fingerprint of the certificate.
pub fn generate_self_signed_cert(
    cert_path: &Path,
    key_path: &Path,
    lan_ip: Option<IpAddr>,
) -> Result<String> {
    let mut params = rcgen::CertificateParams::new(vec![
        "localhost".to_string(),
        "127.0.0.1".to_string(),
        "0.0.0.0".to_string(),
    ])
    .context("failed to create certificate params")?;

    params
        .distinguished_name
        .push(rcgen::DnType::CommonName, "caliper self-signed");
    params
        .distinguished_name
        .push(rcgen::DnType::OrganizationName, "caliper");

    // IP SANs for local network access
    params
        .subject_alt_names
        .push(rcgen::SanType::IpAddress(IpAddr::V4(
            std::net::Ipv4Addr::LOCALHOST,
        )));
    if let Some(ip) = lan_ip {
        params.subject_alt_names.push(rcgen::SanType::IpAddress(ip));
    }

    let key_pair = rcgen::KeyPair::generate().context("failed to generate key pair")?;
    let cert = params
        .self_signed(&key_pair)
        .context("failed to generate self-signed certificate")?;

    let cert_pem = cert.pem();
    let key_pem = key_pair.serialize_pem();

    // Compute fingerprint from DER bytes (more reliable than re-parsing PEM)
    let fingerprint = sha256_fingerprint(cert.der());

    std::fs::write(cert_path, &cert_pem)
        .with_context(|| format!("Failed to write certificate to {}", cert_path.display()))?;
    std::fs::write(key_path, &key_pem)
        .with_context(|| format!("Failed to write private key to {}", key_path.display()))?;

    Ok(fingerprint)
}

/// Compute the SHA-256 fingerprint of DER-encoded certificate bytes.
fn sha256_fingerprint(der: &[u8]) -> String {
    let hash = Sha256::digest(der);
    hash.iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Compute the SHA-256 fingerprint from a PEM-encoded certificate file.
pub fn fingerprint_from_pem_file(cert_path: &Path) -> Result<String> {
    let pem_data = std::fs::read(cert_path)
        .with_context(|| format!("Failed to read certificate from {}", cert_path.display()))?;

    let mut reader = std::io::BufReader::new(pem_data.as_slice());
    let certs: Vec<_> =
        rustls_pemfile::certs(&mut reader).collect::<std::result::Result<_, _>>()?;

    let cert = certs.first().context("No certificate found in PEM file")?;

    Ok(sha256_fingerprint(cert.as_ref()))
}

/// Ensure a certificate and key exist (generate if missing).
/// Returns the SHA-256 fingerprint.
pub fn ensure_cert(cert_path: &Path, key_path: &Path, lan_ip: Option<IpAddr>) -> Result<String> {
    if cert_path.exists() && key_path.exists() {
        fingerprint_from_pem_file(cert_path)
    } else {
        eprintln!(
            "Generating self-signed TLS certificate at {}",
            cert_path.display()
        );
        generate_self_signed_cert(cert_path, key_path, lan_ip)
    }
}
