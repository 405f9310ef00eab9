//! Client certificate handling
//!
//! The client authenticates with a self-signed RSA certificate. Pairing binds
//! the certificate's public key into the pairing secret, so the same
//! certificate must be presented on every later command connection.
//!
//! ## Certificate Requirements
//!
//! - **Algorithm**: RSA 2048-bit (the secret derivation reads the RSA modulus
//!   and exponent, other key types cannot pair)
//! - **Common Name (CN)**: free-form client identifier
//! - **Validity**: 10 years
//!
//! ## File Format
//!
//! [`CertificateInfo::load_from_file`] reads a single PEM file containing both
//! the certificate and the private key, which is what
//! `openssl req -x509 -nodes -keyout f.pem -out f.pem` produces.

use crate::{ProtocolError, Result};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509, X509Name};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Default Common Name for generated certificates
pub const DEFAULT_COMMON_NAME: &str = "anymote/rust/client";

/// Certificate validity period (10 years)
const CERT_VALIDITY_YEARS: u32 = 10;

/// RSA key size for generated certificates
const RSA_KEY_BITS: u32 = 2048;

/// Client certificate and private key
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Subject Common Name
    pub common_name: String,

    /// DER-encoded certificate
    pub certificate: Vec<u8>,

    /// DER-encoded private key
    pub private_key: Vec<u8>,

    /// SHA256 fingerprint of certificate
    pub fingerprint: String,
}

impl CertificateInfo {
    /// Generate a new self-signed certificate
    ///
    /// # Examples
    ///
    /// ```
    /// use anymote_protocol::CertificateInfo;
    ///
    /// let cert_info = CertificateInfo::generate("living-room-remote").unwrap();
    /// println!("Fingerprint: {}", cert_info.fingerprint);
    /// ```
    pub fn generate(common_name: impl Into<String>) -> Result<Self> {
        let common_name = common_name.into();

        let rsa = Rsa::generate(RSA_KEY_BITS)?;
        let pkey = PKey::from_rsa(rsa)?;

        let mut builder = X509::builder()?;
        builder.set_version(2)?;

        let mut serial = BigNum::new()?;
        serial.rand(159, MsbOption::MAYBE_ZERO, false)?;
        let serial = serial.to_asn1_integer()?;
        builder.set_serial_number(&serial)?;

        let mut name = X509Name::builder()?;
        name.append_entry_by_text("CN", &common_name)?;
        let name = name.build();
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;

        let not_before = Asn1Time::days_from_now(0)?;
        let not_after = Asn1Time::days_from_now(CERT_VALIDITY_YEARS * 365)?;
        builder.set_not_before(&not_before)?;
        builder.set_not_after(&not_after)?;

        builder.set_pubkey(&pkey)?;
        builder.append_extension(BasicConstraints::new().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;
        builder.sign(&pkey, MessageDigest::sha256())?;

        let cert = builder.build();
        let certificate = cert.to_der()?;
        let private_key = pkey.private_key_to_der()?;
        let fingerprint = Self::calculate_fingerprint(&certificate);

        info!(
            "Generated certificate for {} with fingerprint: {}",
            common_name, fingerprint
        );

        Ok(Self {
            common_name,
            certificate,
            private_key,
            fingerprint,
        })
    }

    /// Build from DER-encoded certificate and private key
    pub fn from_der(certificate: Vec<u8>, private_key: Vec<u8>) -> Result<Self> {
        let cert = X509::from_der(&certificate)?;
        // Reject a key that does not parse before it reaches the TLS layer
        PKey::private_key_from_der(&private_key)?;

        let common_name = Self::extract_common_name(&cert)?;
        let fingerprint = Self::calculate_fingerprint(&certificate);

        Ok(Self {
            common_name,
            certificate,
            private_key,
            fingerprint,
        })
    }

    /// Calculate SHA256 fingerprint of a certificate
    ///
    /// Returns fingerprint in format: XX:XX:XX:...:XX (hex bytes separated by colons)
    pub fn calculate_fingerprint(cert_der: &[u8]) -> String {
        let hash = Sha256::digest(cert_der);

        hash.iter()
            .map(|b| format!("{:02X}", b))
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Certificate followed by private key, PEM encoded
    pub fn to_pem(&self) -> Result<Vec<u8>> {
        let cert = X509::from_der(&self.certificate)?;
        let pkey = PKey::private_key_from_der(&self.private_key)?;

        let mut pem = cert.to_pem()?;
        pem.extend_from_slice(&pkey.private_key_to_pem_pkcs8()?);
        Ok(pem)
    }

    /// Parse a PEM bundle holding a certificate and a private key
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let cert = X509::from_pem(pem)?;
        let pkey = PKey::private_key_from_pem(pem)?;
        Self::from_der(cert.to_der()?, pkey.private_key_to_der()?)
    }

    /// Save certificate and private key to a single PEM file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_pem()?)?;

        info!("Saved certificate and private key to {:?}", path);
        Ok(())
    }

    /// Load certificate and private key from a single PEM file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading certificate bundle from {:?}", path);

        let pem = fs::read(path)?;
        let info = Self::from_pem(&pem)?;

        info!(
            "Loaded certificate for {} with fingerprint: {}",
            info.common_name, info.fingerprint
        );
        Ok(info)
    }

    /// Save certificate and private key to separate PEM files
    pub fn save_to_files(
        &self,
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<()> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        if let Some(parent) = cert_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Some(parent) = key_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let cert = X509::from_der(&self.certificate)?;
        fs::write(cert_path, cert.to_pem()?)?;

        let pkey = PKey::private_key_from_der(&self.private_key)?;
        fs::write(key_path, pkey.private_key_to_pem_pkcs8()?)?;

        info!(
            "Saved certificate to {:?} and private key to {:?}",
            cert_path, key_path
        );
        Ok(())
    }

    /// Load certificate and private key from separate PEM files
    pub fn load_from_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self> {
        let cert_path = cert_path.as_ref();
        let key_path = key_path.as_ref();

        debug!("Loading certificate from {:?}", cert_path);

        let cert = X509::from_pem(&fs::read(cert_path)?)?;
        let pkey = PKey::private_key_from_pem(&fs::read(key_path)?)?;

        Self::from_der(cert.to_der()?, pkey.private_key_to_der()?)
    }

    /// Load the bundle at `path`, generating and saving one if it does not exist
    pub fn load_or_generate(path: impl AsRef<Path>, common_name: &str) -> Result<Self> {
        let path = path.as_ref();

        if path.exists() {
            Self::load_from_file(path)
        } else {
            info!("No certificate at {:?}, generating a new one", path);
            let info = Self::generate(common_name)?;
            info.save_to_file(path)?;
            Ok(info)
        }
    }

    fn extract_common_name(cert: &X509) -> Result<String> {
        let entry = cert
            .subject_name()
            .entries_by_nid(Nid::COMMONNAME)
            .next()
            .ok_or_else(|| {
                ProtocolError::CertificateValidation(
                    "Certificate does not contain Common Name".to_string(),
                )
            })?;

        Ok(entry.data().as_utf8()?.to_string())
    }
}
