//! Pairing secret derivation
//!
//! The device displays a short hexadecimal code. The client proves it has
//! seen the code by sending
//!
//! ```text
//! SHA-256(client_modulus ‖ client_exponent ‖ server_modulus ‖ server_exponent ‖ nonce)
//! ```
//!
//! where the moduli and exponents are the RSA public keys of the two TLS
//! certificates and `nonce` is the second half of the decoded code. The first
//! half of the code is a check value: it equals the leading bytes of the
//! digest, which lets a client spot a mistyped code.

use crate::{ProtocolError, Result};
use openssl::bn::BigNumRef;
use openssl::x509::X509;
use sha2::{Digest, Sha256};
use tracing::debug;

/// Length of the secret digest
pub const SECRET_LENGTH: usize = 32;

/// RSA public key of a certificate, big-endian without leading zero bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyMaterial {
    pub modulus: Vec<u8>,
    pub exponent: Vec<u8>,
}

/// Decode a hexadecimal pairing code two characters at a time
///
/// # Examples
///
/// ```
/// use anymote_protocol::pairing::decode_hex_code;
///
/// assert_eq!(decode_hex_code("1A2B").unwrap(), vec![0x1A, 0x2B]);
/// assert!(decode_hex_code("1A2").is_err());
/// ```
pub fn decode_hex_code(code: &str) -> Result<Vec<u8>> {
    if code.len() % 2 != 0 {
        return Err(ProtocolError::InvalidArgument(format!(
            "pairing code must have an even number of characters, got {}",
            code.len()
        )));
    }

    hex::decode(code).map_err(|e| {
        ProtocolError::InvalidArgument(format!("pairing code '{}' is not hexadecimal: {}", code, e))
    })
}

fn unsigned_be_bytes(n: &BigNumRef) -> Vec<u8> {
    let bytes = n.to_vec();
    let first_nonzero = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    bytes[first_nonzero..].to_vec()
}

/// Extract the RSA modulus and public exponent from a DER certificate
pub fn rsa_key_material(cert_der: &[u8]) -> Result<RsaKeyMaterial> {
    let cert = X509::from_der(cert_der)
        .map_err(|e| ProtocolError::Pairing(format!("certificate does not parse: {}", e)))?;
    let public_key = cert
        .public_key()
        .map_err(|e| ProtocolError::Pairing(format!("certificate has no public key: {}", e)))?;
    let rsa = public_key
        .rsa()
        .map_err(|e| ProtocolError::Pairing(format!("certificate key is not RSA: {}", e)))?;

    Ok(RsaKeyMaterial {
        modulus: unsigned_be_bytes(rsa.n()),
        exponent: unsigned_be_bytes(rsa.e()),
    })
}

/// Derive the pairing secret from the typed code and both certificates
///
/// `local_cert` is the client certificate, `peer_cert` the certificate the
/// device presented during the TLS handshake. The result is deterministic.
pub fn derive_secret(code: &str, local_cert: &[u8], peer_cert: &[u8]) -> Result<[u8; SECRET_LENGTH]> {
    let code_bytes = decode_hex_code(code)?;
    let client = rsa_key_material(local_cert)?;
    let server = rsa_key_material(peer_cert)?;
    let nonce = &code_bytes[code_bytes.len() / 2..];

    let mut hasher = Sha256::new();
    hasher.update(&client.modulus);
    hasher.update(&client.exponent);
    hasher.update(&server.modulus);
    hasher.update(&server.exponent);
    hasher.update(nonce);

    debug!(
        "Derived pairing secret from {}-byte code ({}-byte nonce)",
        code_bytes.len(),
        nonce.len()
    );

    Ok(hasher.finalize().into())
}

/// Whether the check half of the code matches the digest
///
/// A mismatch almost always means the code was mistyped; the device will
/// then reject the secret.
pub fn code_check_matches(code_bytes: &[u8], digest: &[u8; SECRET_LENGTH]) -> bool {
    let check = &code_bytes[..code_bytes.len() / 2];
    check.len() <= SECRET_LENGTH && digest.starts_with(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CertificateInfo;
    use openssl::ec::{EcGroup, EcKey};
    use openssl::hash::MessageDigest;
    use openssl::nid::Nid;
    use openssl::pkey::PKey;
    use openssl::x509::X509Name;

    fn ec_certificate() -> Vec<u8> {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let pkey = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();
        let mut name = X509Name::builder().unwrap();
        name.append_entry_by_text("CN", "ec").unwrap();
        let name = name.build();

        let mut builder = X509::builder().unwrap();
        builder.set_version(2).unwrap();
        builder.set_subject_name(&name).unwrap();
        builder.set_issuer_name(&name).unwrap();
        builder.set_pubkey(&pkey).unwrap();
        builder.sign(&pkey, MessageDigest::sha256()).unwrap();
        builder.build().to_der().unwrap()
    }

    #[test]
    fn test_decode_hex_code() {
        assert_eq!(decode_hex_code("1A2B").unwrap(), vec![0x1A, 0x2B]);
        assert_eq!(decode_hex_code("ff00").unwrap(), vec![0xFF, 0x00]);
        assert_eq!(decode_hex_code("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_decode_hex_code_rejects_bad_input() {
        assert!(matches!(decode_hex_code("ABC"), Err(ProtocolError::InvalidArgument(_))));
        assert!(matches!(decode_hex_code("ZZ11"), Err(ProtocolError::InvalidArgument(_))));
        assert!(matches!(decode_hex_code("12 4"), Err(ProtocolError::InvalidArgument(_))));
    }

    #[test]
    fn test_key_material_has_no_leading_zero() {
        let cert = CertificateInfo::generate("keys").unwrap();
        let material = rsa_key_material(&cert.certificate).unwrap();

        assert_ne!(material.modulus[0], 0);
        assert_eq!(material.modulus.len(), 256);
        assert_eq!(material.exponent, vec![0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_unsigned_be_bytes_strips_zero_padding() {
        let padded = openssl::bn::BigNum::from_slice(&[0x00, 0x00, 0x80, 0x01]).unwrap();
        assert_eq!(unsigned_be_bytes(&padded), vec![0x80, 0x01]);
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let local = CertificateInfo::generate("local").unwrap();
        let peer = CertificateInfo::generate("peer").unwrap();

        let first = derive_secret("1A2B", &local.certificate, &peer.certificate).unwrap();
        let second = derive_secret("1A2B", &local.certificate, &peer.certificate).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), SECRET_LENGTH);

        // Roles matter: swapping the certificates changes the digest
        let swapped = derive_secret("1A2B", &peer.certificate, &local.certificate).unwrap();
        assert_ne!(first, swapped);
    }

    #[test]
    fn test_digest_matches_manual_hash() {
        let local = CertificateInfo::generate("local").unwrap();
        let peer = CertificateInfo::generate("peer").unwrap();
        let client = rsa_key_material(&local.certificate).unwrap();
        let server = rsa_key_material(&peer.certificate).unwrap();

        let mut input = Vec::new();
        input.extend_from_slice(&client.modulus);
        input.extend_from_slice(&client.exponent);
        input.extend_from_slice(&server.modulus);
        input.extend_from_slice(&server.exponent);
        input.push(0x2B);
        let expected: [u8; 32] = Sha256::digest(&input).into();

        assert_eq!(
            derive_secret("1A2B", &local.certificate, &peer.certificate).unwrap(),
            expected
        );
    }

    #[test]
    fn test_only_second_half_of_code_is_hashed() {
        let local = CertificateInfo::generate("local").unwrap();
        let peer = CertificateInfo::generate("peer").unwrap();

        let a = derive_secret("002B", &local.certificate, &peer.certificate).unwrap();
        let b = derive_secret("FF2B", &local.certificate, &peer.certificate).unwrap();
        let c = derive_secret("FF2C", &local.certificate, &peer.certificate).unwrap();
        assert_eq!(a, b);
        assert_ne!(b, c);

        let long = derive_secret("00112233445566778899", &local.certificate, &peer.certificate)
            .unwrap();
        assert_eq!(long.len(), SECRET_LENGTH);
    }

    #[test]
    fn test_non_rsa_certificate_is_pairing_error() {
        let local = CertificateInfo::generate("local").unwrap();
        let result = derive_secret("1A2B", &local.certificate, &ec_certificate());
        assert!(matches!(result, Err(ProtocolError::Pairing(_))));

        let result = derive_secret("1A2B", &local.certificate, b"not a certificate");
        assert!(matches!(result, Err(ProtocolError::Pairing(_))));
    }

    #[test]
    fn test_code_check() {
        let mut digest = [0u8; SECRET_LENGTH];
        digest[0] = 0x1A;
        assert!(code_check_matches(&[0x1A, 0x2B], &digest));
        assert!(!code_check_matches(&[0x1B, 0x2B], &digest));
        assert!(code_check_matches(&[], &digest));
    }
}
