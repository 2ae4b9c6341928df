//! X.509 certificates.
//!
//! Certificates are parsed once and held with their useful fields
//! extracted: distinguished names, serial, validity, the RSA public key
//! and the raw to-be-signed bytes for signature checks.

use dcpack_core::{base64_encode, Error, Result};
use rsa::{BigUint, Pkcs1v15Sign, RsaPublicKey};
use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha384, Sha512};
use x509_parser::prelude::*;

/// Hash used in a certificate's signature algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignatureHash {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

/// A parsed X.509 certificate.
#[derive(Debug, Clone)]
pub struct Certificate {
    der: Vec<u8>,
    subject: String,
    issuer: String,
    serial: String,
    subject_common_name: String,
    subject_dn_qualifier: Option<String>,
    not_before: i64,
    not_after: i64,
    public_key: RsaPublicKey,
    tbs: Vec<u8>,
    signature: Vec<u8>,
    signature_hash: SignatureHash,
}

impl Certificate {
    /// Parse a certificate from one PEM block.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let (_, parsed) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
            .map_err(|e| Error::CertificateChain(format!("bad PEM: {e}")))?;
        Self::from_der(&parsed.contents)
    }

    /// Parse every certificate in a PEM bundle, in order.
    pub fn from_pem_bundle(bundle: &str) -> Result<Vec<Self>> {
        let mut certificates = Vec::new();
        for pem in x509_parser::pem::Pem::iter_from_buffer(bundle.as_bytes()) {
            let pem = pem.map_err(|e| Error::CertificateChain(format!("bad PEM: {e}")))?;
            if pem.label == "CERTIFICATE" {
                certificates.push(Self::from_der(&pem.contents)?);
            }
        }
        Ok(certificates)
    }

    /// Parse a certificate from DER bytes.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| Error::CertificateChain(format!("bad certificate: {e}")))?;

        let subject = format_name(cert.subject());
        let issuer = format_name(cert.issuer());
        let serial = cert.tbs_certificate.serial.to_string();

        let subject_common_name = name_attribute(cert.subject(), OID_CN).unwrap_or_default();
        let subject_dn_qualifier = name_attribute(cert.subject(), OID_DN_QUALIFIER);

        let public_key = match cert
            .public_key()
            .parsed()
            .map_err(|e| Error::CertificateChain(format!("bad public key: {e}")))?
        {
            x509_parser::public_key::PublicKey::RSA(rsa) => RsaPublicKey::new(
                BigUint::from_bytes_be(rsa.modulus),
                BigUint::from_bytes_be(rsa.exponent),
            )
            .map_err(|e| Error::CertificateChain(format!("bad RSA key: {e}")))?,
            _ => {
                return Err(Error::CertificateChain(
                    "certificate does not hold an RSA key".into(),
                ))
            }
        };

        let oid = cert.signature_algorithm.algorithm.to_id_string();
        let signature_hash = match oid.as_str() {
            "1.2.840.113549.1.1.5" => SignatureHash::Sha1,
            "1.2.840.113549.1.1.11" => SignatureHash::Sha256,
            "1.2.840.113549.1.1.12" => SignatureHash::Sha384,
            "1.2.840.113549.1.1.13" => SignatureHash::Sha512,
            other => {
                return Err(Error::CertificateChain(format!(
                    "unsupported signature algorithm {other}"
                )))
            }
        };

        Ok(Certificate {
            subject,
            issuer,
            serial,
            subject_common_name,
            subject_dn_qualifier,
            not_before: cert.validity().not_before.timestamp(),
            not_after: cert.validity().not_after.timestamp(),
            public_key,
            tbs: cert.tbs_certificate.as_ref().to_vec(),
            signature: cert.signature_value.data.to_vec(),
            signature_hash,
            der: der.to_vec(),
        })
    }

    /// The subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The issuer distinguished name.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// The serial number in decimal.
    pub fn serial(&self) -> &str {
        &self.serial
    }

    /// The subject common name.
    pub fn subject_common_name(&self) -> &str {
        &self.subject_common_name
    }

    /// The subject dnQualifier, if present.
    pub fn subject_dn_qualifier(&self) -> Option<&str> {
        self.subject_dn_qualifier.as_deref()
    }

    /// Whether the certificate is self-signed by name.
    pub fn self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Validity window as UNIX timestamps.
    pub fn validity(&self) -> (i64, i64) {
        (self.not_before, self.not_after)
    }

    /// The RSA public key.
    pub fn public_key(&self) -> &RsaPublicKey {
        &self.public_key
    }

    /// The DER bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Base64 of the DER, without headers or line breaks; the form used in
    /// `<X509Certificate>` elements.
    pub fn base64_body(&self) -> String {
        base64_encode(&self.der)
    }

    /// The certificate as a PEM block with 64-column base64 lines.
    pub fn pem(&self) -> String {
        let body = self.base64_body();
        let mut out = String::from("-----BEGIN CERTIFICATE-----\n");
        for chunk in body.as_bytes().chunks(64) {
            out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
            out.push('\n');
        }
        out.push_str("-----END CERTIFICATE-----\n");
        out
    }

    /// Base64 SHA-1 of the DER bytes.
    pub fn thumbprint(&self) -> String {
        let mut sha = Sha1::new();
        sha.update(&self.der);
        base64_encode(&sha.finalize())
    }

    /// Check whether this certificate's signature verifies against the
    /// given issuer's public key.
    pub fn signed_by(&self, issuer: &Certificate) -> bool {
        let key = issuer.public_key();
        let result = match self.signature_hash {
            SignatureHash::Sha1 => key.verify(
                Pkcs1v15Sign::new::<Sha1>(),
                &Sha1::digest(&self.tbs),
                &self.signature,
            ),
            SignatureHash::Sha256 => key.verify(
                Pkcs1v15Sign::new::<Sha256>(),
                &Sha256::digest(&self.tbs),
                &self.signature,
            ),
            SignatureHash::Sha384 => key.verify(
                Pkcs1v15Sign::new::<Sha384>(),
                &Sha384::digest(&self.tbs),
                &self.signature,
            ),
            SignatureHash::Sha512 => key.verify(
                Pkcs1v15Sign::new::<Sha512>(),
                &Sha512::digest(&self.tbs),
                &self.signature,
            ),
        };
        result.is_ok()
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl PartialOrd for Certificate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Certificate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.der.cmp(&other.der)
    }
}

const OID_CN: &str = "2.5.4.3";
const OID_DN_QUALIFIER: &str = "2.5.4.46";

fn short_attribute_name(oid: &str) -> Option<&'static str> {
    match oid {
        "2.5.4.3" => Some("CN"),
        "2.5.4.6" => Some("C"),
        "2.5.4.7" => Some("L"),
        "2.5.4.8" => Some("ST"),
        "2.5.4.10" => Some("O"),
        "2.5.4.11" => Some("OU"),
        "2.5.4.46" => Some("dnQualifier"),
        "1.2.840.113549.1.9.1" => Some("emailAddress"),
        _ => None,
    }
}

/// Format a distinguished name as comma-joined `type=value` pairs in
/// document order. Used for both subjects and issuers so that the
/// adjacency checks in chain validation compare like with like.
fn format_name(name: &X509Name) -> String {
    let mut parts = Vec::new();
    for attribute in name.iter_attributes() {
        let oid = attribute.attr_type().to_id_string();
        let key = short_attribute_name(&oid)
            .map(str::to_string)
            .unwrap_or(oid);
        let value = attribute.as_str().unwrap_or_default();
        parts.push(format!("{key}={value}"));
    }
    parts.join(",")
}

fn name_attribute(name: &X509Name, oid: &str) -> Option<String> {
    for attribute in name.iter_attributes() {
        if attribute.attr_type().to_id_string() == oid {
            return attribute.as_str().ok().map(str::to_string);
        }
    }
    None
}
