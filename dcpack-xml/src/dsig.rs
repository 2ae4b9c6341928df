//! Enveloped XML signatures for CPLs, PKLs and KDMs.
//!
//! The signature layout follows SMPTE 429-7 / the Interop convention: a
//! `<Signer>` block naming the leaf certificate, then a `<Signature>` whose
//! `SignedInfo` references the whole document with the enveloped-signature
//! transform. Interop signs rsa-sha1 over a sha1 digest; SMPTE signs
//! rsa-sha256 over a sha256 digest.

use crate::c14n::{canonicalize, canonicalize_subset};
use crate::certificate::Certificate;
use crate::chain::CertificateChain;
use crate::element::Element;
use dcpack_core::{base64_decode, base64_encode, Error, Result, Standard};
use rsa::Pkcs1v15Sign;
use sha1::{Digest, Sha1};
use sha2::Sha256;
use std::collections::BTreeMap;
use tracing::debug;

/// The XML-DSig namespace.
pub const DSIG_NS: &str = "http://www.w3.org/2000/09/xmldsig#";

const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
const ENVELOPED_TRANSFORM: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";
const RSA_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#rsa-sha1";
const RSA_SHA256: &str = "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256";
const DIGEST_SHA1: &str = "http://www.w3.org/2000/09/xmldsig#sha1";
const DIGEST_SHA256: &str = "http://www.w3.org/2001/04/xmlenc#sha256";

fn dsig(name: &str) -> Element {
    Element::prefixed("dsig", name, DSIG_NS)
}

fn dsig_text(name: &str, text: impl Into<String>) -> Element {
    let mut element = dsig(name);
    element.add_text(text);
    element
}

/// Add `<Signer>` and an enveloped `<Signature>` to a document root and
/// compute the digest and signature values in place.
pub fn sign_document(
    root: &mut Element,
    chain: &CertificateChain,
    standard: Standard,
) -> Result<()> {
    let leaf = chain.leaf()?;
    let private_key = chain.private_key()?;

    // <Signer> participates in the digest, so it goes in first.
    let mut signer = Element::new("Signer");
    signer.declare_namespace(Some("dsig"), DSIG_NS);
    let data = signer.add_child(dsig("X509Data"));
    let serial = data.add_child(dsig("X509IssuerSerial"));
    serial.add_child(dsig_text("X509IssuerName", leaf.issuer()));
    serial.add_child(dsig_text("X509SerialNumber", leaf.serial()));
    data.add_child(dsig_text("X509SubjectName", leaf.subject()));
    root.add_child(signer);

    let digest = match standard {
        Standard::Interop => Sha1::digest(canonicalize(root, true).as_bytes()).to_vec(),
        Standard::Smpte => Sha256::digest(canonicalize(root, true).as_bytes()).to_vec(),
    };

    let mut signed_info = dsig("SignedInfo");
    {
        let mut c14n_method = dsig("CanonicalizationMethod");
        c14n_method.set_attribute("Algorithm", C14N_ALGORITHM);
        signed_info.add_child(c14n_method);

        let mut signature_method = dsig("SignatureMethod");
        signature_method.set_attribute(
            "Algorithm",
            match standard {
                Standard::Interop => RSA_SHA1,
                Standard::Smpte => RSA_SHA256,
            },
        );
        signed_info.add_child(signature_method);

        let mut reference = dsig("Reference");
        reference.set_attribute("URI", "");
        let transforms = reference.add_child(dsig("Transforms"));
        let mut transform = dsig("Transform");
        transform.set_attribute("Algorithm", ENVELOPED_TRANSFORM);
        transforms.add_child(transform);
        let mut digest_method = dsig("DigestMethod");
        digest_method.set_attribute(
            "Algorithm",
            match standard {
                Standard::Interop => DIGEST_SHA1,
                Standard::Smpte => DIGEST_SHA256,
            },
        );
        reference.add_child(digest_method);
        reference.add_child(dsig_text("DigestValue", base64_encode(&digest)));
        signed_info.add_child(reference);
    }

    // SignedInfo is canonicalised with the namespace context it will have
    // inside the signed document.
    let mut in_scope = bindings_of(root);
    in_scope.insert(Some("dsig".to_string()), DSIG_NS.to_string());
    let signed_info_c14n = canonicalize_subset(&signed_info, &in_scope);

    let signature_value = match standard {
        Standard::Interop => private_key.sign(
            Pkcs1v15Sign::new::<Sha1>(),
            &Sha1::digest(signed_info_c14n.as_bytes()),
        ),
        Standard::Smpte => private_key.sign(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(signed_info_c14n.as_bytes()),
        ),
    }
    .map_err(|e| Error::CertificateChain(format!("could not sign: {e}")))?;

    let mut signature = dsig("Signature");
    signature.declare_namespace(Some("dsig"), DSIG_NS);
    signature.add_child(signed_info);
    signature.add_child(dsig_text("SignatureValue", base64_encode(&signature_value)));

    let key_info = signature.add_child(dsig("KeyInfo"));
    for certificate in chain.leaf_to_root()? {
        let data = key_info.add_child(dsig("X509Data"));
        let serial = data.add_child(dsig("X509IssuerSerial"));
        serial.add_child(dsig_text("X509IssuerName", certificate.issuer()));
        serial.add_child(dsig_text("X509SerialNumber", certificate.serial()));
        data.add_child(dsig_text("X509Certificate", certificate.base64_body()));
    }

    root.add_child(signature);
    debug!(root = %root.name, standard = %standard, "signed document");
    Ok(())
}

/// Whether a document carries a `<Signature>` in the dsig namespace.
pub fn is_signed(root: &Element) -> bool {
    root.elements()
        .any(|e| e.name == "Signature" && e.namespace.as_deref() == Some(DSIG_NS))
}

/// Verify the enveloped signature of a parsed document: recompute the
/// reference digest, then check the signature over `SignedInfo` against
/// the leaf certificate carried in `KeyInfo`.
pub fn verify_signature(root: &Element) -> Result<()> {
    let signature = root
        .elements()
        .find(|e| e.name == "Signature" && e.namespace.as_deref() == Some(DSIG_NS))
        .ok_or_else(|| Error::misc(format!("<{}> is not signed", root.name)))?;
    let signed_info = signature.required_child("SignedInfo")?;
    let reference = signed_info.required_child("Reference")?;

    let digest_algorithm = reference
        .required_child("DigestMethod")?
        .string_attribute("Algorithm")?;
    let actual_digest = match digest_algorithm.as_str() {
        DIGEST_SHA1 => Sha1::digest(canonicalize(root, true).as_bytes()).to_vec(),
        DIGEST_SHA256 => Sha256::digest(canonicalize(root, true).as_bytes()).to_vec(),
        other => {
            return Err(Error::misc(format!("unsupported digest algorithm {other}")));
        }
    };
    let declared_digest = base64_decode(reference.string_child("DigestValue")?.trim())?;
    if actual_digest != declared_digest {
        return Err(Error::misc("signature digest does not match".to_string()));
    }

    let key_info = signature.required_child("KeyInfo")?;
    let leaf_body = key_info
        .elements()
        .filter(|e| e.name == "X509Data")
        .find_map(|d| d.optional_string_child("X509Certificate"))
        .ok_or_else(|| Error::misc("no certificate in KeyInfo".to_string()))?;
    let leaf = Certificate::from_der(&base64_decode(leaf_body.trim())?)?;

    let mut in_scope = bindings_of(root);
    for (prefix, uri) in &signature.ns_decls {
        in_scope.insert(prefix.clone(), uri.clone());
    }
    let signed_info_c14n = canonicalize_subset(signed_info, &in_scope);

    let signature_value = base64_decode(signature.string_child("SignatureValue")?.trim())?;
    let signature_algorithm = signed_info
        .required_child("SignatureMethod")?
        .string_attribute("Algorithm")?;

    let verified = match signature_algorithm.as_str() {
        RSA_SHA1 => leaf.public_key().verify(
            Pkcs1v15Sign::new::<Sha1>(),
            &Sha1::digest(signed_info_c14n.as_bytes()),
            &signature_value,
        ),
        RSA_SHA256 => leaf.public_key().verify(
            Pkcs1v15Sign::new::<Sha256>(),
            &Sha256::digest(signed_info_c14n.as_bytes()),
            &signature_value,
        ),
        other => {
            return Err(Error::misc(format!(
                "unsupported signature algorithm {other}"
            )));
        }
    };
    verified.map_err(|_| Error::misc("signature does not verify".to_string()))
}

fn bindings_of(element: &Element) -> BTreeMap<Option<String>, String> {
    let mut bindings = BTreeMap::new();
    if let Some(uri) = &element.namespace {
        bindings.insert(element.prefix.clone(), uri.clone());
    }
    for (prefix, uri) in &element.ns_decls {
        bindings.insert(prefix.clone(), uri.clone());
    }
    bindings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::parse_string;
    use crate::write::document_to_string;

    fn test_chain() -> CertificateChain {
        let mut chain =
            CertificateChain::from_pem_bundle(include_str!("../test-data/chain.pem")).unwrap();
        chain.set_key(include_str!("../test-data/leaf-key.pem"));
        chain
    }

    fn signed_document(standard: Standard) -> String {
        let mut root = Element::root("PackingList", "http://example.com/pkl");
        root.add_text_child("Id", "urn:uuid:1");
        root.add_text_child("AnnotationText", "A test package");
        sign_document(&mut root, &test_chain(), standard).unwrap();
        document_to_string(&root)
    }

    #[test]
    fn test_sign_and_verify_smpte() {
        let text = signed_document(Standard::Smpte);
        let parsed = parse_string(&text).unwrap();
        assert!(is_signed(&parsed));
        verify_signature(&parsed).unwrap();
    }

    #[test]
    fn test_sign_and_verify_interop() {
        let text = signed_document(Standard::Interop);
        let parsed = parse_string(&text).unwrap();
        verify_signature(&parsed).unwrap();
    }

    #[test]
    fn test_signature_structure() {
        let text = signed_document(Standard::Smpte);
        let parsed = parse_string(&text).unwrap();

        let signer = parsed.child("Signer").unwrap();
        assert!(signer.has_descendant("X509SubjectName"));

        let signature = parsed.child("Signature").unwrap();
        let signed_info = signature.child("SignedInfo").unwrap();
        assert_eq!(
            signed_info
                .child("CanonicalizationMethod")
                .unwrap()
                .attribute("Algorithm"),
            Some(C14N_ALGORITHM)
        );
        assert_eq!(
            signed_info
                .child("SignatureMethod")
                .unwrap()
                .attribute("Algorithm"),
            Some(RSA_SHA256)
        );
        assert_eq!(
            signed_info.child("Reference").unwrap().attribute("URI"),
            Some("")
        );
        // The certificate chain rides along leaf to root.
        let key_info = signature.child("KeyInfo").unwrap();
        assert_eq!(key_info.children_named("X509Data").count(), 3);
    }

    #[test]
    fn test_tamper_detected() {
        let text = signed_document(Standard::Smpte);
        let tampered = text.replace("A test package", "Another package");
        let parsed = parse_string(&tampered).unwrap();
        assert!(verify_signature(&parsed).is_err());
    }

    #[test]
    fn test_unsigned_rejected() {
        let parsed = parse_string("<PackingList/>").unwrap();
        assert!(!is_signed(&parsed));
        assert!(verify_signature(&parsed).is_err());
    }
}
