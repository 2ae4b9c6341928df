//! Certificate chains for signing DCP documents.
//!
//! A chain is stored unordered; [`CertificateChain::root_to_leaf`] finds
//! the one permutation in which each certificate signs its successor. The
//! leaf's RSA private key may be attached for signing.

use crate::certificate::Certificate;
use dcpack_core::{Error, Result};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;

/// An ordered-on-demand chain of certificates, with an optional private
/// key for the leaf.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
    key: Option<String>,
}

impl CertificateChain {
    /// An empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read every certificate from a PEM bundle. Fails if the certificates
    /// cannot be ordered into a chain.
    pub fn from_pem_bundle(bundle: &str) -> Result<Self> {
        let chain = CertificateChain {
            certificates: Certificate::from_pem_bundle(bundle)?,
            key: None,
        };
        chain.root_to_leaf()?;
        Ok(chain)
    }

    /// Add a certificate.
    pub fn add(&mut self, certificate: Certificate) {
        self.certificates.push(certificate);
    }

    /// Remove a certificate equal to the given one.
    pub fn remove(&mut self, certificate: &Certificate) {
        self.certificates.retain(|c| c != certificate);
    }

    /// Remove the i'th certificate as stored.
    pub fn remove_index(&mut self, index: usize) {
        if index < self.certificates.len() {
            self.certificates.remove(index);
        }
    }

    /// The certificates in storage order.
    pub fn unordered(&self) -> &[Certificate] {
        &self.certificates
    }

    /// Number of certificates.
    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Attach the leaf's private key (PEM).
    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    /// The leaf's private key (PEM), if attached.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The leaf's private key, parsed. Both PKCS#1 and PKCS#8 PEM forms
    /// are accepted.
    pub fn private_key(&self) -> Result<RsaPrivateKey> {
        let pem = self
            .key
            .as_deref()
            .ok_or_else(|| Error::CertificateChain("no private key in chain".into()))?;
        parse_private_key(pem)
    }

    /// Certificates ordered root first.
    pub fn root_to_leaf(&self) -> Result<Vec<&Certificate>> {
        let mut order: Vec<usize> = (0..self.certificates.len()).collect();
        order.sort_by(|&a, &b| self.certificates[a].cmp(&self.certificates[b]));

        loop {
            let candidate: Vec<&Certificate> =
                order.iter().map(|&i| &self.certificates[i]).collect();
            if self.chain_valid_slice(&candidate) {
                return Ok(candidate);
            }
            if !next_permutation(&mut order, |&a, &b| {
                self.certificates[a].cmp(&self.certificates[b])
            }) {
                break;
            }
        }

        Err(Error::CertificateChain(
            "certificate chain is not consistent".into(),
        ))
    }

    /// Certificates ordered leaf first.
    pub fn leaf_to_root(&self) -> Result<Vec<&Certificate>> {
        let mut ordered = self.root_to_leaf()?;
        ordered.reverse();
        Ok(ordered)
    }

    /// The root certificate.
    pub fn root(&self) -> Result<&Certificate> {
        self.root_to_leaf()?
            .first()
            .copied()
            .ok_or_else(|| Error::CertificateChain("chain is empty".into()))
    }

    /// The leaf certificate.
    pub fn leaf(&self) -> Result<&Certificate> {
        self.root_to_leaf()?
            .last()
            .copied()
            .ok_or_else(|| Error::CertificateChain("chain is empty".into()))
    }

    /// Check the chain in its stored order.
    pub fn chain_valid(&self) -> bool {
        let refs: Vec<&Certificate> = self.certificates.iter().collect();
        self.chain_valid_slice(&refs)
    }

    fn chain_valid_slice(&self, chain: &[&Certificate]) -> bool {
        for pair in chain.windows(2) {
            let (predecessor, successor) = (pair[0], pair[1]);
            // Path building alone is not enough: a reordered chain can
            // still verify if two certificates share a key, so the names
            // must also chain.
            if successor.issuer() != predecessor.subject()
                || successor.subject() == predecessor.subject()
                || !successor.signed_by(predecessor)
            {
                return false;
            }
        }
        true
    }

    /// Check that the attached private key matches the leaf certificate.
    /// An empty chain is trivially valid.
    pub fn private_key_valid(&self) -> bool {
        if self.certificates.is_empty() {
            return true;
        }
        let Ok(private_key) = self.private_key() else {
            return false;
        };
        let Ok(leaf) = self.leaf() else {
            return false;
        };
        private_key.n() == leaf.public_key().n()
    }

    /// Check the whole chain, reporting the reason for failure.
    pub fn valid(&self, reason: Option<&mut String>) -> bool {
        if self.root_to_leaf().is_err() {
            if let Some(r) = reason {
                *r = "certificates do not form a chain".to_string();
            }
            return false;
        }

        if !self.private_key_valid() {
            if let Some(r) = reason {
                *r = "private key does not exist, or does not match leaf certificate"
                    .to_string();
            }
            return false;
        }

        true
    }

    /// The whole chain as concatenated PEM, root first.
    pub fn chain_pem(&self) -> Result<String> {
        let mut out = String::new();
        for certificate in self.root_to_leaf()? {
            out.push_str(&certificate.pem());
        }
        Ok(out)
    }
}

/// Parse an RSA private key in either PKCS#8 or PKCS#1 PEM form.
pub fn parse_private_key(pem: &str) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs8_pem(pem)
        .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
        .map_err(|e| Error::CertificateChain(format!("could not read private key: {e}")))
}

/// Lexicographic next permutation, by the given comparator. Returns false
/// once the sequence has wrapped around.
fn next_permutation<T, F>(items: &mut [T], compare: F) -> bool
where
    F: Fn(&T, &T) -> std::cmp::Ordering,
{
    use std::cmp::Ordering;

    if items.len() < 2 {
        return false;
    }
    let mut i = items.len() - 1;
    while i > 0 && compare(&items[i - 1], &items[i]) != Ordering::Less {
        i -= 1;
    }
    if i == 0 {
        items.reverse();
        return false;
    }
    let mut j = items.len() - 1;
    while compare(&items[i - 1], &items[j]) != Ordering::Less {
        j -= 1;
    }
    items.swap(i - 1, j);
    items[i..].reverse();
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN_PEM: &str = include_str!("../test-data/chain.pem");
    const LEAF_KEY_PEM: &str = include_str!("../test-data/leaf-key.pem");

    fn test_chain() -> CertificateChain {
        let mut chain = CertificateChain::from_pem_bundle(CHAIN_PEM).unwrap();
        chain.set_key(LEAF_KEY_PEM);
        chain
    }

    #[test]
    fn test_orders_regardless_of_input_order() {
        let certificates = Certificate::from_pem_bundle(CHAIN_PEM).unwrap();
        // Root, intermediate and leaf shuffled.
        let mut chain = CertificateChain::new();
        chain.add(certificates[1].clone());
        chain.add(certificates[2].clone());
        chain.add(certificates[0].clone());

        let ordered = chain.root_to_leaf().unwrap();
        assert!(ordered[0].self_issued());
        assert_eq!(ordered[1].issuer(), ordered[0].subject());
        assert_eq!(ordered[2].issuer(), ordered[1].subject());
    }

    #[test]
    fn test_ordering_is_idempotent() {
        let chain = test_chain();
        let first: Vec<String> = chain
            .root_to_leaf()
            .unwrap()
            .iter()
            .map(|c| c.subject().to_string())
            .collect();
        let second: Vec<String> = chain
            .root_to_leaf()
            .unwrap()
            .iter()
            .map(|c| c.subject().to_string())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_valid_chain() {
        let chain = test_chain();
        let mut reason = String::new();
        assert!(chain.valid(Some(&mut reason)), "{reason}");
        assert!(chain.private_key_valid());
    }

    #[test]
    fn test_broken_without_intermediate() {
        let mut chain = test_chain();
        let intermediate = chain
            .unordered()
            .iter()
            .find(|c| !c.self_issued() && c.subject().contains("INTERMEDIATE"))
            .unwrap()
            .clone();
        chain.remove(&intermediate);

        let mut reason = String::new();
        assert!(!chain.valid(Some(&mut reason)));
        assert_eq!(reason, "certificates do not form a chain");
    }

    #[test]
    fn test_key_mismatch_reported() {
        let mut chain = CertificateChain::from_pem_bundle(CHAIN_PEM).unwrap();

        // No key at all.
        let mut reason = String::new();
        assert!(!chain.valid(Some(&mut reason)));
        assert_eq!(
            reason,
            "private key does not exist, or does not match leaf certificate"
        );

        // A key belonging to nothing in the chain.
        chain.set_key(include_str!("../test-data/other-key.pem"));
        assert!(!chain.private_key_valid());
        assert!(!chain.valid(None));
    }

    #[test]
    fn test_leaf_and_root() {
        let chain = test_chain();
        assert!(chain.root().unwrap().self_issued());
        assert!(chain.leaf().unwrap().subject().contains("LEAF"));
    }

    #[test]
    fn test_chain_pem_round_trip() {
        let chain = test_chain();
        let pem = chain.chain_pem().unwrap();
        let again = CertificateChain::from_pem_bundle(&pem).unwrap();
        assert_eq!(again.len(), 3);
        assert!(again.root_to_leaf().is_ok());
    }

    #[test]
    fn test_next_permutation() {
        let mut items = vec![1, 2, 3];
        let mut seen = vec![items.clone()];
        while next_permutation(&mut items, |a, b| a.cmp(b)) {
            seen.push(items.clone());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(items, vec![1, 2, 3]);
    }
}
