//! Certificate chain generation.
//!
//! Chains are generated by shelling out to the `openssl` binary. The
//! dnQualifier attribute required by SMPTE 430-2 is a base64 SHA-1 of the
//! subject's public key DER with its first 24 bytes omitted; those bytes
//! are the SubjectPublicKeyInfo header of a 2048-bit RSA key, leaving the
//! raw PKCS#1 key material.

use crate::chain::CertificateChain;
use dcpack_core::{base64_decode, base64_encode, Error, Result};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Parameters for a generated chain.
#[derive(Debug, Clone)]
pub struct ChainBuilder {
    openssl: PathBuf,
    organisation: String,
    organisational_unit: String,
    root_common_name: String,
    intermediate_common_name: String,
    leaf_common_name: String,
}

impl ChainBuilder {
    /// Create a builder using `openssl` from the search path.
    pub fn new(
        organisation: impl Into<String>,
        organisational_unit: impl Into<String>,
        root_common_name: impl Into<String>,
        intermediate_common_name: impl Into<String>,
        leaf_common_name: impl Into<String>,
    ) -> Self {
        ChainBuilder {
            openssl: PathBuf::from("openssl"),
            organisation: organisation.into(),
            organisational_unit: organisational_unit.into(),
            root_common_name: root_common_name.into(),
            intermediate_common_name: intermediate_common_name.into(),
            leaf_common_name: leaf_common_name.into(),
        }
    }

    /// Use a specific openssl binary.
    pub fn with_openssl(mut self, path: impl Into<PathBuf>) -> Self {
        self.openssl = path.into();
        self
    }

    /// Generate a three-deep chain (root, intermediate, leaf) with the
    /// leaf's private key attached.
    ///
    /// All work happens in a temporary directory which is removed before
    /// returning; removal failure never masks the primary result.
    pub fn build(&self) -> Result<CertificateChain> {
        let dir = tempfile::tempdir()?;
        let result = self.build_in(dir.path());
        // TempDir removes itself on drop and swallows any error doing so.
        result
    }

    fn build_in(&self, dir: &Path) -> Result<CertificateChain> {
        debug!(dir = %dir.display(), "generating certificate chain");

        self.run(dir, &["genrsa", "-out", "ca.key", "2048"])?;
        std::fs::write(dir.join("ca.cnf"), config(3, true))?;
        let ca_subject = self.subject(&self.root_common_name, &dir.join("ca.key"))?;
        self.run(
            dir,
            &[
                "req", "-new", "-x509", "-sha256", "-config", "ca.cnf", "-days", "3650",
                "-set_serial", "5", "-subj", &ca_subject, "-key", "ca.key", "-outform", "PEM",
                "-out", "ca.self-signed.pem",
            ],
        )?;

        self.run(dir, &["genrsa", "-out", "intermediate.key", "2048"])?;
        std::fs::write(dir.join("intermediate.cnf"), config(2, true))?;
        let intermediate_subject =
            self.subject(&self.intermediate_common_name, &dir.join("intermediate.key"))?;
        self.run(
            dir,
            &[
                "req", "-new", "-config", "intermediate.cnf", "-days", "3649", "-subj",
                &intermediate_subject, "-key", "intermediate.key", "-out", "intermediate.csr",
            ],
        )?;
        self.run(
            dir,
            &[
                "x509", "-req", "-sha256", "-days", "3649", "-CA", "ca.self-signed.pem",
                "-CAkey", "ca.key", "-set_serial", "6", "-in", "intermediate.csr", "-extfile",
                "intermediate.cnf", "-extensions", "v3_ca", "-out", "intermediate.signed.pem",
            ],
        )?;

        self.run(dir, &["genrsa", "-out", "leaf.key", "2048"])?;
        std::fs::write(dir.join("leaf.cnf"), config(0, false))?;
        let leaf_subject = self.subject(&self.leaf_common_name, &dir.join("leaf.key"))?;
        self.run(
            dir,
            &[
                "req", "-new", "-config", "leaf.cnf", "-days", "3648", "-subj", &leaf_subject,
                "-key", "leaf.key", "-outform", "PEM", "-out", "leaf.csr",
            ],
        )?;
        self.run(
            dir,
            &[
                "x509", "-req", "-sha256", "-days", "3648", "-CA", "intermediate.signed.pem",
                "-CAkey", "intermediate.key", "-set_serial", "7", "-in", "leaf.csr", "-extfile",
                "leaf.cnf", "-extensions", "v3_ca", "-out", "leaf.signed.pem",
            ],
        )?;

        let mut bundle = String::new();
        for name in ["ca.self-signed.pem", "intermediate.signed.pem", "leaf.signed.pem"] {
            bundle.push_str(&std::fs::read_to_string(dir.join(name))?);
        }
        let mut chain = CertificateChain::from_pem_bundle(&bundle)?;
        chain.set_key(std::fs::read_to_string(dir.join("leaf.key"))?);
        Ok(chain)
    }

    fn subject(&self, common_name: &str, key: &Path) -> Result<String> {
        Ok(format!(
            "/O={}/OU={}/CN={}/dnQualifier={}",
            self.organisation,
            self.organisational_unit,
            common_name,
            public_key_digest(key, &self.openssl)?
        ))
    }

    fn run(&self, dir: &Path, args: &[&str]) -> Result<()> {
        let status = Command::new(&self.openssl)
            .args(args)
            .current_dir(dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| Error::misc(format!("could not run {}: {e}", self.openssl.display())))?;
        if !status.success() {
            return Err(Error::misc(format!(
                "error {} in openssl {}",
                status.code().unwrap_or(-1),
                args.join(" ")
            )));
        }
        Ok(())
    }
}

fn config(path_length: u32, ca: bool) -> String {
    let constraints = if ca {
        format!("basicConstraints = critical,CA:true,pathlen:{path_length}")
    } else {
        "basicConstraints = critical,CA:false".to_string()
    };
    let key_usage = if ca {
        "keyUsage = keyCertSign,cRLSign"
    } else {
        "keyUsage = digitalSignature,keyEncipherment"
    };
    format!(
        "[ req ]\n\
         distinguished_name = req_distinguished_name\n\
         x509_extensions = v3_ca\n\
         string_mask = nombstr\n\
         [ v3_ca ]\n\
         {constraints}\n\
         {key_usage}\n\
         subjectKeyIdentifier = hash\n\
         authorityKeyIdentifier = keyid:always,issuer:always\n\
         [ req_distinguished_name ]\n\
         O = Unique organization name\n\
         OU = Organization unit\n\
         CN = Entity and dnQualifier\n"
    )
}

/// Extract the public key of a private key file and compute the SMPTE
/// dnQualifier digest of it, with `/` characters escaped for use in an
/// openssl subject argument.
pub fn public_key_digest(private_key: &Path, openssl: &Path) -> Result<String> {
    let public_path = private_key.with_extension("public");
    let status = Command::new(openssl)
        .args(["rsa", "-outform", "PEM", "-pubout", "-in"])
        .arg(private_key)
        .arg("-out")
        .arg(&public_path)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| Error::misc(format!("could not run {}: {e}", openssl.display())))?;
    if !status.success() {
        return Err(Error::misc("could not extract public key".to_string()));
    }

    let pem = std::fs::read_to_string(&public_path)
        .map_err(|_| Error::misc("public key not found".to_string()))?;
    Ok(dn_qualifier_of_public_key_pem(&pem)?.replace('/', "\\/"))
}

/// The dnQualifier digest of a public key given as PEM: base64 SHA-1 of
/// the DER with the first 24 bytes omitted.
pub fn dn_qualifier_of_public_key_pem(pem: &str) -> Result<String> {
    let mut body = String::new();
    let mut in_block = false;
    for line in pem.lines() {
        if line.starts_with("-----BEGIN") {
            in_block = true;
        } else if line.starts_with("-----END") {
            break;
        } else if in_block {
            body.push_str(line.trim());
        }
    }
    if body.is_empty() {
        return Err(Error::misc("no public key PEM block found".to_string()));
    }

    let der = base64_decode(&body)?;
    if der.len() <= 24 {
        return Err(Error::misc("public key DER too short".to_string()));
    }
    let mut sha = Sha1::new();
    sha.update(&der[24..]);
    Ok(base64_encode(&sha.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openssl_available() -> bool {
        Command::new("openssl")
            .arg("version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    #[test]
    fn test_generated_chain_is_valid() {
        if !openssl_available() {
            return;
        }
        let chain = ChainBuilder::new(
            "example.org",
            "example.org",
            ".smpte-430-2.ROOT.NOT_FOR_PRODUCTION",
            ".smpte-430-2.INTERMEDIATE.NOT_FOR_PRODUCTION",
            "CS.smpte-430-2.LEAF.NOT_FOR_PRODUCTION",
        )
        .build()
        .unwrap();

        assert_eq!(chain.len(), 3);
        let mut reason = String::new();
        assert!(chain.valid(Some(&mut reason)), "{reason}");

        // Every subject carries the dnQualifier of its own public key.
        for certificate in chain.unordered() {
            assert!(certificate.subject().contains("dnQualifier="));
        }
    }

    #[test]
    fn test_removing_intermediate_breaks_generated_chain() {
        if !openssl_available() {
            return;
        }
        let mut chain = ChainBuilder::new("o", "ou", "root", "intermediate", "leaf")
            .build()
            .unwrap();
        let ordered: Vec<_> = chain
            .root_to_leaf()
            .unwrap()
            .into_iter()
            .cloned()
            .collect();
        chain.remove(&ordered[1]);

        let mut reason = String::new();
        assert!(!chain.valid(Some(&mut reason)));
        assert_eq!(reason, "certificates do not form a chain");
    }

    #[test]
    fn test_dn_qualifier_omits_spki_header() {
        // For a 2048-bit RSA SubjectPublicKeyInfo the first 24 bytes are
        // the outer SEQUENCE, AlgorithmIdentifier and BIT STRING header;
        // the digest is over what follows. Pinned with a fixed key so the
        // skip never drifts.
        let pem = include_str!("../test-data/public-key.pem");
        let digest = dn_qualifier_of_public_key_pem(pem).unwrap();

        let body: String = pem
            .lines()
            .filter(|l| !l.starts_with("-----"))
            .collect();
        let der = base64_decode(&body).unwrap();
        let mut sha = Sha1::new();
        sha.update(&der[24..]);
        assert_eq!(digest, base64_encode(&sha.finalize()));
        assert_eq!(digest.len(), 28);
    }
}
