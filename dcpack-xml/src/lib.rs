//! XML and signing infrastructure for the dcpack library.
//!
//! DCP manifests are namespace-sensitive XML documents whose exact bytes
//! matter: CPLs and PKLs carry enveloped XML signatures whose digests are
//! computed over canonicalised subtrees. This crate provides the owned
//! element tree those documents are built from, a parser and an
//! unformatted writer over it, inclusive canonicalisation, the signature
//! engine and the X.509 certificate chain it signs with.

mod c14n;
mod certificate;
mod chain;
mod dsig;
mod element;
mod generate;
mod read;
mod write;

pub use c14n::{canonicalize, canonicalize_subset};
pub use certificate::Certificate;
pub use chain::{parse_private_key, CertificateChain};
pub use dsig::{is_signed, sign_document, verify_signature, DSIG_NS};
pub use element::{Element, Node};
pub use generate::{dn_qualifier_of_public_key_pem, public_key_digest, ChainBuilder};
pub use read::{parse_file, parse_string};
pub use write::{document_to_string, element_to_string, write_document};
