//! Packing lists.

use dcpack_core::{make_uuid, remove_urn_uuid, Result, Standard, XmlError};
use dcpack_xml::{parse_file, sign_document, write_document, CertificateChain, Element};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The Interop PKL namespace.
pub const PKL_INTEROP_NS: &str = "http://www.digicine.com/PROTO-ASDCP-PKL-20040311#";
/// The SMPTE PKL namespace.
pub const PKL_SMPTE_NS: &str = "http://www.smpte-ra.org/schemas/429-8/2007/PKL";

/// One `<Asset>` entry in a packing list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PklAsset {
    /// The asset's UUID.
    pub id: String,
    /// Optional annotation.
    pub annotation_text: Option<String>,
    /// Base64 SHA-1 of the file.
    pub hash: String,
    /// File size in bytes.
    pub size: u64,
    /// MIME type.
    pub type_: String,
}

/// A packing list: the inventory of every file in the package with its
/// hash, size and type.
#[derive(Debug, Clone)]
pub struct Pkl {
    /// The PKL's UUID.
    pub id: String,
    /// Where the PKL lives on disk, once read or written.
    pub file: Option<PathBuf>,
    pub annotation_text: Option<String>,
    pub issue_date: String,
    pub issuer: String,
    pub creator: String,
    standard: Standard,
    assets: Vec<PklAsset>,
}

impl Pkl {
    /// Create an empty packing list for authoring.
    pub fn new(
        standard: Standard,
        annotation_text: impl Into<String>,
        issue_date: impl Into<String>,
        issuer: impl Into<String>,
        creator: impl Into<String>,
    ) -> Self {
        Pkl {
            id: make_uuid(),
            file: None,
            annotation_text: Some(annotation_text.into()),
            issue_date: issue_date.into(),
            issuer: issuer.into(),
            creator: creator.into(),
            standard,
            assets: Vec::new(),
        }
    }

    /// Load a packing list from an XML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let root = parse_file(path)?;
        if root.name != "PackingList" {
            return Err(XmlError::UnexpectedRoot {
                expected: "PackingList".to_string(),
                found: root.name.clone(),
            }
            .into());
        }
        let standard = match root.namespace.as_deref() {
            Some(PKL_SMPTE_NS) => Standard::Smpte,
            _ => Standard::Interop,
        };

        let mut assets = Vec::new();
        if let Some(list) = root.child("AssetList") {
            for asset in list.children_named("Asset") {
                assets.push(PklAsset {
                    id: remove_urn_uuid(&asset.string_child("Id")?),
                    annotation_text: asset.optional_string_child("AnnotationText"),
                    hash: asset.string_child("Hash")?,
                    size: asset.number_child("Size")?,
                    type_: asset.string_child("Type")?,
                });
            }
        }

        debug!(path = %path.display(), assets = assets.len(), "read PKL");

        Ok(Pkl {
            id: remove_urn_uuid(&root.string_child("Id")?),
            file: Some(path.to_path_buf()),
            annotation_text: root.optional_string_child("AnnotationText"),
            issue_date: root.string_child("IssueDate")?,
            issuer: root.optional_string_child("Issuer").unwrap_or_default(),
            creator: root.optional_string_child("Creator").unwrap_or_default(),
            standard,
            assets,
        })
    }

    /// The dialect this PKL was created or read as.
    pub fn standard(&self) -> Standard {
        self.standard
    }

    /// Add an entry.
    pub fn add(&mut self, id: &str, hash: String, size: u64, type_: &str) {
        self.assets.push(PklAsset {
            id: id.to_string(),
            annotation_text: None,
            hash,
            size,
            type_: type_.to_string(),
        });
    }

    /// All entries.
    pub fn assets(&self) -> &[PklAsset] {
        &self.assets
    }

    /// The hash recorded for an asset id.
    pub fn hash(&self, id: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| dcpack_core::ids_equal(&a.id, id))
            .map(|a| a.hash.as_str())
    }

    /// The type recorded for an asset id.
    pub fn type_(&self, id: &str) -> Option<&str> {
        self.assets
            .iter()
            .find(|a| dcpack_core::ids_equal(&a.id, id))
            .map(|a| a.type_.as_str())
    }

    /// The size recorded for an asset id.
    pub fn size(&self, id: &str) -> Option<u64> {
        self.assets
            .iter()
            .find(|a| dcpack_core::ids_equal(&a.id, id))
            .map(|a| a.size)
    }

    /// Write the packing list, optionally signing it.
    pub fn write(&mut self, path: &Path, signer: Option<&CertificateChain>) -> Result<()> {
        let namespace = match self.standard {
            Standard::Interop => PKL_INTEROP_NS,
            Standard::Smpte => PKL_SMPTE_NS,
        };
        let mut root = Element::root("PackingList", namespace);

        root.add_text_child("Id", format!("urn:uuid:{}", self.id));
        if let Some(annotation) = &self.annotation_text {
            if !annotation.is_empty() {
                root.add_text_child("AnnotationText", annotation);
            }
        }
        root.add_text_child("IssueDate", &self.issue_date);
        root.add_text_child("Issuer", &self.issuer);
        root.add_text_child("Creator", &self.creator);

        let list = root.add_child(Element::new("AssetList"));
        for asset in &self.assets {
            let node = list.add_child(Element::new("Asset"));
            node.add_text_child("Id", format!("urn:uuid:{}", asset.id));
            if let Some(annotation) = &asset.annotation_text {
                if !annotation.is_empty() {
                    node.add_text_child("AnnotationText", annotation);
                }
            }
            node.add_text_child("Hash", &asset.hash);
            node.add_text_child("Size", asset.size.to_string());
            node.add_text_child("Type", &asset.type_);
        }

        if let Some(chain) = signer {
            sign_document(&mut root, chain, self.standard)?;
        }

        write_document(&root, path)?;
        self.file = Some(path.to_path_buf());
        info!(path = %path.display(), id = %self.id, "wrote PKL");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkl.xml");

        let mut pkl = Pkl::new(
            Standard::Smpte,
            "A Test DCP",
            "2024-03-01T09:30:00.000+00:00",
            "acme",
            "acme",
        );
        pkl.add(
            "0b4e3ce2-0f9c-4e4c-87c0-9e0a1f9b9a10",
            "qZk+NkcGgWq6PiVxeFDCbJzQ2J0=".to_string(),
            1234,
            "application/mxf",
        );
        pkl.write(&path, None).unwrap();

        let read = Pkl::from_file(&path).unwrap();
        assert_eq!(read.id, pkl.id);
        assert_eq!(read.standard(), Standard::Smpte);
        assert_eq!(read.assets().len(), 1);
        assert_eq!(
            read.hash("0B4E3CE2-0F9C-4E4C-87C0-9E0A1F9B9A10"),
            Some("qZk+NkcGgWq6PiVxeFDCbJzQ2J0=")
        );
        assert_eq!(read.size("0b4e3ce2-0f9c-4e4c-87c0-9e0a1f9b9a10"), Some(1234));
        assert_eq!(
            read.type_("0b4e3ce2-0f9c-4e4c-87c0-9e0a1f9b9a10"),
            Some("application/mxf")
        );
    }

    #[test]
    fn test_interop_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkl.xml");

        let mut pkl = Pkl::new(Standard::Interop, "x", "now", "i", "c");
        pkl.write(&path, None).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains(PKL_INTEROP_NS));
    }

    #[test]
    fn test_rejects_wrong_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pkl.xml");
        std::fs::write(&path, "<AssetMap/>").unwrap();
        assert!(Pkl::from_file(&path).is_err());
    }
}
