//! The asset map: the package's entry point on disk.
//!
//! The asset map names every file by id and relative path, flags which
//! entry is the packing list, and is the last file a writer touches: a
//! reader discovers the whole package through it.

use dcpack_core::{make_uuid, remove_urn_uuid, Result, Standard, XmlError};
use dcpack_xml::{parse_file, write_document, Element};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The Interop asset map namespace.
pub const ASSETMAP_INTEROP_NS: &str = "http://www.digicine.com/PROTO-ASDCP-AM-20040311#";
/// The SMPTE asset map namespace.
pub const ASSETMAP_SMPTE_NS: &str = "http://www.smpte-ra.org/schemas/429-9/2007/AM";
/// The Interop volume index namespace.
pub const VOLINDEX_INTEROP_NS: &str = "http://www.digicine.com/PROTO-ASDCP-VL-20040311#";
/// The SMPTE volume index namespace.
pub const VOLINDEX_SMPTE_NS: &str = "http://www.smpte-ra.org/schemas/429-9/2007/AM";

/// One entry in the asset map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetMapEntry {
    /// The asset's UUID.
    pub id: String,
    /// Path relative to the package directory.
    pub path: String,
    /// Whether this entry is the packing list.
    pub pkl: bool,
    /// Chunk length in bytes, where recorded.
    pub length: Option<u64>,
}

/// A parsed or under-construction asset map.
#[derive(Debug, Clone)]
pub struct AssetMap {
    /// The asset map's own UUID.
    pub id: String,
    /// Annotation carried in the map.
    pub annotation_text: Option<String>,
    /// The dialect, detected from the namespace on read.
    pub standard: Standard,
    /// The entries in document order.
    pub entries: Vec<AssetMapEntry>,
    /// Where the map was read from.
    pub file: Option<PathBuf>,
}

impl AssetMap {
    /// Locate `ASSETMAP` or `ASSETMAP.xml` under a directory.
    pub fn find(directory: &Path) -> Option<PathBuf> {
        for name in ["ASSETMAP", "ASSETMAP.xml"] {
            let candidate = directory.join(name);
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }

    /// Read an asset map, detecting the dialect from its namespace.
    pub fn from_file(path: &Path) -> Result<Self> {
        let root = parse_file(path)?;
        if root.name != "AssetMap" {
            return Err(XmlError::UnexpectedRoot {
                expected: "AssetMap".to_string(),
                found: root.name.clone(),
            }
            .into());
        }

        let standard = match root.namespace.as_deref() {
            Some(ASSETMAP_INTEROP_NS) => Standard::Interop,
            Some(ASSETMAP_SMPTE_NS) => Standard::Smpte,
            other => {
                return Err(XmlError::UnrecognisedNamespace(
                    other.unwrap_or_default().to_string(),
                )
                .into());
            }
        };

        let mut entries = Vec::new();
        if let Some(list) = root.child("AssetList") {
            for asset in list.children_named("Asset") {
                let chunks: Vec<_> = asset
                    .required_child("ChunkList")?
                    .children_named("Chunk")
                    .collect();
                if chunks.len() != 1 {
                    return Err(XmlError::BadContent {
                        element: "ChunkList".to_string(),
                        message: format!("unsupported chunk count {}", chunks.len()),
                    }
                    .into());
                }
                let mut path = chunks[0].string_child("Path")?;
                if let Some(stripped) = path.strip_prefix("file://") {
                    path = stripped.to_string();
                }

                // Interop flags the PKL with a bare element; SMPTE with
                // boolean content.
                let pkl = match standard {
                    Standard::Interop => asset.child("PackingList").is_some(),
                    Standard::Smpte => asset
                        .optional_string_child("PackingList")
                        .map(|v| v.trim() == "true")
                        .unwrap_or(false),
                };

                entries.push(AssetMapEntry {
                    id: remove_urn_uuid(&asset.string_child("Id")?),
                    path,
                    pkl,
                    length: chunks[0].optional_number_child("Length")?,
                });
            }
        }

        debug!(path = %path.display(), entries = entries.len(), "read asset map");

        Ok(AssetMap {
            id: remove_urn_uuid(&root.string_child("Id")?),
            annotation_text: root.optional_string_child("AnnotationText"),
            standard,
            entries,
            file: Some(path.to_path_buf()),
        })
    }

    /// Paths of the packing lists named by the map.
    pub fn pkl_paths(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.pkl)
            .map(|e| e.path.as_str())
            .collect()
    }

    /// Non-PKL entries as `(id, path)`.
    pub fn asset_entries(&self) -> impl Iterator<Item = &AssetMapEntry> {
        self.entries.iter().filter(|e| !e.pkl)
    }
}

/// Data for writing one asset-map entry.
pub struct AssetMapWriteEntry {
    pub id: String,
    pub filename: String,
    pub length: u64,
}

/// Write an `ASSETMAP` (Interop) or `ASSETMAP.xml` (SMPTE) and return its
/// path. The PKL entry comes first, flagged per dialect.
#[allow(clippy::too_many_arguments)]
pub fn write_asset_map(
    directory: &Path,
    standard: Standard,
    pkl_id: &str,
    pkl_path: &Path,
    issuer: &str,
    creator: &str,
    issue_date: &str,
    annotation_text: &str,
    assets: &[AssetMapWriteEntry],
) -> Result<PathBuf> {
    let path = directory.join(match standard {
        Standard::Interop => "ASSETMAP",
        Standard::Smpte => "ASSETMAP.xml",
    });

    let namespace = match standard {
        Standard::Interop => ASSETMAP_INTEROP_NS,
        Standard::Smpte => ASSETMAP_SMPTE_NS,
    };
    let mut root = Element::root("AssetMap", namespace);
    root.add_text_child("Id", format!("urn:uuid:{}", make_uuid()));
    root.add_text_child("AnnotationText", annotation_text);

    // The dialects order the header fields differently.
    match standard {
        Standard::Interop => {
            root.add_text_child("VolumeCount", "1");
            root.add_text_child("IssueDate", issue_date);
            root.add_text_child("Issuer", issuer);
            root.add_text_child("Creator", creator);
        }
        Standard::Smpte => {
            root.add_text_child("Creator", creator);
            root.add_text_child("VolumeCount", "1");
            root.add_text_child("IssueDate", issue_date);
            root.add_text_child("Issuer", issuer);
        }
    }

    let pkl_size = std::fs::metadata(pkl_path)?.len();
    let pkl_filename = pkl_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let list = root.add_child(Element::new("AssetList"));
    {
        let asset = list.add_child(Element::new("Asset"));
        asset.add_text_child("Id", format!("urn:uuid:{pkl_id}"));
        match standard {
            Standard::Interop => {
                asset.add_child(Element::new("PackingList"));
            }
            Standard::Smpte => {
                asset.add_text_child("PackingList", "true");
            }
        }
        add_chunk(asset, &pkl_filename, pkl_size);
    }
    for entry in assets {
        let asset = list.add_child(Element::new("Asset"));
        asset.add_text_child("Id", format!("urn:uuid:{}", entry.id));
        add_chunk(asset, &entry.filename, entry.length);
    }

    write_document(&root, &path)?;
    info!(path = %path.display(), "wrote asset map");
    Ok(path)
}

fn add_chunk(asset: &mut Element, filename: &str, length: u64) {
    let chunk_list = asset.add_child(Element::new("ChunkList"));
    let chunk = chunk_list.add_child(Element::new("Chunk"));
    chunk.add_text_child("Path", filename);
    chunk.add_text_child("VolumeIndex", "1");
    chunk.add_text_child("Offset", "0");
    chunk.add_text_child("Length", length.to_string());
}

/// Write the `VOLINDEX` (Interop) or `VOLINDEX.xml` (SMPTE) file.
pub fn write_volindex(directory: &Path, standard: Standard) -> Result<PathBuf> {
    let (name, namespace) = match standard {
        Standard::Interop => ("VOLINDEX", VOLINDEX_INTEROP_NS),
        Standard::Smpte => ("VOLINDEX.xml", VOLINDEX_SMPTE_NS),
    };
    let path = directory.join(name);
    let mut root = Element::root("VolumeIndex", namespace);
    root.add_text_child("Index", "1");
    write_document(&root, &path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_sample(dir: &Path, standard: Standard) -> PathBuf {
        let pkl_path = dir.join("pkl.xml");
        std::fs::write(&pkl_path, "<PackingList/>").unwrap();
        write_asset_map(
            dir,
            standard,
            "11111111-2222-3333-4444-555555555555",
            &pkl_path,
            "issuer",
            "creator",
            "2024-03-01T09:30:00.000+00:00",
            "A Test DCP",
            &[AssetMapWriteEntry {
                id: "66666666-7777-8888-9999-aaaaaaaaaaaa".to_string(),
                filename: "picture.mxf".to_string(),
                length: 42,
            }],
        )
        .unwrap()
    }

    #[test]
    fn test_smpte_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), Standard::Smpte);
        assert!(path.ends_with("ASSETMAP.xml"));

        let map = AssetMap::from_file(&path).unwrap();
        assert_eq!(map.standard, Standard::Smpte);
        assert_eq!(map.pkl_paths(), vec!["pkl.xml"]);

        let assets: Vec<_> = map.asset_entries().collect();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "66666666-7777-8888-9999-aaaaaaaaaaaa");
        assert_eq!(assets[0].path, "picture.mxf");
        assert_eq!(assets[0].length, Some(42));
    }

    #[test]
    fn test_interop_pkl_flag_is_bare_element() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample(dir.path(), Standard::Interop);
        assert!(path.ends_with("ASSETMAP"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("<PackingList/>"));

        let map = AssetMap::from_file(&path).unwrap();
        assert_eq!(map.standard, Standard::Interop);
        assert_eq!(map.pkl_paths().len(), 1);
    }

    #[test]
    fn test_file_uri_prefix_stripped() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!(
            concat!(
                "<AssetMap xmlns=\"{}\"><Id>urn:uuid:x</Id><AssetList>",
                "<Asset><Id>urn:uuid:y</Id><ChunkList><Chunk>",
                "<Path>file://video.mxf</Path></Chunk></ChunkList></Asset>",
                "</AssetList></AssetMap>",
            ),
            ASSETMAP_SMPTE_NS
        );
        let path = dir.path().join("ASSETMAP.xml");
        std::fs::write(&path, text).unwrap();

        let map = AssetMap::from_file(&path).unwrap();
        let entries: Vec<_> = map.asset_entries().collect();
        assert_eq!(entries[0].path, "video.mxf");
    }

    #[test]
    fn test_unrecognised_namespace_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ASSETMAP.xml");
        std::fs::write(&path, "<AssetMap xmlns=\"urn:nope\"/>").unwrap();
        assert!(AssetMap::from_file(&path).is_err());
    }

    #[test]
    fn test_find() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AssetMap::find(dir.path()).is_none());
        write_sample(dir.path(), Standard::Interop);
        assert!(AssetMap::find(dir.path()).unwrap().ends_with("ASSETMAP"));
    }
}
