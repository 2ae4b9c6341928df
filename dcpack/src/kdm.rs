//! Key Delivery Message consumption.
//!
//! Issuing KDMs is someone else's job; this module only takes a KDM
//! targeted at us, decrypts its key blocks with the recipient's RSA
//! private key and hands the content keys to the matching assets. Key
//! material is zeroized on drop.

use dcpack_core::{base64_decode, Error, Result};
use dcpack_xml::{parse_file, parse_string, parse_private_key, Element};
use rsa::Oaep;
use sha1::Sha1;
use std::path::Path;
use uuid::Uuid;
use zeroize::{Zeroize, ZeroizeOnDrop};

// SMPTE 430-1 key blocks: both dialects share the layout up to the CPL
// id; SMPTE inserts a four-character key type before the key id.
const INTEROP_BLOCK_LEN: usize = 134;
const SMPTE_BLOCK_LEN: usize = 138;

/// One `<TypedKeyId>` from the authenticated public part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedKeyId {
    /// `MDIK`, `MDAK`, `MDSK` or similar; absent in Interop KDMs.
    pub key_type: Option<String>,
    /// The key's UUID.
    pub key_id: String,
}

/// A KDM as parsed from XML, with its key blocks still encrypted.
#[derive(Debug, Clone)]
pub struct EncryptedKdm {
    /// The message's UUID.
    pub message_id: String,
    /// Annotation from the authenticated public part.
    pub annotation_text: Option<String>,
    /// Issue date as written.
    pub issue_date: String,
    /// The CPL this KDM unlocks.
    pub cpl_id: String,
    /// Content title as written.
    pub content_title_text: String,
    /// Declared key ids.
    pub key_ids: Vec<TypedKeyId>,
    encrypted_keys: Vec<Vec<u8>>,
}

impl EncryptedKdm {
    /// Parse a KDM document.
    pub fn from_xml(text: &str) -> Result<Self> {
        let root = parse_string(text)?;
        Self::from_element(&root)
    }

    /// Parse a KDM file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let root = parse_file(path)?;
        Self::from_element(&root)
    }

    fn from_element(root: &Element) -> Result<Self> {
        if root.name != "DCinemaSecurityMessage" {
            return Err(Error::read(format!(
                "expected <DCinemaSecurityMessage>, found <{}>",
                root.name
            )));
        }
        let public = root.required_child("AuthenticatedPublic")?;
        let extensions = public
            .required_child("RequiredExtensions")?
            .required_child("KDMRequiredExtensions")?;

        let mut key_ids = Vec::new();
        if let Some(list) = extensions.child("KeyIdList") {
            for typed in list.children_named("TypedKeyId") {
                key_ids.push(TypedKeyId {
                    key_type: typed.optional_string_child("KeyType"),
                    key_id: dcpack_core::remove_urn_uuid(&typed.string_child("KeyId")?),
                });
            }
        }

        let mut encrypted_keys = Vec::new();
        if let Some(private) = root.child("AuthenticatedPrivate") {
            for encrypted in private.children_named("EncryptedKey") {
                let value = encrypted
                    .required_child("CipherData")?
                    .string_child("CipherValue")?;
                encrypted_keys.push(base64_decode(value.trim())?);
            }
        }

        Ok(EncryptedKdm {
            message_id: dcpack_core::remove_urn_uuid(&public.string_child("MessageId")?),
            annotation_text: public.optional_string_child("AnnotationText"),
            issue_date: public.optional_string_child("IssueDate").unwrap_or_default(),
            cpl_id: dcpack_core::remove_urn_uuid(
                &extensions.string_child("CompositionPlaylistId")?,
            ),
            content_title_text: extensions
                .optional_string_child("ContentTitleText")
                .unwrap_or_default(),
            key_ids,
            encrypted_keys,
        })
    }

    /// The raw encrypted key blocks.
    pub fn encrypted_keys(&self) -> &[Vec<u8>] {
        &self.encrypted_keys
    }
}

/// One decrypted content key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DecryptedKdmKey {
    /// The CPL the key belongs to.
    pub cpl_id: String,
    /// `MDIK`, `MDAK` and friends; absent in Interop key blocks.
    pub key_type: Option<String>,
    /// The key's UUID.
    pub key_id: String,
    /// Validity window start, as written in the block.
    pub not_valid_before: String,
    /// Validity window end, as written in the block.
    pub not_valid_after: String,
    /// The AES-128 content key.
    pub key: [u8; 16],
}

impl std::fmt::Debug for DecryptedKdmKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material stays out of logs.
        f.debug_struct("DecryptedKdmKey")
            .field("cpl_id", &self.cpl_id)
            .field("key_type", &self.key_type)
            .field("key_id", &self.key_id)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A KDM whose key blocks have been decrypted.
#[derive(Debug, Clone, Default)]
pub struct DecryptedKdm {
    keys: Vec<DecryptedKdmKey>,
}

impl DecryptedKdm {
    /// Wrap an already-decrypted key set.
    pub fn new(keys: Vec<DecryptedKdmKey>) -> Self {
        DecryptedKdm { keys }
    }

    /// Decrypt every key block of an encrypted KDM with the recipient's
    /// RSA private key (PEM).
    pub fn from_encrypted(kdm: &EncryptedKdm, private_key_pem: &str) -> Result<Self> {
        let private_key = parse_private_key(private_key_pem)?;
        let mut keys = Vec::new();
        for cipher in kdm.encrypted_keys() {
            let block = private_key
                .decrypt(Oaep::new::<Sha1>(), cipher)
                .map_err(|_| Error::misc("could not decrypt KDM key block".to_string()))?;
            keys.push(parse_key_block(&block)?);
        }
        Ok(DecryptedKdm { keys })
    }

    /// The decrypted keys.
    pub fn keys(&self) -> &[DecryptedKdmKey] {
        &self.keys
    }
}

fn parse_key_block(block: &[u8]) -> Result<DecryptedKdmKey> {
    let smpte = match block.len() {
        INTEROP_BLOCK_LEN => false,
        SMPTE_BLOCK_LEN => true,
        other => {
            return Err(Error::misc(format!("unexpected KDM key block length {other}")));
        }
    };

    let uuid_at = |offset: usize| -> String {
        Uuid::from_slice(&block[offset..offset + 16])
            .map(|u| u.to_string())
            .unwrap_or_default()
    };
    let text_at = |offset: usize| -> String {
        String::from_utf8_lossy(&block[offset..offset + 25]).into_owned()
    };

    // structure id (16) and signer thumbprint (20) precede the CPL id.
    let cpl_id = uuid_at(36);
    let (key_type, key_id_offset) = if smpte {
        (
            Some(String::from_utf8_lossy(&block[52..56]).into_owned()),
            56,
        )
    } else {
        (None, 52)
    };
    let key_id = uuid_at(key_id_offset);
    let not_valid_before = text_at(key_id_offset + 16);
    let not_valid_after = text_at(key_id_offset + 41);

    let mut key = [0u8; 16];
    key.copy_from_slice(&block[key_id_offset + 66..key_id_offset + 82]);

    Ok(DecryptedKdmKey {
        cpl_id,
        key_type,
        key_id,
        not_valid_before,
        not_valid_after,
        key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEAF_KEY_PEM: &str = include_str!("../../dcpack-xml/test-data/leaf-key.pem");
    const CIPHER_B64: &str = include_str!("../test-data/kdm-cipher.b64");

    fn sample_kdm_xml() -> String {
        format!(
            concat!(
                "<DCinemaSecurityMessage>",
                "<AuthenticatedPublic>",
                "<MessageId>urn:uuid:99999999-0000-0000-0000-000000000000</MessageId>",
                "<AnnotationText>A KDM</AnnotationText>",
                "<IssueDate>2024-01-01T00:00:00+00:00</IssueDate>",
                "<RequiredExtensions><KDMRequiredExtensions>",
                "<CompositionPlaylistId>urn:uuid:11111111-2222-3333-4444-555555555555</CompositionPlaylistId>",
                "<ContentTitleText>A Test DCP</ContentTitleText>",
                "<KeyIdList><TypedKeyId><KeyType>MDIK</KeyType>",
                "<KeyId>urn:uuid:66666666-7777-8888-9999-aaaaaaaaaaaa</KeyId>",
                "</TypedKeyId></KeyIdList>",
                "</KDMRequiredExtensions></RequiredExtensions>",
                "</AuthenticatedPublic>",
                "<AuthenticatedPrivate><EncryptedKey>",
                "<CipherData><CipherValue>{}</CipherValue></CipherData>",
                "</EncryptedKey></AuthenticatedPrivate>",
                "</DCinemaSecurityMessage>",
            ),
            CIPHER_B64.trim()
        )
    }

    #[test]
    fn test_parse_encrypted() {
        let kdm = EncryptedKdm::from_xml(&sample_kdm_xml()).unwrap();
        assert_eq!(kdm.cpl_id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(kdm.content_title_text, "A Test DCP");
        assert_eq!(kdm.key_ids.len(), 1);
        assert_eq!(kdm.key_ids[0].key_type.as_deref(), Some("MDIK"));
        assert_eq!(kdm.encrypted_keys().len(), 1);
        assert_eq!(kdm.encrypted_keys()[0].len(), 256);
    }

    #[test]
    fn test_decrypt_key_block() {
        let kdm = EncryptedKdm::from_xml(&sample_kdm_xml()).unwrap();
        let decrypted = DecryptedKdm::from_encrypted(&kdm, LEAF_KEY_PEM).unwrap();

        assert_eq!(decrypted.keys().len(), 1);
        let key = &decrypted.keys()[0];
        assert_eq!(key.cpl_id, "11111111-2222-3333-4444-555555555555");
        assert_eq!(key.key_type.as_deref(), Some("MDIK"));
        assert_eq!(key.key_id, "66666666-7777-8888-9999-aaaaaaaaaaaa");
        assert_eq!(key.not_valid_before, "2024-01-01T00:00:00+00:00");
        assert_eq!(key.not_valid_after, "2025-01-01T00:00:00+00:00");
        let expected: Vec<u8> = (0..16).collect();
        assert_eq!(key.key.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_wrong_key_fails() {
        let kdm = EncryptedKdm::from_xml(&sample_kdm_xml()).unwrap();
        let wrong = include_str!("../../dcpack-xml/test-data/other-key.pem");
        assert!(DecryptedKdm::from_encrypted(&kdm, wrong).is_err());
    }

    #[test]
    fn test_interop_block_parses_without_key_type() {
        // An Interop block is the SMPTE block with the four key-type
        // bytes removed.
        let mut block = Vec::new();
        block.extend_from_slice(&[0u8; 16]);
        block.extend_from_slice(&[1u8; 20]);
        block.extend_from_slice(
            uuid::Uuid::parse_str("11111111-2222-3333-4444-555555555555")
                .unwrap()
                .as_bytes(),
        );
        block.extend_from_slice(
            uuid::Uuid::parse_str("66666666-7777-8888-9999-aaaaaaaaaaaa")
                .unwrap()
                .as_bytes(),
        );
        block.extend_from_slice(b"2024-01-01T00:00:00+00:00");
        block.extend_from_slice(b"2025-01-01T00:00:00+00:00");
        block.extend_from_slice(&[7u8; 16]);
        assert_eq!(block.len(), INTEROP_BLOCK_LEN);

        let key = parse_key_block(&block).unwrap();
        assert_eq!(key.key_type, None);
        assert_eq!(key.key_id, "66666666-7777-8888-9999-aaaaaaaaaaaa");
        assert_eq!(key.key, [7u8; 16]);
    }
}
