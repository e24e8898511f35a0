use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a link (node, album, listing) within the local cache.
///
/// Link IDs are only unique inside a volume, so every cached entity is keyed by
/// the pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeIdentifier {
    pub id: String,
    pub volume_id: String,
}

impl NodeIdentifier {
    pub fn new(id: impl Into<String>, volume_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            volume_id: volume_id.into(),
        }
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.volume_id, self.id)
    }
}

/// Backend topology of a volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeType {
    /// Not migrated yet; treated as a regular volume
    #[default]
    Undetermined,
    Main,
    /// Dedicated photo volume
    Photo,
}

impl fmt::Display for VolumeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolumeType::Undetermined => "undetermined",
            VolumeType::Main => "main",
            VolumeType::Photo => "photo",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareKind {
    #[default]
    Main,
    Standard,
    Device,
    Photos,
}

/// Remote link type, encoded as an integer on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LinkType {
    Folder,
    File,
    Album,
}

impl TryFrom<u8> for LinkType {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LinkType::Folder),
            2 => Ok(LinkType::File),
            3 => Ok(LinkType::Album),
            other => Err(format!("unknown link type: {other}")),
        }
    }
}

impl From<LinkType> for u8 {
    fn from(value: LinkType) -> Self {
        match value {
            LinkType::Folder => 1,
            LinkType::File => 2,
            LinkType::Album => 3,
        }
    }
}

/// Lifecycle state of a link, encoded as an integer on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum NodeState {
    Draft,
    #[default]
    Active,
    Trashed,
    Deleted,
}

impl TryFrom<u8> for NodeState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(NodeState::Draft),
            1 => Ok(NodeState::Active),
            2 => Ok(NodeState::Trashed),
            3 => Ok(NodeState::Deleted),
            other => Err(format!("unknown node state: {other}")),
        }
    }
}

impl From<NodeState> for u8 {
    fn from(value: NodeState) -> Self {
        match value {
            NodeState::Draft => 0,
            NodeState::Active => 1,
            NodeState::Trashed => 2,
            NodeState::Deleted => 3,
        }
    }
}

// ── Remote link metadata ──────────────────────────────────────────────────────

/// Link metadata as returned by the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Link {
    #[serde(rename = "LinkID")]
    pub link_id: String,
    #[serde(rename = "ParentLinkID", default)]
    pub parent_link_id: Option<String>,
    #[serde(rename = "VolumeID")]
    pub volume_id: String,
    #[serde(rename = "Type")]
    pub link_type: LinkType,
    pub name: String,
    #[serde(default)]
    pub name_signature_email: Option<String>,
    pub hash: String,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub size: u64,
    #[serde(rename = "MIMEType", default)]
    pub mime_type: String,
    #[serde(default)]
    pub node_key: String,
    pub node_passphrase: String,
    #[serde(default)]
    pub node_passphrase_signature: String,
    #[serde(default)]
    pub signature_email: String,
    #[serde(default)]
    pub create_time: i64,
    #[serde(default)]
    pub modify_time: i64,
    #[serde(default)]
    pub trashed: Option<i64>,
    #[serde(rename = "XAttr", default)]
    pub x_attr: Option<String>,
    #[serde(default)]
    pub sharing_details: Option<SharingDetails>,
    #[serde(default)]
    pub album_properties: Option<AlbumProperties>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SharingDetails {
    #[serde(rename = "ShareID")]
    pub share_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AlbumProperties {
    pub locked: bool,
    #[serde(rename = "CoverLinkID", default)]
    pub cover_link_id: Option<String>,
    /// Last time a photo was added to the album (unix seconds)
    pub last_activity_time: i64,
    pub node_hash_key: String,
    pub photo_count: u32,
}

impl Link {
    pub fn identifier(&self) -> NodeIdentifier {
        NodeIdentifier::new(self.link_id.clone(), self.volume_id.clone())
    }
}

// ── Move confirmation ─────────────────────────────────────────────────────────

/// Post-move metadata the server confirmed for one link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MovedLink {
    #[serde(rename = "LinkID")]
    pub link_id: String,
    pub name: String,
    pub hash: String,
    pub node_passphrase: String,
    #[serde(default)]
    pub node_passphrase_signature: Option<String>,
}

/// One confirmed entry of a multi-node move, with the signer used for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovedLinkInfo {
    #[serde(flatten)]
    pub link: MovedLink,
    #[serde(rename = "signatureEmail")]
    pub signature_email: String,
    #[serde(rename = "isAnonymous")]
    pub is_anonymous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moved_link_info_uses_flat_wire_names() {
        let json = r#"{
            "LinkID": "link-1",
            "Name": "enc-name",
            "Hash": "name-hash",
            "NodePassphrase": "pass",
            "signatureEmail": "anon@proton.test",
            "isAnonymous": true
        }"#;
        let info: MovedLinkInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.link.link_id, "link-1");
        assert_eq!(info.link.node_passphrase_signature, None);
        assert_eq!(info.signature_email, "anon@proton.test");
        assert!(info.is_anonymous);
    }

    #[test]
    fn album_link_parses_properties() {
        let json = r#"{
            "LinkID": "album-1",
            "VolumeID": "vol-1",
            "Type": 3,
            "Name": "enc",
            "Hash": "h",
            "State": 1,
            "NodePassphrase": "p",
            "SharingDetails": { "ShareID": "share-9" },
            "AlbumProperties": {
                "Locked": false,
                "CoverLinkID": "photo-7",
                "LastActivityTime": 1700000000,
                "NodeHashKey": "hk",
                "PhotoCount": 12
            }
        }"#;
        let link: Link = serde_json::from_str(json).unwrap();
        assert_eq!(link.link_type, LinkType::Album);
        assert_eq!(link.identifier(), NodeIdentifier::new("album-1", "vol-1"));
        let props = link.album_properties.unwrap();
        assert_eq!(props.cover_link_id.as_deref(), Some("photo-7"));
        assert_eq!(props.photo_count, 12);
        assert_eq!(link.sharing_details.unwrap().share_id, "share-9");
    }

    #[test]
    fn unknown_link_type_is_rejected() {
        let json = r#"{"LinkID":"x","VolumeID":"v","Type":9,"Name":"n","Hash":"h","NodePassphrase":"p"}"#;
        assert!(serde_json::from_str::<Link>(json).is_err());
    }

    #[test]
    fn identifier_display() {
        assert_eq!(NodeIdentifier::new("a", "v").to_string(), "v/a");
    }
}
