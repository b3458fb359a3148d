use serde::{Deserialize, Serialize};

pub type NodeId = i64;
pub type WayId = i64;
pub type RelationId = i64;

/// A single key/value tag. Keys are unique within a [`TagList`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

/// Ordered tag collection. Lookup is by key; insertion order is kept so
/// output properties are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagList(Vec<Tag>);

impl TagList {
    pub fn new() -> Self {
        TagList(Vec::new())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Inserts a tag, replacing the value of an existing key in place.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.0.iter_mut().find(|tag| tag.key == key) {
            existing.value = value;
        } else {
            self.0.push(Tag { key, value });
        }
    }

    /// Inserts a tag only when the key is not yet present.
    pub fn push_if_absent(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        if !self.contains_key(&key) {
            self.0.push(Tag {
                key,
                value: value.into(),
            });
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tag> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut tags = TagList::new();
        for (key, value) in pairs {
            tags.push(key, value);
        }
        tags
    }
}

impl<'a> IntoIterator for &'a TagList {
    type Item = &'a Tag;
    type IntoIter = std::slice::Iter<'a, Tag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberKind {
    Node,
    Way,
    Relation,
}

/// One entry of a relation's ordered member list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: i64,
    pub kind: MemberKind,
    pub role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
    pub tags: TagList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Way {
    pub id: WayId,
    pub node_ids: Vec<NodeId>,
    pub tags: TagList,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub id: RelationId,
    pub members: Vec<Member>,
    pub tags: TagList,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Node(Node),
    Way(Way),
    Relation(Relation),
}

impl Element {
    pub fn id(&self) -> i64 {
        match self {
            Element::Node(node) => node.id,
            Element::Way(way) => way.id,
            Element::Relation(relation) => relation.id,
        }
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Element::Node(_) => ElementKind::Node,
            Element::Way(_) => ElementKind::Way,
            Element::Relation(_) => ElementKind::Relation,
        }
    }

    pub fn tags(&self) -> &TagList {
        match self {
            Element::Node(node) => &node.tags,
            Element::Way(way) => &way.tags,
            Element::Relation(relation) => &relation.tags,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Node,
    Way,
    Relation,
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Node => "node",
            ElementKind::Way => "way",
            ElementKind::Relation => "relation",
        }
    }
}

/// Which element kinds a geometry processor consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interest(u8);

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const NODE: Interest = Interest(1);
    pub const WAY: Interest = Interest(2);
    pub const RELATION: Interest = Interest(4);
    pub const ALL: Interest = Interest(7);

    pub fn contains(self, kind: ElementKind) -> bool {
        let bit = match kind {
            ElementKind::Node => Interest::NODE.0,
            ElementKind::Way => Interest::WAY.0,
            ElementKind::Relation => Interest::RELATION.0,
        };
        self.0 & bit != 0
    }
}

impl std::ops::BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// Run configuration, loaded from a JSON file by the CLI.
///
/// A present `tag_script` selects the scripted transform backend; otherwise
/// the built-in rule table is used. `export_rules` optionally replaces the
/// built-in export table.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub geometry_type: String,
    pub srid: i32,
    #[serde(default)]
    pub tag_script: Option<String>,
    #[serde(default)]
    pub export_rules: Option<String>,
    #[serde(default)]
    pub allow_typeless: bool,
}
