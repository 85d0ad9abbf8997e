use crate::error::{LexiconError, Result};
use crate::sense::{CandidateSense, HypernymRef};
use crate::source::LexicalSource;
use async_trait::async_trait;
use concord_protocol::SourceKind;
use concord_registry::normalize_alias;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

const BUILTIN_GRAPH: &str = include_str!("../data/graph.json");

/// Entity record in a knowledge-graph dump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Graph-native id ("Q2766")
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub instance_of: Vec<String>,
    #[serde(default)]
    pub subclass_of: Vec<String>,
    /// Equivalent lexical sense; when present it becomes the concept id so
    /// both sources agree on identity
    #[serde(default)]
    pub synset: Option<String>,
}

impl Entity {
    /// Id this entity is reported under.
    #[must_use]
    pub fn concept_id(&self) -> String {
        match &self.synset {
            Some(synset) => synset.clone(),
            None => format!("kg:{}", self.id),
        }
    }

    fn parents(&self) -> impl Iterator<Item = &String> {
        self.instance_of.iter().chain(self.subclass_of.iter())
    }
}

#[derive(Debug, Deserialize)]
struct GraphFile {
    entities: Vec<Entity>,
}

/// Structured knowledge-graph adapter: label/alias lookup plus
/// instance-of / subclass-of chains.
#[derive(Debug)]
pub struct KnowledgeGraphSource {
    entities: HashMap<String, Entity>,
    by_alias: HashMap<String, Vec<String>>,
    by_concept: HashMap<String, String>,
}

impl KnowledgeGraphSource {
    pub fn from_entities(entities: Vec<Entity>) -> Result<Self> {
        let mut by_id = HashMap::with_capacity(entities.len());
        let mut by_alias: HashMap<String, Vec<String>> = HashMap::new();
        let mut by_concept = HashMap::new();
        for entity in entities {
            if by_id.contains_key(&entity.id) {
                return Err(LexiconError::InvalidData(format!(
                    "duplicate entity id '{}'",
                    entity.id
                )));
            }
            for name in std::iter::once(&entity.label).chain(entity.aliases.iter()) {
                let ids = by_alias.entry(normalize_alias(name)).or_default();
                if !ids.contains(&entity.id) {
                    ids.push(entity.id.clone());
                }
            }
            by_concept.insert(entity.concept_id(), entity.id.clone());
            by_id.insert(entity.id.clone(), entity);
        }
        Ok(Self {
            entities: by_id,
            by_alias,
            by_concept,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: GraphFile = serde_json::from_str(raw)?;
        Self::from_entities(file.entities)
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_GRAPH)
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let source = Self::from_json(&raw)?;
        log::info!(
            "Loaded knowledge graph from {:?}: {} entities",
            path.as_ref(),
            source.entities.len()
        );
        Ok(source)
    }

    #[must_use]
    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// First-parent chain above `entity`, nearest first. Parents missing from
    /// the dump end the chain.
    fn chain(&self, entity: &Entity) -> Vec<HypernymRef> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([entity.id.as_str()]);
        let mut current = entity;
        while let Some(parent) = current.parents().find_map(|id| self.entities.get(id)) {
            if !seen.insert(parent.id.as_str()) {
                break;
            }
            chain.push(HypernymRef::new(parent.concept_id(), parent.label.to_lowercase()));
            current = parent;
        }
        chain
    }

    fn candidate(&self, entity: &Entity) -> CandidateSense {
        CandidateSense::new(
            SourceKind::KnowledgeGraph,
            entity.concept_id(),
            entity.label.to_lowercase(),
        )
        .gloss(&entity.description)
        .forms(entity.aliases.iter().cloned())
        .hypernyms(self.chain(entity))
    }
}

#[async_trait]
impl LexicalSource for KnowledgeGraphSource {
    fn name(&self) -> &str {
        "knowledge-graph"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::KnowledgeGraph
    }

    async fn lookup(&self, term: &str) -> Result<Vec<CandidateSense>> {
        let Some(ids) = self.by_alias.get(&normalize_alias(term)) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| self.entities.get(id))
            .map(|entity| self.candidate(entity))
            .collect())
    }

    async fn hypernyms_of(&self, concept_id: &str) -> Result<Vec<HypernymRef>> {
        let id = concept_id.strip_prefix("kg:").map_or_else(
            || self.by_concept.get(concept_id).cloned(),
            |raw| Some(raw.to_string()),
        );
        Ok(id
            .and_then(|id| self.entities.get(&id))
            .map(|entity| self.chain(entity))
            .unwrap_or_default())
    }
}
