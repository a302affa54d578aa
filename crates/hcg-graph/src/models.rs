use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifier
// ---------------------------------------------------------------------------

/// Canonical identifier for every node and planning artifact.
///
/// Parsed once at the boundary; everything past that point passes `Id`
/// values around and never re-validates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derive a stable identifier from a node kind and a name.
    ///
    /// The same `(kind, name)` pair always yields the same id.
    pub fn from_name(kind: &str, name: &str) -> Self {
        Self(Uuid::new_v5(&Uuid::NAMESPACE_OID, format!("hcg:{kind}:{name}").as_bytes()))
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub const fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

impl FromStr for Id {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| IdParseError(s.to_owned()))
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Error returned when parsing an invalid [`Id`] string.
#[derive(Debug, Clone)]
pub struct IdParseError(pub String);

impl fmt::Display for IdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid identifier: {:?}", self.0)
    }
}

impl std::error::Error for IdParseError {}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Recognized producers of provenance-stamped artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProvenanceSource {
    Human,
    PlannerService,
    ExecutorService,
    PerceptionService,
    LanguageService,
    InterfaceService,
}

impl fmt::Display for ProvenanceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Human => "human",
            Self::PlannerService => "planner-service",
            Self::ExecutorService => "executor-service",
            Self::PerceptionService => "perception-service",
            Self::LanguageService => "language-service",
            Self::InterfaceService => "interface-service",
        };
        f.write_str(s)
    }
}

impl FromStr for ProvenanceSource {
    type Err = ProvenanceSourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "planner-service" => Ok(Self::PlannerService),
            "executor-service" => Ok(Self::ExecutorService),
            "perception-service" => Ok(Self::PerceptionService),
            "language-service" => Ok(Self::LanguageService),
            "interface-service" => Ok(Self::InterfaceService),
            other => Err(ProvenanceSourceParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`ProvenanceSource`] string.
#[derive(Debug, Clone)]
pub struct ProvenanceSourceParseError(pub String);

impl fmt::Display for ProvenanceSourceParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid provenance source: {:?}", self.0)
    }
}

impl std::error::Error for ProvenanceSourceParseError {}

// ---------------------------------------------------------------------------

/// Status of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    Pending,
    Active,
    Completed,
    Failed,
}

impl fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for GoalStatus {
    type Err = GoalStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(GoalStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`GoalStatus`] string.
#[derive(Debug, Clone)]
pub struct GoalStatusParseError(pub String);

impl fmt::Display for GoalStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid goal status: {:?}", self.0)
    }
}

impl std::error::Error for GoalStatusParseError {}

// ---------------------------------------------------------------------------

/// Status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Pending,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

impl FromStr for PlanStatus {
    type Err = PlanStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "executing" => Ok(Self::Executing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(PlanStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`PlanStatus`] string.
#[derive(Debug, Clone)]
pub struct PlanStatusParseError(pub String);

impl fmt::Display for PlanStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid plan status: {:?}", self.0)
    }
}

impl std::error::Error for PlanStatusParseError {}

// ---------------------------------------------------------------------------
// Graph nodes
// ---------------------------------------------------------------------------

/// A fact or configuration at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<Id>,
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl State {
    pub fn new(id: Id) -> Self {
        Self {
            id,
            name: None,
            entity_id: None,
            concept_id: None,
            properties: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn entity(mut self, entity_id: Id) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn concept(mut self, concept_id: Id) -> Self {
        self.concept_id = Some(concept_id);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Whether this state satisfies every constraint in `target`.
    ///
    /// The entity must match; the concept must match when the target names
    /// one; every target property must be present with an equal value.
    pub fn matches(&self, target: &GoalTarget) -> bool {
        if self.entity_id != Some(target.entity_id) {
            return false;
        }
        if let Some(concept) = target.concept_id {
            if self.concept_id != Some(concept) {
                return false;
            }
        }
        target
            .state_properties
            .iter()
            .all(|(key, value)| self.properties.get(key) == Some(value))
    }

    /// Name if present, otherwise the id. Used in log and error output.
    pub fn label(&self) -> String {
        self.name.clone().unwrap_or_else(|| self.id.to_string())
    }
}

/// An action with REQUIRES and CAUSES edges to states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Process {
    pub id: Id,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<u64>,
}

impl Process {
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            estimated_duration_ms: None,
        }
    }

    pub fn description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn estimated_duration_ms(mut self, ms: u64) -> Self {
        self.estimated_duration_ms = Some(ms);
        self
    }
}

/// Binding of a process to the actor or service that executes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub id: Id,
    pub name: String,
    pub executor: String,
}

impl Capability {
    pub fn new(id: Id, name: impl Into<String>, executor: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            executor: executor.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Planning data model
// ---------------------------------------------------------------------------

/// Audit record of who or what produced an artifact, and when.
///
/// Use [`Provenance::new`] for the required fields, then chain optional
/// setters before handing the record to an artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub source: ProvenanceSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_id: Option<Id>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<Id>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Provenance {
    /// Stamp a new record with the current time.
    pub fn new(source: ProvenanceSource) -> Self {
        Self {
            source,
            author_id: None,
            created_at: Utc::now(),
            trace_id: None,
            tags: Vec::new(),
        }
    }

    pub fn author(mut self, author_id: Id) -> Self {
        self.author_id = Some(author_id);
        self
    }

    pub fn trace(mut self, trace_id: Id) -> Self {
        self.trace_id = Some(trace_id);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// What must become true for a goal to be met.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalTarget {
    pub entity_id: Id,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_id: Option<Id>,
    #[serde(default)]
    pub state_properties: BTreeMap<String, serde_json::Value>,
}

impl GoalTarget {
    pub fn new(entity_id: Id) -> Self {
        Self {
            entity_id,
            concept_id: None,
            state_properties: BTreeMap::new(),
        }
    }

    pub fn concept(mut self, concept_id: Id) -> Self {
        self.concept_id = Some(concept_id);
        self
    }

    pub fn property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.state_properties.insert(key.into(), value.into());
        self
    }

    /// Whether the target constrains anything beyond the entity.
    pub fn is_constrained(&self) -> bool {
        self.concept_id.is_some() || !self.state_properties.is_empty()
    }
}

/// A declarative objective handed to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Id,
    pub description: String,
    pub target: GoalTarget,
    pub priority: f64,
    pub status: GoalStatus,
    pub provenance: Provenance,
}

impl Goal {
    /// Create a pending goal with priority `0.0` and a fresh id.
    pub fn new(description: impl Into<String>, target: GoalTarget, provenance: Provenance) -> Self {
        Self {
            id: Id::generate(),
            description: description.into(),
            target,
            priority: 0.0,
            status: GoalStatus::Pending,
            provenance,
        }
    }

    pub fn priority(mut self, priority: f64) -> Self {
        self.priority = priority;
        self
    }

    pub fn status(mut self, status: GoalStatus) -> Self {
        self.status = status;
        self
    }
}

/// One executable step of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    pub id: Id,
    pub index: usize,
    pub process_id: Id,
    pub precondition_ids: Vec<Id>,
    pub effect_ids: Vec<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capability_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration_ms: Option<u64>,
    pub confidence: f64,
    pub provenance: Provenance,
}

/// An ordered, causally consistent sequence of steps answering a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Id,
    pub goal_id: Id,
    pub steps: Vec<PlanStep>,
    pub current_state_id: Option<Id>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_final_state_id: Option<Id>,
    pub status: PlanStatus,
    pub confidence: f64,
    pub provenance: Provenance,
}

impl Plan {
    /// Process ids in execution order.
    pub fn process_sequence(&self) -> Vec<Id> {
        self.steps.iter().map(|s| s.process_id).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
