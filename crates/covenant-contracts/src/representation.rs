//! Agent representation: who an agent is, and on whose behalf it acts.
//!
//! An agent is always exactly one of:
//!
//! - a Nym acting for himself (`SelfIndividual`)
//! - a Nym acting in a role for an entity formed by contract (`EntityRoleIndividual`)
//! - a voting group acting passively for the entity it belongs to (`EntityVotingGroup`)
//!
//! A Nym cannot act as agent for another Nym, and a group cannot act for a
//! Nym. Each variant carries only the identifiers that apply to it, so a
//! "group representing himself" cannot be constructed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{CovenantError, CovenantResult},
    identity::Identifier,
};

/// The closed set of agent representations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Representation {
    /// A Nym who is also the party.
    SelfIndividual { nym_id: Identifier },

    /// A Nym (e.g. an employee) acting in a role on behalf of an entity.
    EntityRoleIndividual {
        nym_id: Identifier,
        role_id: Identifier,
        entity_id: Identifier,
    },

    /// A voting group inside an entity. It has no signer of its own; it acts
    /// through elections, which are outside this crate.
    EntityVotingGroup {
        group_name: String,
        entity_id: Identifier,
    },
}

/// Descriptor discriminant as it appears in serialized agent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Nym,
    Role,
    Group,
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentKind::Nym => "nym",
            AgentKind::Role => "role",
            AgentKind::Group => "group",
        };
        f.write_str(s)
    }
}

impl Representation {
    pub fn kind(&self) -> AgentKind {
        match self {
            Representation::SelfIndividual { .. } => AgentKind::Nym,
            Representation::EntityRoleIndividual { .. } => AgentKind::Role,
            Representation::EntityVotingGroup { .. } => AgentKind::Group,
        }
    }

    /// True for both individual variants; false only for a voting group.
    pub fn is_individual(&self) -> bool {
        !matches!(self, Representation::EntityVotingGroup { .. })
    }

    pub fn is_group(&self) -> bool {
        !self.is_individual()
    }

    pub fn does_represent_entity(&self) -> bool {
        !matches!(self, Representation::SelfIndividual { .. })
    }

    pub fn does_represent_himself(&self) -> bool {
        !self.does_represent_entity()
    }

    /// The agent's personal NymID, whether he acts for himself or in a role.
    pub fn nym_id(&self) -> Option<&Identifier> {
        match self {
            Representation::SelfIndividual { nym_id }
            | Representation::EntityRoleIndividual { nym_id, .. } => Some(nym_id),
            Representation::EntityVotingGroup { .. } => None,
        }
    }

    pub fn role_id(&self) -> Option<&Identifier> {
        match self {
            Representation::EntityRoleIndividual { role_id, .. } => Some(role_id),
            _ => None,
        }
    }

    pub fn group_name(&self) -> Option<&str> {
        match self {
            Representation::EntityVotingGroup { group_name, .. } => Some(group_name),
            _ => None,
        }
    }

    pub fn entity_id(&self) -> Option<&Identifier> {
        match self {
            Representation::EntityRoleIndividual { entity_id, .. }
            | Representation::EntityVotingGroup { entity_id, .. } => Some(entity_id),
            Representation::SelfIndividual { .. } => None,
        }
    }

    /// The identity that signs for this agent.
    ///
    /// A role signs as the role; a self-representing Nym signs as himself. A
    /// voting group has no direct signer.
    pub fn signer_id(&self) -> Option<&Identifier> {
        match self {
            Representation::SelfIndividual { nym_id } => Some(nym_id),
            Representation::EntityRoleIndividual { role_id, .. } => Some(role_id),
            Representation::EntityVotingGroup { .. } => None,
        }
    }

    /// The party is either the Nym himself or the entity.
    pub fn party_id(&self) -> &Identifier {
        match self {
            Representation::SelfIndividual { nym_id } => nym_id,
            Representation::EntityRoleIndividual { entity_id, .. }
            | Representation::EntityVotingGroup { entity_id, .. } => entity_id,
        }
    }
}

/// Serialized form of an agent.
///
/// Fields that do not apply to the agent's `type` are omitted on output and
/// rejected on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nym_id: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_id: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<Identifier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_name: Option<String>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, representation: &Representation) -> Self {
        Self {
            name: name.into(),
            kind: representation.kind(),
            nym_id: representation.nym_id().cloned(),
            role_id: representation.role_id().cloned(),
            entity_id: representation.entity_id().cloned(),
            group_name: representation.group_name().map(str::to_string),
        }
    }

    /// Validate field presence against `type` and split into name and
    /// representation.
    pub fn into_parts(self) -> CovenantResult<(String, Representation)> {
        let invalid = |reason: &str| CovenantError::InvalidDescriptor {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        let representation = match self.kind {
            AgentKind::Nym => {
                if self.role_id.is_some() || self.entity_id.is_some() || self.group_name.is_some() {
                    return Err(invalid("a nym agent carries only nym_id"));
                }
                let nym_id = self.nym_id.clone().ok_or_else(|| invalid("nym_id is required"))?;
                Representation::SelfIndividual { nym_id }
            }
            AgentKind::Role => {
                if self.group_name.is_some() {
                    return Err(invalid("a role agent has no group_name"));
                }
                Representation::EntityRoleIndividual {
                    nym_id: self.nym_id.clone().ok_or_else(|| invalid("nym_id is required"))?,
                    role_id: self.role_id.clone().ok_or_else(|| invalid("role_id is required"))?,
                    entity_id: self
                        .entity_id
                        .clone()
                        .ok_or_else(|| invalid("entity_id is required"))?,
                }
            }
            AgentKind::Group => {
                if self.nym_id.is_some() || self.role_id.is_some() {
                    return Err(invalid("a group agent has no nym_id or role_id"));
                }
                Representation::EntityVotingGroup {
                    group_name: self
                        .group_name
                        .clone()
                        .ok_or_else(|| invalid("group_name is required"))?,
                    entity_id: self
                        .entity_id
                        .clone()
                        .ok_or_else(|| invalid("entity_id is required"))?,
                }
            }
        };

        Ok((self.name, representation))
    }
}
