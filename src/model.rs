use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    CoreCompany,
    #[serde(alias = "shareholder", alias = "top_level_entity")]
    TopEntity,
    Subsidiary,
    #[serde(alias = "person")]
    Individual,
    #[serde(alias = "controller")]
    ActualController,
    #[serde(alias = "government")]
    Institution,
    Company,
}

impl EntityType {
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "core_company" | "core" => Some(Self::CoreCompany),
            "top_entity" | "top_level_entity" | "shareholder" => Some(Self::TopEntity),
            "subsidiary" => Some(Self::Subsidiary),
            "individual" | "person" => Some(Self::Individual),
            "actual_controller" | "controller" => Some(Self::ActualController),
            "institution" | "government" => Some(Self::Institution),
            "company" => Some(Self::Company),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub english_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registered_capital: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_representative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub establishment_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration_status: Option<String>,
}

impl EntityMetadata {
    pub fn is_empty(&self) -> bool {
        self.english_name.is_none()
            && self.registered_capital.is_none()
            && self.legal_representative.is_none()
            && self.establishment_date.is_none()
            && self.registration_status.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "EntityMetadata::is_empty")]
    pub metadata: EntityMetadata,
}

impl Entity {
    pub fn new(name: impl Into<String>, entity_type: EntityType) -> Self {
        Self {
            name: name.into(),
            entity_type,
            metadata: EntityMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: EntityMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// `from` holds `percentage` percent of `to`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShareholdingEdge {
    pub from: String,
    pub to: String,
    pub percentage: f64,
    /// This holding is part of the actual controller's chain.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub actual_control: bool,
}

/// `from` actually controls `to`, independent of any holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One snapshot of an ownership structure. Entity names are identity keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OwnershipGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub core_company: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_level: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_controller: Option<String>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default)]
    pub shareholdings: Vec<ShareholdingEdge>,
    #[serde(default)]
    pub controls: Vec<ControlEdge>,
}

pub fn is_valid_percentage(value: f64) -> bool {
    value.is_finite() && (0.0..=100.0).contains(&value)
}

impl OwnershipGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entity(name).is_some()
    }

    pub fn is_core(&self, name: &str) -> bool {
        self.core_company.as_deref() == Some(name)
    }

    pub fn is_actual_controller(&self, name: &str) -> bool {
        self.actual_controller.as_deref() == Some(name)
    }

    /// Entity name -> declaration index.
    pub fn entity_index(&self) -> HashMap<&str, usize> {
        self.entities
            .iter()
            .enumerate()
            .map(|(idx, e)| (e.name.as_str(), idx))
            .collect()
    }

    /// Every (parent, child) pair over both ownership and control edges, in
    /// declaration order, ownership first.
    pub fn parent_links(&self) -> impl Iterator<Item = (&str, &str)> {
        self.shareholdings
            .iter()
            .map(|e| (e.from.as_str(), e.to.as_str()))
            .chain(
                self.controls
                    .iter()
                    .map(|e| (e.from.as_str(), e.to.as_str())),
            )
    }

    pub fn add_entity(&mut self, entity: Entity) -> Result<(), ValidationError> {
        if entity.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.contains(&entity.name) {
            return Err(ValidationError::DuplicateEntity(entity.name));
        }
        self.entities.push(entity);
        Ok(())
    }

    /// Renames an entity and rewrites every reference to it.
    pub fn rename_entity(&mut self, old: &str, new: &str) -> Result<(), ValidationError> {
        if new.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if old == new {
            return self.require(old, "rename");
        }
        if self.contains(new) {
            return Err(ValidationError::DuplicateEntity(new.to_string()));
        }
        let entity = self
            .entities
            .iter_mut()
            .find(|e| e.name == old)
            .ok_or_else(|| unknown(old, "rename"))?;
        entity.name = new.to_string();

        let rewrite = |value: &mut String| {
            if value == old {
                *value = new.to_string();
            }
        };
        for edge in &mut self.shareholdings {
            rewrite(&mut edge.from);
            rewrite(&mut edge.to);
        }
        for edge in &mut self.controls {
            rewrite(&mut edge.from);
            rewrite(&mut edge.to);
        }
        self.top_level.iter_mut().for_each(rewrite);
        if let Some(core) = self.core_company.as_mut() {
            rewrite(core);
        }
        if let Some(controller) = self.actual_controller.as_mut() {
            rewrite(controller);
        }
        Ok(())
    }

    /// Removes an entity together with every edge and designation naming it.
    pub fn remove_entity(&mut self, name: &str) -> Result<Entity, ValidationError> {
        let idx = self
            .entities
            .iter()
            .position(|e| e.name == name)
            .ok_or_else(|| unknown(name, "remove"))?;
        let removed = self.entities.remove(idx);
        self.shareholdings.retain(|e| e.from != name && e.to != name);
        self.controls.retain(|e| e.from != name && e.to != name);
        self.top_level.retain(|n| n != name);
        if self.is_core(name) {
            self.core_company = None;
        }
        if self.is_actual_controller(name) {
            self.actual_controller = None;
        }
        Ok(removed)
    }

    /// Records that `from` holds `percentage` of `to`, replacing an earlier
    /// holding on the same ordered pair. Returns the replaced percentage.
    pub fn set_shareholding(
        &mut self,
        from: &str,
        to: &str,
        percentage: f64,
    ) -> Result<Option<f64>, ValidationError> {
        self.check_link(from, to, "shareholding")?;
        if !is_valid_percentage(percentage) {
            return Err(ValidationError::InvalidPercentage {
                from: from.to_string(),
                to: to.to_string(),
                value: percentage,
            });
        }
        if let Some(edge) = self
            .shareholdings
            .iter_mut()
            .find(|e| e.from == from && e.to == to)
        {
            let previous = edge.percentage;
            edge.percentage = percentage;
            return Ok(Some(previous));
        }
        self.shareholdings.push(ShareholdingEdge {
            from: from.to_string(),
            to: to.to_string(),
            percentage,
            actual_control: false,
        });
        Ok(None)
    }

    pub fn mark_actual_control(
        &mut self,
        from: &str,
        to: &str,
        flag: bool,
    ) -> Result<(), ValidationError> {
        let edge = self
            .shareholdings
            .iter_mut()
            .find(|e| e.from == from && e.to == to)
            .ok_or_else(|| unknown(&format!("{from} -> {to}"), "shareholding"))?;
        edge.actual_control = flag;
        Ok(())
    }

    pub fn remove_shareholding(&mut self, from: &str, to: &str) -> bool {
        let before = self.shareholdings.len();
        self.shareholdings.retain(|e| !(e.from == from && e.to == to));
        before != self.shareholdings.len()
    }

    /// Adds a control relationship, replacing the label of an existing one on
    /// the same ordered pair.
    pub fn add_control(
        &mut self,
        from: &str,
        to: &str,
        label: Option<String>,
    ) -> Result<(), ValidationError> {
        self.check_link(from, to, "control")?;
        if let Some(edge) = self.controls.iter_mut().find(|e| e.from == from && e.to == to) {
            edge.label = label;
            return Ok(());
        }
        self.controls.push(ControlEdge {
            from: from.to_string(),
            to: to.to_string(),
            label,
        });
        Ok(())
    }

    pub fn remove_control(&mut self, from: &str, to: &str) -> bool {
        let before = self.controls.len();
        self.controls.retain(|e| !(e.from == from && e.to == to));
        before != self.controls.len()
    }

    pub fn set_core_company(&mut self, name: &str) -> Result<(), ValidationError> {
        self.require(name, "core company")?;
        self.core_company = Some(name.to_string());
        Ok(())
    }

    pub fn add_top_level(&mut self, name: &str) -> Result<(), ValidationError> {
        self.require(name, "top-level list")?;
        if !self.top_level.iter().any(|n| n == name) {
            self.top_level.push(name.to_string());
        }
        Ok(())
    }

    pub fn set_actual_controller(&mut self, name: Option<&str>) -> Result<(), ValidationError> {
        if let Some(name) = name {
            self.require(name, "actual controller")?;
        }
        self.actual_controller = name.map(str::to_string);
        Ok(())
    }

    /// Checks every structural invariant. Generators call this first.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.entities.len());
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(ValidationError::EmptyName);
            }
            if !seen.insert(entity.name.as_str()) {
                return Err(ValidationError::DuplicateEntity(entity.name.clone()));
            }
        }

        let core = self
            .core_company
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .ok_or(ValidationError::MissingCoreCompany)?;
        if !seen.contains(core) {
            return Err(unknown(core, "core company"));
        }
        for name in &self.top_level {
            if !seen.contains(name.as_str()) {
                return Err(unknown(name, "top-level list"));
            }
        }
        if let Some(controller) = self.actual_controller.as_deref() {
            if !seen.contains(controller) {
                return Err(unknown(controller, "actual controller"));
            }
        }

        let mut pairs: HashSet<(&str, &str)> = HashSet::new();
        for edge in &self.shareholdings {
            check_endpoints(&seen, &edge.from, &edge.to, "shareholding")?;
            if !is_valid_percentage(edge.percentage) {
                return Err(ValidationError::InvalidPercentage {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    value: edge.percentage,
                });
            }
            if !pairs.insert((edge.from.as_str(), edge.to.as_str())) {
                return Err(ValidationError::DuplicateEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    kind: "shareholding",
                });
            }
        }

        pairs.clear();
        for edge in &self.controls {
            check_endpoints(&seen, &edge.from, &edge.to, "control")?;
            if !pairs.insert((edge.from.as_str(), edge.to.as_str())) {
                return Err(ValidationError::DuplicateEdge {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    kind: "control",
                });
            }
        }
        Ok(())
    }

    fn require(&self, name: &str, context: &'static str) -> Result<(), ValidationError> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(unknown(name, context))
        }
    }

    fn check_link(&self, from: &str, to: &str, context: &'static str) -> Result<(), ValidationError> {
        self.require(from, context)?;
        self.require(to, context)?;
        if from == to {
            return Err(ValidationError::SelfReference(from.to_string()));
        }
        Ok(())
    }
}

fn unknown(name: &str, context: &'static str) -> ValidationError {
    ValidationError::UnknownEntity {
        name: name.to_string(),
        context,
    }
}

fn check_endpoints(
    known: &HashSet<&str>,
    from: &str,
    to: &str,
    context: &'static str,
) -> Result<(), ValidationError> {
    for name in [from, to] {
        if !known.contains(name) {
            return Err(unknown(name, context));
        }
    }
    if from == to {
        return Err(ValidationError::SelfReference(from.to_string()));
    }
    Ok(())
}
