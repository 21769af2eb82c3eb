//! Collection metadata: schema, vector fields, and governance settings.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::error::CoreError;
use crate::model::value::FieldType;

/// `[A-Za-z_][A-Za-z0-9_]{0,62}` — identifier-safe collection/view names
/// (§4.E CreateCollection precondition).
pub static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());

pub fn validate_identifier(name: &str) -> crate::error::Result<()> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(())
    } else {
        Err(CoreError::BadRequest(format!(
            "'{name}' is not a valid identifier: must match [A-Za-z_][A-Za-z0-9_]{{0,62}}"
        )))
    }
}

/// A single property declaration within a `Schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub description: Option<String>,
    /// Recursive schema for `array` item validation.
    #[serde(default)]
    pub items: Option<Box<FieldSchema>>,
    /// Field-level permissions narrowing read/write beyond collection rules.
    #[serde(default)]
    pub permissions: Option<FieldPermissions>,
    /// Required dimensionality for `vector`-typed fields. Populated from
    /// the matching `VectorField` at validation time if not set explicitly.
    #[serde(default)]
    pub dimensions: Option<u32>,
}

/// Field-level permission narrowing (§3 Schema).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldPermissions {
    #[serde(default)]
    pub read: Option<bool>,
    #[serde(default)]
    pub write: Option<bool>,
}

/// A JSON-schema subset attached to a collection (§3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub properties: BTreeMap<String, FieldSchema>,
    #[serde(default)]
    pub required: Vec<String>,
    /// When true, fields absent from `properties` fail validation instead
    /// of being allowed through (§4.B rule 3).
    #[serde(default)]
    pub strict: bool,
}

impl Schema {
    /// A schema is well-formed iff every name in `required` is declared in
    /// `properties`, and `items`/`vector` declarations are internally
    /// consistent. Called by CreateCollection (§4.E precondition).
    pub fn validate_well_formed(&self) -> crate::error::Result<()> {
        for field in &self.required {
            if !self.properties.contains_key(field) {
                return Err(CoreError::BadRequest(format!(
                    "schema lists '{field}' as required but does not declare it in properties"
                )));
            }
        }
        for (name, decl) in &self.properties {
            if decl.field_type == FieldType::Array && decl.items.is_none() {
                return Err(CoreError::BadRequest(format!(
                    "field '{name}' declared as array must declare 'items'"
                )));
            }
        }
        Ok(())
    }

    /// Is `new` a non-narrowing evolution of `self`? (§4.E UpdateCollection:
    /// schema changes must not add new required fields to a non-empty
    /// collection without an explicit migration flag.)
    pub fn is_non_narrowing_extension_of(&self, new: &Schema) -> bool {
        let newly_required: Vec<&String> = new
            .required
            .iter()
            .filter(|f| !self.required.contains(f))
            .collect();
        newly_required.is_empty()
    }
}

/// Distance metric for a vector field (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cosine,
    L2,
    InnerProduct,
}

/// ANN index family for a vector field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexType {
    Ivfflat,
    Hnsw,
}

/// Index-type-specific tuning parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IndexParams {
    Ivfflat { list_size: u32 },
    Hnsw { m: u32, ef_construct: u32 },
}

/// A named vector column on a collection (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorField {
    pub name: String,
    pub dimensions: u32,
    pub metric: Metric,
    pub index_type: IndexType,
    pub index_params: IndexParams,
    #[serde(default)]
    pub auto_embed: bool,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub source_fields: Vec<String>,
}

impl VectorField {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.dimensions == 0 || self.dimensions > 65536 {
            return Err(CoreError::BadRequest(format!(
                "vector field '{}' dimensions must be in 1..=65536, got {}",
                self.name, self.dimensions
            )));
        }
        if self.auto_embed && self.source_fields.is_empty() {
            return Err(CoreError::BadRequest(format!(
                "vector field '{}' has auto_embed=true but no source_fields",
                self.name
            )));
        }
        Ok(())
    }
}

/// Per-collection governance toggles (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSettings {
    #[serde(default = "default_true")]
    pub soft_delete: bool,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default = "default_true")]
    pub auditing: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CollectionSettings {
    fn default() -> Self {
        Self {
            soft_delete: true,
            versioning: false,
            auditing: true,
        }
    }
}

/// A secondary index declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    pub fields: Vec<String>,
    #[serde(default)]
    pub unique: bool,
}

/// Collection metadata (§3). Identified globally by `name`, which is
/// immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Collection {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub indexes: Vec<IndexSpec>,
    #[serde(default)]
    pub vector_fields: Vec<VectorField>,
    pub settings: CollectionSettings,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for `CreateCollection` (§4.E).
#[derive(Debug, Clone, Deserialize)]
pub struct CollectionSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub settings: Option<CollectionSettings>,
}

/// Mutable patch applied by `UpdateCollection` (§4.E). Renaming and
/// touching `vector_fields` here is deliberately not representable —
/// those go through the dedicated vector-field operations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollectionPatch {
    pub description: Option<String>,
    pub settings: Option<CollectionSettings>,
    pub schema: Option<Schema>,
    pub indexes: Option<Vec<IndexSpec>>,
    /// Explicit migration flag permitting a narrowing (new required field)
    /// schema change on a non-empty collection.
    #[serde(default)]
    pub allow_narrowing_migration: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_regex_accepts_and_rejects() {
        assert!(validate_identifier("products").is_ok());
        assert!(validate_identifier("_private_1").is_ok());
        assert!(validate_identifier("9start").is_err());
        assert!(validate_identifier("has space").is_err());
        assert!(validate_identifier("has-dash").is_err());
    }

    #[test]
    fn schema_rejects_required_field_not_declared() {
        let schema = Schema {
            properties: BTreeMap::new(),
            required: vec!["price".into()],
            strict: false,
        };
        assert!(schema.validate_well_formed().is_err());
    }

    #[test]
    fn schema_non_narrowing_check() {
        let mut base = Schema::default();
        base.properties.insert(
            "name".into(),
            FieldSchema {
                field_type: FieldType::String,
                description: None,
                items: None,
                permissions: None,
                dimensions: None,
            },
        );
        base.required = vec!["name".into()];

        let same = base.clone();
        assert!(base.is_non_narrowing_extension_of(&same));

        let mut narrower = base.clone();
        narrower.properties.insert(
            "price".into(),
            FieldSchema {
                field_type: FieldType::Number,
                description: None,
                items: None,
                permissions: None,
                dimensions: None,
            },
        );
        narrower.required.push("price".into());
        assert!(!base.is_non_narrowing_extension_of(&narrower));
    }

    #[test]
    fn vector_field_rejects_out_of_range_dimensions() {
        let field = VectorField {
            name: "emb".into(),
            dimensions: 0,
            metric: Metric::Cosine,
            index_type: IndexType::Hnsw,
            index_params: IndexParams::Hnsw {
                m: 16,
                ef_construct: 200,
            },
            auto_embed: false,
            provider_id: None,
            model: None,
            source_fields: vec![],
        };
        assert!(field.validate().is_err());
    }
}
