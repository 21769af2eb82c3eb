//! Saved views: a named, permission-inheriting query over a base collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::model::value::Value;

/// A single stage in a view's aggregate pipeline (§4.E QueryView). Unknown
/// stage names are rejected at parse time rather than at evaluation time —
/// `PipelineStage` only ever represents a recognized stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op")]
pub enum PipelineStage {
    #[serde(rename = "$match")]
    Match { filter: BTreeMap<String, Value> },
    #[serde(rename = "$project")]
    Project { fields: Vec<String> },
    #[serde(rename = "$sort")]
    Sort { by: String, #[serde(default)] descending: bool },
    #[serde(rename = "$limit")]
    Limit { count: u64 },
    #[serde(rename = "$skip")]
    Skip { count: u64 },
    #[serde(rename = "$group")]
    Group {
        by: String,
        #[serde(default)]
        count_as: Option<String>,
    },
}

impl PipelineStage {
    /// The wire name of this stage, for error messages and audit detail.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::Match { .. } => "$match",
            PipelineStage::Project { .. } => "$project",
            PipelineStage::Sort { .. } => "$sort",
            PipelineStage::Limit { .. } => "$limit",
            PipelineStage::Skip { .. } => "$skip",
            PipelineStage::Group { .. } => "$group",
        }
    }
}

/// A saved query over a base collection (§3). Owns no data of its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub base_collection: String,
    #[serde(default)]
    pub filter: BTreeMap<String, Value>,
    #[serde(default)]
    pub projection: Option<Vec<String>>,
    #[serde(default)]
    pub pipeline: Vec<PipelineStage>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    pub creator_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A sort key and direction, shared between a view's stored default and a
/// per-request runtime override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortSpec {
    pub by: String,
    #[serde(default)]
    pub descending: bool,
}

/// Request payload for `CreateView` (§4.E).
#[derive(Debug, Clone, Deserialize)]
pub struct ViewSpec {
    pub name: String,
    pub base_collection: String,
    #[serde(default)]
    pub filter: BTreeMap<String, Value>,
    #[serde(default)]
    pub projection: Option<Vec<String>>,
    #[serde(default)]
    pub pipeline: Vec<PipelineStage>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

/// Mutable patch applied by `UpdateView`. `base_collection` is deliberately
/// absent — changing a view's base collection is disallowed (§4.E).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewPatch {
    pub filter: Option<BTreeMap<String, Value>>,
    pub projection: Option<Option<Vec<String>>>,
    pub pipeline: Option<Vec<PipelineStage>>,
    pub sort: Option<Option<SortSpec>>,
}

/// Per-request overrides supplied to `QueryView` (§4.E). Composed with the
/// view's own filter/sort: `effective_filter = view.filter AND
/// runtime.extra_filter`; `effective_sort = runtime.sort.or(view.sort)`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViewRuntimeOptions {
    #[serde(default)]
    pub extra_filter: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    pub sort: Option<SortSpec>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
}

impl View {
    /// Combine the view's stored filter with a caller-supplied extra filter
    /// into the single predicate `QueryDocuments` will evaluate.
    pub fn effective_filter(&self, extra: Option<&BTreeMap<String, Value>>) -> BTreeMap<String, Value> {
        match extra {
            None => self.filter.clone(),
            Some(extra) if extra.is_empty() => self.filter.clone(),
            Some(extra) => {
                let mut and_clauses = Vec::new();
                if !self.filter.is_empty() {
                    and_clauses.push(Value::Object(self.filter.clone()));
                }
                and_clauses.push(Value::Object(extra.clone()));
                let mut combined = BTreeMap::new();
                combined.insert("$and".to_string(), Value::Array(and_clauses));
                combined
            }
        }
    }

    pub fn effective_sort(&self, runtime_sort: Option<&SortSpec>) -> Option<SortSpec> {
        runtime_sort.cloned().or_else(|| self.sort.clone())
    }
}

/// Maps a view action onto the permission action required on its base
/// collection (§4.E: "read→read, execute→read").
pub fn base_action_for_view_action(
    view_action: crate::model::permission::Action,
) -> crate::model::permission::Action {
    use crate::model::permission::Action;
    match view_action {
        Action::Execute => Action::Read,
        other => other,
    }
}

pub fn validate_pipeline(stages: &[PipelineStage]) -> crate::error::Result<()> {
    for stage in stages {
        if let PipelineStage::Limit { count } = stage {
            if *count == 0 {
                return Err(CoreError::BadRequest(
                    "$limit stage must have count > 0".into(),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::permission::Action;

    fn sample_view() -> View {
        View {
            name: "cheap".into(),
            base_collection: "products".into(),
            filter: BTreeMap::from([("price".to_string(), Value::Integer(5))]),
            projection: None,
            pipeline: vec![],
            sort: None,
            creator_id: "u1".into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn empty_runtime_filter_returns_view_filter_unchanged() {
        let view = sample_view();
        assert_eq!(view.effective_filter(None), view.filter);
    }

    #[test]
    fn runtime_filter_is_anded_with_view_filter() {
        let view = sample_view();
        let extra = BTreeMap::from([("in_stock".to_string(), Value::Bool(true))]);
        let combined = view.effective_filter(Some(&extra));
        assert!(combined.contains_key("$and"));
    }

    #[test]
    fn execute_action_maps_to_read_on_base_collection() {
        assert_eq!(base_action_for_view_action(Action::Execute), Action::Read);
        assert_eq!(base_action_for_view_action(Action::Read), Action::Read);
    }

    #[test]
    fn zero_limit_stage_rejected() {
        let stages = vec![PipelineStage::Limit { count: 0 }];
        assert!(validate_pipeline(&stages).is_err());
    }
}
