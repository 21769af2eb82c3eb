//! Component E — the Collection/View Service. The orchestration core: every
//! public operation resolves a permission decision, dispatches to the
//! storage adapter, and appends exactly one audit record.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use uuid::Uuid;

use crate::audit::AccessLogWriter;
use crate::collections::metadata::{self, COLLECTIONS_META, VIEWS_META};
use crate::error::{CoreError, Result};
use crate::model::access_log::AccessLog;
use crate::model::collection::{validate_identifier, Collection, CollectionPatch, CollectionSpec, VectorField};
use crate::model::document::{Document, UpdateMode, VersionPrecondition};
use crate::model::permission::{Action, PermissionSet, ResourceKind};
use crate::model::principal::Principal;
use crate::model::value::{DocumentData, Value};
use crate::model::view::{
    base_action_for_view_action, validate_pipeline, PipelineStage, View, ViewPatch, ViewRuntimeOptions, ViewSpec,
};
use crate::rag::RagOrchestrator;
use crate::rbac::RbacEvaluator;
use crate::schema::validate_document;
use crate::storage::{FindOptions, Sort, StorageAdapter, VectorHit};

/// Reserved `Document` fields a caller's write payload may never set —
/// they're owned by the storage adapter, not the schema (§4.E UpdateDocument).
const RESERVED_FIELDS: &[&str] = &["id", "created_at", "updated_at", "version", "deleted_at"];

/// Document listing parameters (§4.E QueryDocuments).
#[derive(Debug, Clone, Default)]
pub struct DocumentQuery {
    pub filter: BTreeMap<String, Value>,
    pub sort: Option<Sort>,
    pub limit: Option<u64>,
    pub skip: Option<u64>,
    pub projection: Option<Vec<String>>,
    pub include_deleted: bool,
}

/// Parameters for `VectorSearch` (§4.E).
#[derive(Debug, Clone)]
pub struct VectorSearchQuery {
    pub field: String,
    pub query_vector: Vec<f32>,
    pub top_k: usize,
    pub extra_filter: Option<BTreeMap<String, Value>>,
}

/// Parameters for `HybridSearch` (§4.E).
#[derive(Debug, Clone)]
pub struct HybridSearchQuery {
    pub field: String,
    pub query_vector: Vec<f32>,
    pub text_query: String,
    pub alpha: f32,
    pub top_k: usize,
    pub extra_filter: Option<BTreeMap<String, Value>>,
}

fn reject_reserved_fields(data: &DocumentData) -> Result<()> {
    for field in RESERVED_FIELDS {
        if data.contains_key(*field) {
            return Err(CoreError::BadRequest(format!(
                "'{field}' is a reserved field and cannot be set directly"
            )));
        }
    }
    Ok(())
}

/// The permission-visible subset of a projection, given the collection's
/// schema (§4.E QueryDocuments projection rule). `None` means "no
/// restriction beyond what the caller asked for."
fn readable_field_filter(collection: &Collection, is_admin: bool) -> Option<std::collections::HashSet<String>> {
    if is_admin {
        return None;
    }
    let schema = collection.schema.as_ref()?;
    let hidden: Vec<&String> = schema
        .properties
        .iter()
        .filter(|(_, field)| field.permissions.as_ref().and_then(|p| p.read) == Some(false))
        .map(|(name, _)| name)
        .collect();
    if hidden.is_empty() {
        return None;
    }
    Some(
        schema
            .properties
            .keys()
            .filter(|name| !hidden.contains(name))
            .cloned()
            .collect(),
    )
}

fn apply_projection(mut data: DocumentData, projection: Option<&[String]>, readable: Option<&std::collections::HashSet<String>>) -> DocumentData {
    if let Some(fields) = projection {
        let wanted: std::collections::HashSet<&String> = fields.iter().collect();
        data.retain(|key, _| wanted.contains(key));
    }
    if let Some(readable) = readable {
        data.retain(|key, _| readable.contains(key));
    }
    data
}

/// The orchestration core (§4.E). One instance is shared across all
/// request workers; all its state is either immutable or internally
/// synchronized by the components it wraps.
pub struct CollectionService {
    storage: Arc<dyn StorageAdapter>,
    audit: Arc<AccessLogWriter>,
    rag: OnceLock<Arc<RagOrchestrator>>,
}

impl CollectionService {
    pub async fn new(storage: Arc<dyn StorageAdapter>, audit: Arc<AccessLogWriter>) -> Result<Self> {
        for meta in [COLLECTIONS_META, VIEWS_META] {
            match storage.create_collection(meta).await {
                Ok(()) | Err(CoreError::Conflict(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(Self { storage, audit, rag: OnceLock::new() })
    }

    /// Gives the collection/view service a handle back to the RAG
    /// orchestrator so document mutations can trigger auto-embed jobs.
    /// Called once during startup, after both are constructed — the two
    /// depend on each other (the orchestrator calls back into
    /// `vector_search`/`get_collection`), so neither can build the other.
    pub fn attach_rag_orchestrator(&self, orchestrator: Arc<RagOrchestrator>) {
        let _ = self.rag.set(orchestrator);
    }

    /// The shared storage handle, for components (the RAG orchestrator)
    /// that need raw document access outside the RBAC/audit envelope.
    pub fn storage(&self) -> Arc<dyn StorageAdapter> {
        self.storage.clone()
    }

    fn evaluator(principal: &Principal, extra_grants: &PermissionSet) -> RbacEvaluator {
        RbacEvaluator::new(principal.clone(), extra_grants.clone())
    }

    async fn audit_and_return<T>(
        &self,
        principal: &Principal,
        resource: &str,
        resource_id: Option<String>,
        action: Action,
        result: Result<T>,
    ) -> Result<T> {
        let log = match &result {
            Ok(_) => AccessLog::allowed(principal.id(), resource, resource_id, action.to_string()),
            Err(e) => AccessLog::denied(principal.id(), resource, resource_id, action.to_string(), e.to_string()),
        };
        self.audit.record(log).await;
        result
    }

    /// Builds the denial error for a failed permission check, re-checking
    /// `Action::Read` on `(resource_kind, check_name)` so existence is only
    /// ever revealed to a caller who could at least read the resource
    /// (§4.E): a caller without read gets `NotFound`, one with read but
    /// lacking the specific action gets `Forbidden`. `check_name` is the
    /// name the original permission check ran against — a view's own
    /// `base_collection` for view actions, since view permissions are
    /// derived from the base collection's grants.
    async fn deny(
        &self,
        principal: &Principal,
        evaluator: &RbacEvaluator,
        resource_kind: ResourceKind,
        check_name: &str,
        resource: &str,
        resource_id: Option<String>,
        action: Action,
    ) -> CoreError {
        let err = if evaluator.allowed(resource_kind, check_name, Action::Read) {
            CoreError::Forbidden("insufficient permissions".to_string())
        } else {
            CoreError::NotFound(format!("{resource} '{}'", resource_id.as_deref().unwrap_or(check_name)))
        };
        self.audit
            .record(AccessLog::denied(principal.id(), resource, resource_id, action.to_string(), err.to_string()))
            .await;
        err
    }

    async fn load_collection(&self, name: &str) -> Result<Collection> {
        metadata::get(self.storage.as_ref(), COLLECTIONS_META, name)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("collection '{name}'")))
    }

    async fn load_view(&self, name: &str) -> Result<View> {
        metadata::get(self.storage.as_ref(), VIEWS_META, name)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("view '{name}'")))
    }

    // ---------------------------------------------------------------
    // Collections
    // ---------------------------------------------------------------

    pub async fn create_collection(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        spec: CollectionSpec,
    ) -> Result<Collection> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, &spec.name, Action::Create) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, &spec.name, "collection", Some(spec.name.clone()), Action::Create).await);
        }

        let result = self.create_collection_inner(principal, spec.clone()).await;
        self.audit_and_return(principal, "collection", Some(spec.name), Action::Create, result).await
    }

    async fn create_collection_inner(&self, principal: &Principal, spec: CollectionSpec) -> Result<Collection> {
        validate_identifier(&spec.name)?;
        if metadata::get::<Collection>(self.storage.as_ref(), COLLECTIONS_META, &spec.name).await?.is_some() {
            return Err(CoreError::Conflict(format!("collection '{}' already exists", spec.name)));
        }
        if let Some(schema) = &spec.schema {
            schema.validate_well_formed()?;
        }

        let now = chrono::Utc::now();
        let collection = Collection {
            name: spec.name.clone(),
            description: spec.description,
            schema: spec.schema,
            indexes: Vec::new(),
            vector_fields: Vec::new(),
            settings: spec.settings.unwrap_or_default(),
            creator_id: principal.id().to_string(),
            created_at: now,
            updated_at: now,
        };

        // Document storage creation is not transactional with metadata
        // persistence; on failure, best-effort undo the storage side so we
        // don't leave an orphan collection with no metadata (§5).
        self.storage.create_collection(&spec.name).await?;
        if let Err(e) = metadata::put(self.storage.as_ref(), COLLECTIONS_META, &spec.name, &collection).await {
            let _ = self.storage.drop_collection(&spec.name).await;
            return Err(e);
        }
        Ok(collection)
    }

    pub async fn get_collection(&self, principal: &Principal, extra_grants: &PermissionSet, name: &str) -> Result<Collection> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, name, Action::Read) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, name, "collection", Some(name.to_string()), Action::Read).await);
        }
        let result = self.load_collection(name).await;
        self.audit_and_return(principal, "collection", Some(name.to_string()), Action::Read, result).await
    }

    pub async fn list_collections(&self, principal: &Principal, extra_grants: &PermissionSet) -> Result<Vec<Collection>> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let all: Vec<Collection> = metadata::list(self.storage.as_ref(), COLLECTIONS_META).await?;
        let visible = all
            .into_iter()
            .filter(|c| evaluator.allowed(ResourceKind::Collection, &c.name, Action::Read))
            .collect();
        Ok(visible)
    }

    pub async fn update_collection(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        name: &str,
        patch: CollectionPatch,
    ) -> Result<Collection> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, name, Action::Update) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, name, "collection", Some(name.to_string()), Action::Update).await);
        }
        let result = self.update_collection_inner(name, patch).await;
        self.audit_and_return(principal, "collection", Some(name.to_string()), Action::Update, result).await
    }

    async fn update_collection_inner(&self, name: &str, patch: CollectionPatch) -> Result<Collection> {
        let mut collection = self.load_collection(name).await?;

        if let Some(new_schema) = &patch.schema {
            new_schema.validate_well_formed()?;
            if let Some(old_schema) = &collection.schema {
                let non_empty = self.storage.count(name, &BTreeMap::new()).await? > 0;
                if non_empty && !old_schema.is_non_narrowing_extension_of(new_schema) && !patch.allow_narrowing_migration {
                    return Err(CoreError::BadRequest(
                        "schema change adds required fields to a non-empty collection without allow_narrowing_migration".into(),
                    ));
                }
            }
            collection.schema = Some(new_schema.clone());
        }
        if let Some(description) = patch.description {
            collection.description = description;
        }
        if let Some(settings) = patch.settings {
            collection.settings = settings;
        }
        if let Some(indexes) = patch.indexes {
            collection.indexes = indexes;
        }
        collection.updated_at = chrono::Utc::now();

        metadata::put(self.storage.as_ref(), COLLECTIONS_META, name, &collection).await?;
        Ok(collection)
    }

    pub async fn delete_collection(&self, principal: &Principal, extra_grants: &PermissionSet, name: &str, force: bool) -> Result<()> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, name, Action::Delete) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, name, "collection", Some(name.to_string()), Action::Delete).await);
        }
        let result = self.delete_collection_inner(name, force).await;
        self.audit_and_return(principal, "collection", Some(name.to_string()), Action::Delete, result).await
    }

    async fn delete_collection_inner(&self, name: &str, force: bool) -> Result<()> {
        self.load_collection(name).await?;

        if !force {
            let views: Vec<View> = metadata::list(self.storage.as_ref(), VIEWS_META).await?;
            if views.iter().any(|v| v.base_collection == name) {
                return Err(CoreError::InUse(format!("collection '{name}' is referenced by one or more views")));
            }
        }

        self.storage.drop_collection(name).await?;
        metadata::remove(self.storage.as_ref(), COLLECTIONS_META, name).await?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    pub async fn insert_document(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        data: DocumentData,
    ) -> Result<Document> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Write) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Write).await);
        }
        let result = self.insert_document_inner(collection_name, data).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Write, result).await
    }

    async fn insert_document_inner(&self, collection_name: &str, data: DocumentData) -> Result<Document> {
        reject_reserved_fields(&data)?;
        let collection = self.load_collection(collection_name).await?;
        if let Some(schema) = &collection.schema {
            let violations = validate_document(&data, schema, &collection.vector_fields);
            if let Some(first) = violations.into_iter().next() {
                return Err(CoreError::BadRequest(format!("{}: {}", first.path, first.reason)));
            }
        }

        let touched: Vec<String> = data.keys().cloned().collect();
        let now = chrono::Utc::now();
        let document = Document {
            id: Uuid::new_v4().to_string(),
            collection: collection_name.to_string(),
            data,
            version: 1,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let inserted = self.storage.insert_one(collection_name, document).await?;
        self.index_vector_fields(&collection, &inserted).await;
        self.trigger_auto_embed(&collection, &inserted, &touched).await;
        Ok(inserted)
    }

    pub async fn update_document(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        id: &str,
        data: DocumentData,
        mode: UpdateMode,
        precondition: VersionPrecondition,
    ) -> Result<Document> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Write) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Write).await);
        }
        let result = self.update_document_inner(collection_name, id, data, mode, precondition).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Write, result).await
    }

    async fn update_document_inner(
        &self,
        collection_name: &str,
        id: &str,
        data: DocumentData,
        mode: UpdateMode,
        precondition: VersionPrecondition,
    ) -> Result<Document> {
        reject_reserved_fields(&data)?;
        let collection = self.load_collection(collection_name).await?;
        let touched: Vec<String> = data.keys().cloned().collect();

        let existing = self
            .storage
            .find_one_by_id(collection_name, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("document '{id}'")))?;

        let merged = match mode {
            UpdateMode::Replace => data.clone(),
            UpdateMode::Patch => {
                let mut merged = existing.data.clone();
                for (key, value) in &data {
                    if value.is_null() {
                        merged.remove(key);
                    } else {
                        merged.insert(key.clone(), value.clone());
                    }
                }
                merged
            }
        };

        if let Some(schema) = &collection.schema {
            let violations = validate_document(&merged, schema, &collection.vector_fields);
            if let Some(first) = violations.into_iter().next() {
                return Err(CoreError::BadRequest(format!("{}: {}", first.path, first.reason)));
            }
        }

        let updated = self
            .storage
            .update_one(collection_name, id, data, mode, precondition.if_version)
            .await?;
        self.index_vector_fields(&collection, &updated).await;
        self.trigger_auto_embed(&collection, &updated, &touched).await;
        Ok(updated)
    }

    /// Best-effort: push any vector-typed field present in `document.data`
    /// into its column's index. Swallows per-field failures (logged) rather
    /// than failing the write the data itself already committed.
    async fn index_vector_fields(&self, collection: &Collection, document: &Document) {
        for field in &collection.vector_fields {
            let Some(value) = document.data.get(&field.name) else { continue };
            let Some(vector) = value.as_numeric_vector() else { continue };
            if let Err(err) = self.storage.index_vector(&collection.name, &field.name, &document.id, &vector).await {
                tracing::warn!(
                    collection = %collection.name,
                    field = %field.name,
                    document_id = %document.id,
                    error = %err,
                    "failed to index vector field"
                );
            }
        }
    }

    /// Post-commit auto-embed hook (§4.F): any `auto_embed=true` vector
    /// field whose `source_fields` overlap the keys the write touched gets
    /// a single-document embedding job queued.
    async fn trigger_auto_embed(&self, collection: &Collection, document: &Document, touched_fields: &[String]) {
        let Some(rag) = self.rag.get() else { return };
        for field in &collection.vector_fields {
            if !field.auto_embed {
                continue;
            }
            if field.source_fields.iter().any(|sf| touched_fields.iter().any(|t| t == sf)) {
                rag.enqueue_auto_embed(&collection.name, &field.name, document.id.clone()).await;
            }
        }
    }

    pub async fn delete_document(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        id: &str,
    ) -> Result<()> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Delete) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Delete).await);
        }
        let result = self.delete_document_inner(collection_name, id).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Delete, result).await
    }

    async fn delete_document_inner(&self, collection_name: &str, id: &str) -> Result<()> {
        let collection = self.load_collection(collection_name).await?;
        self.storage.delete_one(collection_name, id, !collection.settings.soft_delete).await
    }

    pub async fn query_documents(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        mut query: DocumentQuery,
    ) -> Result<Vec<DocumentData>> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Read) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Read).await);
        }

        if query.include_deleted && !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Delete) {
            query.include_deleted = false;
        }

        let result = self
            .query_documents_inner(collection_name, query, evaluator.principal().is_admin())
            .await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Read, result).await
    }

    async fn query_documents_inner(&self, collection_name: &str, mut query: DocumentQuery, is_admin: bool) -> Result<Vec<DocumentData>> {
        let collection = self.load_collection(collection_name).await?;

        if !query.include_deleted {
            query.filter.insert("deleted_at".to_string(), Value::Null);
        }

        let limit = query.limit.unwrap_or(20);
        if limit == 0 || limit > 100 {
            return Err(CoreError::BadRequest("limit must satisfy 0 < limit <= 100".into()));
        }

        let opts = FindOptions {
            sort: query.sort.clone(),
            limit: Some(limit),
            skip: query.skip,
        };
        let docs = self.storage.find(collection_name, &query.filter, &opts).await?;

        let readable = readable_field_filter(&collection, is_admin);
        Ok(docs
            .into_iter()
            .map(|d| apply_projection(d.data, query.projection.as_deref(), readable.as_ref()))
            .collect())
    }

    /// Single-document read by id (the `GET /data/{collection}/{id}`
    /// handler). `find_one_by_id` returns the full `Document`, so the
    /// soft-delete check is done directly against `deleted_at` rather than
    /// through the filter language `query_documents` relies on.
    pub async fn get_document(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        id: &str,
        include_deleted: bool,
    ) -> Result<DocumentData> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Read) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Read).await);
        }
        let include_deleted = include_deleted && evaluator.allowed(ResourceKind::Collection, collection_name, Action::Delete);
        let result = self.get_document_inner(collection_name, id, include_deleted, evaluator.principal().is_admin()).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Read, result).await
    }

    async fn get_document_inner(&self, collection_name: &str, id: &str, include_deleted: bool, is_admin: bool) -> Result<DocumentData> {
        let collection = self.load_collection(collection_name).await?;
        let doc = self
            .storage
            .find_one_by_id(collection_name, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("document '{id}'")))?;
        if doc.deleted_at.is_some() && !include_deleted {
            return Err(CoreError::NotFound(format!("document '{id}'")));
        }
        let readable = readable_field_filter(&collection, is_admin);
        Ok(apply_projection(doc.data, None, readable.as_ref()))
    }

    pub async fn count_documents(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        filter: BTreeMap<String, Value>,
        include_deleted: bool,
    ) -> Result<u64> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Read) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Read).await);
        }
        let mut filter = filter;
        let include_deleted = include_deleted && evaluator.allowed(ResourceKind::Collection, collection_name, Action::Delete);
        if !include_deleted {
            filter.insert("deleted_at".to_string(), Value::Null);
        }
        let result = self.storage.count(collection_name, &filter).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Read, result).await
    }

    // ---------------------------------------------------------------
    // Views
    // ---------------------------------------------------------------

    pub async fn create_view(&self, principal: &Principal, extra_grants: &PermissionSet, spec: ViewSpec) -> Result<View> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let base_action = base_action_for_view_action(Action::Create);
        if !evaluator.allowed(ResourceKind::Collection, &spec.base_collection, base_action) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, &spec.base_collection, "view", Some(spec.name.clone()), Action::Create).await);
        }
        let result = self.create_view_inner(principal, spec.clone()).await;
        self.audit_and_return(principal, "view", Some(spec.name), Action::Create, result).await
    }

    async fn create_view_inner(&self, principal: &Principal, spec: ViewSpec) -> Result<View> {
        validate_identifier(&spec.name)?;
        validate_pipeline(&spec.pipeline)?;
        self.load_collection(&spec.base_collection).await?;
        if metadata::get::<View>(self.storage.as_ref(), VIEWS_META, &spec.name).await?.is_some() {
            return Err(CoreError::Conflict(format!("view '{}' already exists", spec.name)));
        }

        let now = chrono::Utc::now();
        let view = View {
            name: spec.name.clone(),
            base_collection: spec.base_collection,
            filter: spec.filter,
            projection: spec.projection,
            pipeline: spec.pipeline,
            sort: spec.sort,
            creator_id: principal.id().to_string(),
            created_at: now,
            updated_at: now,
        };
        metadata::put(self.storage.as_ref(), VIEWS_META, &spec.name, &view).await?;
        Ok(view)
    }

    pub async fn get_view(&self, principal: &Principal, extra_grants: &PermissionSet, name: &str) -> Result<View> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let view = self.load_view(name).await?;
        let base_action = base_action_for_view_action(Action::Read);
        if !evaluator.allowed(ResourceKind::Collection, &view.base_collection, base_action) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, &view.base_collection, "view", Some(name.to_string()), Action::Read).await);
        }
        self.audit_and_return(principal, "view", Some(name.to_string()), Action::Read, Ok(view)).await
    }

    pub async fn list_views(&self, principal: &Principal, extra_grants: &PermissionSet) -> Result<Vec<View>> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let all: Vec<View> = metadata::list(self.storage.as_ref(), VIEWS_META).await?;
        Ok(all
            .into_iter()
            .filter(|v| evaluator.allowed(ResourceKind::Collection, &v.base_collection, base_action_for_view_action(Action::Read)))
            .collect())
    }

    pub async fn update_view(&self, principal: &Principal, extra_grants: &PermissionSet, name: &str, patch: ViewPatch) -> Result<View> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let view = self.load_view(name).await?;
        let base_action = base_action_for_view_action(Action::Update);
        if !evaluator.allowed(ResourceKind::Collection, &view.base_collection, base_action) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, &view.base_collection, "view", Some(name.to_string()), Action::Update).await);
        }
        let result = self.update_view_inner(view, patch).await;
        self.audit_and_return(principal, "view", Some(name.to_string()), Action::Update, result).await
    }

    async fn update_view_inner(&self, mut view: View, patch: ViewPatch) -> Result<View> {
        if let Some(pipeline) = patch.pipeline {
            validate_pipeline(&pipeline)?;
            view.pipeline = pipeline;
        }
        if let Some(filter) = patch.filter {
            view.filter = filter;
        }
        if let Some(projection) = patch.projection {
            view.projection = projection;
        }
        if let Some(sort) = patch.sort {
            view.sort = sort;
        }
        view.updated_at = chrono::Utc::now();
        metadata::put(self.storage.as_ref(), VIEWS_META, &view.name, &view).await?;
        Ok(view)
    }

    pub async fn delete_view(&self, principal: &Principal, extra_grants: &PermissionSet, name: &str) -> Result<()> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let view = self.load_view(name).await?;
        let base_action = base_action_for_view_action(Action::Delete);
        if !evaluator.allowed(ResourceKind::Collection, &view.base_collection, base_action) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, &view.base_collection, "view", Some(name.to_string()), Action::Delete).await);
        }
        let result = metadata::remove(self.storage.as_ref(), VIEWS_META, name).await;
        self.audit_and_return(principal, "view", Some(name.to_string()), Action::Delete, result).await
    }

    pub async fn query_view(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        name: &str,
        runtime: ViewRuntimeOptions,
    ) -> Result<Vec<DocumentData>> {
        let evaluator = Self::evaluator(principal, extra_grants);
        let view = self.load_view(name).await?;
        let base_action = base_action_for_view_action(Action::Execute);
        if !evaluator.allowed(ResourceKind::Collection, &view.base_collection, base_action) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, &view.base_collection, "view", Some(name.to_string()), Action::Execute).await);
        }
        let result = self.query_view_inner(&view, runtime, evaluator.principal().is_admin()).await;
        self.audit_and_return(principal, "view", Some(name.to_string()), Action::Execute, result).await
    }

    async fn query_view_inner(&self, view: &View, runtime: ViewRuntimeOptions, is_admin: bool) -> Result<Vec<DocumentData>> {
        let collection = self.load_collection(&view.base_collection).await?;

        let mut filter = view.effective_filter(runtime.extra_filter.as_ref());
        filter.entry("deleted_at".to_string()).or_insert(Value::Null);

        // The view's own filter/pipeline/sort compose into a single
        // aggregate call: the effective filter becomes a leading $match,
        // the view's declared stages run next, and a runtime sort/limit/
        // skip (falling back to the view's own) close the pipeline.
        let mut pipeline = Vec::with_capacity(view.pipeline.len() + 3);
        pipeline.push(PipelineStage::Match { filter });
        pipeline.extend(view.pipeline.clone());

        if let Some(sort) = view.effective_sort(runtime.sort.as_ref()) {
            pipeline.push(PipelineStage::Sort {
                by: sort.by,
                descending: sort.descending,
            });
        }
        if let Some(skip) = runtime.skip {
            pipeline.push(PipelineStage::Skip { count: skip });
        }
        pipeline.push(PipelineStage::Limit {
            count: runtime.limit.unwrap_or(20),
        });

        let rows = self.storage.aggregate(&view.base_collection, &pipeline).await?;

        let readable = readable_field_filter(&collection, is_admin);
        Ok(rows
            .into_iter()
            .map(|row| apply_projection(row, view.projection.as_deref(), readable.as_ref()))
            .collect())
    }

    // ---------------------------------------------------------------
    // Vector fields & search
    // ---------------------------------------------------------------

    pub async fn add_vector_field(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        field: VectorField,
    ) -> Result<Collection> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Update) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Update).await);
        }
        let result = self.add_vector_field_inner(collection_name, field).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Update, result).await
    }

    async fn add_vector_field_inner(&self, collection_name: &str, field: VectorField) -> Result<Collection> {
        field.validate()?;
        let mut collection = self.load_collection(collection_name).await?;
        if collection.vector_fields.iter().any(|f| f.name == field.name) {
            return Err(CoreError::Conflict(format!("vector field '{}' already exists", field.name)));
        }

        self.storage
            .create_vector_column(collection_name, &field.name, field.dimensions, field.metric)
            .await?;
        collection.vector_fields.push(field);
        collection.updated_at = chrono::Utc::now();
        metadata::put(self.storage.as_ref(), COLLECTIONS_META, collection_name, &collection).await?;
        Ok(collection)
    }

    pub async fn remove_vector_field(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        field_name: &str,
        has_active_job: bool,
    ) -> Result<Collection> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Update) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Update).await);
        }
        if has_active_job {
            let err = CoreError::InUse(format!("vector field '{field_name}' has a queued or running embedding job"));
            self.audit
                .record(AccessLog::denied(principal.id(), "collection", Some(collection_name.to_string()), "update", err.to_string()))
                .await;
            return Err(err);
        }
        let result = self.remove_vector_field_inner(collection_name, field_name).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Update, result).await
    }

    async fn remove_vector_field_inner(&self, collection_name: &str, field_name: &str) -> Result<Collection> {
        let mut collection = self.load_collection(collection_name).await?;
        let before = collection.vector_fields.len();
        collection.vector_fields.retain(|f| f.name != field_name);
        if collection.vector_fields.len() == before {
            return Err(CoreError::NotFound(format!("vector field '{field_name}'")));
        }
        self.storage.drop_vector_column(collection_name, field_name).await?;
        collection.updated_at = chrono::Utc::now();
        metadata::put(self.storage.as_ref(), COLLECTIONS_META, collection_name, &collection).await?;
        Ok(collection)
    }

    pub async fn list_vector_fields(&self, principal: &Principal, extra_grants: &PermissionSet, collection_name: &str) -> Result<Vec<VectorField>> {
        let collection = self.get_collection(principal, extra_grants, collection_name).await?;
        Ok(collection.vector_fields)
    }

    pub async fn vector_search(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        query: VectorSearchQuery,
    ) -> Result<Vec<VectorHit>> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Read) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Read).await);
        }
        let result = self.vector_search_inner(collection_name, query).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Read, result).await
    }

    async fn vector_search_inner(&self, collection_name: &str, query: VectorSearchQuery) -> Result<Vec<VectorHit>> {
        let collection = self.load_collection(collection_name).await?;
        let field = collection
            .vector_fields
            .iter()
            .find(|f| f.name == query.field)
            .ok_or_else(|| CoreError::NotFound(format!("vector field '{}'", query.field)))?;

        if query.query_vector.len() != field.dimensions as usize {
            return Err(CoreError::BadRequest(format!(
                "query vector has {} dimensions, field '{}' expects {}",
                query.query_vector.len(),
                field.name,
                field.dimensions
            )));
        }
        if query.top_k == 0 || query.top_k > 1000 {
            return Err(CoreError::BadRequest("top_k must satisfy 0 < top_k <= 1000".into()));
        }

        self.storage
            .vector_search(collection_name, &query.field, &query.query_vector, query.top_k, query.extra_filter.as_ref())
            .await
    }

    pub async fn hybrid_search(
        &self,
        principal: &Principal,
        extra_grants: &PermissionSet,
        collection_name: &str,
        query: HybridSearchQuery,
    ) -> Result<Vec<VectorHit>> {
        let evaluator = Self::evaluator(principal, extra_grants);
        if !evaluator.allowed(ResourceKind::Collection, collection_name, Action::Read) {
            return Err(self.deny(principal, &evaluator, ResourceKind::Collection, collection_name, "collection", Some(collection_name.to_string()), Action::Read).await);
        }
        let result = self.hybrid_search_inner(collection_name, query).await;
        self.audit_and_return(principal, "collection", Some(collection_name.to_string()), Action::Read, result).await
    }

    async fn hybrid_search_inner(&self, collection_name: &str, query: HybridSearchQuery) -> Result<Vec<VectorHit>> {
        let collection = self.load_collection(collection_name).await?;
        let field = collection
            .vector_fields
            .iter()
            .find(|f| f.name == query.field)
            .ok_or_else(|| CoreError::NotFound(format!("vector field '{}'", query.field)))?;

        if query.query_vector.len() != field.dimensions as usize {
            return Err(CoreError::BadRequest(format!(
                "query vector has {} dimensions, field '{}' expects {}",
                query.query_vector.len(),
                field.name,
                field.dimensions
            )));
        }
        if query.text_query.trim().is_empty() {
            return Err(CoreError::BadRequest("text_query must not be empty".into()));
        }
        if !(0.0..=1.0).contains(&query.alpha) {
            return Err(CoreError::BadRequest("alpha must be in [0, 1]".into()));
        }
        if query.top_k == 0 || query.top_k > 1000 {
            return Err(CoreError::BadRequest("top_k must satisfy 0 < top_k <= 1000".into()));
        }

        self.storage
            .hybrid_search(
                collection_name,
                &query.field,
                &query.query_vector,
                &query.text_query,
                query.top_k,
                query.alpha,
                query.extra_filter.as_ref(),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AccessLogSink;
    use crate::model::collection::{IndexType, IndexParams};
    use crate::model::principal::{Role, User};
    use crate::storage::MemoryAdapter;

    async fn test_service() -> CollectionService {
        let adapter = Arc::new(MemoryAdapter::new().await.unwrap());
        let sink: Arc<dyn AccessLogSink> = adapter.clone();
        let audit = Arc::new(AccessLogWriter::new(sink, 64));
        let storage: Arc<dyn StorageAdapter> = adapter;
        CollectionService::new(storage, audit).await.unwrap()
    }

    fn user(role: Role) -> Principal {
        Principal::User(Box::new(User {
            id: "u1".into(),
            email: "a@x.io".into(),
            password_hash: "h".into(),
            name: "A".into(),
            role,
            active: true,
            failed_login_attempts: 0,
            locked_until: None,
            extra_grants: PermissionSet::default(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }))
    }

    fn spec(name: &str) -> CollectionSpec {
        CollectionSpec {
            name: name.to_string(),
            description: String::new(),
            schema: None,
            settings: None,
        }
    }

    #[tokio::test]
    async fn developer_can_create_and_read_own_collection() {
        let service = test_service().await;
        let dev = user(Role::Developer);
        let grants = PermissionSet::default();

        let created = service.create_collection(&dev, &grants, spec("products")).await.unwrap();
        assert_eq!(created.name, "products");

        let fetched = service.get_collection(&dev, &grants, "products").await.unwrap();
        assert_eq!(fetched.name, "products");
    }

    #[tokio::test]
    async fn regular_user_without_grants_is_denied() {
        let service = test_service().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        service.create_collection(&admin, &grants, spec("products")).await.unwrap();

        let regular = user(Role::Regular);
        let err = service.get_collection(&regular, &grants, "products").await.unwrap_err();
        assert!(matches!(err, CoreError::Forbidden(_)));
    }

    #[tokio::test]
    async fn insert_then_query_excludes_soft_deleted_by_default() {
        let service = test_service().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        service.create_collection(&admin, &grants, spec("products")).await.unwrap();

        let doc = service
            .insert_document(
                &admin,
                &grants,
                "products",
                BTreeMap::from([("name".to_string(), Value::String("Pen".into()))]),
            )
            .await
            .unwrap();

        service.delete_document(&admin, &grants, "products", &doc.id).await.unwrap();

        let rows = service
            .query_documents(&admin, &grants, "products", DocumentQuery::default())
            .await
            .unwrap();
        assert!(rows.is_empty());

        let mut with_deleted = DocumentQuery::default();
        with_deleted.include_deleted = true;
        let rows = service.query_documents(&admin, &grants, "products", with_deleted).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn get_document_hides_soft_deleted_unless_included() {
        let service = test_service().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        service.create_collection(&admin, &grants, spec("products")).await.unwrap();

        let doc = service
            .insert_document(
                &admin,
                &grants,
                "products",
                BTreeMap::from([("name".to_string(), Value::String("Pen".into()))]),
            )
            .await
            .unwrap();

        service.delete_document(&admin, &grants, "products", &doc.id).await.unwrap();

        let err = service.get_document(&admin, &grants, "products", &doc.id, false).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let found = service.get_document(&admin, &grants, "products", &doc.id, true).await.unwrap();
        assert_eq!(found.get("name"), Some(&Value::String("Pen".into())));
    }

    #[tokio::test]
    async fn update_document_rejects_reserved_field() {
        let service = test_service().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        service.create_collection(&admin, &grants, spec("products")).await.unwrap();
        let doc = service
            .insert_document(&admin, &grants, "products", BTreeMap::new())
            .await
            .unwrap();

        let err = service
            .update_document(
                &admin,
                &grants,
                "products",
                &doc.id,
                BTreeMap::from([("version".to_string(), Value::Integer(99))]),
                UpdateMode::Patch,
                VersionPrecondition::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }

    #[tokio::test]
    async fn delete_collection_blocked_by_referencing_view_unless_forced() {
        let service = test_service().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        service.create_collection(&admin, &grants, spec("products")).await.unwrap();
        service
            .create_view(
                &admin,
                &grants,
                ViewSpec {
                    name: "cheap".into(),
                    base_collection: "products".into(),
                    filter: BTreeMap::new(),
                    projection: None,
                    pipeline: vec![],
                    sort: None,
                },
            )
            .await
            .unwrap();

        let err = service.delete_collection(&admin, &grants, "products", false).await.unwrap_err();
        assert!(matches!(err, CoreError::InUse(_)));

        service.delete_collection(&admin, &grants, "products", true).await.unwrap();
    }

    #[tokio::test]
    async fn vector_search_rejects_mismatched_dimensions() {
        let service = test_service().await;
        let admin = user(Role::Admin);
        let grants = PermissionSet::default();
        service.create_collection(&admin, &grants, spec("products")).await.unwrap();
        service
            .add_vector_field(
                &admin,
                &grants,
                "products",
                VectorField {
                    name: "embedding".into(),
                    dimensions: 3,
                    metric: crate::model::collection::Metric::Cosine,
                    index_type: IndexType::Hnsw,
                    index_params: IndexParams::Hnsw { m: 16, ef_construct: 200 },
                    auto_embed: false,
                    provider_id: None,
                    model: None,
                    source_fields: vec![],
                },
            )
            .await
            .unwrap();

        let err = service
            .vector_search(
                &admin,
                &grants,
                "products",
                VectorSearchQuery {
                    field: "embedding".into(),
                    query_vector: vec![1.0, 0.0],
                    top_k: 5,
                    extra_filter: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::BadRequest(_)));
    }
}
