//! Nebula Test Utilities
//!
//! Centralized test infrastructure for the Nebula workspace:
//! - Proptest generators for record ids and core enums
//! - A pre-populated [`EnumRegistry`] fixture standing in for a taxonomy load
//! - Fixtures building the closed per-action input shapes and sample records
//! - Custom assertions for Nebula-specific error variants

pub use nebula_core::{
    ApiKey, ApprovalRequest, ApprovalStatus, AuditEntry, AuditIdentity, Caller, ContextSegment,
    Entity, EntityIdType, EnumRegistry, EnumSection, EnrollmentSession, EnrollmentStatus,
    ExecutorError, Job, JobPriority, KnowledgeItem, NebulaAgentId, NebulaError, NebulaResult,
    NodeRef, Protocol, Relationship, Scope, ScopeRecordId, StatusId, StoreError, TaxonomyError,
    UserId,
};

use chrono::Utc;

// ============================================================================
// ENUM REGISTRY FIXTURE
// ============================================================================

pub mod registry {
    //! Builds an [`EnumRegistry`] with a small, fixed taxonomy so executor
    //! and mediator tests don't need a database to resolve names to ids.

    use super::*;
    use nebula_core::{EntityTypeId, LogTypeId, RelationshipTypeId};

    /// Resolved ids for the taxonomy rows [`sample_registry`] seeds, so
    /// callers can build inputs without re-deriving names from the
    /// registry each time.
    pub struct SampleIds {
        pub status_active: StatusId,
        pub status_archived: StatusId,
        pub scope_personal: ScopeRecordId,
        pub scope_work: ScopeRecordId,
        pub entity_type_person: EntityTypeId,
        pub entity_type_project: EntityTypeId,
        pub relationship_type_works_on: RelationshipTypeId,
        pub log_type_note: LogTypeId,
    }

    /// A taxonomy with two statuses, two scopes, two entity types, one
    /// relationship type, and one log type — enough to exercise every
    /// executor without a single-name registry masking name-vs-id bugs.
    pub fn sample_registry() -> (EnumRegistry, SampleIds) {
        let status_active = StatusId::now_v7();
        let status_archived = StatusId::now_v7();
        let scope_personal = ScopeRecordId::now_v7();
        let scope_work = ScopeRecordId::now_v7();
        let entity_type_person = EntityTypeId::now_v7();
        let entity_type_project = EntityTypeId::now_v7();
        let relationship_type_works_on = RelationshipTypeId::now_v7();
        let log_type_note = LogTypeId::now_v7();

        let registry = EnumRegistry {
            statuses: EnumSection::new(vec![
                ("active".to_string(), status_active),
                ("archived".to_string(), status_archived),
            ]),
            scopes: EnumSection::new(vec![
                ("personal".to_string(), scope_personal),
                ("work".to_string(), scope_work),
            ]),
            relationship_types: EnumSection::new(vec![(
                "works_on".to_string(),
                relationship_type_works_on,
            )]),
            entity_types: EnumSection::new(vec![
                ("person".to_string(), entity_type_person),
                ("project".to_string(), entity_type_project),
            ]),
            log_types: EnumSection::new(vec![("note".to_string(), log_type_note)]),
        };

        (
            registry,
            SampleIds {
                status_active,
                status_archived,
                scope_personal,
                scope_work,
                entity_type_person,
                entity_type_project,
                relationship_type_works_on,
                log_type_note,
            },
        )
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Nebula record ids and enums.

    use super::*;
    use nebula_core::{
        EntityId, EntityTypeId, FileId, KnowledgeItemId, LogId, LogTypeId, ProtocolId,
        RelationshipId, RelationshipTypeId,
    };
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID (for generic id generation).
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    /// Generate a valid UUIDv7 (timestamp-sortable, matches `now_v7`).
    pub fn arb_uuid_v7() -> impl Strategy<Value = Uuid> {
        Just(()).prop_map(|_| Uuid::now_v7())
    }

    macro_rules! arb_id_fn {
        ($fn_name:ident, $id_ty:ty) => {
            pub fn $fn_name() -> impl Strategy<Value = $id_ty> {
                arb_uuid().prop_map(<$id_ty as EntityIdType>::new)
            }
        };
    }

    arb_id_fn!(arb_entity_id, EntityId);
    arb_id_fn!(arb_knowledge_item_id, KnowledgeItemId);
    arb_id_fn!(arb_relationship_id, RelationshipId);
    arb_id_fn!(arb_log_id, LogId);
    arb_id_fn!(arb_file_id, FileId);
    arb_id_fn!(arb_protocol_id, ProtocolId);
    arb_id_fn!(arb_entity_type_id, EntityTypeId);
    arb_id_fn!(arb_relationship_type_id, RelationshipTypeId);
    arb_id_fn!(arb_log_type_id, LogTypeId);
    arb_id_fn!(arb_status_id, StatusId);
    arb_id_fn!(arb_scope_record_id, ScopeRecordId);
    arb_id_fn!(arb_agent_id, NebulaAgentId);
    arb_id_fn!(arb_user_id, UserId);

    /// Generate a timestamp within a reasonable range (2020-2030).
    pub fn arb_timestamp() -> impl Strategy<Value = nebula_core::Timestamp> {
        (1577836800i64..1893456000i64)
            .prop_map(|secs| chrono::DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now))
    }

    /// Generate a non-empty, deduplication-friendly tag (lowercase,
    /// `[a-z0-9-]`, 1-20 chars), matching the shape `sanitize_tags`
    /// accepts after stripping.
    pub fn arb_tag() -> impl Strategy<Value = String> {
        "[a-z][a-z0-9-]{0,19}".prop_map(|s| s)
    }

    pub fn arb_tags(max: usize) -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec(arb_tag(), 0..max)
    }

    /// Generate a `JobPriority` variant.
    pub fn arb_job_priority() -> impl Strategy<Value = JobPriority> {
        prop_oneof![
            Just(JobPriority::Low),
            Just(JobPriority::Medium),
            Just(JobPriority::High),
            Just(JobPriority::Critical),
        ]
    }

    /// Generate an `ApprovalStatus` variant.
    pub fn arb_approval_status() -> impl Strategy<Value = ApprovalStatus> {
        prop_oneof![
            Just(ApprovalStatus::Pending),
            Just(ApprovalStatus::Approved),
            Just(ApprovalStatus::ApprovedFailed),
            Just(ApprovalStatus::Rejected),
        ]
    }

    /// Generate an `EnrollmentStatus` variant.
    pub fn arb_enrollment_status() -> impl Strategy<Value = EnrollmentStatus> {
        prop_oneof![
            Just(EnrollmentStatus::PendingApproval),
            Just(EnrollmentStatus::Approved),
            Just(EnrollmentStatus::Rejected),
            Just(EnrollmentStatus::Expired),
            Just(EnrollmentStatus::Redeemed),
        ]
    }

    /// Generate a `NodeRef::Entity` or `NodeRef::Agent` — the two kinds
    /// relationships most commonly connect in the catalog's fixture data.
    pub fn arb_node_ref() -> impl Strategy<Value = NodeRef> {
        prop_oneof![
            arb_entity_id().prop_map(NodeRef::Entity),
            arb_agent_id().prop_map(NodeRef::Agent),
            arb_knowledge_item_id().prop_map(NodeRef::Knowledge),
            arb_log_id().prop_map(NodeRef::Log),
            arb_file_id().prop_map(NodeRef::File),
            arb_protocol_id().prop_map(NodeRef::Protocol),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built records and input shapes for common testing scenarios.
    //!
    //! Every builder takes the ids the caller already resolved from
    //! [`registry::sample_registry`] rather than re-deriving them, so one
    //! registry fixture backs an entire test module's worth of records.

    use super::*;
    use nebula_core::{
        BulkOp, BulkUpdateEntityScopesInput, BulkUpdateEntityTagsInput, CreateEntityInput,
        CreateJobInput, CreateKnowledgeInput, CreateLogInput, CreateProtocolInput,
        CreateRelationshipInput, EntityTypeId,
    };

    /// A `CreateEntityInput` for a "person" named `name`, scoped to
    /// `scope_name`, with no metadata or tags.
    pub fn create_entity_input(name: &str, scope_name: &str) -> CreateEntityInput {
        CreateEntityInput {
            name: name.to_string(),
            type_name: "person".to_string(),
            status: "active".to_string(),
            scopes: vec![scope_name.to_string()],
            tags: vec![],
            metadata: None,
            vault_file_path: None,
        }
    }

    /// A fully-formed `Entity` record for assertion helpers and executors
    /// that need a persisted-looking value without a round trip through the
    /// store.
    pub fn sample_entity(type_id: EntityTypeId, status_id: StatusId, scope_ids: Vec<ScopeRecordId>) -> Entity {
        Entity {
            id: nebula_core::EntityId::now_v7(),
            name: "Ada Lovelace".to_string(),
            type_id,
            status_id,
            scope_ids,
            tags: vec!["mathematician".to_string()],
            metadata: serde_json::json!({}),
            vault_path: None,
        }
    }

    /// A `CreateKnowledgeInput` for a bookmark-style knowledge item.
    pub fn create_knowledge_input(title: &str, scope_name: &str) -> CreateKnowledgeInput {
        CreateKnowledgeInput {
            title: title.to_string(),
            url: Some("https://example.com/article".to_string()),
            source_type: "article".to_string(),
            content: None,
            scopes: vec![scope_name.to_string()],
            tags: vec![],
            metadata: None,
        }
    }

    /// A `CreateRelationshipInput` linking two nodes with `type_name`.
    pub fn create_relationship_input(
        source: NodeRef,
        target: NodeRef,
        type_name: &str,
    ) -> CreateRelationshipInput {
        CreateRelationshipInput {
            source,
            target,
            relationship_type: type_name.to_string(),
            properties: None,
        }
    }

    /// A minimal `CreateJobInput` with default (medium) priority.
    pub fn create_job_input(title: &str) -> CreateJobInput {
        CreateJobInput {
            title: title.to_string(),
            description: None,
            job_type: None,
            assigned_to: None,
            agent_id: None,
            priority: None,
            parent_job_id: None,
            due_at: None,
            metadata: None,
        }
    }

    /// A `CreateLogInput` recording a single numeric value under `log_type`.
    pub fn create_log_input(log_type: &str, value: serde_json::Value) -> CreateLogInput {
        CreateLogInput {
            log_type: log_type.to_string(),
            timestamp: None,
            value,
            tags: vec![],
            metadata: None,
        }
    }

    /// A `CreateProtocolInput` for a named procedure document.
    pub fn create_protocol_input(name: &str, scope_name: &str) -> CreateProtocolInput {
        CreateProtocolInput {
            name: name.to_string(),
            description: None,
            scopes: vec![scope_name.to_string()],
            metadata: None,
        }
    }

    /// A `BulkUpdateEntityTagsInput` adding `tags` to every id in `entity_ids`.
    pub fn bulk_add_tags(
        entity_ids: Vec<nebula_core::EntityId>,
        tags: Vec<String>,
    ) -> BulkUpdateEntityTagsInput {
        BulkUpdateEntityTagsInput {
            entity_ids,
            tags,
            op: BulkOp::Add,
        }
    }

    /// A `BulkUpdateEntityScopesInput` replacing every id's scopes with
    /// `scopes`.
    pub fn bulk_set_scopes(
        entity_ids: Vec<nebula_core::EntityId>,
        scopes: Vec<String>,
    ) -> BulkUpdateEntityScopesInput {
        BulkUpdateEntityScopesInput {
            entity_ids,
            scopes,
            op: BulkOp::Replace,
        }
    }

    /// An `AuditIdentity::Agent` for a trusted agent with no human side.
    pub fn agent_identity() -> AuditIdentity {
        AuditIdentity::Agent(NebulaAgentId::now_v7())
    }

    /// An `AuditIdentity::User` for a reviewer action.
    pub fn user_identity() -> AuditIdentity {
        AuditIdentity::User(UserId::now_v7())
    }

    /// A person metadata blob with a valid (leap-year-aware) birth date,
    /// used to exercise `validate_entity_metadata` without hand-writing the
    /// JSON at every call site.
    pub fn valid_person_metadata() -> serde_json::Value {
        serde_json::json!({
            "first_name": "Ada",
            "last_name": "Lovelace",
            "birth_year": 1815,
            "birth_month": 12,
            "birth_day": 10,
        })
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Nebula's layered error enum, matching each
    //! `NebulaError` variant the way the workspace's `#[from]` conversions
    //! nest the underlying component error.

    use super::*;

    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        assert!(result.is_ok(), "expected Ok, got Err: {:?}", result);
    }

    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        assert!(result.is_err(), "expected Err, got Ok: {:?}", result);
    }

    #[track_caller]
    pub fn assert_taxonomy_unknown<T: std::fmt::Debug>(result: &NebulaResult<T>, expected_label: &str) {
        match result {
            Err(NebulaError::Taxonomy(TaxonomyError::Unknown { label, .. })) => {
                assert_eq!(*label, expected_label, "wrong taxonomy label in Unknown error");
            }
            other => panic!("expected Taxonomy::Unknown({expected_label}), got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_taxonomy_required<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Taxonomy(TaxonomyError::Required { .. })) => {}
            other => panic!("expected Taxonomy::Required, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_executor_conflict<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Executor(ExecutorError::Conflict { .. })) => {}
            other => panic!("expected Executor::Conflict, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_executor_invalid<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Executor(ExecutorError::Invalid { .. })) => {}
            other => panic!("expected Executor::Invalid, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_executor_not_found<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Executor(ExecutorError::NotFound { .. })) => {}
            other => panic!("expected Executor::NotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_store_not_found<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Store(StoreError::NotFound { .. }))
            | Err(NebulaError::Store(StoreError::NotFoundByKey { .. })) => {}
            other => panic!("expected Store::NotFound, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_scope_forbidden<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Scope(nebula_core::ScopeError::Forbidden)) => {}
            other => panic!("expected Scope::Forbidden, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_auth_error<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Auth(_)) => {}
            other => panic!("expected Auth error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_approval_error<T: std::fmt::Debug>(result: &NebulaResult<T>) {
        match result {
            Err(NebulaError::Approval(_)) => {}
            other => panic!("expected Approval error, got: {:?}", other),
        }
    }

    /// Assert a job record carries the expected priority.
    #[track_caller]
    pub fn assert_job_priority(job: &Job, expected: JobPriority) {
        assert_eq!(job.priority, expected, "job priority mismatch");
    }

    /// Assert an entity's scope set is exactly `expected` (order-independent).
    #[track_caller]
    pub fn assert_entity_scopes(entity: &Entity, expected: &[ScopeRecordId]) {
        let mut got = entity.scope_ids.clone();
        let mut want = expected.to_vec();
        got.sort_by_key(|id| id.as_uuid());
        want.sort_by_key(|id| id.as_uuid());
        assert_eq!(got, want, "entity scope set mismatch");
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn sample_registry_resolves_every_seeded_name() {
        let (registry, ids) = registry::sample_registry();
        assert_eq!(registry.require_status("active").unwrap(), ids.status_active);
        assert_eq!(
            registry.require_entity_type("person").unwrap(),
            ids.entity_type_person
        );
        assert_eq!(
            registry.require_relationship_type("works_on").unwrap(),
            ids.relationship_type_works_on
        );
        assert_eq!(registry.require_log_type("note").unwrap(), ids.log_type_note);
        assert_eq!(
            registry.require_scopes(&["personal".to_string()]).unwrap(),
            vec![ids.scope_personal]
        );
    }

    #[test]
    fn sample_registry_rejects_unknown_status() {
        let (registry, _ids) = registry::sample_registry();
        let result = registry.require_status("nonexistent");
        assert!(matches!(result, Err(TaxonomyError::Unknown { .. })));
    }

    #[test]
    fn create_entity_input_fixture_round_trips_through_registry() {
        let (registry, ids) = registry::sample_registry();
        let input = fixtures::create_entity_input("Ada Lovelace", "personal");
        assert_eq!(registry.require_entity_type(&input.type_name).unwrap(), ids.entity_type_person);
        assert_eq!(registry.require_status(&input.status).unwrap(), ids.status_active);
        assert_eq!(registry.require_scopes(&input.scopes).unwrap(), vec![ids.scope_personal]);
    }

    #[test]
    fn sample_entity_fixture_carries_requested_scopes() {
        let (_, ids) = registry::sample_registry();
        let entity = fixtures::sample_entity(
            ids.entity_type_person,
            ids.status_active,
            vec![ids.scope_personal, ids.scope_work],
        );
        assertions::assert_entity_scopes(&entity, &[ids.scope_work, ids.scope_personal]);
    }

    #[test]
    fn bulk_add_tags_fixture_carries_add_op() {
        let input = fixtures::bulk_add_tags(vec![nebula_core::EntityId::now_v7()], vec!["x".to_string()]);
        assert!(matches!(input.op, nebula_core::BulkOp::Add));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        #[test]
        fn prop_generated_entity_id_round_trips(id in generators::arb_entity_id()) {
            let uuid = id.as_uuid();
            assert_eq!(nebula_core::EntityId::new(uuid), id);
        }

        #[test]
        fn prop_generated_tags_are_lowercase_ascii(tags in generators::arb_tags(10)) {
            for tag in &tags {
                assert!(tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            }
        }

        #[test]
        fn prop_generated_job_priority_variants(priority in generators::arb_job_priority()) {
            match priority {
                JobPriority::Low | JobPriority::Medium | JobPriority::High | JobPriority::Critical => {}
            }
        }

        #[test]
        fn prop_generated_node_ref_type_name_is_stable(node in generators::arb_node_ref()) {
            let name = node.type_name();
            assert!(!name.is_empty());
        }
    }
}
