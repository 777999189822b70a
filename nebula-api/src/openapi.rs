//! OpenAPI Specification for the Nebula API
//!
//! Registers the wire-level record and input schemas so `/openapi.json`
//! (served via `utoipa-swagger-ui` when the `swagger-ui` feature is on)
//! reflects the control-plane's data model. Route handlers dispatch by
//! action name rather than one `#[utoipa::path]` per function, so this
//! document carries schemas only — no generated `paths` section.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use nebula_core::{
    Agent, ApiKey as NebulaApiKey, ApprovalRequest, ApprovalStatus, AuditEntry, AuditIdentity,
    ContextSegment, Entity, EnrollmentSession, EnrollmentStatus, Job, JobPriority, KnowledgeItem,
    Log, NebulaFile, NodeRef, Protocol, RegisterAgentGrants, Relationship, Scope,
};

use crate::error::{ApiError, ErrorCode};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nebula API",
        version = "0.1.0",
        description = "Agent-context control plane: scoped entities, knowledge, relationships, jobs, logs, files and protocols, mediated through an approval gate for untrusted agents.",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Entities", description = "Typed records under scope-mediated access control"),
        (name = "Knowledge", description = "Scoped knowledge items"),
        (name = "Relationships", description = "Typed edges between nodes"),
        (name = "Jobs", description = "Work items with ownership and status"),
        (name = "Logs", description = "Timestamped structured events"),
        (name = "Files", description = "File metadata with scope-gated visibility"),
        (name = "Protocols", description = "Scoped operating procedures"),
        (name = "Approvals", description = "Review surface for deferred agent proposals"),
        (name = "Enrollment", description = "Unauthenticated agent self-registration"),
        (name = "Audit", description = "Read-only audit trail queries"),
        (name = "Keys", description = "API key minting and revocation")
    ),
    components(
        schemas(
            ApiError, ErrorCode,
            Agent, ContextSegment,
            Entity, KnowledgeItem,
            Relationship, NodeRef,
            JobPriority, Job,
            Log, NebulaFile, Protocol,
            ApprovalStatus, ApprovalRequest,
            EnrollmentStatus, EnrollmentSession,
            Scope, NebulaApiKey,
            AuditEntry, AuditIdentity,
            RegisterAgentGrants,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some("Nebula API key (`nbl_...`), sent as `Authorization: Bearer <key>`"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("Authorization"))),
            );
        }
    }
}

impl ApiDoc {
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utoipa::OpenApi as _;

    #[test]
    fn generates_without_panicking() {
        let openapi = ApiDoc::openapi();
        assert_eq!(openapi.info.title, "Nebula API");
        let components = openapi.components.expect("components present");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("Entity"));
        assert!(components.schemas.contains_key("Job"));
    }

    #[test]
    fn json_serializes() {
        let json = ApiDoc::to_json().expect("serializes");
        assert!(json.contains("Nebula API"));
    }
}
