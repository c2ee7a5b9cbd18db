//! Integration tests for the Keycloak adapters using wiremock.
//!
//! These tests run the admin API transport and the relation adapters against
//! a mock server, covering token acquisition, pagination, idempotent
//! attach/detach, error classification and retries.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kcsync::conflict::ConflictResolver;
use kcsync::error::{KcSyncError, ReconcileError, RemoteError};
use kcsync::keycloak::{set_client_for, ClientSettings, Credentials, KeycloakClient, TokenExchangeClientsClient};
use kcsync::{MemberId, MemberSet, ParentRef, Reconciler, RelationKind, RemovalPolicy, RemoteSetClient, Scope, TrackingId};

// =============================================================================
// Test Helpers
// =============================================================================

const TOKEN_PATH: &str = "/realms/master/protocol/openid-connect/token";

async fn setup_mock_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "expires_in": 300
        })))
        .mount(&server)
        .await;
    server
}

fn create_client(base_url: &str) -> Arc<KeycloakClient> {
    let settings = ClientSettings {
        url: base_url.to_string(),
        base_path: String::new(),
        auth_realm: String::from("master"),
        credentials: Credentials::ClientCredentials {
            client_id: String::from("kcsync"),
            client_secret: String::from("s3cr3t"),
        },
        timeout_secs: 5,
    };
    Arc::new(
        KeycloakClient::new(settings)
            .unwrap()
            .with_retry_delay(Duration::from_millis(1)),
    )
}

fn parent(parent_id: &str) -> ParentRef {
    ParentRef::new(Scope::new("acme"), parent_id)
}

fn members(names: &[&str]) -> MemberSet {
    names.iter().map(|n| MemberId::new(*n)).collect()
}

fn users_page(range: std::ops::Range<usize>) -> serde_json::Value {
    range
        .map(|i| json!({ "id": format!("u{i}"), "username": format!("user{i:03}") }))
        .collect()
}

// =============================================================================
// Transport Tests
// =============================================================================

#[tokio::test]
async fn test_token_is_requested_once_and_sent_as_bearer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc",
            "expires_in": 300
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/default-groups"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "g1", "name": "staff" }])))
        .expect(2)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::DefaultGroups, create_client(&server.uri()));
    let first = adapter.fetch(&parent("acme")).await.unwrap();
    let second = adapter.fetch(&parent("acme")).await.unwrap();

    assert_eq!(first, members(&["g1"]));
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_token_rejection_is_authentication_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid_client"))
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::DefaultGroups, create_client(&server.uri()));
    let err = adapter.fetch(&parent("acme")).await.unwrap_err();

    assert!(matches!(
        err,
        KcSyncError::Remote(RemoteError::AuthenticationFailed { .. })
    ));
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/default-groups"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/default-groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::DefaultGroups, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("acme")).await.unwrap();

    assert!(actual.is_empty());
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/default-groups"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::DefaultGroups, create_client(&server.uri()));
    let err = adapter.fetch(&parent("acme")).await.unwrap_err();

    match err {
        KcSyncError::Remote(RemoteError::ApiRequestFailed { status, .. }) => assert_eq!(status, 500),
        other => panic!("Expected ApiRequestFailed, got {other:?}"),
    }
}

// =============================================================================
// Group Adapter Tests
// =============================================================================

#[tokio::test]
async fn test_group_members_are_read_across_pages() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/groups/g1/members"))
        .and(query_param("first", "0"))
        .and(query_param("max", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(0..50)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/groups/g1/members"))
        .and(query_param("first", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(users_page(50..53)))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::GroupMemberships, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("g1")).await.unwrap();

    assert_eq!(actual.len(), 53);
    assert!(actual.contains(&MemberId::new("user000")));
    assert!(actual.contains(&MemberId::new("user052")));
}

#[tokio::test]
async fn test_add_tolerates_existing_membership() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/users"))
        .and(query_param("username", "alice"))
        .and(query_param("exact", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "u1", "username": "alice" }])))
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/admin/realms/acme/users/u1/groups/g1"))
        .respond_with(ResponseTemplate::new(409).set_body_string("already a member"))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::GroupMemberships, create_client(&server.uri()));
    let result = adapter.add(&parent("g1"), &MemberId::new("alice")).await;

    assert!(result.is_ok(), "409 on attach should succeed: {:?}", result.err());
}

#[tokio::test]
async fn test_add_unknown_user_is_not_found() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::GroupMemberships, create_client(&server.uri()));
    let err = adapter.add(&parent("g1"), &MemberId::new("ghost")).await.unwrap_err();

    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_remove_tolerates_missing_membership() {
    let server = setup_mock_server().await;

    Mock::given(method("DELETE"))
        .and(path("/admin/realms/acme/users/u1/groups/g9"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::UserGroups, create_client(&server.uri()));
    let result = adapter.remove(&parent("u1"), &MemberId::new("g9")).await;

    assert!(result.is_ok());
}

// =============================================================================
// Role Adapter Tests
// =============================================================================

#[tokio::test]
async fn test_service_account_roles_resolve_user_and_skip_client_roles() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/clients/c1/service-account-user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sa1",
            "username": "service-account-reporting"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/users/sa1/role-mappings/realm"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "r1", "name": "offline_access", "clientRole": false, "containerId": "acme" },
            { "id": "r2", "name": "view-users", "clientRole": true, "containerId": "rm1" }
        ])))
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::ServiceAccountRoles, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("c1")).await.unwrap();

    assert_eq!(actual, members(&["offline_access"]));
}

#[tokio::test]
async fn test_group_role_is_posted_as_representation() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/roles/auditor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r7",
            "name": "auditor",
            "clientRole": false,
            "containerId": "acme"
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/admin/realms/acme/groups/g1/role-mappings/realm"))
        .and(body_partial_json(json!([{ "id": "r7", "name": "auditor" }])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::GroupRoles, create_client(&server.uri()));
    let result = adapter.add(&parent("g1"), &MemberId::new("auditor")).await;

    assert!(result.is_ok(), "Role mapping should succeed: {:?}", result.err());
}

// =============================================================================
// Reconciler Tests
// =============================================================================

#[tokio::test]
async fn test_reconcile_user_groups_end_to_end() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/users/u1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "g1", "name": "old" }])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/users/u1/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "g2", "name": "new" }])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/admin/realms/acme/users/u1/groups/g1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/admin/realms/acme/users/u1/groups/g2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let tracking_id = TrackingId::new(Scope::new("acme"), RelationKind::UserGroups, "u1").unwrap();
    let reconciler = Reconciler::new(set_client_for(RelationKind::UserGroups, create_client(&server.uri())));

    let result = reconciler
        .reconcile(&tracking_id, &members(&["g2"]), &RemovalPolicy::Exhaustive)
        .await
        .unwrap();

    assert_eq!(result.removed, 1);
    assert_eq!(result.added, 1);
    assert_eq!(result.final_actual, members(&["g2"]));
    assert!(result.residual.is_empty());
}

#[tokio::test]
async fn test_missing_parent_is_parent_gone() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/groups/deleted/members"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "error": "Could not find group by id" })))
        .mount(&server)
        .await;

    let tracking_id =
        TrackingId::new(Scope::new("acme"), RelationKind::GroupMemberships, "deleted").unwrap();
    let reconciler =
        Reconciler::new(set_client_for(RelationKind::GroupMemberships, create_client(&server.uri())));

    let err = reconciler
        .reconcile(&tracking_id, &members(&["alice"]), &RemovalPolicy::Exhaustive)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        KcSyncError::Reconcile(ReconcileError::ParentGone { .. })
    ));
}

// =============================================================================
// Token Exchange Tests
// =============================================================================

const AUTHZ: &str = "/admin/realms/acme/clients/rm1/authz/resource-server";

fn fixed_suffix() -> String {
    String::from("deadbeef")
}

async fn mount_exchange_permission(server: &MockServer, associated: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/identity-provider/instances/google/management/permissions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "enabled": true,
            "resource": "res1",
            "scopePermissions": { "token-exchange": "perm1" }
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/clients"))
        .and(query_param("clientId", "realm-management"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "rm1", "clientId": "realm-management" }
        ])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{AUTHZ}/permission/perm1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "perm1",
            "name": "token-exchange.permission.idp.res1",
            "type": "scope",
            "decisionStrategy": "UNANIMOUS"
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{AUTHZ}/policy/perm1/associatedPolicies")))
        .respond_with(ResponseTemplate::new(200).set_body_json(associated))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{AUTHZ}/permission/perm1/resources")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "_id": "res1", "name": "idp.resource" }])))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{AUTHZ}/permission/perm1/scopes")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "sc1", "name": "token-exchange" }])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_token_exchange_without_policy_is_empty() {
    let server = setup_mock_server().await;
    mount_exchange_permission(&server, json!([])).await;

    let adapter = set_client_for(RelationKind::TokenExchangeClients, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("google")).await.unwrap();

    assert!(actual.is_empty());
}

#[tokio::test]
async fn test_token_exchange_policy_name_conflict_is_retried_with_suffix() {
    let server = setup_mock_server().await;
    mount_exchange_permission(&server, json!([])).await;

    Mock::given(method("POST"))
        .and(path(format!("{AUTHZ}/policy/client")))
        .and(body_partial_json(json!({ "name": "google_idp_client_policy" })))
        .respond_with(ResponseTemplate::new(409).set_body_string("Policy with same name exists"))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{AUTHZ}/policy/client")))
        .and(body_partial_json(json!({
            "name": "google_deadbeef_idp_client_policy",
            "clients": ["client-a"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "pol1",
            "name": "google_deadbeef_idp_client_policy",
            "decisionStrategy": "UNANIMOUS",
            "logic": "POSITIVE",
            "type": "client",
            "clients": ["client-a"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path(format!("{AUTHZ}/permission/scope/perm1")))
        .and(body_partial_json(json!({
            "policies": ["pol1"],
            "resources": ["res1"],
            "scopes": ["sc1"]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = TokenExchangeClientsClient::with_resolver(
        create_client(&server.uri()),
        ConflictResolver::with_suffix_source(fixed_suffix),
    );
    let result = adapter.add(&parent("google"), &MemberId::new("client-a")).await;

    assert!(result.is_ok(), "Grant should succeed: {:?}", result.err());
}

async fn mount_client_policy(server: &MockServer, clients: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("{AUTHZ}/policy/client/pol1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pol1",
            "name": "google_idp_client_policy",
            "decisionStrategy": "UNANIMOUS",
            "logic": "POSITIVE",
            "type": "client",
            "clients": clients
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_token_exchange_grant_extends_existing_policy() {
    let server = setup_mock_server().await;
    mount_exchange_permission(&server, json!([{ "id": "pol1" }])).await;
    mount_client_policy(&server, json!(["client-a"])).await;

    Mock::given(method("PUT"))
        .and(path(format!("{AUTHZ}/policy/client/pol1")))
        .and(body_partial_json(json!({
            "name": "google_idp_client_policy",
            "clients": ["client-a", "client-b"]
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(format!("{AUTHZ}/policy/client")))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::TokenExchangeClients, create_client(&server.uri()));
    assert_eq!(
        adapter.fetch(&parent("google")).await.unwrap(),
        members(&["client-a"])
    );
    let result = adapter.add(&parent("google"), &MemberId::new("client-b")).await;

    assert!(result.is_ok(), "Grant should succeed: {:?}", result.err());
}

#[tokio::test]
async fn test_token_exchange_revoke_keeps_policy_while_clients_remain() {
    let server = setup_mock_server().await;
    mount_exchange_permission(&server, json!([{ "id": "pol1" }])).await;
    mount_client_policy(&server, json!(["client-a", "client-b"])).await;

    Mock::given(method("PUT"))
        .and(path(format!("{AUTHZ}/policy/client/pol1")))
        .and(body_partial_json(json!({ "clients": ["client-b"] })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{AUTHZ}/policy/client/pol1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::TokenExchangeClients, create_client(&server.uri()));
    let result = adapter.remove(&parent("google"), &MemberId::new("client-a")).await;

    assert!(result.is_ok(), "Revoke should succeed: {:?}", result.err());
}

#[tokio::test]
async fn test_token_exchange_revoking_last_client_detaches_then_deletes_policy() {
    let server = setup_mock_server().await;
    mount_exchange_permission(&server, json!([{ "id": "pol1" }])).await;
    mount_client_policy(&server, json!(["client-a"])).await;

    Mock::given(method("PUT"))
        .and(path(format!("{AUTHZ}/permission/scope/perm1")))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path(format!("{AUTHZ}/policy/client/pol1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::TokenExchangeClients, create_client(&server.uri()));
    let result = adapter.remove(&parent("google"), &MemberId::new("client-a")).await;
    assert!(result.is_ok(), "Revoke should succeed: {:?}", result.err());

    let requests = server.received_requests().await.unwrap();
    let writes: Vec<_> = requests
        .iter()
        .filter(|r| r.method.as_str() == "PUT" || r.method.as_str() == "DELETE")
        .collect();
    assert_eq!(writes.len(), 2);
    assert_eq!(writes[0].method.as_str(), "PUT");
    assert_eq!(writes[1].method.as_str(), "DELETE");

    let permission: serde_json::Value = serde_json::from_slice(&writes[0].body).unwrap();
    assert_eq!(permission["policies"], json!([]));
    assert_eq!(permission["resources"], json!(["res1"]));
}

// =============================================================================
// Client Scope Tests
// =============================================================================

async fn mount_realm_scopes(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/client-scopes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "sc-1", "name": "profile", "protocol": "openid-connect" },
            { "id": "sc-2", "name": "offline_access", "protocol": "openid-connect" }
        ])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_default_scopes_are_reported_by_name() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/clients/c1/default-client-scopes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "sc-1", "name": "profile" },
            { "id": "sc-3", "name": "email" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::DefaultScopes, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("c1")).await.unwrap();

    assert_eq!(actual, members(&["email", "profile"]));
}

#[tokio::test]
async fn test_optional_scope_is_attached_by_resolved_id() {
    let server = setup_mock_server().await;
    mount_realm_scopes(&server).await;

    Mock::given(method("PUT"))
        .and(path("/admin/realms/acme/clients/c1/optional-client-scopes/sc-2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/admin/realms/acme/clients/c1/default-client-scopes/sc-2"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::OptionalScopes, create_client(&server.uri()));
    let result = adapter.add(&parent("c1"), &MemberId::new("offline_access")).await;

    assert!(result.is_ok(), "Attach should succeed: {:?}", result.err());
}

#[tokio::test]
async fn test_unknown_scope_cannot_be_attached() {
    let server = setup_mock_server().await;
    mount_realm_scopes(&server).await;

    let adapter = set_client_for(RelationKind::DefaultScopes, create_client(&server.uri()));
    let err = adapter
        .add(&parent("c1"), &MemberId::new("no-such-scope"))
        .await
        .unwrap_err();

    assert!(err.is_not_found());
}

// =============================================================================
// Role Set Tests
// =============================================================================

#[tokio::test]
async fn test_role_composites_are_keyed_by_id() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/roles-by-id/r-1/composites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "r-3", "name": "viewer", "clientRole": false },
            { "id": "r-4", "name": "manage-users", "clientRole": true, "containerId": "rm1" }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/roles-by-id/r-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-2", "name": "editor", "clientRole": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/admin/realms/acme/roles-by-id/r-1/composites"))
        .and(body_partial_json(json!([{ "id": "r-2", "name": "editor" }])))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::RoleComposites, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("r-1")).await.unwrap();
    assert_eq!(actual, members(&["r-3", "r-4"]));

    let result = adapter.add(&parent("r-1"), &MemberId::new("r-2")).await;
    assert!(result.is_ok(), "Attach should succeed: {:?}", result.err());
}

#[tokio::test]
async fn test_default_roles_are_realm_role_names() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/roles-by-id/dr-1/composites"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "r-3", "name": "offline_access", "clientRole": false },
            { "id": "r-4", "name": "view-profile", "clientRole": true, "containerId": "account" }
        ])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/realms/acme/roles/uma_authorization"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "r-5", "name": "uma_authorization", "clientRole": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/admin/realms/acme/roles-by-id/dr-1/composites"))
        .and(body_partial_json(json!([{ "id": "r-5" }])))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = set_client_for(RelationKind::DefaultRoles, create_client(&server.uri()));
    let actual = adapter.fetch(&parent("dr-1")).await.unwrap();
    assert_eq!(actual, members(&["offline_access"]));

    let result = adapter.remove(&parent("dr-1"), &MemberId::new("uma_authorization")).await;
    assert!(result.is_ok(), "Already-detached role should be tolerated: {:?}", result.err());
}
