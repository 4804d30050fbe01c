mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{len, names, TestServer};

fn guid(doc: &Value) -> String {
    doc["guid"].as_str().unwrap_or_default().to_string()
}

#[tokio::test]
async fn cluster_lifecycle() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    let (status, created) = client.post("/cluster", json!({"name": "prod", "attributes": {"env": "eu"}})).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.is_object());
    assert!(created["subscription_date"].is_string());
    assert_eq!(created["attributes"]["alias"], "PROD");
    let id = guid(&created);

    let (status, body) = client.post("/cluster", json!({"name": "prod"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name prod already exists");

    let (status, body) = client.post("/cluster", json!({"description": "no name"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing name");

    let (status, body) = client.get("/cluster?name=prod").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guid(&body), id);

    let (status, _) = client.get("/cluster?name=nope").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = client.get("/cluster?list").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!(["prod"]));

    // name is read-only on clusters
    let (status, body) = client
        .put(&format!("/cluster/{}", id), json!({"name": "renamed", "description": "updated"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body), 2);
    assert!(body[0].get("description").is_none());
    assert_eq!(body[1]["description"], "updated");
    assert_eq!(body[1]["name"], "prod");
    assert_eq!(body[1]["attributes"]["alias"], "PROD");

    let (status, body) = client.put("/cluster", json!({"description": "no guid"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing guid");

    let (status, _) = client.put("/cluster/unknown", json!({"description": "x"})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, deleted) = client.delete(&format!("/cluster/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guid(&deleted), id);

    let (status, _) = client.get(&format!("/cluster/{}", id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn bulk_insert_and_bulk_delete() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    let (status, created) = client
        .post("/v1_repository", json!([
            {"name": "a", "repoName": "alpha"},
            {"name": "b", "repoName": "beta"},
            {"name": "c", "repoName": "gamma"},
        ]))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(len(&created), 3);

    let (status, body) = client.post("/v1_repository", json!([{"name": "d"}, {"name": "d"}])).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "duplicate name d");

    let ids: Vec<String> = created.as_array().into_iter().flatten().map(guid).collect();
    let (status, body) = client
        .delete(&format!("/v1_repository/bulk?guid={}&guid={}", ids[0], ids[1]))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deletedCount": 2}));

    let (status, body) = client.delete_with("/v1_repository/bulk", json!([ids[2]])).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deletedCount": 1}));

    let (status, body) = client.delete("/v1_repository/bulk").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing guids in query or body");

    let (_, body) = client.get("/v1_repository").await?;
    assert_eq!(body, json!([]));
    Ok(())
}

#[tokio::test]
async fn policies_are_addressed_by_name() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");
    let path = "/v1_posture_exception_policy";

    client
        .post(path, json!([
            {"name": "p1", "attributes": {"team": "blue"}, "posturePolicies": [{"controlID": "C-0001"}]},
            {"name": "p2", "attributes": {"team": "red"}},
            {"name": "p3", "attributes": {"team": "blue"}},
        ]))
        .await?;

    let (status, body) = client.get(&format!("{}?policyName=p2", path)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "p2");

    let (status, body) = client.get(&format!("{}?team=blue", path)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["p1", "p3"]);

    let (status, body) = client.delete(&format!("{}?policyName=p1", path)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "p1");

    let (status, _) = client.delete(&format!("{}?policyName=p1", path)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = client
        .delete_with(path, json!([{"policyName": "p2"}, {"policyName": "p3"}]))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deletedCount": 2}));

    let (status, body) = client.delete(path).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing name");
    Ok(())
}

#[tokio::test]
async fn frameworks_use_their_own_name_parameter() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    client.post("/v1_opa_framework", json!({"name": "NSA", "controls": []})).await?;
    let (status, body) = client.get("/v1_opa_framework?frameworkName=NSA").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "NSA");

    let (status, body) = client.delete("/v1_opa_framework?frameworkName=NSA").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "NSA");
    Ok(())
}

#[tokio::test]
async fn collection_specific_validation() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    let (status, body) = client.post("/workflows", json!({"conditions": []})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing name");

    // workflow names need not be unique
    for _ in 0..2 {
        let (status, _) = client.post("/workflows", json!({"name": "notify"})).await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = client.post("/attackChainsState", json!({"name": "chain"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Attack Chain must contain AttackChainID");

    let (status, _) = client
        .post("/attackChainsState", json!({"name": "chain", "attackChainID": "ac-1"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn cached_documents_expire_within_bounds() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    let (status, created) = client
        .post("/usersNotificationsCache", json!({"guid": "cache-1", "dataType": "unsubscribe"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["guid"], "cache-1");
    let expiry = created["expiryTime"].as_str().unwrap_or_default();
    let expiry = chrono::DateTime::parse_from_rfc3339(expiry)?;
    let days = (expiry.with_timezone(&chrono::Utc) - chrono::Utc::now()).num_days();
    assert!((89..=90).contains(&days));

    let (status, body) = client
        .put("/usersNotificationsCache/cache-1", json!({"expiryTime": "2999-01-01T00:00:00Z"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body[1]["expiryTime"], "2999-01-01T00:00:00Z");
    Ok(())
}

#[tokio::test]
async fn dismissed_incident_gets_resolve_day() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    let (status, created) = client
        .post("/runtimeIncident", json!({"guid": "inc-1", "name": "shell in container"}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["creationDayDate"].as_str().unwrap_or_default().ends_with("T00:00:00.000000000Z"));

    let (status, body) = client.put("/runtimeIncident/inc-1", json!({"isDismissed": true})).await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body[0].get("resolveDayDate").is_none());
    assert!(body[1]["resolveDayDate"].as_str().unwrap_or_default().ends_with("T00:00:00.000000000Z"));
    Ok(())
}

#[tokio::test]
async fn runtime_incident_policies_are_named() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");
    let path = "/runtimeIncidentPolicy";

    let (status, body) = client.post(path, json!({"incidentTypeIDs": ["R0001"]})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing name");

    let (status, created) = client
        .post(path, json!({"name": "malware", "incidentTypeIDs": ["R0001", "R0002"], "scope": {"riskFactors": ["internet"]}}))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(created["creationTime"].is_string());

    // names may repeat
    let (status, _) = client.post(path, json!({"name": "malware"})).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = client
        .post(&format!("{}/query", path), json!({"innerFilters": [{"incidentTypeIDs": "R0002"}]}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"]["value"], 1);

    let (status, body) = client.get(&format!("{}?policyName=malware", path)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "malware");

    let (status, body) = client.put(path, json!({"name": "malware"})).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing guid");

    let (status, _) = client.delete(&format!("{}?policyName=malware", path)).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn vulnerability_notifications_and_registries_are_searchable() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    client
        .post("/usersNotificationsVulnerabilities", json!([
            {"name": "weekly", "workloads": [{"kind": "Deployment", "name": "nginx"}], "wlids": ["wlid://a"]},
            {"name": "weekly", "workloads": [{"kind": "DaemonSet", "name": "agent"}], "wlids": ["wlid://b"]},
        ]))
        .await?;
    let (status, body) = client
        .post("/usersNotificationsVulnerabilities/query", json!({"innerFilters": [{"workloads.kind": "Deployment"}]}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"]["value"], 1);
    assert_eq!(body["response"][0]["wlids"], json!(["wlid://a"]));

    // no names listing on this collection
    let (status, body) = client.get("/usersNotificationsVulnerabilities?list").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(len(&body), 2);

    for name in ["quay", "quay"] {
        let (status, created) = client
            .post("/containerImageRegistries", json!({"name": name, "provider": "quay.io"}))
            .await?;
        assert_eq!(status, StatusCode::CREATED);
        assert!(created["updatedTime"].is_string());
    }
    let (status, body) = client.post("/containerImageRegistries/query", json!({})).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"]["value"], 2);
    Ok(())
}

#[tokio::test]
async fn cloud_credentials_need_account_fields() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");
    let account = json!({"provider": "aws", "accountID": "1234", "name": "prod", "enabled": true});

    let (status, body) = client
        .post("/cloudCredentials", json!({"provider": "aws", "name": "prod", "enabled": true}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing accountID");

    let (status, body) = client
        .post("/cloudCredentials", json!({"provider": "aws", "accountID": "1234", "name": "prod"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing enabled");

    let (status, created) = client.post("/cloudCredentials", account.clone()).await?;
    assert_eq!(status, StatusCode::CREATED);
    let id = guid(&created);

    let (status, body) = client.post("/cloudCredentials", account).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "name prod already exists");

    let (status, body) = client
        .put(&format!("/cloudCredentials/{}", id), json!({"enabled": false}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[1]["enabled"], false);
    Ok(())
}

#[tokio::test]
async fn users_are_read_by_guid_only() -> Result<()> {
    let server = TestServer::start().await?;
    let client = server.tenant("t1");

    let (status, created) = client.post("/user", json!({"name": "dana"})).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = client.post("/user", json!({"name": "dana"})).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = client.get(&format!("/user/{}", guid(&created))).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "dana");

    let (status, _) = client.get("/user").await?;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}
