mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{len, names, TestServer};

fn severity_of(policy: &Value, array: &str, key: &str, id: &str) -> Value {
    policy[array]
        .as_array()
        .into_iter()
        .flatten()
        .find(|item| item[key] == id)
        .map(|item| item["severityScore"].clone())
        .unwrap_or(Value::Null)
}

#[tokio::test]
async fn exception_severities_are_rescored_across_tenants() -> Result<()> {
    let server = TestServer::start().await?;
    for tenant in ["t1", "t2"] {
        server
            .tenant(tenant)
            .post(
                "/v1_vulnerability_exception_policy",
                json!([
                    {"name": "p1", "vulnerabilities": [{"name": "CVE-1", "severityScore": 1}, {"name": "CVE-2", "severityScore": 1}]},
                    {"name": "p2", "vulnerabilities": [{"name": "CVE-3", "severityScore": 1}]},
                ]),
            )
            .await?;
        server
            .tenant(tenant)
            .post(
                "/v1_posture_exception_policy",
                json!({"name": "c1", "posturePolicies": [{"controlID": "C-0001"}, {"controlID": "C-0002"}]}),
            )
            .await?;
    }

    let admin = server.admin();
    let (status, body) = admin
        .put(
            "/admin/updateVulnerabilityExceptionsSeverity",
            json!({"cves": ["CVE-2"], "severityScore": 9}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updatedCount": 2}));

    let (status, body) = admin
        .put(
            "/admin/updatePostureExceptionsSeverity",
            json!({"controlIDS": ["C-0002"], "severityScore": 7}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"updatedCount": 2}));

    let client = server.tenant("t2");
    let (_, p1) = client.get("/v1_vulnerability_exception_policy?policyName=p1").await?;
    assert_eq!(severity_of(&p1, "vulnerabilities", "name", "CVE-1"), json!(1));
    assert_eq!(severity_of(&p1, "vulnerabilities", "name", "CVE-2"), json!(9));
    let (_, p2) = client.get("/v1_vulnerability_exception_policy?policyName=p2").await?;
    assert_eq!(severity_of(&p2, "vulnerabilities", "name", "CVE-3"), json!(1));

    let (_, c1) = client.get("/v1_posture_exception_policy?policyName=c1").await?;
    assert_eq!(severity_of(&c1, "posturePolicies", "controlID", "C-0001"), Value::Null);
    assert_eq!(severity_of(&c1, "posturePolicies", "controlID", "C-0002"), json!(7));
    Ok(())
}

#[tokio::test]
async fn active_customers_between_dates() -> Result<()> {
    let server = TestServer::start().await?;
    for (tenant, scanned) in [
        ("t1", "2024-02-01T00:00:00Z"),
        ("t2", "2024-05-01T00:00:00Z"),
        ("t3", "2022-01-01T00:00:00Z"),
    ] {
        let client = server.tenant(tenant);
        client.post("/customer", json!({"name": format!("{} inc", tenant)})).await?;
        client
            .post("/cluster", json!({"name": "c", "lastPostureScanTriggered": scanned}))
            .await?;
    }

    let admin = server.admin();
    let (status, body) = admin
        .get("/admin/activeCustomers?fromDate=2024-01-01T00:00:00Z&toDate=2024-12-31T00:00:00Z&limit=1")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"], json!({"total": 2, "limit": 1, "nextSkip": 1}));
    assert_eq!(body["results"][0]["guid"], "t1");
    assert!(body["results"][0].get("customers").is_none());

    let (_, body) = admin
        .get("/admin/activeCustomers?fromDate=2024-01-01T00:00:00Z&toDate=2024-12-31T00:00:00Z&limit=1&skip=1")
        .await?;
    assert_eq!(body["metadata"]["nextSkip"], 0);
    assert_eq!(body["results"][0]["guid"], "t2");

    // offsets are normalised to UTC
    let (_, body) = admin
        .get("/admin/activeCustomers?fromDate=2024-04-30T21:00:00-02:00&toDate=2024-12-31T00:00:00%2B00:00")
        .await?;
    assert_eq!(body["metadata"]["total"], 1);

    let (status, body) = admin.get("/admin/activeCustomers?toDate=2024-12-31T00:00:00Z").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing fromDate query param");

    let (status, body) = admin
        .get("/admin/activeCustomers?fromDate=yesterday&toDate=2024-12-31T00:00:00Z")
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "fromDate must be in RFC3339 format");

    let (status, body) = admin
        .get("/admin/activeCustomers?fromDate=2024-01-01T00:00:00Z&toDate=2024-12-31T00:00:00Z&limit=many")
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "limit must be a number");
    Ok(())
}

#[tokio::test]
async fn customers_lookup_and_purge() -> Result<()> {
    let server = TestServer::start().await?;
    for (tenant, plan) in [("t1", "free"), ("t2", "pro"), ("t3", "pro")] {
        server
            .tenant(tenant)
            .post("/customer", json!({"name": format!("{} inc", tenant), "plan": plan}))
            .await?;
    }

    let admin = server.admin();
    let (status, body) = admin.get("/admin/customers?plan=pro").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["t2 inc", "t3 inc"]);

    let (_, body) = admin.get("/admin/customers?plan=free&projection=name").await?;
    assert_eq!(len(&body), 1);
    assert_eq!(body[0]["name"], "t1 inc");
    assert!(body[0].get("plan").is_none());

    let (status, body) = admin.get("/admin/customers").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "must provide query params");

    let (status, body) = admin.delete("/admin/customers").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "missing customers query param");

    let (status, body) = admin.delete("/admin/customers?customers=t3").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": 1}));
    let (_, body) = admin.get("/admin/customers?plan=pro").await?;
    assert_eq!(names(&body), vec!["t2 inc"]);
    Ok(())
}

#[tokio::test]
async fn cross_tenant_unique_values_and_unknown_paths() -> Result<()> {
    let server = TestServer::start().await?;
    server.tenant("t1").post("/v1_repository", json!([{"name": "a"}, {"name": "b"}])).await?;
    server.tenant("t2").post("/v1_repository", json!([{"name": "b"}, {"name": "c"}])).await?;

    let admin = server.admin();
    let (status, body) = admin
        .post("/admin/v1_repository/uniqueValues", json!({"fields": {"name": ""}}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fields"]["name"], json!(["a", "b", "c"]));
    let counts: Vec<i64> = body["fieldsCount"]["name"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|c| c["count"].as_i64())
        .collect();
    assert_eq!(counts, vec![1, 2, 1]);

    let (status, body) = admin.post("/admin/nowhere/query", json!({})).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let message = body["message"].as_str().unwrap_or_default();
    assert!(message.starts_with("unknown path /nowhere - available paths are ["));
    assert!(message.contains("/cluster"));
    Ok(())
}
