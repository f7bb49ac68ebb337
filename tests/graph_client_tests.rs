//! Integration tests for the Graph wire contract.
//!
//! Uses wiremock to simulate the responses the commands depend on: OData
//! pagination, the Graph error envelope, and the status codes the bulk
//! layer classifies.

use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Directory listing: a $select'ed page of users.
#[tokio::test]
async fn test_list_users_page() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .and(query_param(
            "$select",
            "id,displayName,userPrincipalName,mail,accountEnabled",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "u-1",
                    "displayName": "Ada",
                    "userPrincipalName": "ada@contoso.test",
                    "mail": "ada@contoso.test",
                    "accountEnabled": true
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/v1.0/users", server.uri()))
        .query(&[("$select", "id,displayName,userPrincipalName,mail,accountEnabled")])
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["value"][0]["userPrincipalName"], "ada@contoso.test");
}

/// Pagination: @odata.nextLink points at the next page, absent on the last.
#[tokio::test]
async fn test_pagination_next_link() {
    let server = setup_mock_server().await;
    let next = format!("{}/v1.0/groups-page-2", server.uri());

    Mock::given(method("GET"))
        .and(path("/v1.0/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "g-1"}],
            "@odata.nextLink": next
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/groups-page-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [{"id": "g-2"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let mut url = format!("{}/v1.0/groups", server.uri());
    let mut ids: Vec<String> = Vec::new();

    loop {
        let body: serde_json::Value = client.get(&url).send().await.unwrap().json().await.unwrap();
        for item in body["value"].as_array().unwrap() {
            ids.push(item["id"].as_str().unwrap().to_string());
        }
        match body["@odata.nextLink"].as_str() {
            Some(next) => url = next.to_string(),
            None => break,
        }
    }

    assert_eq!(ids, ["g-1", "g-2"]);
}

/// BitLocker key material lives on the beta endpoint and needs an explicit
/// $select to include the key itself.
#[tokio::test]
async fn test_bitlocker_key_select() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/beta/informationProtection/bitlocker/recoveryKeys/key-1"))
        .and(query_param("$select", "key,deviceId,createdDateTime"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "key-1",
            "key": "111111-222222-333333-444444-555555-666666-777777-888888",
            "deviceId": "dev-1",
            "createdDateTime": "2026-01-10T08:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!(
            "{}/beta/informationProtection/bitlocker/recoveryKeys/key-1",
            server.uri()
        ))
        .query(&[("$select", "key,deviceId,createdDateTime")])
        .bearer_auth("test-token")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["key"].as_str().unwrap().starts_with("111111-"));
}

/// 404 with the Graph error envelope: the shape the error classifier parses.
#[tokio::test]
async fn test_not_found_error_envelope() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/ghost@contoso.test/drive"))
        .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
            "error": {
                "code": "Request_ResourceNotFound",
                "message": "Resource 'ghost@contoso.test' does not exist."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/v1.0/users/ghost@contoso.test/drive", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "Request_ResourceNotFound");
}

/// 429 throttling response with Retry-After.
#[tokio::test]
async fn test_rate_limit_with_retry_after() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users"))
        .respond_with(
            ResponseTemplate::new(429)
                .append_header("Retry-After", "1")
                .set_body_json(serde_json::json!({
                    "error": {
                        "code": "TooManyRequests",
                        "message": "Too many requests."
                    }
                })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!("{}/v1.0/users", server.uri()))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 429);
    assert!(response.headers().contains_key("retry-after"));
}

/// 403 Forbidden: a permission failure that retrying cannot fix.
#[tokio::test]
async fn test_forbidden_no_retry() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/ada@contoso.test/mailFolders/inbox/messageRules"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "error": {
                "code": "Authorization_RequestDenied",
                "message": "Insufficient privileges to complete the operation."
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let response = client
        .get(format!(
            "{}/v1.0/users/ada@contoso.test/mailFolders/inbox/messageRules",
            server.uri()
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "Authorization_RequestDenied");
}

/// Inbox rules with forwarding actions: the shape the mailbox audit flags.
#[tokio::test]
async fn test_inbox_rules_forwarding_shape() {
    let server = setup_mock_server().await;

    Mock::given(method("GET"))
        .and(path("/v1.0/users/ada@contoso.test/mailFolders/inbox/messageRules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "value": [
                {
                    "id": "rule-1",
                    "displayName": "Forward invoices",
                    "isEnabled": true,
                    "actions": {
                        "forwardTo": [
                            {"emailAddress": {"address": "outside@evil.test"}}
                        ]
                    }
                },
                {
                    "id": "rule-2",
                    "displayName": "File newsletters",
                    "isEnabled": true,
                    "actions": {"moveToFolder": "newsletters"}
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = reqwest::Client::new();
    let body: serde_json::Value = client
        .get(format!(
            "{}/v1.0/users/ada@contoso.test/mailFolders/inbox/messageRules",
            server.uri()
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let rules = body["value"].as_array().unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(
        rules[0]["actions"]["forwardTo"][0]["emailAddress"]["address"],
        "outside@evil.test"
    );
    assert!(rules[1]["actions"]["forwardTo"].is_null());
}
