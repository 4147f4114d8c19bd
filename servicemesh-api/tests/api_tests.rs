//! HTTP-level tests for the REST API.
//!
//! Requests are driven through the router with `tower::ServiceExt::oneshot`,
//! backed by an in-memory SQLite database.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use servicemesh_api::api::jwt::JwtService;
use servicemesh_api::api::{ApiServer, ApiServerConfig, AppState};
use servicemesh_api::database::{init_pool, run_migrations};
use servicemesh_api::integrations::HttpSettings;

const SECRET: &str = "api-test-secret";

async fn test_state() -> AppState {
    let pool = init_pool("sqlite::memory:").await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    AppState::new(pool, HttpSettings::new(Duration::from_secs(5)))
}

fn router(state: AppState) -> Router {
    ApiServer::with_state(ApiServerConfig::default(), state).build_router()
}

fn jwt() -> Arc<JwtService> {
    Arc::new(JwtService::new(SECRET, Duration::from_secs(600)))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

fn kuma_body() -> Value {
    json!({
        "service_type": "uptime_kuma",
        "endpoint": "http://kuma.local",
        "username": "u",
        "password": "p"
    })
}

mod health_routes {
    use super::*;

    #[tokio::test]
    async fn test_ping_and_liveness() {
        let app = router(test_state().await);

        let (status, body) = send(&app, Method::GET, "/api/v1/health/ping", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "pong");

        let (status, body) = send(&app, Method::GET, "/api/v1/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");
    }

    #[tokio::test]
    async fn test_openapi_document_follows_custom_prefix() {
        let config = ApiServerConfig {
            api_prefix: "/mesh".to_string(),
            ..ApiServerConfig::default()
        };
        let app = ApiServer::with_state(config, test_state().await).build_router();

        let (status, doc) = send(&app, Method::GET, "/mesh/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(doc["servers"][0]["url"], "/mesh");
        assert!(doc["paths"]["/health/ping"].is_object());

        // The documented path resolves against the server base path.
        let (status, _) = send(&app, Method::GET, "/mesh/health/ping", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_readiness() {
        let app = router(test_state().await);
        let (status, body) = send(&app, Method::GET, "/api/v1/health/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ready".to_string()));
    }

    #[tokio::test]
    async fn test_services_health_without_credentials() {
        let app = router(test_state().await);
        let (status, body) = send(&app, Method::GET, "/api/v1/health/services", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        for service in ["uptime_kuma", "prometheus", "grafana", "proxmox"] {
            assert_eq!(body["services"][service]["enabled"], false, "{service}");
        }
    }

    #[tokio::test]
    async fn test_health_is_open_when_jwt_enabled() {
        let app = router(test_state().await.with_jwt_service(jwt()));
        let (status, _) = send(&app, Method::GET, "/api/v1/health/ping", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}

mod credential_routes {
    use super::*;

    #[tokio::test]
    async fn test_create_then_get_redacts_secrets() {
        let app = router(test_state().await);

        let (status, created) =
            send(&app, Method::POST, "/api/v1/credentials", Some(kuma_body())).await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_str().expect("generated id").to_string();
        assert!(!id.is_empty());
        assert_eq!(created["password"], "********");

        let (status, fetched) =
            send(&app, Method::GET, &format!("/api/v1/credentials/{id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["service_type"], "uptime_kuma");
        assert_eq!(fetched["endpoint"], "http://kuma.local");
        assert_eq!(fetched["username"], "u");
        assert_eq!(fetched["password"], "********");
        assert_eq!(fetched["auth_type"], "basic");
        assert!(fetched["api_key"].is_null());
    }

    #[tokio::test]
    async fn test_list_and_filter_by_service_type() {
        let app = router(test_state().await);
        send(&app, Method::POST, "/api/v1/credentials", Some(kuma_body())).await;
        send(
            &app,
            Method::POST,
            "/api/v1/credentials",
            Some(json!({
                "id": "prom",
                "service_type": "prometheus",
                "endpoint": "http://prometheus:9090",
                "api_key": "token"
            })),
        )
        .await;

        let (status, all) = send(&app, Method::GET, "/api/v1/credentials", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(all.as_array().unwrap().len(), 2);

        let (status, prom) = send(
            &app,
            Method::GET,
            "/api/v1/credentials/service/prometheus",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(prom[0]["id"], "prom");
        assert_eq!(prom[0]["api_key"], "********");

        let (status, _) =
            send(&app, Method::GET, "/api/v1/credentials/service/grafana", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, Method::GET, "/api/v1/credentials/service/nagios", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let app = router(test_state().await);

        let (status, body) =
            send(&app, Method::GET, "/api/v1/credentials/missing", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let mut with_id = kuma_body();
        with_id["id"] = json!("kuma-1");
        let (status, _) =
            send(&app, Method::POST, "/api/v1/credentials", Some(with_id.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, body) =
            send(&app, Method::POST, "/api/v1/credentials", Some(with_id)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");

        let mut unknown = kuma_body();
        unknown["service_type"] = json!("nagios");
        let (status, _) = send(&app, Method::POST, "/api/v1/credentials", Some(unknown)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/credentials",
            Some(json!({"service_type": "grafana", "endpoint": "http://g"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_malformed_json_is_validation_error() {
        let app = router(test_state().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/api/v1/credentials")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from("{\"service_type\": "))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let app = router(test_state().await);
        let mut body = kuma_body();
        body["id"] = json!("kuma-1");
        send(&app, Method::POST, "/api/v1/credentials", Some(body)).await;

        let (status, updated) = send(
            &app,
            Method::PATCH,
            "/api/v1/credentials/kuma-1",
            Some(json!({"endpoint": "https://status.example.com", "verify_tls": false})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["endpoint"], "https://status.example.com");
        assert_eq!(updated["verify_tls"], false);
        assert_eq!(updated["username"], "u");

        // The id is immutable.
        let (status, _) = send(
            &app,
            Method::PATCH,
            "/api/v1/credentials/kuma-1",
            Some(json!({"id": "renamed"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) =
            send(&app, Method::DELETE, "/api/v1/credentials/kuma-1", None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) =
            send(&app, Method::DELETE, "/api/v1/credentials/kuma-1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod vendor_routes {
    use super::*;
    use mockito::Server;

    #[tokio::test]
    async fn test_missing_credential_is_not_found() {
        let app = router(test_state().await);
        let (status, body) = send(&app, Method::GET, "/api/v1/grafana/dashboards", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_vendor_routes_require_token_when_jwt_enabled() {
        let jwt = jwt();
        let app = router(test_state().await.with_jwt_service(jwt.clone()));

        let (status, body) = send(&app, Method::GET, "/api/v1/proxmox/nodes", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");

        let token = jwt.issue("tester").unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/proxmox/nodes")
                    .header(header::AUTHORIZATION, format!("Bearer {token}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        // Authenticated, but no Proxmox credential is stored.
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_credentials_stay_open_when_jwt_enabled() {
        let app = router(test_state().await.with_jwt_service(jwt()));
        let (status, _) = send(&app, Method::GET, "/api/v1/credentials", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_prometheus_query_through_api() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/status/buildinfo")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","data":{"version":"2.53.0","revision":"abc","branch":"HEAD","goVersion":"go1.22"}}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v1/query")
            .match_query(mockito::Matcher::UrlEncoded("query".into(), "up".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"success","data":{"resultType":"vector","result":[{"metric":{"job":"node"},"value":[1700000000,"1"]}]}}"#)
            .create_async()
            .await;

        let app = router(test_state().await);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/credentials",
            Some(json!({
                "service_type": "prometheus",
                "endpoint": server.url(),
                "api_key": "token"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, body) =
            send(&app, Method::GET, "/api/v1/prometheus/query?query=up", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["resultType"], "vector");
        assert_eq!(body["result"][0]["metric"]["job"], "node");

        let (status, _) = send(&app, Method::GET, "/api/v1/prometheus/query", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_encoded_slashes_stay_inside_the_dashboard_path() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/org")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id":1,"name":"Main Org."}"#)
            .create_async()
            .await;
        let admin_delete = server
            .mock("DELETE", "/api/admin/users/1")
            .with_status(200)
            .expect(0)
            .create_async()
            .await;
        let dashboard_delete = server
            .mock(
                "DELETE",
                mockito::Matcher::Regex(r"^/api/dashboards/uid/[^/]+$".to_string()),
            )
            .with_status(404)
            .with_header("content-type", "application/json")
            .with_body(r#"{"message":"Dashboard not found"}"#)
            .expect(1)
            .create_async()
            .await;

        let app = router(test_state().await);
        send(
            &app,
            Method::POST,
            "/api/v1/credentials",
            Some(json!({
                "service_type": "grafana",
                "endpoint": server.url(),
                "api_key": "glsa_admin"
            })),
        )
        .await;

        let (status, _) = send(
            &app,
            Method::DELETE,
            "/api/v1/grafana/dashboards/..%2F..%2Fadmin%2Fusers%2F1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) =
            send(&app, Method::DELETE, "/api/v1/grafana/dashboards/%2E%2E", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        admin_delete.assert_async().await;
        dashboard_delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_wrong_api_root_is_bad_gateway() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v1/status/buildinfo")
            .with_status(404)
            .with_body("404 page not found")
            .create_async()
            .await;

        let app = router(test_state().await);
        send(
            &app,
            Method::POST,
            "/api/v1/credentials",
            Some(json!({
                "service_type": "prometheus",
                "endpoint": server.url(),
                "api_key": "token"
            })),
        )
        .await;

        let (status, body) = send(&app, Method::GET, "/api/v1/prometheus/alerts", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }
}
