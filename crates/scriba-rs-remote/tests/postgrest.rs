use pretty_assertions::assert_eq;
use scriba_rs_protocol::{
    InteractionFilter, InteractionType, ListOptions, NewInteraction, RecordId, SortDirection,
    SortKey,
};
use scriba_rs_remote::{
    INTERACTIONS_TABLE, PostgrestOptions, PostgrestStore, RemoteError, RemoteQuery, RemoteStore,
    WipeConfirmation,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "anon-key";

fn store_for(server: &MockServer, use_stored_procedures: bool) -> PostgrestStore {
    PostgrestStore::new(
        &server.uri(),
        KEY,
        PostgrestOptions {
            use_stored_procedures,
            ..PostgrestOptions::default()
        },
    )
    .expect("store")
}

fn row(id: &str, created_at: &str, prompt: &str) -> Value {
    json!({
        "id": id,
        "created_at": created_at,
        "prompt": prompt,
        "response": "ok",
        "model": "gpt-4o",
        "interaction_type": "paper_search",
        "metadata": {},
        "project_id": null,
        "task_id": null,
        "document_id": null
    })
}

fn input() -> NewInteraction {
    NewInteraction::new("find papers", "three papers", "gpt-4o", InteractionType::PaperSearch)
}

#[tokio::test]
async fn insert_uses_stored_procedure_with_auth_headers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_ai_interaction"))
        .and(header("apikey", KEY))
        .and(header("authorization", "Bearer anon-key"))
        .and(body_partial_json(json!({
            "p_prompt": "find papers",
            "p_interaction_type": "paper_search"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("7d1c1f0e-0000-4000-8000-000000000001")))
        .expect(1)
        .mount(&server)
        .await;

    let record = store_for(&server, true).insert(&input()).await.expect("insert");
    assert_eq!(record.id, RecordId::new("7d1c1f0e-0000-4000-8000-000000000001"));
    assert_eq!(record.prompt, "find papers");
    assert_eq!(record.interaction_type, InteractionType::PaperSearch);
}

/// A missing procedure falls through to a direct table insert.
#[tokio::test]
async fn insert_falls_back_to_table_when_procedure_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_ai_interaction"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "PGRST202",
            "message": "Could not find the function public.create_ai_interaction"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_interactions"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(
            "remote-1",
            "2024-05-01T10:00:00Z",
            "find papers"
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let record = store_for(&server, true).insert(&input()).await.expect("insert");
    assert_eq!(record.id, RecordId::new("remote-1"));
}

#[tokio::test]
async fn insert_reports_missing_table() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_interactions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "42P01",
            "message": "relation \"public.ai_interactions\" does not exist"
        })))
        .mount(&server)
        .await;

    let err = store_for(&server, false)
        .insert(&input())
        .await
        .expect_err("missing table");
    assert!(matches!(err, RemoteError::RelationMissing(_)));
    assert!(err.is_schema_missing());
}

#[tokio::test]
async fn server_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = store_for(&server, false)
        .insert(&input())
        .await
        .expect_err("unavailable");
    assert!(err.is_unavailable());
}

/// A gateway timeout may follow a committed procedure call, so the insert
/// is not repeated against the table.
#[tokio::test]
async fn insert_does_not_retry_after_gateway_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/create_ai_interaction"))
        .respond_with(ResponseTemplate::new(504).set_body_string("gateway timeout"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_interactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(
            "remote-1",
            "2024-05-01T10:00:00Z",
            "find papers"
        )])))
        .expect(0)
        .mount(&server)
        .await;

    let err = store_for(&server, true)
        .insert(&input())
        .await
        .expect_err("gateway timeout");
    assert!(matches!(err, RemoteError::Unavailable(_)));
}

#[tokio::test]
async fn refused_connection_is_unreachable() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let store = PostgrestStore::new(&uri, KEY, PostgrestOptions::default()).expect("store");
    let err = store.insert(&input()).await.expect_err("refused");
    assert!(err.is_unreachable());
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn batch_insert_is_single_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_interactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            row("remote-1", "2024-05-01T10:00:00Z", "a"),
            row("remote-2", "2024-05-01T10:00:01Z", "b")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let records = store_for(&server, true)
        .insert_batch(&[input(), input()])
        .await
        .expect("batch");
    assert_eq!(records.len(), 2);
}

#[tokio::test]
async fn batch_insert_rejects_short_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/ai_interactions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([row(
            "remote-1",
            "2024-05-01T10:00:00Z",
            "a"
        )])))
        .mount(&server)
        .await;

    let err = store_for(&server, true)
        .insert_batch(&[input(), input()])
        .await
        .expect_err("short response");
    assert!(matches!(err, RemoteError::Decode(_)));
}

#[tokio::test]
async fn custom_order_queries_table_with_exact_count() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_interactions"))
        .and(query_param("order", "model.asc,id.asc"))
        .and(query_param("offset", "10"))
        .and(query_param("limit", "5"))
        .and(query_param("interaction_type", "eq.paper_search"))
        .and(header("prefer", "count=exact"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-range", "10-10/11")
                .set_body_json(json!([row("remote-11", "2024-05-01T10:00:00Z", "a")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let options = ListOptions::default()
        .with_filter(InteractionFilter {
            interaction_type: Some(InteractionType::PaperSearch),
            ..InteractionFilter::default()
        })
        .with_sort(SortKey::Model, SortDirection::Asc)
        .with_page(10, 5);
    let page = store_for(&server, true)
        .query(&RemoteQuery::from_options(&options))
        .await
        .expect("query");
    assert_eq!(page.total, Some(11));
    assert_eq!(page.records.len(), 1);
}

#[tokio::test]
async fn default_order_uses_listing_procedure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/get_ai_interactions"))
        .and(body_partial_json(json!({ "p_limit": 50, "p_offset": 0 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            row("remote-2", "2024-05-01T10:00:01Z", "b"),
            row("remote-1", "2024-05-01T10:00:00Z", "a")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let page = store_for(&server, true)
        .query(&RemoteQuery::from_options(&ListOptions::default()))
        .await
        .expect("query");
    assert_eq!(page.total, None);
    assert_eq!(page.records.len(), 2);
}

#[tokio::test]
async fn count_reads_content_range_from_head_request() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/rest/v1/ai_interactions"))
        .and(query_param("interaction_type", "eq.paper_search"))
        .and(header("prefer", "count=exact"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-range", "*/42"))
        .expect(1)
        .mount(&server)
        .await;

    let filter = InteractionFilter {
        interaction_type: Some(InteractionType::PaperSearch),
        ..InteractionFilter::default()
    };
    let total = store_for(&server, true).count(&filter).await.expect("count");
    assert_eq!(total, 42);
}

#[tokio::test]
async fn get_returns_none_for_unknown_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_interactions"))
        .and(query_param("id", "eq.missing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let found = store_for(&server, true)
        .get(&RecordId::new("missing"))
        .await
        .expect("get");
    assert_eq!(found, None);
}

#[tokio::test]
async fn delete_by_id_reports_whether_a_row_matched() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/ai_interactions"))
        .and(query_param("id", "eq.remote-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row(
            "remote-1",
            "2024-05-01T10:00:00Z",
            "a"
        )])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/ai_interactions"))
        .and(query_param("id", "eq.remote-2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server, true);
    assert!(store.delete_by_id(&RecordId::new("remote-1")).await.expect("delete"));
    assert!(!store.delete_by_id(&RecordId::new("remote-2")).await.expect("delete"));
}

#[tokio::test]
async fn delete_all_matches_every_row() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/ai_interactions"))
        .and(query_param("id", "neq.00000000-0000-0000-0000-000000000000"))
        .respond_with(ResponseTemplate::new(204).insert_header("content-range", "*/4"))
        .expect(1)
        .mount(&server)
        .await;

    let confirmation = WipeConfirmation::for_table(INTERACTIONS_TABLE).expect("confirm");
    let removed = store_for(&server, true)
        .delete_all(confirmation)
        .await
        .expect("delete all");
    assert_eq!(removed, 4);
}

#[tokio::test]
async fn table_exists_detects_missing_relation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/ai_interactions"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "42P01",
            "message": "relation does not exist"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/other_table"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store_for(&server, true);
    assert!(!store.table_exists(INTERACTIONS_TABLE).await.expect("exists"));
    assert!(store.table_exists("other_table").await.expect("exists"));
}

#[tokio::test]
async fn ensure_schema_posts_bootstrap_sql() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/exec_sql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server, true)
        .ensure_schema()
        .await
        .expect("ensure schema");

    let requests = server.received_requests().await.expect("recording enabled");
    let body: Value = serde_json::from_slice(&requests[0].body).expect("json body");
    let sql = body["sql"].as_str().expect("sql");
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS public.ai_interactions"));
}

#[tokio::test]
async fn ensure_schema_without_exec_sql_is_procedure_missing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/rpc/exec_sql"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "code": "PGRST202",
            "message": "Could not find the function public.exec_sql"
        })))
        .mount(&server)
        .await;

    let err = store_for(&server, true)
        .ensure_schema()
        .await
        .expect_err("no exec_sql");
    assert!(matches!(err, RemoteError::ProcedureMissing(message) if message.contains("manually")));
}
