use actix_web::{
    delete, get, patch, post, put, web, HttpResponse, Responder, Result as ActixResult,
};
use actix_ws::Message;
use flowconvert::{import_value, to_legacy, ExportDocument};
use flowcore::{DataType, EdgeType, EventBus, NodeKind, Position, StoreEvent, WorkflowError};
use flowstore::{
    node_palette, EdgePatch, ExpressionPatch, NodePatch, VariablePatch, WorkflowPatch,
    WorkflowStore,
};
use flowvalidate::validate_workflow;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Application state shared across handlers
pub struct AppState {
    /// One store per open workflow, keyed by workflow id.
    pub stores: RwLock<HashMap<String, WorkflowStore>>,
    /// Shared by every store so one socket sees all changes.
    pub event_bus: Arc<EventBus>,
}

impl AppState {
    pub fn new(event_buffer_size: usize) -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
            event_bus: Arc::new(EventBus::new(event_buffer_size)),
        }
    }

    fn new_store(&self) -> WorkflowStore {
        WorkflowStore::with_event_bus(self.event_bus.clone())
    }
}

#[derive(Debug, Deserialize)]
struct CreateWorkflowRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AddNodeRequest {
    #[serde(rename = "type")]
    kind: NodeKind,
    #[serde(default)]
    position: Position,
}

#[derive(Debug, Deserialize)]
struct AddEdgeRequest {
    source: String,
    target: String,
    #[serde(rename = "type", default)]
    edge_type: EdgeType,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddVariableRequest {
    name: String,
    data_type: DataType,
}

#[derive(Debug, Deserialize)]
struct AddExpressionRequest {
    name: String,
    #[serde(default)]
    content: String,
}

/// Current selection; sending both ids selects the node.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct Selection {
    node_id: Option<String>,
    edge_id: Option<String>,
}

/// Response for created resources
#[derive(Debug, Serialize)]
struct CreatedResponse {
    id: String,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn workflow_not_found(workflow_id: &str) -> HttpResponse {
    HttpResponse::NotFound().json(ErrorResponse {
        error: format!("Workflow {} not found", workflow_id),
    })
}

fn store_error(e: WorkflowError) -> HttpResponse {
    let body = ErrorResponse {
        error: e.to_string(),
    };
    match e {
        WorkflowError::NoDocument => HttpResponse::Conflict().json(body),
        _ => HttpResponse::NotFound().json(body),
    }
}

fn created(result: Result<String, WorkflowError>) -> HttpResponse {
    match result {
        Ok(id) => HttpResponse::Created().json(CreatedResponse { id }),
        Err(e) => store_error(e),
    }
}

fn updated(result: Result<(), WorkflowError>) -> HttpResponse {
    match result {
        Ok(()) => HttpResponse::NoContent().finish(),
        Err(e) => store_error(e),
    }
}

/// Runs `f` against the store for `workflow_id`, or answers 404.
async fn with_store<F>(data: &AppState, workflow_id: &str, f: F) -> HttpResponse
where
    F: FnOnce(&mut WorkflowStore) -> HttpResponse,
{
    let mut stores = data.stores.write().await;
    match stores.get_mut(workflow_id) {
        Some(store) => f(store),
        None => workflow_not_found(workflow_id),
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowserver"
    }))
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types() -> impl Responder {
    HttpResponse::Ok().json(node_palette())
}

/// List all open workflows
#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let stores = data.stores.read().await;
    let mut workflow_list: Vec<_> = stores
        .values()
        .filter_map(WorkflowStore::workflow)
        .map(|w| {
            serde_json::json!({
                "id": w.id,
                "name": w.name,
                "nodes": w.nodes.len(),
                "edges": w.edges.len(),
                "variables": w.variables.len(),
                "expressions": w.expressions.len(),
            })
        })
        .collect();
    workflow_list.sort_by(|a, b| a["id"].as_str().cmp(&b["id"].as_str()));

    Ok(HttpResponse::Ok().json(workflow_list))
}

/// Create a workflow with a start and an end node
#[post("/api/workflows")]
async fn create_workflow(
    data: web::Data<AppState>,
    req: web::Json<CreateWorkflowRequest>,
) -> ActixResult<impl Responder> {
    let mut store = data.new_store();
    let workflow_id = store.create_workflow(req.into_inner().name);

    info!("Created workflow: {}", workflow_id);
    data.stores.write().await.insert(workflow_id.clone(), store);

    Ok(HttpResponse::Created().json(CreatedResponse { id: workflow_id }))
}

/// Open a legacy, export or internal document
#[post("/api/workflows/import")]
async fn import_workflow(
    data: web::Data<AppState>,
    body: web::Json<serde_json::Value>,
) -> ActixResult<impl Responder> {
    let workflow = match import_value(body.into_inner()) {
        Ok(workflow) => workflow,
        Err(e) => {
            warn!("Rejected import: {}", e);
            return Ok(HttpResponse::BadRequest().json(ErrorResponse {
                error: e.to_string(),
            }));
        }
    };

    let mut stores = data.stores.write().await;
    if stores.contains_key(&workflow.id) {
        warn!("Rejected import of already open workflow {}", workflow.id);
        return Ok(HttpResponse::Conflict().json(ErrorResponse {
            error: format!("Workflow {} is already open", workflow.id),
        }));
    }

    let mut store = data.new_store();
    let workflow_id = store.load_workflow(workflow);
    stores.insert(workflow_id.clone(), store);

    Ok(HttpResponse::Created().json(CreatedResponse { id: workflow_id }))
}

/// Get a specific workflow
#[get("/api/workflows/{id}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let stores = data.stores.read().await;

    match stores.get(&workflow_id).and_then(WorkflowStore::workflow) {
        Some(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        None => Ok(workflow_not_found(&workflow_id)),
    }
}

#[patch("/api/workflows/{id}")]
async fn update_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
    patch: web::Json<WorkflowPatch>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let patch = patch.into_inner();
    Ok(with_store(&data, &workflow_id, |store| updated(store.update_workflow(patch))).await)
}

/// Close a workflow
#[delete("/api/workflows/{id}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let mut stores = data.stores.write().await;

    match stores.remove(&workflow_id) {
        Some(mut store) => {
            store.reset();
            info!("Deleted workflow: {}", workflow_id);
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": "Workflow deleted successfully"
            })))
        }
        None => Ok(workflow_not_found(&workflow_id)),
    }
}

#[get("/api/workflows/{id}/validate")]
async fn validate(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let stores = data.stores.read().await;

    match stores.get(&workflow_id).and_then(WorkflowStore::workflow) {
        Some(workflow) => Ok(HttpResponse::Ok().json(validate_workflow(workflow))),
        None => Ok(workflow_not_found(&workflow_id)),
    }
}

/// Download the export wrapper
#[get("/api/workflows/{id}/export")]
async fn export_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let stores = data.stores.read().await;

    match stores.get(&workflow_id).and_then(WorkflowStore::workflow) {
        Some(workflow) => Ok(HttpResponse::Ok().json(ExportDocument::new(workflow.clone()))),
        None => Ok(workflow_not_found(&workflow_id)),
    }
}

/// Download the legacy dialect
#[get("/api/workflows/{id}/legacy")]
async fn legacy_workflow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let stores = data.stores.read().await;

    match stores.get(&workflow_id).and_then(WorkflowStore::workflow) {
        Some(workflow) => Ok(HttpResponse::Ok().json(to_legacy(workflow))),
        None => Ok(workflow_not_found(&workflow_id)),
    }
}

#[post("/api/workflows/{id}/nodes")]
async fn add_node(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddNodeRequest>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let req = req.into_inner();
    Ok(with_store(&data, &workflow_id, |store| created(store.add_node(req.kind, req.position))).await)
}

#[patch("/api/workflows/{id}/nodes/{node_id}")]
async fn update_node(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    patch: web::Json<NodePatch>,
) -> ActixResult<impl Responder> {
    let (workflow_id, node_id) = path.into_inner();
    let patch = patch.into_inner();
    Ok(with_store(&data, &workflow_id, |store| updated(store.update_node(&node_id, patch))).await)
}

#[delete("/api/workflows/{id}/nodes/{node_id}")]
async fn delete_node(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ActixResult<impl Responder> {
    let (workflow_id, node_id) = path.into_inner();
    Ok(with_store(&data, &workflow_id, |store| updated(store.delete_node(&node_id))).await)
}

#[post("/api/workflows/{id}/edges")]
async fn add_edge(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddEdgeRequest>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let req = req.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        created(store.add_edge(&req.source, &req.target, req.edge_type))
    })
    .await)
}

#[patch("/api/workflows/{id}/edges/{edge_id}")]
async fn update_edge(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    patch: web::Json<EdgePatch>,
) -> ActixResult<impl Responder> {
    let (workflow_id, edge_id) = path.into_inner();
    let patch = patch.into_inner();
    Ok(with_store(&data, &workflow_id, |store| updated(store.update_edge(&edge_id, patch))).await)
}

#[delete("/api/workflows/{id}/edges/{edge_id}")]
async fn delete_edge(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ActixResult<impl Responder> {
    let (workflow_id, edge_id) = path.into_inner();
    Ok(with_store(&data, &workflow_id, |store| updated(store.delete_edge(&edge_id))).await)
}

#[post("/api/workflows/{id}/variables")]
async fn add_variable(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddVariableRequest>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let req = req.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        created(store.add_variable(req.name, req.data_type))
    })
    .await)
}

#[patch("/api/workflows/{id}/variables/{variable_id}")]
async fn update_variable(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    patch: web::Json<VariablePatch>,
) -> ActixResult<impl Responder> {
    let (workflow_id, variable_id) = path.into_inner();
    let patch = patch.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        updated(store.update_variable(&variable_id, patch))
    })
    .await)
}

#[delete("/api/workflows/{id}/variables/{variable_id}")]
async fn delete_variable(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ActixResult<impl Responder> {
    let (workflow_id, variable_id) = path.into_inner();
    Ok(with_store(&data, &workflow_id, |store| updated(store.delete_variable(&variable_id))).await)
}

#[post("/api/workflows/{id}/expressions")]
async fn add_expression(
    data: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<AddExpressionRequest>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let req = req.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        created(store.add_expression(req.name, req.content))
    })
    .await)
}

#[patch("/api/workflows/{id}/expressions/{expression_id}")]
async fn update_expression(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
    patch: web::Json<ExpressionPatch>,
) -> ActixResult<impl Responder> {
    let (workflow_id, expression_id) = path.into_inner();
    let patch = patch.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        updated(store.update_expression(&expression_id, patch))
    })
    .await)
}

#[delete("/api/workflows/{id}/expressions/{expression_id}")]
async fn delete_expression(
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> ActixResult<impl Responder> {
    let (workflow_id, expression_id) = path.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        updated(store.delete_expression(&expression_id))
    })
    .await)
}

#[get("/api/workflows/{id}/selection")]
async fn get_selection(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let stores = data.stores.read().await;

    match stores.get(&workflow_id) {
        Some(store) => Ok(HttpResponse::Ok().json(Selection {
            node_id: store.selected_node_id().map(str::to_string),
            edge_id: store.selected_edge_id().map(str::to_string),
        })),
        None => Ok(workflow_not_found(&workflow_id)),
    }
}

/// Select a node or an edge; an empty body clears the selection
#[put("/api/workflows/{id}/selection")]
async fn update_selection(
    data: web::Data<AppState>,
    path: web::Path<String>,
    selection: web::Json<Selection>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    let selection = selection.into_inner();
    Ok(with_store(&data, &workflow_id, |store| match selection {
        Selection {
            node_id: Some(node_id),
            ..
        } => updated(store.select_node(Some(&node_id))),
        Selection {
            edge_id: Some(edge_id),
            ..
        } => updated(store.select_edge(Some(&edge_id))),
        Selection { .. } => {
            store.clear_selection();
            HttpResponse::NoContent().finish()
        }
    })
    .await)
}

#[delete("/api/workflows/{id}/selection")]
async fn clear_selection(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let workflow_id = path.into_inner();
    Ok(with_store(&data, &workflow_id, |store| {
        store.clear_selection();
        HttpResponse::NoContent().finish()
    })
    .await)
}

/// Next event for a socket client. A lagging client skips what it missed.
async fn next_event(events: &mut broadcast::Receiver<StoreEvent>) -> Option<StoreEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Some(event),
            Err(RecvError::Lagged(missed)) => {
                warn!("WebSocket client lagged, skipped {} events", missed);
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

/// WebSocket endpoint streaming store events
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.event_bus.subscribe();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = next_event(&mut events) => {
                    let Some(event) = event else { break };
                    if let Ok(json) = serde_json::to_string(&event) {
                        if session.text(json).await.is_err() {
                            break;
                        }
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(list_node_types)
        .service(list_workflows)
        .service(create_workflow)
        .service(import_workflow)
        .service(get_workflow)
        .service(update_workflow)
        .service(delete_workflow)
        .service(validate)
        .service(export_workflow)
        .service(legacy_workflow)
        .service(add_node)
        .service(update_node)
        .service(delete_node)
        .service(add_edge)
        .service(update_edge)
        .service(delete_edge)
        .service(add_variable)
        .service(update_variable)
        .service(delete_variable)
        .service(add_expression)
        .service(update_expression)
        .service(delete_expression)
        .service(get_selection)
        .service(update_selection)
        .service(clear_selection)
        .service(websocket_events);
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test, App};
    use flowconvert::DEMO_LEGACY_JSON;
    use serde_json::{json, Value};

    macro_rules! app {
        ($state:expr) => {
            test::init_service(App::new().app_data($state.clone()).configure(configure)).await
        };
    }

    #[actix_web::test]
    async fn test_health() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_create_edit_and_validate() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/workflows")
            .set_json(json!({ "name": "挂号" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/workflows/{}", id))
            .to_request();
        let workflow: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(workflow["name"], "挂号");
        let start = workflow["startId"].as_str().unwrap().to_string();
        let end = workflow["nodes"]
            .as_object()
            .unwrap()
            .values()
            .find(|n| n["type"] == "END")
            .and_then(|n| n["id"].as_str())
            .unwrap()
            .to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/edges", id))
            .set_json(json!({ "source": start, "target": end }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get()
            .uri(&format!("/api/workflows/{}/validate", id))
            .to_request();
        let result: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(result["isValid"], true);
        assert_eq!(result["warnings"], json!([]));

        let req = test::TestRequest::get()
            .uri(&format!("/api/workflows/{}/legacy", id))
            .to_request();
        let legacy: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(legacy["FlowName"], "挂号");
        assert_eq!(legacy["ProcessDic"][&start]["NextID"], end.as_str());
    }

    #[actix_web::test]
    async fn test_import_legacy_document() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let legacy: Value = serde_json::from_str(DEMO_LEGACY_JSON).unwrap();
        let req = test::TestRequest::post()
            .uri("/api/workflows/import")
            .set_json(legacy)
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(created["id"], "049FD372E4704F508D08AD2870D8B309");

        let req = test::TestRequest::get().uri("/api/workflows").to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list[0]["nodes"], 9);
        assert_eq!(list[0]["edges"], 8);
    }

    #[actix_web::test]
    async fn test_import_rejects_non_objects() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/workflows/import")
            .set_json(json!([1, 2, 3]))
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_unknown_workflow_and_node() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/workflows/missing/nodes")
            .set_json(json!({ "type": "LOOP" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/api/workflows")
            .set_json(json!({ "name": "wf" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap();

        let req = test::TestRequest::delete()
            .uri(&format!("/api/workflows/{}/nodes/ghost", id))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_import_same_document_twice_conflicts() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);
        let legacy: Value = serde_json::from_str(DEMO_LEGACY_JSON).unwrap();

        let req = test::TestRequest::post()
            .uri("/api/workflows/import")
            .set_json(&legacy)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::patch()
            .uri("/api/workflows/049FD372E4704F508D08AD2870D8B309")
            .set_json(json!({ "name": "edited" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::post()
            .uri("/api/workflows/import")
            .set_json(&legacy)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(
            resp.status(),
            StatusCode::CONFLICT,
            "A second import must not replace the open workflow"
        );

        let req = test::TestRequest::get().uri("/api/workflows").to_request();
        let list: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(list.as_array().unwrap().len(), 1);
        assert_eq!(list[0]["name"], "edited", "Edits must survive the rejected import");
    }

    #[actix_web::test]
    async fn test_patch_edge_variable_and_expression() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/workflows")
            .set_json(json!({ "name": "wf" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::get()
            .uri(&format!("/api/workflows/{}", id))
            .to_request();
        let workflow: Value = test::call_and_read_body_json(&app, req).await;
        let start = workflow["startId"].as_str().unwrap().to_string();
        let end = workflow["nodes"]
            .as_object()
            .unwrap()
            .values()
            .find(|n| n["type"] == "END")
            .and_then(|n| n["id"].as_str())
            .unwrap()
            .to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/edges", id))
            .set_json(json!({ "source": start, "target": end }))
            .to_request();
        let edge: Value = test::call_and_read_body_json(&app, req).await;
        let edge_id = edge["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/variables", id))
            .set_json(json!({ "name": "count", "dataType": "NUMBER" }))
            .to_request();
        let variable: Value = test::call_and_read_body_json(&app, req).await;
        let variable_id = variable["id"].as_str().unwrap().to_string();

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/expressions", id))
            .set_json(json!({ "name": "check" }))
            .to_request();
        let expression: Value = test::call_and_read_body_json(&app, req).await;
        let expression_id = expression["id"].as_str().unwrap().to_string();

        for (uri, body) in [
            (
                format!("/api/workflows/{}/edges/{}", id, edge_id),
                json!({ "label": "done" }),
            ),
            (
                format!("/api/workflows/{}/variables/{}", id, variable_id),
                json!({ "name": "total", "description": "running total" }),
            ),
            (
                format!("/api/workflows/{}/expressions/{}", id, expression_id),
                json!({ "returnType": "BOOLEAN" }),
            ),
        ] {
            let req = test::TestRequest::patch()
                .uri(&uri)
                .set_json(body)
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::NO_CONTENT, "PATCH {} failed", uri);
        }

        let req = test::TestRequest::get()
            .uri(&format!("/api/workflows/{}", id))
            .to_request();
        let workflow: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(workflow["edges"][0]["label"], "done");
        assert_eq!(workflow["variables"][&variable_id]["name"], "total");
        assert_eq!(workflow["variables"][&variable_id]["dataType"], "NUMBER");
        assert_eq!(workflow["variables"][&variable_id]["description"], "running total");
        assert_eq!(workflow["expressions"][&expression_id]["returnType"], "BOOLEAN");
        assert_eq!(workflow["expressions"][&expression_id]["name"], "check");

        let req = test::TestRequest::patch()
            .uri(&format!("/api/workflows/{}/edges/ghost", id))
            .set_json(json!({ "label": "x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_selection_follows_requests() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::post()
            .uri("/api/workflows")
            .set_json(json!({ "name": "wf" }))
            .to_request();
        let created: Value = test::call_and_read_body_json(&app, req).await;
        let id = created["id"].as_str().unwrap().to_string();
        let uri = format!("/api/workflows/{}/selection", id);

        let req = test::TestRequest::get()
            .uri(&format!("/api/workflows/{}", id))
            .to_request();
        let workflow: Value = test::call_and_read_body_json(&app, req).await;
        let start = workflow["startId"].as_str().unwrap().to_string();

        let req = test::TestRequest::get().uri(&uri).to_request();
        let selection: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(selection, json!({ "nodeId": null, "edgeId": null }));

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "nodeId": start }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&uri).to_request();
        let selection: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(selection["nodeId"], start.as_str());

        let req = test::TestRequest::put()
            .uri(&uri)
            .set_json(json!({ "edgeId": "ghost" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "Unknown edges cannot be selected");

        let req = test::TestRequest::get().uri(&uri).to_request();
        let selection: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(selection["nodeId"], start.as_str(), "A failed select keeps the old selection");

        let req = test::TestRequest::delete().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let req = test::TestRequest::get().uri(&uri).to_request();
        let selection: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(selection, json!({ "nodeId": null, "edgeId": null }));
    }

    #[actix_web::test]
    async fn test_lagging_subscriber_keeps_receiving() {
        let bus = Arc::new(EventBus::new(2));
        let mut events = bus.subscribe();
        let mut store = WorkflowStore::with_event_bus(bus.clone());

        for _ in 0..5 {
            store.clear_selection();
        }

        let first = next_event(&mut events).await;
        assert!(
            matches!(first, Some(StoreEvent::SelectionChanged { .. })),
            "Lagging must skip missed events, not end the stream"
        );

        drop(store);
        drop(bus);
        let mut remaining = 0;
        while next_event(&mut events).await.is_some() {
            remaining += 1;
        }
        assert_eq!(remaining, 1, "Only the buffered events are delivered");
    }

    #[actix_web::test]
    async fn test_palette_lists_every_kind() {
        let state = web::Data::new(AppState::new(16));
        let app = app!(state);

        let req = test::TestRequest::get().uri("/api/nodes").to_request();
        let nodes: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(nodes.as_array().unwrap().len(), NodeKind::ALL.len());
        assert_eq!(nodes[2]["type"], "CONDITION");
    }
}
