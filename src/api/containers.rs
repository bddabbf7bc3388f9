use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::AppState;
use super::error::ApiError;
use crate::runtime::{RawContainer, ServerSpec};

/// Number of id characters shown in listings.
pub const SHORT_ID_LEN: usize = 10;

/// Name shown for containers the runtime reports without one.
pub const UNNAMED: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerSummary {
    pub id: String,
    pub name: String,
    pub image: String,
    pub state: String,
    pub status: String,
}

impl From<RawContainer> for ContainerSummary {
    fn from(raw: RawContainer) -> Self {
        Self {
            id: raw.id.chars().take(SHORT_ID_LEN).collect(),
            name: display_name(&raw.names),
            image: raw.image,
            state: raw.state,
            status: raw.status,
        }
    }
}

/// The engine prefixes names with `/`. Exactly one leading character is
/// dropped.
fn display_name(names: &[String]) -> String {
    match names.first() {
        Some(name) => {
            let mut chars = name.chars();
            chars.next();
            chars.as_str().to_string()
        }
        None => UNNAMED.to_string(),
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub port: String,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub data_path: String,
    #[serde(default)]
    pub image: String,
}

impl CreateRequest {
    pub fn into_spec(self, default_image: &str) -> Result<ServerSpec, ApiError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ApiError::BadRequest("name must not be empty".to_string()));
        }

        let host_port = match self.port.trim().parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => {
                return Err(ApiError::BadRequest(format!(
                    "port must be a number between 1 and 65535, got {:?}",
                    self.port
                )));
            }
        };

        let image = match self.image.trim() {
            "" => default_image.to_string(),
            image => image.to_string(),
        };

        let data_path = match self.data_path.trim() {
            "" => None,
            path => Some(path.to_string()),
        };

        Ok(ServerSpec {
            name: name.to_string(),
            image,
            host_port,
            env: self.env,
            data_path,
        })
    }
}

pub async fn list_containers(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContainerSummary>>, ApiError> {
    let containers = state.runtime.list_containers(true).await?;
    Ok(Json(
        containers
            .into_iter()
            .map(ContainerSummary::from)
            .collect(),
    ))
}

pub async fn start_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.runtime.start_container(&id).await?;
    Ok(Json(json!({ "message": "container started" })))
}

pub async fn stop_container(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.runtime.stop_container(&id).await?;
    Ok(Json(json!({ "message": "container stopped" })))
}

pub async fn create_container(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let spec = request.into_spec(&state.default_image)?;

    log::info!(
        "Creating server {} from {} on port {}",
        spec.name,
        spec.image,
        spec.host_port
    );
    let id = state.runtime.create_and_start(&spec).await?;

    Ok(Json(json!({
        "message": "server created and started",
        "id": id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::testing::FakeRuntime;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;

    fn raw(id: &str, names: &[&str]) -> RawContainer {
        RawContainer {
            id: id.to_string(),
            names: names.iter().map(|n| n.to_string()).collect(),
            image: "itzg/minecraft-server".to_string(),
            state: "running".to_string(),
            status: "Up 3 minutes".to_string(),
        }
    }

    fn state(runtime: FakeRuntime) -> Arc<AppState> {
        Arc::new(AppState {
            runtime: Arc::new(runtime),
            default_image: "itzg/minecraft-server".to_string(),
        })
    }

    fn request(json: Value) -> CreateRequest {
        serde_json::from_value(json).expect("request should deserialize")
    }

    async fn body_json(error: ApiError) -> (StatusCode, Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_summary_shortens_id_and_strips_prefix() {
        let summary = ContainerSummary::from(raw("4f1c2b3a5d6e7f8091a2", &["/survival"]));
        assert_eq!(summary.id, "4f1c2b3a5d");
        assert_eq!(summary.name, "survival");
        assert_eq!(summary.state, "running");
    }

    #[test]
    fn test_summary_strips_exactly_one_character() {
        assert_eq!(display_name(&["//nested".to_string()]), "/nested");
        assert_eq!(display_name(&["/é-world".to_string()]), "é-world");
    }

    #[test]
    fn test_summary_without_name_uses_placeholder() {
        let summary = ContainerSummary::from(raw("abc", &[]));
        assert_eq!(summary.name, UNNAMED);
        assert_eq!(summary.id, "abc");
    }

    #[test]
    fn test_create_request_defaults() {
        let spec = request(json!({ "name": "creative", "port": "25570" }))
            .into_spec("itzg/minecraft-server")
            .unwrap();
        assert_eq!(spec.image, "itzg/minecraft-server");
        assert_eq!(spec.host_port, 25570);
        assert_eq!(spec.data_path, None);
        assert!(spec.env.is_empty());
    }

    #[test]
    fn test_create_request_full() {
        let spec = request(json!({
            "name": "modded",
            "port": "25565",
            "env": { "TYPE": "FORGE", "VERSION": "1.20.1" },
            "dataPath": "/srv/modded",
            "image": "itzg/minecraft-server:java17",
        }))
        .into_spec("unused")
        .unwrap();
        assert_eq!(spec.image, "itzg/minecraft-server:java17");
        assert_eq!(spec.data_bind().as_deref(), Some("/srv/modded:/data"));
        assert_eq!(spec.env.get("TYPE").map(String::as_str), Some("FORGE"));
    }

    #[test]
    fn test_create_request_rejects_bad_input() {
        for body in [
            json!({ "name": "", "port": "25565" }),
            json!({ "name": "a", "port": "" }),
            json!({ "name": "a", "port": "0" }),
            json!({ "name": "a", "port": "70000" }),
            json!({ "name": "a", "port": "mc" }),
        ] {
            let err = request(body).into_spec("img").unwrap_err();
            assert!(matches!(err, ApiError::BadRequest(_)));
        }
    }

    #[tokio::test]
    async fn test_list_containers_includes_stopped() {
        let runtime = FakeRuntime {
            containers: vec![raw("0123456789abcdef", &["/lobby"]), raw("fedcba", &[])],
            ..Default::default()
        };
        let state = state(runtime);
        let Json(list) = list_containers(State(Arc::clone(&state))).await.unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].name, "lobby");
        assert_eq!(list[1].name, UNNAMED);

        let value = serde_json::to_value(&list[0]).unwrap();
        assert_eq!(value["id"], "0123456789");
        assert_eq!(value["status"], "Up 3 minutes");
    }

    #[tokio::test]
    async fn test_list_failure_is_500() {
        let runtime = FakeRuntime {
            fail_list: Some("daemon unavailable".to_string()),
            ..Default::default()
        };
        let err = list_containers(State(state(runtime))).await.unwrap_err();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("daemon unavailable"));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let runtime = FakeRuntime {
            containers: vec![raw("0123456789abcdef", &["/lobby"])],
            ..Default::default()
        };
        let state = state(runtime);

        let Json(started) = start_container(State(Arc::clone(&state)), Path("0123456789".into()))
            .await
            .unwrap();
        assert_eq!(started["message"], "container started");

        let Json(stopped) = stop_container(State(Arc::clone(&state)), Path("0123456789".into()))
            .await
            .unwrap();
        assert_eq!(stopped["message"], "container stopped");
    }

    #[tokio::test]
    async fn test_stop_unknown_container_is_500() {
        let err = stop_container(State(state(FakeRuntime::default())), Path("ghost".into()))
            .await
            .unwrap_err();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("No such container"));
    }

    #[tokio::test]
    async fn test_create_pulls_creates_and_starts() {
        let state = state(FakeRuntime::default());
        let body = Ok(Json(request(json!({ "name": "survival", "port": "25566" }))));

        let Json(reply) = create_container(State(Arc::clone(&state)), body)
            .await
            .unwrap();
        assert_eq!(reply["id"], "survival");
        assert_eq!(reply["message"], "server created and started");
    }

    #[tokio::test]
    async fn test_create_invalid_port_is_400() {
        let state = state(FakeRuntime::default());
        let body = Ok(Json(request(json!({ "name": "survival", "port": "abc" }))));

        let err = create_container(State(state), body).await.unwrap_err();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("invalid request"));
    }

    #[tokio::test]
    async fn test_create_pull_failure_is_500() {
        let runtime = FakeRuntime {
            fail_pull: Some("pull access denied".to_string()),
            ..Default::default()
        };
        let body = Ok(Json(request(json!({ "name": "survival", "port": "25566" }))));

        let err = create_container(State(state(runtime)), body)
            .await
            .unwrap_err();
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = body["error"].as_str().unwrap();
        assert!(message.starts_with("failed to pull image"));
        assert!(message.contains("pull access denied"));
    }
}
