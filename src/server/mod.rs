//! HTTP service exposing the contact store.
//!
//! Every request is a full load-mutate-save cycle against the JSON file.
//! Requests are not serialised against each other, so two mutations racing
//! on the same file can lose one of them.

pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    http::{header::CONTENT_TYPE, Method},
    routing::{delete, get, put},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::store::Store;

use routes::{create_handler, delete_handler, list_handler, toggle_favorite_handler};

pub struct ServerState {
    pub store: Store,
}

pub fn router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/contactos", get(list_handler).post(create_handler))
        .route("/api/contactos/{id}", delete(delete_handler))
        .route("/api/contactos/{id}/favorito", put(toggle_favorite_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(address: &str, store: Store) -> Result<()> {
    info!(store = %store.path().display(), "Initializing state...");
    let state = Arc::new(ServerState { store });
    let app = router(state);

    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server terminated unexpectedly")?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(err) => {
                error!(error = %err, "failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                error!(error = %err, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::blocking::Client;
    use reqwest::StatusCode;
    use serde_json::{json, Value};
    use tempfile::TempDir;
    use tokio::runtime::Runtime;

    use super::*;
    use crate::client::{ContactService, HttpContactService};
    use crate::contact::{Contact, NewContact};

    /// Running service bound to an ephemeral port.
    struct TestServer {
        _runtime: Runtime,
        _dir: TempDir,
        base_url: String,
        store_path: std::path::PathBuf,
    }

    impl TestServer {
        fn start(initial: &str) -> Self {
            let dir = TempDir::new().unwrap();
            let store_path = dir.path().join("contacts.json");
            if !initial.is_empty() {
                std::fs::write(&store_path, initial).unwrap();
            }

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();
            let listener = runtime
                .block_on(TcpListener::bind("127.0.0.1:0"))
                .unwrap();
            let addr = listener.local_addr().unwrap();
            let state = Arc::new(ServerState {
                store: Store::new(&store_path),
            });
            runtime.spawn(async move {
                axum::serve(listener, router(state)).await.unwrap();
            });

            Self {
                _runtime: runtime,
                _dir: dir,
                base_url: format!("http://{addr}"),
                store_path,
            }
        }

        fn url(&self, path: &str) -> String {
            format!("{}{}", self.base_url, path)
        }

        fn service(&self) -> HttpContactService {
            HttpContactService::new(&self.base_url, Some(Duration::from_secs(5))).unwrap()
        }

        fn stored(&self) -> Value {
            serde_json::from_str(&std::fs::read_to_string(&self.store_path).unwrap()).unwrap()
        }
    }

    const ANA: &str = r#"{"contactos":[{"id":1,"nombre":"Ana","apellido":"Lopez","telefono":"+34 600111222","favorito":false}]}"#;

    #[test]
    fn test_list_coerces_ids() {
        let server = TestServer::start(
            r#"{"contactos":[{"id":"3","nombre":"Ana","apellido":"Lopez","telefono":"1","favorito":true}]}"#,
        );
        let body: Value = Client::new()
            .get(server.url("/api/contactos"))
            .send()
            .unwrap()
            .json()
            .unwrap();
        assert_eq!(body[0]["id"], json!(3));
        assert_eq!(body[0]["favorito"], json!(true));
    }

    #[test]
    fn test_list_empty_when_store_missing() {
        let server = TestServer::start("");
        assert!(server.service().list().unwrap().is_empty());
    }

    #[test]
    fn test_create_scenario() {
        let server = TestServer::start(ANA);
        let response = Client::new()
            .post(server.url("/api/contactos"))
            .json(&json!({"nombre": "Beto", "apellido": "Ruiz", "telefono": "+34 123456789"}))
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created: Contact = response.json().unwrap();
        assert_eq!(created.first_name, "Beto");
        assert!(!created.favorite);
        assert_ne!(created.id, 1);

        let all = server.service().list().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all.iter().filter(|c| c.id == created.id).count(), 1);
        assert_eq!(server.stored()["contactos"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_rapid_creates_get_unique_ids() {
        let server = TestServer::start("");
        let service = server.service();
        let mut ids = Vec::new();
        for n in 0..5 {
            let created = service
                .create(&NewContact {
                    first_name: format!("Contacto {n}"),
                    last_name: String::new(),
                    phone: "+34 600000000".into(),
                    image: None,
                })
                .unwrap();
            ids.push(created.id);
        }
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let server = TestServer::start(ANA);
        let service = server.service();

        let first = service.toggle_favorite(1).unwrap().unwrap();
        assert!(first.favorite);
        assert_eq!(server.stored()["contactos"][0]["favorito"], json!(true));

        let second = service.toggle_favorite(1).unwrap().unwrap();
        assert!(!second.favorite);
        assert_eq!(server.stored()["contactos"][0]["favorito"], json!(false));
    }

    #[test]
    fn test_toggle_unknown_id_is_404() {
        let server = TestServer::start(ANA);
        let response = Client::new()
            .put(server.url("/api/contactos/99/favorito"))
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = response.json().unwrap();
        assert_eq!(body, json!({"message": "Contacto no encontrado"}));

        let response = Client::new()
            .put(server.url("/api/contactos/abc/favorito"))
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        assert!(server.service().toggle_favorite(99).unwrap().is_none());
    }

    #[test]
    fn test_delete_is_idempotent() {
        let server = TestServer::start(ANA);

        let response = Client::new()
            .delete(server.url("/api/contactos/99"))
            .send()
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().unwrap();
        assert_eq!(body, json!({"message": "Contacto eliminado"}));
        assert_eq!(server.service().list().unwrap().len(), 1);

        server.service().delete(1).unwrap();
        server.service().delete(1).unwrap();
        assert!(server.service().list().unwrap().is_empty());
        assert_eq!(server.stored(), json!({"contactos": []}));
    }

    const WITH_NAMELESS: &str = r#"{"contactos":[{"id":1,"apellido":"SinNombre","telefono":"+34 600000000","favorito":false},{"id":2,"nombre":"Ana","apellido":"Lopez","telefono":"+34 600111222","favorito":false}]}"#;

    #[test]
    fn test_mutations_keep_unreadable_records() {
        let server = TestServer::start(WITH_NAMELESS);
        let service = server.service();

        assert_eq!(service.list().unwrap().len(), 1);
        service.delete(99).unwrap();
        assert!(service.toggle_favorite(2).unwrap().unwrap().favorite);
        let created = service
            .create(&NewContact {
                first_name: "Beto".into(),
                last_name: String::new(),
                phone: "+34 123456789".into(),
                image: None,
            })
            .unwrap();
        assert_ne!(created.id, 1);
        service.delete(2).unwrap();

        let stored = server.stored();
        let records = stored["contactos"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["apellido"], json!("SinNombre"));
        assert!(records[0].get("nombre").is_none());
        assert_eq!(records[1]["nombre"], json!("Beto"));
    }

    #[test]
    fn test_controller_against_running_service() {
        use crate::contact::SyncStatus;
        use crate::controller::{ContactForm, Controller, LoadSource};

        let server = TestServer::start(ANA);
        let mut controller = Controller::new(server.service());
        assert_eq!(controller.load(), LoadSource::Service);

        let mut form = ContactForm::new("+34");
        form.first_name = "Beto".into();
        form.last_name = "Ruiz".into();
        form.digits = "123456789".into();
        let id = controller.submit_contact(&form).unwrap();
        assert_eq!(controller.get(id).unwrap().sync, SyncStatus::Synced);

        controller.request_toggle_favorite(id);
        controller.request_delete(1);
        controller.confirm();

        let stored = server.service().list().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].phone, "+34 123456789");
        assert!(stored[0].favorite);
        assert_eq!(controller.unsynced_count(), 0);
    }

    #[test]
    fn test_cors_preflight() {
        let server = TestServer::start("");
        let response = Client::new()
            .request(reqwest::Method::OPTIONS, server.url("/api/contactos"))
            .header("Origin", "http://localhost:5173")
            .header("Access-Control-Request-Method", "DELETE")
            .send()
            .unwrap();
        assert!(response.status().is_success());
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|v| v.to_str().ok()),
            Some("*")
        );
    }
}
