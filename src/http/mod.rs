use std::sync::Arc;
use std::time::Instant;

use actix_web::error::{InternalError, JsonPayloadError, PathError};
use actix_web::http::StatusCode;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, ResponseError};

use crate::config::ServerConfig;
use crate::coordinator::OrderCoordinator;
use crate::errors::OrderError;
use crate::metrics::{health_handler, metrics_handler, Metrics};
use crate::models::NewOrder;

// ============================================================================
// HTTP API
// ============================================================================
//
// POST /orders        -> 201 Order | 400 | 500
// GET  /orders/{id}   -> 200 Order | 404 | 500
// GET  /health        -> 200
// GET  /metrics       -> 200 Prometheus text
//
// Error bodies are always {"error": "<message>"}.
// ============================================================================

impl ResponseError for OrderError {
    fn status_code(&self) -> StatusCode {
        match self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::NotFound(_) => StatusCode::NOT_FOUND,
            OrderError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            OrderError::Store(_) => "internal storage error".to_string(),
            other => other.to_string(),
        };
        HttpResponse::build(self.status_code()).json(serde_json::json!({ "error": message }))
    }
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    OrderError::Validation(err.to_string()).into()
}

fn path_error(err: PathError, _req: &HttpRequest) -> actix_web::Error {
    let response = HttpResponse::NotFound().json(serde_json::json!({ "error": "order not found" }));
    InternalError::from_response(err, response).into()
}

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(json_error))
        .app_data(web::PathConfig::default().error_handler(path_error))
        .route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/orders", web::post().to(create_order))
        .route("/orders/{id}", web::get().to(get_order));
}

async fn create_order(
    coordinator: web::Data<OrderCoordinator>,
    metrics: web::Data<Metrics>,
    body: web::Json<NewOrder>,
) -> Result<HttpResponse, OrderError> {
    let started = Instant::now();
    let draft = body.into_inner();
    draft.validate()?;

    let result = coordinator.create_order(draft).await;
    metrics.observe_request("create", started.elapsed().as_secs_f64());

    Ok(HttpResponse::Created().json(result?))
}

async fn get_order(
    coordinator: web::Data<OrderCoordinator>,
    metrics: web::Data<Metrics>,
    path: web::Path<i64>,
) -> Result<HttpResponse, OrderError> {
    let started = Instant::now();
    let id = path.into_inner();

    let result = coordinator.get_order(id).await;
    metrics.observe_request("get", started.elapsed().as_secs_f64());

    Ok(HttpResponse::Ok().json(result?))
}

pub async fn serve(
    config: &ServerConfig,
    coordinator: OrderCoordinator,
    metrics: Arc<Metrics>,
) -> std::io::Result<()> {
    let coordinator = web::Data::new(coordinator);
    let metrics = web::Data::from(metrics);

    tracing::info!(host = %config.host, port = config.port, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(coordinator.clone())
            .app_data(metrics.clone())
            .configure(routes)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::CoordinatorSettings;
    use crate::gateways::memory::{InMemoryCache, InMemoryOrderStore};
    use crate::messaging::recording::RecordingPublisher;
    use crate::models::Order;
    use actix_web::test;

    struct Fixture {
        store: Arc<InMemoryOrderStore>,
        cache: Arc<InMemoryCache>,
        metrics: Arc<Metrics>,
        coordinator: OrderCoordinator,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryOrderStore::new());
        let cache = Arc::new(InMemoryCache::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let coordinator = OrderCoordinator::new(
            store.clone(),
            cache.clone(),
            Arc::new(RecordingPublisher::new()),
            metrics.clone(),
            CoordinatorSettings::default(),
        );
        Fixture {
            store,
            cache,
            metrics,
            coordinator,
        }
    }

    macro_rules! app {
        ($fx:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::new($fx.coordinator.clone()))
                    .app_data(web::Data::from($fx.metrics.clone()))
                    .configure(routes),
            )
            .await
        };
    }

    fn alice() -> serde_json::Value {
        serde_json::json!({
            "customer_name": "Alice",
            "product_name": "Phone",
            "quantity": 2,
            "status": "Pending"
        })
    }

    #[actix_web::test]
    async fn test_create_then_get() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::post().uri("/orders").set_json(alice()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Order = test::read_body_json(resp).await;
        assert_eq!(created.id, 1);
        assert_eq!(created.customer_name, "Alice");

        let req = test::TestRequest::get().uri("/orders/1").to_request();
        let fetched: Order = test::call_and_read_body_json(&app, req).await;
        assert_eq!(fetched, created);
        assert_eq!(fx.store.fetches(), 0);
        assert_eq!(fx.metrics.orders_created.get(), 1);
    }

    #[actix_web::test]
    async fn test_unknown_order_is_404() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/orders/999").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "order 999 not found");
        assert_eq!(fx.cache.puts(), 0);
    }

    #[actix_web::test]
    async fn test_non_integer_id_is_404() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/orders/abc").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(fx.store.fetches(), 0);
    }

    #[actix_web::test]
    async fn test_malformed_body_is_400() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::post()
            .uri("/orders")
            .insert_header(("content-type", "application/json"))
            .set_payload("{\"customer_name\": ")
            .to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(fx.store.inserts(), 0);
    }

    #[actix_web::test]
    async fn test_invalid_quantity_is_400() {
        let fx = fixture();
        let app = app!(fx);

        let mut body = alice();
        body["quantity"] = serde_json::json!(0);
        let req = test::TestRequest::post().uri("/orders").set_json(body).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("quantity"));
        assert_eq!(fx.store.inserts(), 0);
    }

    #[actix_web::test]
    async fn test_store_outage_is_500() {
        let fx = fixture();
        fx.store.set_down(true);
        let app = app!(fx);

        let req = test::TestRequest::post().uri("/orders").set_json(alice()).to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(fx.cache.puts(), 0);
        assert_eq!(fx.metrics.store_failures.with_label_values(&["insert"]).get(), 1);
    }

    #[actix_web::test]
    async fn test_cache_outage_still_creates() {
        let fx = fixture();
        fx.cache.set_unreachable(true);
        let app = app!(fx);

        let req = test::TestRequest::post().uri("/orders").set_json(alice()).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);

        let req = test::TestRequest::get().uri("/orders/1").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(fx.store.fetches(), 1);
        assert_eq!(fx.metrics.cache_write_failures.get(), 2);
    }

    #[actix_web::test]
    async fn test_health() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, serde_json::json!({ "status": "healthy" }));
    }

    #[actix_web::test]
    async fn test_metrics_exposition() {
        let fx = fixture();
        let app = app!(fx);

        let req = test::TestRequest::post().uri("/orders").set_json(alice()).to_request();
        test::call_service(&app, req).await;

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let body = test::call_and_read_body(&app, req).await;
        let text = String::from_utf8(body.to_vec()).unwrap();

        assert!(text.contains("orders_created_total 1"));
        assert!(text.contains("order_request_duration_seconds"));
    }
}
