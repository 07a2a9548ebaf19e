use axum::{Router, routing::get};
use checkout::{Callback, Checkout, Webhook};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(checkouts: &[Arc<dyn Checkout>], callback: Arc<dyn Callback>) -> Router {
    let mut app = Router::new().route("/health", get(health));

    for checkout in checkouts {
        let hook = Webhook::new(checkout.clone(), callback.clone());
        let path = format!("/webhooks/{}", hook.name());
        tracing::info!("Mounting {}", path);
        app = app.route(&path, hook.route());
    }

    app.layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use checkout::Payment;
    use checkout::anypay::Anypay;
    use checkout::paymaster::Paymaster;
    use serde_json::json;
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn app(seen: Arc<Mutex<Vec<String>>>) -> Router {
        let checkouts: Vec<Arc<dyn Checkout>> = vec![
            Arc::new(Anypay::new("1".into(), "key".into())),
            Arc::new(Paymaster::new("tok".into(), "m".into())),
        ];
        let callback = move |p: Payment| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(format!("{}:{}", p.checkout, p.id));
                Ok::<_, anyhow::Error>(())
            }
        };
        router(&checkouts, Arc::new(callback))
    }

    #[tokio::test]
    async fn health_is_ok() {
        let response = app(Arc::default())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"OK");
    }

    #[tokio::test]
    async fn notification_reaches_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let body = json!({
            "id": 555,
            "created": "2023-02-01T12:04:05Z",
            "status": "Settled",
            "amount": { "value": 10, "currency": "RUB" },
            "invoice": { "description": "test" }
        });

        let response = app(seen.clone())
            .oneshot(
                Request::post("/webhooks/paymaster")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*seen.lock().unwrap(), ["paymaster:555"]);
    }

    #[tokio::test]
    async fn forged_notification_is_forbidden() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let response = app(seen.clone())
            .oneshot(
                Request::post("/webhooks/anypay?pay_id=1&amount=100&sign=deadbeef")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_provider_is_not_mounted() {
        let response = app(Arc::default())
            .oneshot(Request::post("/webhooks/qiwi").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn webhooks_accept_post_only() {
        let response = app(Arc::default())
            .oneshot(Request::get("/webhooks/anypay").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
