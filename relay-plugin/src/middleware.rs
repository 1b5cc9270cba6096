use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use futures::future::BoxFuture;
use tracing::Instrument;

/// The remainder of the chain a [`Middleware`] may invoke. Cloning a `Next` is
/// cheap (an `Arc` clone); a middleware that never calls it short-circuits the
/// request without ever reaching the pipeline handler.
#[derive(Clone)]
pub struct Next(Arc<dyn Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync>);

impl Next {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Request<Body>) -> BoxFuture<'static, Response> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub async fn run(&self, req: Request<Body>) -> Response {
        (self.0)(req).await
    }
}

/// A handler-to-handler transformer applied around the pipeline (§4.2,
/// glossary "Middleware"). Middleware is declared in a fixed order in config
/// and nests with the first declared outermost — see [`compose`].
#[async_trait]
pub trait Middleware: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, req: Request<Body>, next: Next) -> Response;
}

/// Builds the runtime middleware chain for a handler given its declared
/// middleware list (outermost first) and the innermost handler `Next`.
///
/// For `declared = [m1, m2, m3]` the resulting chain is `m1(m2(m3(handler)))`:
/// `m1` observes the request first and the response last (§8 property 2).
/// Middleware named in `trace` with a `true` value is wrapped in a
/// span-per-middleware (C11).
pub fn compose(declared: &[Arc<dyn Middleware>], trace: &HashMap<String, bool>, innermost: Next) -> Next {
    let mut current = innermost;
    for mw in declared.iter().rev() {
        let mw = Arc::clone(mw);
        let next = current.clone();
        let traced = trace.get(mw.name()).copied().unwrap_or(false);
        let name = mw.name().to_string();
        current = Next::new(move |req| {
            let mw = Arc::clone(&mw);
            let next = next.clone();
            let name = name.clone();
            if traced {
                let span = tracing::info_span!("middleware", middleware = %name);
                Box::pin(async move { mw.handle(req, next).await }.instrument(span))
            } else {
                Box::pin(async move { mw.handle(req, next).await })
            }
        });
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use std::sync::Mutex;

    struct Recorder {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait]
    impl Middleware for Recorder {
        fn name(&self) -> &str {
            self.name
        }

        async fn handle(&self, req: Request<Body>, next: Next) -> Response {
            self.order.lock().unwrap().push(self.name);
            let resp = next.run(req).await;
            self.order.lock().unwrap().push(self.name);
            resp
        }
    }

    #[tokio::test]
    async fn first_declared_is_outermost() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let m1: Arc<dyn Middleware> = Arc::new(Recorder {
            name: "m1",
            order: order.clone(),
        });
        let m2: Arc<dyn Middleware> = Arc::new(Recorder {
            name: "m2",
            order: order.clone(),
        });
        let m3: Arc<dyn Middleware> = Arc::new(Recorder {
            name: "m3",
            order: order.clone(),
        });

        let handler = Next::new(|_req| Box::pin(async { Response::new(Body::empty()) }));
        let chain = compose(&[m1, m2, m3], &HashMap::new(), handler);

        let req = Request::builder().body(Body::empty()).unwrap();
        let _ = chain.run(req).await;

        let observed = order.lock().unwrap().clone();
        assert_eq!(observed, vec!["m1", "m2", "m3", "m3", "m2", "m1"]);
    }
}
