use std::collections::HashMap;
use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use relay_core::config::{HandlerConfig, PluginBindings};
use relay_core::context::AmbientContext;
use relay_core::{Envelope, RelayError, Role, StepContext};
use serde_json::Value;
use tracing::Instrument;

use crate::capability::Step;
use crate::dispatch::{DispatchOutcome, RoutingDispatcher};
use crate::manager::PluginManager;
use crate::middleware::{self, Middleware, Next};
use crate::step_factory::{ResolvedCapabilities, StepBuildOptions, StepFactory};

/// Step names resolved to built-in factories rather than plugin-provided steps (§4.2).
pub const BUILTIN_STEP_NAMES: &[&str] = &["sign", "validateSign", "validateSchema", "addRoute", "broadcast"];

struct BuiltStep {
    name: String,
    step: Arc<dyn Step>,
    traced: bool,
}

/// The request-body-bound request context limit. The body is always read
/// exhaustively into memory (§4.2 Serve step a); this bounds that buffer to
/// guard against unbounded request bodies exhausting memory.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// A built, request-ready handler produced by [`HandlerBuilder::build`].
/// Implements §4.2's Serve operation.
#[derive(Clone)]
pub struct Handler {
    steps: Arc<Vec<BuiltStep>>,
    middleware_entry: Next,
    default_sub_id: Option<String>,
    default_role: Role,
}

impl Handler {
    /// The axum entry point: runs the composed middleware chain, which
    /// eventually invokes the pipeline itself as the innermost `Next`.
    pub async fn serve(&self, req: Request<Body>) -> Response {
        self.middleware_entry.run(req).await
    }

    async fn run_pipeline(
        steps: Arc<Vec<BuiltStep>>,
        default_sub_id: Option<String>,
        default_role: Role,
        dispatcher: Option<Arc<dyn RoutingDispatcher>>,
        req: Request<Body>,
    ) -> Response {
        let method = req.method().to_string();
        let uri = req.uri().to_string();
        let ambient = req
            .extensions()
            .get::<AmbientContext>()
            .cloned()
            .unwrap_or_default();
        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect();

        let sub_id = ambient
            .get("subscriber_id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .filter(|s| !s.is_empty())
            .or(default_sub_id);

        let Some(sub_id) = sub_id else {
            return nack(
                Value::Null,
                &RelayError::BadRequest("no subscriber_id on the ambient context or handler default".into()),
                None,
                &HashMap::new(),
            );
        };

        let body = match to_bytes(req.into_body(), MAX_BODY_BYTES).await {
            Ok(b) => b,
            Err(e) => {
                return nack(
                    Value::Null,
                    &RelayError::BadRequest(format!("failed to read request body: {e}")),
                    ambient.message_id.as_deref(),
                    &HashMap::new(),
                )
            }
        };

        let mut ctx = StepContext::new(method, uri, sub_id, default_role);
        ctx.ambient = ambient;
        ctx.headers = headers;
        ctx.body = body.to_vec();

        for step in steps.iter() {
            let outcome = if step.traced {
                let span = tracing::info_span!("step", step = %step.name);
                step.step.run(&mut ctx).instrument(span).await
            } else {
                step.step.run(&mut ctx).await
            };
            if let Err(err) = outcome {
                return nack(
                    extract_context(&ctx.body),
                    &err,
                    ctx.ambient.message_id.as_deref(),
                    &ctx.response_headers,
                );
            }
        }

        if ctx.route.is_some() {
            match &dispatcher {
                Some(d) => match d.dispatch(&ctx).await {
                    Ok(DispatchOutcome::Forwarded(resp)) => resp,
                    Ok(DispatchOutcome::Published) => ack(extract_context(&ctx.body), &ctx.response_headers),
                    Err(err) => nack(
                        extract_context(&ctx.body),
                        &err,
                        ctx.ambient.message_id.as_deref(),
                        &ctx.response_headers,
                    ),
                },
                None => nack(
                    extract_context(&ctx.body),
                    &RelayError::Internal("route was set but no routing dispatcher is configured".into()),
                    ctx.ambient.message_id.as_deref(),
                    &ctx.response_headers,
                ),
            }
        } else {
            ack(extract_context(&ctx.body), &ctx.response_headers)
        }
    }
}

/// Echoes the inbound body's `context` field verbatim (§3 "Response envelope":
/// `context` is an opaque passthrough), or an empty object when the body is
/// not JSON or carries no `context` field.
fn extract_context(body: &[u8]) -> Value {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|v| v.get("context").cloned())
        .unwrap_or(Value::Object(Default::default()))
}

fn ack(context: Value, response_headers: &HashMap<String, String>) -> Response {
    let envelope = Envelope::ack(context);
    apply_headers(
        (StatusCode::OK, axum::Json(envelope)).into_response(),
        response_headers,
    )
}

fn nack(context: Value, err: &RelayError, message_id: Option<&str>, response_headers: &HashMap<String, String>) -> Response {
    let envelope = Envelope::nack(context, err, message_id);
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    apply_headers((status, axum::Json(envelope)).into_response(), response_headers)
}

fn apply_headers(mut resp: Response, headers: &HashMap<String, String>) -> Response {
    for (name, value) in headers {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::try_from(name.as_str()),
            axum::http::HeaderValue::try_from(value.as_str()),
        ) {
            resp.headers_mut().insert(name, value);
        }
    }
    resp
}

/// Composes named steps and middleware into a per-endpoint HTTP handler (C7).
pub struct HandlerBuilder {
    manager: Arc<PluginManager>,
    builtin_factories: HashMap<String, Arc<dyn StepFactory>>,
    dispatcher: Option<Arc<dyn RoutingDispatcher>>,
    opts: StepBuildOptions,
    /// Per-plugin-id config, sourced from `pluginManager.plugins[]` (§3 Plugin descriptor).
    descriptors: HashMap<String, HashMap<String, String>>,
}

impl HandlerBuilder {
    pub fn new(
        manager: Arc<PluginManager>,
        builtin_factories: HashMap<String, Arc<dyn StepFactory>>,
        dispatcher: Option<Arc<dyn RoutingDispatcher>>,
        opts: StepBuildOptions,
        descriptors: HashMap<String, HashMap<String, String>>,
    ) -> Self {
        Self {
            manager,
            builtin_factories,
            dispatcher,
            opts,
            descriptors,
        }
    }

    fn config_for(&self, id: &str) -> HashMap<String, String> {
        self.descriptors.get(id).cloned().unwrap_or_default()
    }

    async fn resolve_capabilities(&self, bindings: &PluginBindings) -> Result<ResolvedCapabilities, RelayError> {
        let mut caps = ResolvedCapabilities::default();

        if let Some(id) = &bindings.signer {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.signer = Some(
                cap.as_signer()
                    .ok_or_else(|| RelayError::Config(format!("plugin {id:?} bound as signer is not a Signer")))?,
            );
        }
        if let Some(id) = &bindings.sign_validator {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.sign_validator = Some(cap.as_sign_validator().ok_or_else(|| {
                RelayError::Config(format!("plugin {id:?} bound as signValidator is not a SignValidator"))
            })?);
        }
        if let Some(id) = &bindings.schema_validator {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.schema_validator = Some(cap.as_schema_validator().ok_or_else(|| {
                RelayError::Config(format!("plugin {id:?} bound as schemaValidator is not a SchemaValidator"))
            })?);
        }
        if let Some(id) = &bindings.router {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.router = Some(
                cap.as_router()
                    .ok_or_else(|| RelayError::Config(format!("plugin {id:?} bound as router is not a RouteResolver")))?,
            );
        }
        if let Some(id) = &bindings.publisher {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.publisher = Some(
                cap.as_publisher()
                    .ok_or_else(|| RelayError::Config(format!("plugin {id:?} bound as publisher is not a Publisher")))?,
            );
        }
        if let Some(id) = &bindings.cache {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.cache = Some(
                cap.as_cache()
                    .ok_or_else(|| RelayError::Config(format!("plugin {id:?} bound as cache is not a Cache")))?,
            );
        }
        if let Some(id) = &bindings.key_manager {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            caps.key_manager = Some(cap.as_key_manager().ok_or_else(|| {
                RelayError::Config(format!("plugin {id:?} bound as keyManager is not a KeyManager"))
            })?);
        }

        Ok(caps)
    }

    /// Build-time validation: every declared step's required capabilities must
    /// be instantiable, and every non-built-in step name must resolve to a
    /// plugin-provided step descriptor (§4.2).
    pub async fn build(&self, config: &HandlerConfig) -> Result<Handler, RelayError> {
        let caps = self.resolve_capabilities(&config.plugins).await?;

        let mut steps = Vec::with_capacity(config.steps.len());
        for name in &config.steps {
            let traced = config.trace.get(name).copied().unwrap_or(false);
            let step: Arc<dyn Step> = if BUILTIN_STEP_NAMES.contains(&name.as_str()) {
                let factory = self
                    .builtin_factories
                    .get(name)
                    .ok_or_else(|| RelayError::Config(format!("no built-in factory registered for step {name:?}")))?;
                factory.build(&caps, &self.opts).await?
            } else {
                let id = config
                    .plugins
                    .steps
                    .get(name)
                    .ok_or_else(|| RelayError::Config(format!("step {name:?} is not built-in and has no bound plugin id")))?;
                let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
                cap.as_step()
                    .ok_or_else(|| RelayError::Config(format!("plugin {id:?} bound to step {name:?} is not a Step")))?
            };
            steps.push(BuiltStep {
                name: name.clone(),
                step,
                traced,
            });
        }
        let steps = Arc::new(steps);

        let mut middlewares: Vec<Arc<dyn Middleware>> = Vec::with_capacity(config.middleware.len());
        for id in &config.middleware {
            let cap = self.manager.instantiate(id, &self.config_for(id)).await?;
            let mw = cap
                .as_middleware()
                .ok_or_else(|| RelayError::Config(format!("plugin {id:?} declared as middleware is not Middleware")))?;
            middlewares.push(mw);
        }

        let default_sub_id = config.subscriber_id.clone();
        let default_role = config.role.unwrap_or(Role::Bap);
        let dispatcher = self.dispatcher.clone();

        let pipeline_steps = Arc::clone(&steps);
        let innermost = Next::new(move |req| {
            let steps = Arc::clone(&pipeline_steps);
            let default_sub_id = default_sub_id.clone();
            let dispatcher = dispatcher.clone();
            Box::pin(Handler::run_pipeline(steps, default_sub_id, default_role, dispatcher, req))
        });

        let middleware_entry = middleware::compose(&middlewares, &config.trace, innermost);

        Ok(Handler {
            steps,
            middleware_entry,
            default_sub_id: config.subscriber_id.clone(),
            default_role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Step as StepCap;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use relay_core::config::HandlerType;
    use std::sync::Mutex;

    struct OrderedStep {
        name: &'static str,
        order: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    #[async_trait]
    impl StepCap for OrderedStep {
        fn name(&self) -> &str {
            self.name
        }

        async fn run(&self, _ctx: &mut StepContext) -> Result<(), RelayError> {
            self.order.lock().unwrap().push(self.name);
            if self.fail {
                return Err(RelayError::BadRequest(format!("{} failed", self.name)));
            }
            Ok(())
        }
    }

    fn handler_config(steps: Vec<&str>) -> HandlerConfig {
        HandlerConfig {
            handler_type: HandlerType::Std,
            registry_url: None,
            subscriber_id: Some("np-1".into()),
            role: Some(Role::Bap),
            steps: steps.into_iter().map(String::from).collect(),
            plugins: PluginBindings::default(),
            trace: HashMap::new(),
            middleware: Vec::new(),
        }
    }

    #[tokio::test]
    async fn steps_run_in_declared_order_and_short_circuit_on_failure() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let manager = Arc::new(PluginManager::new());

        let mut builtin_factories: HashMap<String, Arc<dyn StepFactory>> = HashMap::new();

        struct FixedFactory(Arc<Mutex<Vec<&'static str>>>, &'static str, bool);
        #[async_trait]
        impl StepFactory for FixedFactory {
            async fn build(&self, _caps: &ResolvedCapabilities, _opts: &StepBuildOptions) -> Result<Arc<dyn Step>, RelayError> {
                Ok(Arc::new(OrderedStep {
                    name: self.1,
                    order: Arc::clone(&self.0),
                    fail: self.2,
                }))
            }
        }

        builtin_factories.insert(
            "sign".into(),
            Arc::new(FixedFactory(Arc::clone(&order), "sign", false)),
        );
        builtin_factories.insert(
            "validateSign".into(),
            Arc::new(FixedFactory(Arc::clone(&order), "validateSign", true)),
        );
        builtin_factories.insert(
            "addRoute".into(),
            Arc::new(FixedFactory(Arc::clone(&order), "addRoute", false)),
        );

        let builder = HandlerBuilder::new(
            manager,
            builtin_factories,
            None,
            StepBuildOptions::default(),
            HashMap::new(),
        );

        let config = handler_config(vec!["sign", "validateSign", "addRoute"]);
        let handler = builder.build(&config).await.unwrap();

        let req = Request::builder()
            .method("POST")
            .uri("/handler")
            .body(Body::from("{}"))
            .unwrap();
        let resp = handler.serve(req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let observed = order.lock().unwrap().clone();
        assert_eq!(observed, vec!["sign", "validateSign"]);
    }

    #[test]
    fn extract_context_falls_back_to_empty_object() {
        assert_eq!(extract_context(b"not json"), Value::Object(Default::default()));
        assert_eq!(
            extract_context(br#"{"context":{"action":"search"}}"#),
            serde_json::json!({"action":"search"})
        );
    }
}
