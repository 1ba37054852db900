use std::{net::TcpListener, sync::Arc};

use actix_web::{App, HttpServer, dev::Server, web};
use deployer_telemetry::metrics::init_metrics_handle;
use tracing::info;
use tracing_actix_web::TracingLogger;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    config::ApiConfig,
    k8s::{K8sClient, http::HttpK8sClient},
    routes::{
        ErrorMessage, MessageResponse,
        deployments::{DeployRequest, DeployResponse, deploy},
        health_check::health_check,
        metrics::metrics,
        namespaces::{
            CreateNamespaceRequest, ReadNamespacesResponse, create_namespace, delete_namespace,
            read_all_namespaces,
        },
        status::{ReadStatusResponse, read_status},
    },
    span_builder::ApiRootSpanBuilder,
    workloads::{
        reconciler::DeployAction,
        status::{ContainerLifecycle, ContainerStatusSnapshot, PodStatusSnapshot},
    },
};

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    /// Binds the listener, connects to the cluster and builds the server.
    ///
    /// Fails if no Kubernetes configuration can be found, since every
    /// endpoint except the health check needs the cluster.
    pub async fn build(config: ApiConfig) -> Result<Self, anyhow::Error> {
        let listener = TcpListener::bind(config.application.address())?;
        let port = listener.local_addr()?.port();

        let k8s_client = Arc::new(HttpK8sClient::new().await?) as Arc<dyn K8sClient>;
        info!("connected to the kubernetes api server");

        let server = run(config, listener, k8s_client).await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

/// Starts the HTTP server on `listener`.
///
/// The Kubernetes client is created once by the caller and shared by every
/// worker, which lets tests run the server against an in-memory cluster.
pub async fn run(
    config: ApiConfig,
    listener: TcpListener,
    k8s_client: Arc<dyn K8sClient>,
) -> Result<Server, anyhow::Error> {
    let config = web::Data::new(config);
    let k8s_client: web::Data<dyn K8sClient> = k8s_client.into();
    let metrics_handle = init_metrics_handle()?;

    #[derive(OpenApi)]
    #[openapi(
        paths(
            crate::routes::health_check::health_check,
            crate::routes::metrics::metrics,
            crate::routes::namespaces::create_namespace,
            crate::routes::namespaces::read_all_namespaces,
            crate::routes::namespaces::delete_namespace,
            crate::routes::deployments::deploy,
            crate::routes::status::read_status,
        ),
        components(schemas(
            ErrorMessage,
            MessageResponse,
            CreateNamespaceRequest,
            ReadNamespacesResponse,
            DeployRequest,
            DeployResponse,
            DeployAction,
            ReadStatusResponse,
            PodStatusSnapshot,
            ContainerStatusSnapshot,
            ContainerLifecycle,
        ))
    )]
    struct ApiDoc;

    let openapi = ApiDoc::openapi();

    let server = HttpServer::new(move || {
        let tracing_logger = TracingLogger::<ApiRootSpanBuilder>::new();
        App::new()
            .wrap(
                sentry::integrations::actix::Sentry::builder()
                    .capture_server_errors(true)
                    .start_transaction(true)
                    .finish(),
            )
            .wrap(tracing_logger)
            .service(health_check)
            .service(metrics)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", openapi.clone()),
            )
            .service(
                web::scope("v1")
                    //namespaces
                    .service(create_namespace)
                    .service(read_all_namespaces)
                    .service(delete_namespace)
                    //deployments
                    .service(deploy)
                    //status
                    .service(read_status),
            )
            .app_data(config.clone())
            .app_data(k8s_client.clone())
            .app_data(web::ThinData(metrics_handle.clone()))
    })
    .listen(listener)?
    .run();

    Ok(server)
}
