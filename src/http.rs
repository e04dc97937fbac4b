use crate::collectors::HostProbe;
use crate::config::Config;
use crate::dashboard::render_dashboard;
use crate::metrics::Metrics;
use crate::pipeline::{run_pipeline, PipelineOutput};
use crate::report::ReportWriter;
use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::{routing::get, Json, Router};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};

/// Builds a fresh probe for every request so no sampling state is shared.
pub type ProbeFactory = Arc<dyn Fn() -> Box<dyn HostProbe + Send> + Send + Sync>;

#[derive(Clone)]
pub struct HttpAppState {
    pub config: Arc<Config>,
    pub metrics: Arc<Metrics>,
    pub writer: Arc<ReportWriter>,
    pub probe_factory: ProbeFactory,
}

impl HttpAppState {
    pub fn new(config: Config, metrics: Arc<Metrics>, probe_factory: ProbeFactory) -> Self {
        let writer = Arc::new(ReportWriter::new(config.report_path.clone()));
        Self {
            config: Arc::new(config),
            metrics,
            writer,
            probe_factory,
        }
    }
}

pub fn build_router(state: HttpAppState) -> Router {
    Router::new()
        .route("/", get(dashboard_handler))
        .route("/download_report", get(download_report))
        .route("/download_logs", get(download_logs))
        .route("/api/report", get(api_report_handler))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn dashboard_handler(State(state): State<HttpAppState>) -> Response {
    match collect(&state).await {
        Ok(output) => Html(render_dashboard(&output, state.config.refresh_secs)).into_response(),
        Err(response) => response,
    }
}

async fn api_report_handler(State(state): State<HttpAppState>) -> Response {
    match collect(&state).await {
        Ok(output) => Json(output).into_response(),
        Err(response) => response,
    }
}

async fn download_report(State(state): State<HttpAppState>) -> Response {
    serve_attachment(state.writer.path(), "Report not found").await
}

async fn download_logs(State(state): State<HttpAppState>) -> Response {
    serve_attachment(&state.config.log_path, "Log not found").await
}

async fn metrics_handler(State(state): State<HttpAppState>) -> Response {
    state.metrics.inc_scrape_count();
    match state.metrics.encode_metrics() {
        Ok(encoded) => {
            let mut response = Response::new(Body::from(encoded));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; version=0.0.4"),
            );
            response
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("ошибка кодирования метрик: {err}"),
        )
            .into_response(),
    }
}

/// Runs the pipeline on a blocking worker; the CPU interval must not stall
/// the async runtime.
async fn collect(state: &HttpAppState) -> Result<PipelineOutput, Response> {
    let factory = state.probe_factory.clone();
    let writer = state.writer.clone();
    let settings = state.config.sampler_settings();

    let joined = tokio::task::spawn_blocking(move || {
        let mut probe = factory();
        run_pipeline(&mut *probe, settings, &writer)
    })
    .await;

    match joined {
        Ok(Ok(output)) => {
            state.metrics.update_from_output(&output);
            Ok(output)
        }
        Ok(Err(err)) => {
            state.metrics.inc_report_write_error();
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("ошибка формирования отчёта: {err}"),
            )
                .into_response())
        }
        Err(err) => {
            error!(error = %err, "задача сбора завершилась с ошибкой");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "ошибка сбора данных".to_string(),
            )
                .into_response())
        }
    }
}

async fn serve_attachment(path: &Path, missing: &'static str) -> Response {
    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "download.txt".to_string());
            (
                [
                    (CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                    (
                        CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file_name}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {
            (StatusCode::NOT_FOUND, missing).into_response()
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "не удалось прочитать файл");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("не удалось прочитать файл: {err}"),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::fake::FakeProbe;
    use axum::body::to_bytes;
    use axum::http::Request;
    use tower::ServiceExt;

    struct TestApp {
        _dir: tempfile::TempDir,
        state: HttpAppState,
    }

    fn test_app_with(probe: FakeProbe) -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            report_path: dir.path().join("report").join("system_report.txt"),
            log_path: dir.path().join("log").join("system_report.log"),
            ..Config::default()
        };
        config.ensure_dirs().unwrap();
        let metrics = Metrics::new().expect("инициализация метрик");
        let factory: ProbeFactory =
            Arc::new(move || Box::new(probe.clone()) as Box<dyn HostProbe + Send>);
        TestApp {
            _dir: dir,
            state: HttpAppState::new(config, metrics, factory),
        }
    }

    fn test_app() -> TestApp {
        test_app_with(FakeProbe::default())
    }

    async fn get(app: &TestApp, uri: &str) -> (StatusCode, Option<String>, String) {
        let response = build_router(app.state.clone())
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let disposition = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, disposition, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_returns_ok() {
        let app = test_app();
        let (status, _, body) = get(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn dashboard_renders_and_writes_report() {
        let app = test_app();

        let (status, _, body) = get(&app, "/").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("System Report Dashboard"));
        assert!(body.contains("testhost"));
        let report = std::fs::read_to_string(&app.state.config.report_path).unwrap();
        assert!(report.starts_with("===== SYSTEM REPORT =====\n"));
    }

    #[tokio::test]
    async fn report_download_is_404_until_first_run() {
        let app = test_app();

        let (status, _, body) = get(&app, "/download_report").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Report not found");

        get(&app, "/").await;
        let (status, disposition, body) = get(&app, "/download_report").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=\"system_report.txt\"")
        );
        assert!(body.contains("===== TOP PROCESSES ====="));
    }

    #[tokio::test]
    async fn log_download_follows_same_contract() {
        let app = test_app();

        let (status, _, body) = get(&app, "/download_logs").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, "Log not found");

        std::fs::write(&app.state.config.log_path, "2026-10-19T10:00:00Z INFO started\n").unwrap();
        let (status, disposition, body) = get(&app, "/download_logs").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            disposition.as_deref(),
            Some("attachment; filename=\"system_report.log\"")
        );
        assert!(body.contains("started"));
    }

    #[tokio::test]
    async fn api_report_returns_json() {
        let mut probe = FakeProbe::default();
        probe.battery = None;
        let app = test_app_with(probe);

        let (status, _, body) = get(&app, "/api/report").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["snapshots"]["battery"]["status"], "absent");
        assert_eq!(json["snapshots"]["disks"].as_array().unwrap().len(), 3);
        assert_eq!(json["presence"]["subsystems"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn metrics_reflect_last_run() {
        let app = test_app();
        get(&app, "/").await;

        let (status, _, body) = get(&app, "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("sysreport_pipeline_runs_total 1"));
        assert!(body.contains("sysreport_disk_count 3"));
    }

    #[tokio::test]
    async fn report_write_failure_is_500() {
        let app = test_app();
        std::fs::remove_dir_all(app.state.config.report_path.parent().unwrap()).unwrap();

        let (status, _, _) = get(&app, "/").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let (_, _, metrics) = get(&app, "/metrics").await;
        assert!(metrics.contains("sysreport_report_write_errors_total 1"));
    }
}
