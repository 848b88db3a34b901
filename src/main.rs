use std::{path::Path, process, sync::Arc};

use printcss_playground::{
    application::{
        compose::{ComposeTarget, PreviewAssets, compose},
        conversion::ConversionOrchestrator,
        error::AppError,
        preview::{BroadcastSurface, PreviewTarget},
        remote::ConversionBackend,
        session::{Session, SessionOptions},
        templates::TemplateLibrary,
    },
    config::{self, ComposeArgs, ComposeMode, ConvertArgs, Settings},
    domain::{document::SourceDocument, types::ToolId},
    infra::{
        assets,
        backend::HttpBackend,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
        watch::SourceWatcher,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Convert(args) => run_convert(settings, args).await,
        config::Command::Tools(_) => run_tools(settings).await,
        config::Command::Compose(args) => run_compose(settings, args).await,
    }
}

fn preview_assets(settings: &Settings) -> PreviewAssets {
    PreviewAssets {
        pagination_script_url: settings.preview.pagination_script_url.clone(),
        chrome_stylesheet: assets::preview_chrome_css().to_string(),
    }
}

async fn read_document(path: &Path) -> Result<SourceDocument, AppError> {
    let bytes = tokio::fs::read(path).await.map_err(InfraError::from)?;
    Ok(SourceDocument::from_export_bytes(&bytes)?)
}

async fn run_serve(settings: Settings) -> Result<(), AppError> {
    let backend: Arc<dyn ConversionBackend> = Arc::new(HttpBackend::new(&settings.backend.url)?);
    let templates = match settings.templates.dir.as_deref() {
        Some(dir) => TemplateLibrary::load_dir(dir)?,
        None => TemplateLibrary::empty(),
    };

    let target = Arc::new(PreviewTarget::new(
        preview_assets(&settings),
        settings.preview.compose_policy,
    ));
    let surface = Arc::new(BroadcastSurface::new());
    target.mount(surface.clone());

    let session = Arc::new(Session::new(
        backend,
        target,
        templates,
        SessionOptions {
            quiet_period: settings.preview.debounce,
            default_tool: settings.backend.default_tool.clone(),
            initial: SourceDocument::default(),
        },
    ));
    // Tool discovery runs in the background; the default tool works without it.
    drop(session.start());

    let watcher = match settings.watch.dir.as_deref() {
        Some(dir) => Some(SourceWatcher::start(dir, Arc::clone(&session)).await?),
        None => None,
    };

    let router = http::build_router(HttpState {
        session: Arc::clone(&session),
        surface,
    });
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(InfraError::from)?;
    info!(
        target = "printcss::server",
        addr = %settings.server.addr,
        backend = %settings.backend.url,
        tool = %settings.backend.default_tool,
        compose_policy = settings.preview.compose_policy.as_str(),
        debounce_ms = settings.preview.debounce.as_millis() as u64,
        "preview server listening"
    );

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = stop_rx.await;
            })
            .await
    });

    tokio::select! {
        joined = &mut server => {
            return match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
                Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
            };
        }
        _ = shutdown_signal() => {}
    }

    info!(target = "printcss::server", "shutting down");
    drop(watcher);
    session.shutdown();
    let _ = stop_tx.send(());

    // Open preview event streams never end on their own.
    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(Ok(Ok(()))) => Ok(()),
        Ok(Ok(Err(err))) => Err(AppError::unexpected(format!("server error: {err}"))),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server task failed: {err}"))),
        Err(_) => {
            warn!(
                target = "printcss::server",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out; dropping open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(target = "printcss::server", error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

async fn run_convert(settings: Settings, args: ConvertArgs) -> Result<(), AppError> {
    let document = read_document(&args.input).await?;
    let tool = match args.tool {
        Some(tool) => ToolId::new(tool)?,
        None => settings.backend.default_tool.clone(),
    };

    let orchestrator = ConversionOrchestrator::new(Arc::new(HttpBackend::new(&settings.backend.url)?));
    let job = orchestrator.convert_and_wait(document, tool).await;

    if let Some(detail) = job.error {
        let body = detail
            .body_text
            .as_deref()
            .map(|text| format!(" body {text}"))
            .unwrap_or_default();
        return Err(AppError::unexpected(format!(
            "conversion with `{}` failed: status {} {}{body}",
            job.tool, detail.status_code, detail.message
        )));
    }
    let pdf = job
        .result
        .ok_or_else(|| AppError::unexpected("conversion finished without a document"))?;

    tokio::fs::write(&args.output, &pdf.bytes)
        .await
        .map_err(InfraError::from)?;
    println!(
        "wrote {} bytes rendered by {} to {}",
        pdf.bytes.len(),
        pdf.tool,
        args.output.display()
    );
    Ok(())
}

async fn run_tools(settings: Settings) -> Result<(), AppError> {
    let backend = HttpBackend::new(&settings.backend.url)?;
    let tools = backend.supported_tools().await?;
    for tool in tools {
        let marker = if tool == settings.backend.default_tool {
            " (default)"
        } else {
            ""
        };
        println!("{tool}{marker}");
    }
    Ok(())
}

async fn run_compose(settings: Settings, args: ComposeArgs) -> Result<(), AppError> {
    let document = read_document(&args.input).await?;
    let assets = preview_assets(&settings);
    let target = match args.target {
        ComposeMode::Preview => ComposeTarget::Preview(&assets),
        ComposeMode::Export => ComposeTarget::Export,
    };
    let html = compose(&document, target);

    match args.output {
        Some(path) => tokio::fs::write(&path, html)
            .await
            .map_err(InfraError::from)?,
        None => println!("{html}"),
    }
    Ok(())
}
