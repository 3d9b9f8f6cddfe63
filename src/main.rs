use anyhow::Result;
use tracing::{info, warn};

use kube_inspection::alerting::{fetch_signals, AlertResolver, ResolvedSignals};
use kube_inspection::config::load_config;
use kube_inspection::inspector::{Inspector, InspectorSettings};
use kube_inspection::notify::{send_notification, Notification};
use kube_inspection::report::{FileReportSink, ReportSink};
use kube_inspection::template::load_template;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cfg = load_config()?;
    let task = cfg.task_name.clone();
    let template = load_template(&cfg.template_path)?;
    info!(
        "[{}] template {:?} with {} clusters",
        task,
        template.name,
        template.kubernetes.len()
    );

    // feed errors are logged and the run continues without signals
    let signals = match &cfg.alert_feed {
        Some(feed) => match fetch_signals(feed, &AlertResolver::new(), &task).await {
            Ok(signals) => signals,
            Err(e) => {
                warn!("[{}] proceeding without alert signals: {}", task, e);
                ResolvedSignals::default()
            }
        },
        None => {
            info!("[{}] no alert feed configured", task);
            ResolvedSignals::default()
        }
    };

    let inspector = Inspector::new(InspectorSettings::from(&cfg));
    let outcome = inspector.run(&template, &signals).await;

    let sink = FileReportSink::new(&cfg.report_dir);
    sink.store(&outcome.report)?;

    let notification = Notification {
        title: format!("Kubernetes inspection - {}", outcome.report.global.name),
        text: outcome.digest_text(),
        attachment: Some(sink.path_for(&outcome.report.id)),
    };
    if let Err(e) = send_notification(&cfg.notify, &notification).await {
        warn!("[{}] notification failed: {:#}", task, e);
    }

    info!("[{}] inspection finished, rating {}", task, outcome.report.global.rating);
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .try_init();
}
