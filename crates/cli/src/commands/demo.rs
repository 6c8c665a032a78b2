// `livecode demo`: scripted two-collaborator session on the shared
// in-process store.

use anyhow::Context;
use clap::Args;
use livecode_common::types::{AccessLevel, Language, Permission};
use livecode_session::buffer::{BufferHandle, YrsBufferService};
use livecode_session::config::ClientConfig;
use livecode_session::identity::MemoryIdentityProvider;
use livecode_session::resolver::{Location, MemoryLocation};
use livecode_session::runtime::init_shared_store;
use livecode_session::store::{MemoryConnection, MemoryStore};
use livecode_session::{SessionError, SessionSurface, WorkspaceSession};
use serde::Serialize;
use tracing::info;

use crate::output::{self, OutputFormat};

type DemoSession = WorkspaceSession<MemoryConnection, MemoryIdentityProvider, MemoryLocation>;

#[derive(Debug, Args)]
pub struct DemoArgs {
    /// Default permission the owner switches to before a stranger arrives.
    #[arg(long, value_name = "LEVEL", default_value = "PRIVATE")]
    lock_to: AccessLevel,

    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoReport {
    pub share_url: String,
    pub steps: Vec<DemoStep>,
    pub buffer_language: Language,
    pub buffer_text: String,
    pub owner_view: SessionSurface,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoStep {
    pub actor: String,
    pub action: &'static str,
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission: Option<Permission>,
}

pub fn run(args: DemoArgs, config: ClientConfig) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let report = tokio::runtime::Handle::try_current()
        .map(|h| h.block_on(run_demo(init_shared_store(), &config, args.lock_to)))
        .unwrap_or_else(|_| {
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to build tokio runtime")?
                .block_on(run_demo(init_shared_store(), &config, args.lock_to))
        });

    match report {
        Ok(report) => {
            output::print_output(format, &report, format_human)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

fn open_tab(
    store: &MemoryStore,
    device: &MemoryIdentityProvider,
    url_path: &str,
    config: &ClientConfig,
) -> DemoSession {
    WorkspaceSession::new(store.connect(), device.clone(), MemoryLocation::new(url_path))
        .with_config(config)
}

pub async fn run_demo(
    store: MemoryStore,
    config: &ClientConfig,
    lock_to: AccessLevel,
) -> anyhow::Result<DemoReport> {
    let mut steps = Vec::new();

    let owner_device = MemoryIdentityProvider::new();
    let owner = open_tab(&store, &owner_device, "/", config);
    let joined = owner.join().await.context("owner failed to join")?;
    let url_path = owner.location().path();
    let share_url = config.share_url(joined.workspace.handle())?.to_string();
    info!(handle = %joined.workspace.handle(), %share_url, "demo workspace created");
    steps.push(DemoStep {
        actor: joined.user.name.clone(),
        action: "opens /",
        outcome: format!("created workspace {url_path}"),
        permission: Some(joined.permission),
    });

    let guest = open_tab(&store, &MemoryIdentityProvider::new(), &url_path, config);
    let guest_joined = guest.join().await.context("guest failed to join")?;
    steps.push(DemoStep {
        actor: guest_joined.user.name.clone(),
        action: "follows the share link",
        outcome: format!("joined with default {}", guest_joined.default_permission),
        permission: Some(guest_joined.permission),
    });

    let second_tab = open_tab(&store, &owner_device, &url_path, config);
    second_tab.join().await.context("owner's second tab failed to join")?;
    let tabs = owner
        .online_users()
        .await?
        .into_iter()
        .find(|user| user.id == joined.user.uid)
        .map_or(0, |user| user.connections);
    steps.push(DemoStep {
        actor: joined.user.name.clone(),
        action: "opens a second tab",
        outcome: format!("{tabs} live connections"),
        permission: None,
    });
    second_tab.store().disconnect().await;

    let owner_service = YrsBufferService::new(owner.store().clone());
    let guest_service = YrsBufferService::new(guest.store().clone());
    let owner_buffers = owner.buffers()?;
    let guest_buffers = guest.buffers()?;
    let language = owner_buffers.active();
    let owner_buffer = owner_buffers
        .coordinator(language)
        .context("owner has no buffer for the default language")?
        .mount(&owner_service)
        .await?;
    let guest_buffer = guest_buffers
        .coordinator(language)
        .context("guest has no buffer for the default language")?
        .mount(&guest_service)
        .await?;
    guest_buffer.insert(0, &format!("{} guest was here\n", line_comment(language))).await?;
    owner_buffer.sync().await?;
    steps.push(DemoStep {
        actor: guest_joined.user.name.clone(),
        action: "edits the shared buffer",
        outcome: format!("owner sees {} characters", owner_buffer.text().chars().count()),
        permission: None,
    });

    owner.set_default_permission(lock_to).await?;
    let stranger = open_tab(&store, &MemoryIdentityProvider::new(), &url_path, config);
    let outcome = match stranger.join().await {
        Ok(joined) => format!("admitted as {}", joined.permission),
        Err(SessionError::AccessRefused) => {
            let redirected = stranger.location().navigations().join(", ");
            format!("refused ({}) and sent to {redirected}", SessionError::AccessRefused)
        }
        Err(error) => return Err(error).context("stranger join failed"),
    };
    steps.push(DemoStep {
        actor: "stranger".into(),
        action: "visits after the owner changes the default",
        outcome,
        permission: None,
    });

    Ok(DemoReport {
        share_url,
        steps,
        buffer_language: language,
        buffer_text: owner_buffer.text(),
        owner_view: owner.surface().await?,
    })
}

fn line_comment(language: Language) -> &'static str {
    match language {
        Language::Py => "#",
        Language::Cpp | Language::Java => "//",
    }
}

fn format_human(report: &DemoReport) -> String {
    let mut lines = vec![format!("Share link: {}", report.share_url)];
    for (idx, step) in report.steps.iter().enumerate() {
        let role = step.permission.map(|p| format!(" [{}]", p.label())).unwrap_or_default();
        lines.push(format!("{}. {} {}{role}: {}", idx + 1, step.actor, step.action, step.outcome));
    }

    let me = Some(report.owner_view.user.uid.as_str());
    lines.push(String::new());
    lines.push(format!("Users ({}):", report.owner_view.online_users.len()));
    for user in &report.owner_view.online_users {
        let role = user.role_label().map(|label| format!(" - {label}")).unwrap_or_default();
        lines.push(format!("  {}{role}", user.display_line(me)));
    }

    lines.push(String::new());
    lines.push(format!("{} buffer:", report.buffer_language));
    lines.extend(report.buffer_text.lines().map(|line| format!("  | {line}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_walks_every_step() {
        let report =
            run_demo(MemoryStore::new(), &ClientConfig::default(), AccessLevel::Private)
                .await
                .unwrap();

        assert_eq!(report.steps.len(), 5);
        assert_eq!(report.steps[0].permission, Some(Permission::Owner));
        assert_eq!(report.steps[1].permission, Some(Permission::ReadWrite));
        assert_eq!(report.steps[2].outcome, "2 live connections");
        assert!(report.steps[4].outcome.starts_with("refused (This file is private.)"));
        assert!(report.share_url.starts_with("http://localhost:3000/"));
        assert!(report.buffer_text.starts_with("// guest was here\n"));
        assert_eq!(report.owner_view.default_permission, AccessLevel::Private);
        assert_eq!(report.owner_view.online_users.len(), 2);
    }

    #[tokio::test]
    async fn read_only_default_still_admits_strangers() {
        let config = ClientConfig { default_language: Language::Py, ..ClientConfig::default() };
        let report = run_demo(MemoryStore::new(), &config, AccessLevel::Read).await.unwrap();

        assert_eq!(report.steps[4].outcome, "admitted as READ");
        assert_eq!(report.buffer_language, Language::Py);
        assert!(report.buffer_text.starts_with("# guest was here\n"));
        assert_eq!(report.owner_view.online_users.len(), 3);
    }

    #[tokio::test]
    async fn human_rendering_lists_steps_users_and_buffer() {
        let report =
            run_demo(MemoryStore::new(), &ClientConfig::default(), AccessLevel::Private)
                .await
                .unwrap();
        let text = format_human(&report);

        assert!(text.starts_with("Share link: http://localhost:3000/"));
        assert!(text.contains("1. "));
        assert!(text.contains("(Me) (Online)"));
        assert!(text.contains("cpp buffer:"));
        assert!(text.contains("  | // guest was here"));
    }

    #[tokio::test]
    async fn owner_cannot_be_the_lock_level() {
        let error = run_demo(MemoryStore::new(), &ClientConfig::default(), AccessLevel::Owner)
            .await
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<SessionError>(),
            Some(&SessionError::InvalidDefault(AccessLevel::Owner))
        );
    }

    #[tokio::test]
    async fn json_report_carries_steps_and_owner_view() {
        let report =
            run_demo(MemoryStore::new(), &ClientConfig::default(), AccessLevel::Private)
                .await
                .unwrap();
        let line = output::render(OutputFormat::Json, &report, format_human).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();

        assert_eq!(parsed["steps"].as_array().unwrap().len(), 5);
        assert_eq!(parsed["steps"][0]["permission"], "OWNER");
        assert!(parsed["steps"][2].get("permission").is_none());
        assert_eq!(parsed["owner_view"]["default_permission"], "PRIVATE");
        assert_eq!(parsed["buffer_language"], "cpp");
    }
}
