//! Command handlers for the `script-studio` binary

use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use studio_client::transport::{HttpTransport, SessionApi};
use studio_client::{
    Attachment, ChatRole, GenerationRequest, HookType, ScriptMode, TrainingScript,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::chat::ChatOutcome;
use crate::cli::{Cli, Command, GenerateArgs, TrainArgs};
use crate::config::StudioConfig;
use crate::controller::{Clarification, JobOutcome, StudioController, StudioState};
use crate::gateway::SessionGateway;
use crate::session::SessionId;
use crate::store::{LocalSessionStore, MemorySessionStore, SqliteSessionStore};
use crate::training;

pub async fn run(cli: Cli) -> Result<()> {
    let mut config = StudioConfig::from_env()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if cli.local_sessions {
        config.remote_sessions = false;
    }

    let ephemeral = cli.ephemeral;
    let controller = || build_controller(&config, ephemeral);

    match cli.command {
        Command::Generate(args) => generate(&controller()?, args).await,
        Command::History => history(&controller()?).await,
        Command::Show { id } => show(&controller()?, &id.parse()?).await,
        Command::Delete { id } => delete(&controller()?, &id.parse()?).await,
        Command::Chat {
            id,
            variant,
            message,
        } => chat(&controller()?, &id.parse()?, variant, &message).await,
        Command::Train(args) => train(&config, args).await,
    }
}

/// Wire the HTTP transport, the session stores and the controller together
pub fn build_controller(config: &StudioConfig, ephemeral: bool) -> Result<StudioController> {
    let transport = Arc::new(HttpTransport::new(config.transport_config())?);

    let local: Arc<dyn LocalSessionStore> = if ephemeral {
        Arc::new(MemorySessionStore::new())
    } else {
        Arc::new(SqliteSessionStore::open(config.session_db_path())?)
    };
    let remote: Option<Arc<dyn SessionApi>> = if config.remote_sessions {
        Some(transport.clone() as Arc<dyn SessionApi>)
    } else {
        None
    };

    tracing::debug!(
        api_url = %config.api_url,
        remote_sessions = config.remote_sessions,
        ephemeral,
        "controller configured"
    );

    Ok(StudioController::new(
        transport.clone(),
        transport,
        SessionGateway::new(remote, local),
        config.tail_policy,
    ))
}

async fn train(config: &StudioConfig, args: TrainArgs) -> Result<()> {
    let mode: ScriptMode = args.mode.parse()?;
    let hook_type: HookType = args.hook_type.parse()?;
    let text = training::script_text(args.file.as_deref(), args.script).await?;
    let script = TrainingScript::new(args.title, text)
        .with_mode(mode)
        .with_hook_type(hook_type);

    let transport = HttpTransport::new(config.transport_config())?;
    let receipt = training::upload(&transport, &script).await?;

    println!("Stored training script {}", receipt.script_id);
    if !receipt.meta_preview.skeleton.is_empty() {
        println!("Skeleton: {}", receipt.meta_preview.skeleton);
    }
    Ok(())
}

async fn generate(controller: &StudioController, args: GenerateArgs) -> Result<()> {
    let mode: ScriptMode = args.mode.parse()?;
    let mut request = GenerationRequest::new(args.topic)
        .with_notes(args.notes)
        .with_mode(mode)
        .with_skip_research(args.skip_research);
    for path in &args.files {
        let attachment = Attachment::from_path(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        request = request.with_attachment(attachment);
    }

    let mut progress = controller.subscribe();
    let printer = tokio::spawn(async move {
        let mut last = String::new();
        loop {
            match progress.recv().await {
                Ok(update) if update.status != last => {
                    eprintln!("[{}] {}", update.phase, update.status);
                    last = update.status;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut choose = args.choose;
    let mut outcome = controller.submit(request).await;
    let result = loop {
        match outcome {
            Ok(JobOutcome::NeedsInput(clarification)) => {
                let option = pick_option(&clarification, choose.take()).await?;
                outcome = controller.select_option(&option).await;
            }
            Ok(JobOutcome::Completed { .. }) => break Ok(()),
            Ok(JobOutcome::Failed(message)) => break Err(anyhow!("generation failed: {}", message)),
            Ok(JobOutcome::Superseded) => break Err(anyhow!("generation was superseded")),
            Err(err) => break Err(err.into()),
        }
    };
    printer.abort();
    result?;

    print_state(&controller.snapshot().await);
    Ok(())
}

/// Resolve a clarification from `--choose` or an interactive prompt
async fn pick_option(clarification: &Clarification, choose: Option<usize>) -> Result<String> {
    if let Some(n) = choose {
        return n
            .checked_sub(1)
            .and_then(|i| clarification.options.get(i))
            .cloned()
            .ok_or_else(|| anyhow!("--choose {} is not one of the offered options", n));
    }

    println!("\n{}", clarification.message);
    for (i, option) in clarification.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
    println!("Enter a number or type a topic:");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let Some(line) = lines.next_line().await? else {
        bail!("no answer given");
    };
    let line = line.trim();
    let picked = line
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| clarification.options.get(i).cloned());
    Ok(picked.unwrap_or_else(|| line.to_string()))
}

async fn history(controller: &StudioController) -> Result<()> {
    let sessions = controller.list_history().await;
    if sessions.is_empty() {
        println!("No saved sessions");
        return Ok(());
    }
    for session in sessions {
        let created = session
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<44} {}  {:<13} {}",
            session.id.to_string(),
            created,
            session.mode.as_str(),
            session.topic
        );
    }
    Ok(())
}

async fn show(controller: &StudioController, id: &SessionId) -> Result<()> {
    if !controller.load_session(id).await? {
        bail!("session {} not found", id);
    }
    let state = controller.snapshot().await;
    print_state(&state);

    for (number, thread) in state.chat_history() {
        if thread.is_empty() {
            continue;
        }
        println!("\n--- Chat, script {} ---", number);
        for message in thread {
            let who = match message.role {
                ChatRole::User => "you",
                ChatRole::Assistant => "editor",
            };
            println!("{}: {}", who, message.content);
        }
    }
    Ok(())
}

async fn delete(controller: &StudioController, id: &SessionId) -> Result<()> {
    if controller.delete_session(id).await? {
        println!("Deleted {}", id);
        Ok(())
    } else {
        bail!("session {} could not be deleted", id)
    }
}

async fn chat(
    controller: &StudioController,
    id: &SessionId,
    variant: usize,
    message: &str,
) -> Result<()> {
    if !controller.load_session(id).await? {
        bail!("session {} not found", id);
    }

    match controller.send_chat(variant, message).await? {
        ChatOutcome::Replied {
            reply,
            script_updated,
        } => {
            println!("{}", reply.content);
            if script_updated {
                let state = controller.snapshot().await;
                if let Some(script) = state.scripts.get(variant - 1) {
                    println!("\n--- Updated script {} ---\n{}", variant, script);
                }
            }
        }
        ChatOutcome::Failed { notice } => println!("{}", notice.content),
        ChatOutcome::Discarded => println!("Reply discarded"),
    }
    Ok(())
}

fn print_state(state: &StudioState) {
    println!("\nTopic: {} ({})", state.topic, state.mode);
    if let Some(session) = &state.current_session {
        println!("Session: {}", session);
    }
    if !state.facts.is_empty() {
        println!("Research: {} facts, {} sources", state.facts.len(), state.sources.len());
    }
    if let Some(ranking) = &state.hook_ranking {
        println!("Best hook: script {}", ranking.best);
    }
    if state.dropped_records > 0 {
        println!("Skipped {} malformed stream records", state.dropped_records);
    }

    for (i, script) in state.scripts.iter().enumerate() {
        let angle = state.angle_for(i);
        println!("\n=== Script {}: {} ===", i + 1, angle.name);
        if !angle.focus.is_empty() {
            println!("Focus: {}", angle.focus);
        }
        println!("{}", script);
    }
    if state.scripts.is_empty() && !state.final_script.is_empty() {
        println!("\n{}", state.final_script);
    }
    if let Some(draft) = &state.draft_script {
        println!("\n=== Draft (before optimization) ===\n{}", draft);
    }
}
