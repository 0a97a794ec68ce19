//! Reference-script training
//!
//! Finished scripts can be added to the service's reference library so later
//! generations imitate their structure and hook style.

use anyhow::{bail, Context, Result};
use std::path::Path;
use studio_client::transport::TrainingApi;
use studio_client::{TrainingReceipt, TrainingScript};

/// Script text from a file or from the command line, exactly one of them
pub async fn script_text(file: Option<&Path>, inline: Option<String>) -> Result<String> {
    match (file, inline) {
        (Some(path), None) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display())),
        (None, Some(text)) => Ok(text),
        (Some(_), Some(_)) => bail!("give the script either as --file or as --script, not both"),
        (None, None) => bail!("no script given (use --file or --script)"),
    }
}

/// Upload one training script
pub async fn upload(api: &dyn TrainingApi, script: &TrainingScript) -> Result<TrainingReceipt> {
    script.validate()?;
    let receipt = api
        .train_script(script)
        .await
        .with_context(|| format!("training upload of '{}' failed", script.title))?;
    tracing::info!(
        script_id = %receipt.script_id,
        mode = %script.mode,
        hook_type = %script.hook_type,
        "training script stored"
    );
    Ok(receipt)
}
