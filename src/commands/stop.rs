//! `playpen stop` - stop a session without attaching

use crate::backend::{ExecutionBackend, HttpBackend};
use crate::config::Config;
use crate::error::{PlaypenError, Result};
use crate::session::parse_session_ref;

use colored::Colorize;

/// Issues a best-effort stop for the session named by a share URL or id
///
/// The user-visible contract is "this console no longer follows that
/// session"; a failed backend acknowledgement is reported but not fatal.
pub async fn stop(config: Config, target: String) -> Result<()> {
    let Some(session_id) = parse_session_ref(&target) else {
        return Err(PlaypenError::InvalidUrl(format!(
            "no session id found in '{target}'"
        ))
        .into());
    };

    let backend = HttpBackend::new(&config.backend)?;
    match backend.stop(&session_id).await {
        Ok(()) => println!("{} {}", "Stopped".green().bold(), session_id),
        Err(error) => {
            tracing::warn!(%session_id, %error, "best-effort stop failed");
            println!(
                "{} {} ({})",
                "Stop sent".yellow(),
                session_id,
                "backend did not acknowledge".dimmed()
            );
        }
    }
    Ok(())
}
