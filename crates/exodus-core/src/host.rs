//! Host capability interfaces.
//!
//! The engine never reaches into the chat client directly. The embedding
//! layer supplies these capabilities at construction time; none of them are
//! global state. Raw guild objects cross the boundary as `serde_json::Value`
//! because host object shapes vary between client builds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

/// Access to the host's guild store and guild actions.
#[async_trait]
pub trait GuildGateway: Send + Sync {
    /// Lists the raw guild objects known to the host.
    ///
    /// A failure here is treated by the session as "no guilds", not as a
    /// fatal condition.
    async fn list_guilds(&self) -> Result<Vec<Value>>;

    /// Leaves a single guild. Fallible; the engine never retries.
    async fn leave_guild(&self, guild_id: &str) -> Result<()>;
}

/// Best-effort user-visible notices.
///
/// Never load-bearing for correctness; implementations swallow their own
/// delivery failures.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// The request handed to a modal confirmation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub title: String,
    pub body: String,
    pub confirm_label: String,
    pub cancel_label: String,
}

impl ConfirmRequest {
    /// The standard prompt for leaving `count` selected guilds.
    pub fn leave_guilds(count: usize) -> Self {
        Self {
            title: "Leave selected guilds?".to_string(),
            body: format!(
                "This will leave {count} guild(s). You may need an invite to re-join."
            ),
            confirm_label: "Leave".to_string(),
            cancel_label: "Cancel".to_string(),
        }
    }
}

/// Optional modal confirmation capability.
///
/// When the host provides one, the session delegates the destructive-action
/// decision to it and skips the arm/confirm fallback.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    /// Returns `true` when the user accepted.
    async fn confirm(&self, request: &ConfirmRequest) -> bool;
}
