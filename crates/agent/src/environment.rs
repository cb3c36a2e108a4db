//! The controlled browser environment
//!
//! The browser automation primitives live outside this crate; callers implement
//! [`BrowserEnvironment`] over whatever drives their page. The agent only calls
//! these operations, never implements them.

use crate::error::Result;
use crate::types::AgentAction;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

/// Instruction used to ask the page whether more content can be loaded
pub const HAS_MORE_INSTRUCTION: &str =
    "Check if a control that loads more results exists on the page, scrolling down as needed.";

/// Browser viewport, reported to computer-use models as the display size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 768,
        }
    }
}

/// An action proposed by observing the page (selector-targeted, not coordinate-targeted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDescriptor {
    pub selector: String,
    pub description: String,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub arguments: Vec<String>,
}

/// Browser operations the agent and the search orchestrator consume.
///
/// One environment (page/context) must not be shared by two concurrent
/// searches; serialising access is the caller's job.
#[async_trait]
pub trait BrowserEnvironment: Send + Sync {
    async fn navigate_to(&self, url: &str) -> Result<()>;

    /// Perform an action previously proposed by [`observe_candidate_actions`](Self::observe_candidate_actions)
    async fn perform_action(&self, action: &ActionDescriptor) -> Result<()>;

    /// Propose the single action matching `instruction`, or `None` when nothing matches
    async fn observe_candidate_actions(&self, instruction: &str)
        -> Result<Option<ActionDescriptor>>;

    /// Extract page data matching a JSON schema
    async fn extract_structured(&self, instruction: &str, schema: &Value) -> Result<Value>;

    /// Execute a coordinate-level action proposed by a computer-use model
    async fn perform_computer_action(&self, action: &AgentAction) -> Result<()>;

    /// Base64-encoded PNG of the current viewport
    async fn screenshot(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    fn viewport(&self) -> Viewport {
        Viewport::default()
    }
}

fn has_more_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "hasMore": {
                "type": "boolean",
                "description": "true if a control that loads more results is on the page, false if not"
            }
        },
        "required": ["hasMore"]
    })
}

/// Repeatedly trigger a "load more" style control until the page stops offering one.
///
/// Each iteration observes a candidate action for `instruction` and performs it.
/// When observation fails, the page is asked whether more content exists and the
/// loop stops if it does not. Returns the number of actions performed.
pub async fn expand_listing(
    environment: &dyn BrowserEnvironment,
    instruction: &str,
    max_iterations: u32,
) -> Result<u32> {
    let mut expansions = 0;

    for iteration in 0..max_iterations {
        match environment.observe_candidate_actions(instruction).await {
            Ok(Some(action)) => {
                debug!("Expansion {}: {}", iteration + 1, action.description);
                environment.perform_action(&action).await?;
                expansions += 1;
            }
            Ok(None) => {
                debug!("No expansion control found after {iteration} iterations");
                break;
            }
            Err(e) => {
                warn!("Failed to observe expansion control: {e}");
                let probe = environment
                    .extract_structured(HAS_MORE_INSTRUCTION, &has_more_schema())
                    .await?;
                let has_more = probe
                    .get("hasMore")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if !has_more {
                    break;
                }
            }
        }
    }

    info!("Listing expanded {expansions} time(s)");
    Ok(expansions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Page whose observe calls are scripted; counts performed actions and probes
    struct ScriptedPage {
        observations: Mutex<VecDeque<Result<Option<ActionDescriptor>>>>,
        has_more: bool,
        performed: Mutex<u32>,
        probes: Mutex<u32>,
    }

    impl ScriptedPage {
        fn new(observations: Vec<Result<Option<ActionDescriptor>>>, has_more: bool) -> Self {
            Self {
                observations: Mutex::new(observations.into()),
                has_more,
                performed: Mutex::new(0),
                probes: Mutex::new(0),
            }
        }
    }

    fn see_more() -> ActionDescriptor {
        ActionDescriptor {
            selector: "xpath=/html/body/main/button".to_string(),
            description: "See more button".to_string(),
            method: Some("click".to_string()),
            arguments: vec![],
        }
    }

    #[async_trait]
    impl BrowserEnvironment for ScriptedPage {
        async fn navigate_to(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn perform_action(&self, _action: &ActionDescriptor) -> Result<()> {
            *self.performed.lock().unwrap() += 1;
            Ok(())
        }

        async fn observe_candidate_actions(
            &self,
            _instruction: &str,
        ) -> Result<Option<ActionDescriptor>> {
            self.observations
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(None))
        }

        async fn extract_structured(&self, _instruction: &str, _schema: &Value) -> Result<Value> {
            *self.probes.lock().unwrap() += 1;
            Ok(json!({"hasMore": self.has_more}))
        }

        async fn perform_computer_action(&self, _action: &AgentAction) -> Result<()> {
            Ok(())
        }

        async fn screenshot(&self) -> Result<String> {
            Ok(String::new())
        }

        async fn current_url(&self) -> Result<String> {
            Ok("about:blank".to_string())
        }
    }

    #[tokio::test]
    async fn test_expands_until_no_control() {
        let page = ScriptedPage::new(
            vec![Ok(Some(see_more())), Ok(Some(see_more())), Ok(None)],
            false,
        );
        let expansions = expand_listing(&page, "Click See more", 10).await.unwrap();
        assert_eq!(expansions, 2);
        assert_eq!(*page.probes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stops_at_iteration_limit() {
        let page = ScriptedPage::new((0..5).map(|_| Ok(Some(see_more()))).collect(), false);
        let expansions = expand_listing(&page, "Click See more", 3).await.unwrap();
        assert_eq!(expansions, 3);
    }

    #[tokio::test]
    async fn test_observe_failure_without_more_content_stops() {
        let page = ScriptedPage::new(
            vec![Err(AgentError::environment("observe timed out"))],
            false,
        );
        let expansions = expand_listing(&page, "Click See more", 10).await.unwrap();
        assert_eq!(expansions, 0);
        assert_eq!(*page.probes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_observe_failure_with_more_content_continues() {
        let page = ScriptedPage::new(
            vec![
                Err(AgentError::environment("observe timed out")),
                Ok(Some(see_more())),
                Ok(None),
            ],
            true,
        );
        let expansions = expand_listing(&page, "Click See more", 10).await.unwrap();
        assert_eq!(expansions, 1);
        assert_eq!(*page.probes.lock().unwrap(), 1);
    }
}
