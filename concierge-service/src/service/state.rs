//! State carried through a single dialogue turn.

use std::time::Instant;

use serde::Serialize;
use strum::{Display, IntoStaticStr};

use crate::tools::{ToolCall, ToolResult};

/// Where a turn currently is in the dialogue state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TurnPhase {
    AwaitingModel,
    /// The model answered in text; the turn ends here
    Direct,
    ToolSelected,
    ToolExecuted,
    FinalResponse,
    Done,
}

/// Accumulated result of one turn.
///
/// After the first model call exactly one of `result` and `tool_calls` is set.
/// `final_response` is only produced when `tool_result` is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TurnState {
    #[serde(skip)]
    pub input: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_result: Option<ToolResult>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_response: Option<String>,
}

impl TurnState {
    pub fn new(input: Vec<String>) -> Self {
        Self {
            input,
            ..Default::default()
        }
    }

    /// The first requested tool call, the only one that is executed
    pub fn first_tool_call(&self) -> Option<&ToolCall> {
        self.tool_calls.as_ref().and_then(|calls| calls.first())
    }
}

/// Bookkeeping for a turn in flight, used for logging and metrics
#[derive(Debug)]
pub struct ActiveTurn {
    pub id: String,
    pub phase: TurnPhase,
    pub started_at: Instant,
}

impl ActiveTurn {
    pub fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            phase: TurnPhase::AwaitingModel,
            started_at: Instant::now(),
        }
    }
}
