//! Core types and value objects for desktop automation.
//!
//! Defines computer actions, their wire envelopes, and the task model the
//! scheduler works against.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// =============================================================================
// Actions
// =============================================================================

/// A screen position in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: i32,
    pub y: i32,
}

impl Coordinates {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Whether a press action pushes a button/key down or releases it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Press {
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

fn default_count() -> u32 {
    1
}

/// One discrete thing to do to the desktop.
///
/// On the wire this is a JSON object tagged by `"action"`, e.g.
/// `{"action":"click_mouse","button":"left","coordinates":{"x":10,"y":20}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ComputerAction {
    MoveMouse {
        coordinates: Coordinates,
    },
    TraceMouse {
        path: Vec<Coordinates>,
        #[serde(default)]
        hold_keys: Vec<String>,
    },
    ClickMouse {
        #[serde(default)]
        coordinates: Option<Coordinates>,
        button: MouseButton,
        #[serde(default = "default_count")]
        click_count: u32,
        #[serde(default)]
        hold_keys: Vec<String>,
    },
    PressMouse {
        #[serde(default)]
        coordinates: Option<Coordinates>,
        button: MouseButton,
        press: Press,
    },
    DragMouse {
        path: Vec<Coordinates>,
        button: MouseButton,
        #[serde(default)]
        hold_keys: Vec<String>,
    },
    Scroll {
        #[serde(default)]
        coordinates: Option<Coordinates>,
        direction: ScrollDirection,
        #[serde(default = "default_count")]
        scroll_count: u32,
        #[serde(default)]
        hold_keys: Vec<String>,
    },
    TypeKeys {
        keys: Vec<String>,
        /// Delay between keys in milliseconds.
        #[serde(default)]
        delay: Option<u64>,
    },
    PressKeys {
        keys: Vec<String>,
        press: Press,
    },
    TypeText {
        text: String,
        #[serde(default)]
        delay: Option<u64>,
        /// Sensitive text is never logged.
        #[serde(default)]
        sensitive: bool,
    },
    PasteText {
        text: String,
    },
    Wait {
        /// Milliseconds.
        duration: u64,
    },
    Screenshot,
    CursorPosition,
    Application {
        application: String,
    },
    WriteFile {
        path: String,
        /// Base64 file content.
        data: String,
    },
    ReadFile {
        path: String,
    },
}

impl ComputerAction {
    pub fn kind(&self) -> ActionKind {
        match self {
            ComputerAction::MoveMouse { .. } => ActionKind::MoveMouse,
            ComputerAction::TraceMouse { .. } => ActionKind::TraceMouse,
            ComputerAction::ClickMouse { .. } => ActionKind::ClickMouse,
            ComputerAction::PressMouse { .. } => ActionKind::PressMouse,
            ComputerAction::DragMouse { .. } => ActionKind::DragMouse,
            ComputerAction::Scroll { .. } => ActionKind::Scroll,
            ComputerAction::TypeKeys { .. } => ActionKind::TypeKeys,
            ComputerAction::PressKeys { .. } => ActionKind::PressKeys,
            ComputerAction::TypeText { .. } => ActionKind::TypeText,
            ComputerAction::PasteText { .. } => ActionKind::PasteText,
            ComputerAction::Wait { .. } => ActionKind::Wait,
            ComputerAction::Screenshot => ActionKind::Screenshot,
            ComputerAction::CursorPosition => ActionKind::CursorPosition,
            ComputerAction::Application { .. } => ActionKind::Application,
            ComputerAction::WriteFile { .. } => ActionKind::WriteFile,
            ComputerAction::ReadFile { .. } => ActionKind::ReadFile,
        }
    }
}

/// The tag of a [`ComputerAction`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    MoveMouse,
    TraceMouse,
    ClickMouse,
    PressMouse,
    DragMouse,
    Scroll,
    TypeKeys,
    PressKeys,
    TypeText,
    PasteText,
    Wait,
    Screenshot,
    CursorPosition,
    Application,
    WriteFile,
    ReadFile,
}

impl ActionKind {
    pub const ALL: [ActionKind; 16] = [
        ActionKind::MoveMouse,
        ActionKind::TraceMouse,
        ActionKind::ClickMouse,
        ActionKind::PressMouse,
        ActionKind::DragMouse,
        ActionKind::Scroll,
        ActionKind::TypeKeys,
        ActionKind::PressKeys,
        ActionKind::TypeText,
        ActionKind::PasteText,
        ActionKind::Wait,
        ActionKind::Screenshot,
        ActionKind::CursorPosition,
        ActionKind::Application,
        ActionKind::WriteFile,
        ActionKind::ReadFile,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::MoveMouse => "move_mouse",
            ActionKind::TraceMouse => "trace_mouse",
            ActionKind::ClickMouse => "click_mouse",
            ActionKind::PressMouse => "press_mouse",
            ActionKind::DragMouse => "drag_mouse",
            ActionKind::Scroll => "scroll",
            ActionKind::TypeKeys => "type_keys",
            ActionKind::PressKeys => "press_keys",
            ActionKind::TypeText => "type_text",
            ActionKind::PasteText => "paste_text",
            ActionKind::Wait => "wait",
            ActionKind::Screenshot => "screenshot",
            ActionKind::CursorPosition => "cursor_position",
            ActionKind::Application => "application",
            ActionKind::WriteFile => "write_file",
            ActionKind::ReadFile => "read_file",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown action kind: {}", s))
    }
}

// =============================================================================
// Wire envelopes
// =============================================================================

/// An inbound action request from a client connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Client-chosen correlation id. Must not collide with an outstanding one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub action: ComputerAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    Error,
}

/// Structured error returned to a client in place of data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    /// Machine-readable code, e.g. `connection_closed`.
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// The outcome of one action, as relayed back to the requesting client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub id: String,
    pub action: ActionKind,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl ActionResponse {
    pub fn ok(id: impl Into<String>, action: ActionKind, data: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            action,
            status: ResponseStatus::Ok,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: impl Into<String>, action: ActionKind, error: ResponseError) -> Self {
        Self {
            id: id.into(),
            action,
            status: ResponseStatus::Error,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }
}

// =============================================================================
// Tasks
// =============================================================================

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    ScheduledWait,
    Queued,
    Running,
    NeedsHelp,
    NeedsReview,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// Ready to be picked by the scheduler.
    pub fn is_ready(self) -> bool {
        matches!(self, TaskStatus::Pending | TaskStatus::Queued)
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::ScheduledWait => write!(f, "scheduled_wait"),
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::NeedsHelp => write!(f, "needs_help"),
            TaskStatus::NeedsReview => write!(f, "needs_review"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "scheduled_wait" => Ok(TaskStatus::ScheduledWait),
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "needs_help" => Ok(TaskStatus::NeedsHelp),
            "needs_review" => Ok(TaskStatus::NeedsReview),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// Task priority. Variants are declared in ascending order so the derived
/// `Ord` ranks `Urgent` highest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskPriority::Low => write!(f, "low"),
            TaskPriority::Medium => write!(f, "medium"),
            TaskPriority::High => write!(f, "high"),
            TaskPriority::Urgent => write!(f, "urgent"),
        }
    }
}

/// A file attached to a task, materialized on the desktop before it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFile {
    pub name: String,
    /// Base64 file content.
    pub data: String,
}

/// A unit of agent work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub description: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub queued_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
    #[serde(default)]
    pub files: Vec<TaskFile>,
}

/// A conditional status write against a task store.
///
/// When `expected` is set the write only applies if the task is still in
/// that status; otherwise the store reports a conflict.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub expected: Option<TaskStatus>,
    pub status: TaskStatus,
    pub queued_at: Option<DateTime<Utc>>,
    pub executed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl TaskUpdate {
    pub fn to(status: TaskStatus) -> Self {
        Self {
            expected: None,
            status,
            queued_at: None,
            executed_at: None,
            error: None,
        }
    }

    pub fn expecting(mut self, expected: TaskStatus) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn queued_at(mut self, at: DateTime<Utc>) -> Self {
        self.queued_at = Some(at);
        self
    }

    pub fn executed_at(mut self, at: DateTime<Utc>) -> Self {
        self.executed_at = Some(at);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

// =============================================================================
// Tests
// =============================================================================
