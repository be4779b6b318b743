//! Action executors.
//!
//! Defines the [`ActionExecutor`] trait the automation worker drives, and
//! [`HeadlessDesktop`], an executor for hosts without an input driver.

use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use deskpilot_core::config::{expand_home, DesktopConfig};
use serde_json::{json, Value};

use crate::error::ActionError;
use crate::types::{ComputerAction, Coordinates};

/// Executes one computer action against a desktop.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    /// Run the action and return its result payload.
    async fn execute(&self, action: &ComputerAction) -> Result<Value, ActionError>;
}

/// A virtual desktop: tracks a cursor, honors waits, and keeps files in a
/// sandboxed directory. Input actions are accepted and logged but reach no
/// real display.
pub struct HeadlessDesktop {
    root: PathBuf,
    width: i32,
    height: i32,
    cursor: Mutex<Coordinates>,
}

impl HeadlessDesktop {
    pub fn new(root: impl Into<PathBuf>, screen_width: u32, screen_height: u32) -> Self {
        Self {
            root: root.into(),
            width: i32::try_from(screen_width.max(1)).unwrap_or(i32::MAX),
            height: i32::try_from(screen_height.max(1)).unwrap_or(i32::MAX),
            cursor: Mutex::new(Coordinates::new(0, 0)),
        }
    }

    pub fn from_config(config: &DesktopConfig) -> Self {
        Self::new(
            expand_home(&config.root_dir),
            config.screen_width,
            config.screen_height,
        )
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cursor(&self) -> Coordinates {
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn move_to(&self, target: Coordinates) -> Coordinates {
        let clamped = Coordinates::new(
            target.x.clamp(0, self.width - 1),
            target.y.clamp(0, self.height - 1),
        );
        *self.cursor.lock().unwrap_or_else(PoisonError::into_inner) = clamped;
        clamped
    }

    fn move_along(&self, path: &[Coordinates]) -> Result<Coordinates, ActionError> {
        let last = path
            .last()
            .ok_or_else(|| ActionError::InvalidPayload("Path must not be empty".to_string()))?;
        Ok(self.move_to(*last))
    }

    fn position(&self, at: Option<Coordinates>) -> Coordinates {
        match at {
            Some(target) => self.move_to(target),
            None => self.cursor(),
        }
    }

    /// Resolve a desktop-relative path inside the root. Absolute paths and
    /// `..` components are rejected.
    fn resolve(&self, relative: &str) -> Result<PathBuf, ActionError> {
        let path = Path::new(relative);
        if relative.is_empty() {
            return Err(ActionError::InvalidPayload("File path is empty".to_string()));
        }
        for component in path.components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(ActionError::InvalidPayload(format!(
                        "Path escapes the desktop root: {}",
                        relative
                    )))
                }
            }
        }
        Ok(self.root.join(path))
    }

    async fn write_file(&self, relative: &str, data: &str) -> Result<Value, ActionError> {
        let target = self.resolve(relative)?;
        let bytes = STANDARD
            .decode(data)
            .map_err(|e| ActionError::InvalidPayload(format!("Invalid base64 data: {}", e)))?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;

        tracing::info!(path = %relative, bytes = bytes.len(), "File written");
        Ok(json!({ "path": relative, "bytes": bytes.len() }))
    }

    async fn read_file(&self, relative: &str) -> Result<Value, ActionError> {
        let target = self.resolve(relative)?;
        let bytes = tokio::fs::read(&target).await?;
        Ok(json!({
            "path": relative,
            "bytes": bytes.len(),
            "data": STANDARD.encode(&bytes),
        }))
    }
}

fn cursor_json(at: Coordinates) -> Value {
    json!({ "x": at.x, "y": at.y })
}

/// Total time to type `count` items at `delay` milliseconds apiece.
fn typing_delay(delay: u64, count: usize) -> Result<Duration, ActionError> {
    u64::try_from(count)
        .ok()
        .and_then(|count| delay.checked_mul(count))
        .map(Duration::from_millis)
        .ok_or_else(|| ActionError::InvalidPayload(format!("Typing delay too large: {}ms", delay)))
}

fn require_keys(keys: &[String]) -> Result<(), ActionError> {
    if keys.is_empty() {
        return Err(ActionError::InvalidPayload(
            "At least one key is required".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl ActionExecutor for HeadlessDesktop {
    async fn execute(&self, action: &ComputerAction) -> Result<Value, ActionError> {
        match action {
            ComputerAction::MoveMouse { coordinates } => Ok(cursor_json(self.move_to(*coordinates))),
            ComputerAction::TraceMouse { path, .. } | ComputerAction::DragMouse { path, .. } => {
                Ok(cursor_json(self.move_along(path)?))
            }
            ComputerAction::ClickMouse {
                coordinates,
                click_count,
                ..
            } => {
                if *click_count == 0 {
                    return Err(ActionError::InvalidPayload(
                        "click_count must be at least 1".to_string(),
                    ));
                }
                Ok(cursor_json(self.position(*coordinates)))
            }
            ComputerAction::PressMouse { coordinates, .. } => {
                Ok(cursor_json(self.position(*coordinates)))
            }
            ComputerAction::Scroll { coordinates, .. } => Ok(cursor_json(self.position(*coordinates))),
            ComputerAction::TypeKeys { keys, delay } => {
                require_keys(keys)?;
                if let Some(ms) = delay {
                    tokio::time::sleep(typing_delay(*ms, keys.len())?).await;
                }
                Ok(json!({ "keys": keys.len() }))
            }
            ComputerAction::PressKeys { keys, .. } => {
                require_keys(keys)?;
                Ok(json!({ "keys": keys.len() }))
            }
            ComputerAction::TypeText {
                text,
                delay,
                sensitive,
            } => {
                let chars = text.chars().count();
                if let Some(ms) = delay {
                    tokio::time::sleep(typing_delay(*ms, chars)?).await;
                }
                if *sensitive {
                    tracing::debug!(chars, "Typed sensitive text");
                } else {
                    tracing::debug!(chars, text = %text, "Typed text");
                }
                Ok(json!({ "chars": chars }))
            }
            ComputerAction::PasteText { text } => Ok(json!({ "chars": text.chars().count() })),
            ComputerAction::Wait { duration } => {
                tokio::time::sleep(Duration::from_millis(*duration)).await;
                Ok(Value::Null)
            }
            ComputerAction::Screenshot => Ok(json!({
                "image": "",
                "width": self.width,
                "height": self.height,
            })),
            ComputerAction::CursorPosition => Ok(cursor_json(self.cursor())),
            ComputerAction::WriteFile { path, data } => self.write_file(path, data).await,
            ComputerAction::ReadFile { path } => self.read_file(path).await,
            ComputerAction::Application { .. } => Err(ActionError::Unsupported(action.kind())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::ActionDispatchQueue;
    use crate::error::DispatchError;
    use crate::types::{ActionKind, MouseButton};
    use crate::worker::AutomationWorker;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn desktop() -> (TempDir, HeadlessDesktop) {
        let dir = TempDir::new().unwrap();
        let desktop = HeadlessDesktop::new(dir.path(), 1280, 960);
        (dir, desktop)
    }

    #[tokio::test]
    async fn test_click_moves_cursor_and_reports_position() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::ClickMouse {
                coordinates: Some(Coordinates::new(10, 20)),
                button: MouseButton::Left,
                click_count: 1,
                hold_keys: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result, json!({"x": 10, "y": 20}));

        let pos = desktop.execute(&ComputerAction::CursorPosition).await.unwrap();
        assert_eq!(pos, json!({"x": 10, "y": 20}));
    }

    #[tokio::test]
    async fn test_cursor_is_clamped_to_screen() {
        let (_dir, desktop) = desktop();
        desktop
            .execute(&ComputerAction::MoveMouse {
                coordinates: Coordinates::new(5000, -40),
            })
            .await
            .unwrap();
        assert_eq!(desktop.cursor(), Coordinates::new(1279, 0));
    }

    #[tokio::test]
    async fn test_drag_ends_at_last_point() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::DragMouse {
                path: vec![Coordinates::new(1, 1), Coordinates::new(300, 200)],
                button: MouseButton::Left,
                hold_keys: vec![],
            })
            .await
            .unwrap();
        assert_eq!(result, json!({"x": 300, "y": 200}));
    }

    #[tokio::test]
    async fn test_empty_path_is_invalid() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::TraceMouse {
                path: vec![],
                hold_keys: vec![],
            })
            .await;
        assert!(matches!(result, Err(ActionError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_empty_keys_are_invalid() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::TypeKeys {
                keys: vec![],
                delay: None,
            })
            .await;
        assert!(matches!(result, Err(ActionError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_wait_sleeps() {
        let (_dir, desktop) = desktop();
        let start = std::time::Instant::now();
        desktop
            .execute(&ComputerAction::Wait { duration: 30 })
            .await
            .unwrap();
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_screenshot_reports_screen_size() {
        let (_dir, desktop) = desktop();
        let shot = desktop.execute(&ComputerAction::Screenshot).await.unwrap();
        assert_eq!(shot["width"], 1280);
        assert_eq!(shot["height"], 960);
        assert_eq!(shot["image"], "");
    }

    #[tokio::test]
    async fn test_application_is_unsupported() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::Application {
                application: "firefox".to_string(),
            })
            .await;
        assert!(matches!(
            result,
            Err(ActionError::Unsupported(ActionKind::Application))
        ));
    }

    #[tokio::test]
    async fn test_write_then_read_file() {
        let (dir, desktop) = desktop();
        let data = STANDARD.encode(b"quarterly numbers");

        let written = desktop
            .execute(&ComputerAction::WriteFile {
                path: "Desktop/report.txt".to_string(),
                data: data.clone(),
            })
            .await
            .unwrap();
        assert_eq!(written["bytes"], 17);
        assert_eq!(
            std::fs::read(dir.path().join("Desktop/report.txt")).unwrap(),
            b"quarterly numbers"
        );

        let read = desktop
            .execute(&ComputerAction::ReadFile {
                path: "Desktop/report.txt".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(read["data"], data);
    }

    #[tokio::test]
    async fn test_paths_cannot_escape_root() {
        let (_dir, desktop) = desktop();
        for path in ["../outside.txt", "/etc/passwd", "a/../../b", ""] {
            let result = desktop
                .execute(&ComputerAction::WriteFile {
                    path: path.to_string(),
                    data: String::new(),
                })
                .await;
            assert!(
                matches!(result, Err(ActionError::InvalidPayload(_))),
                "{:?}",
                path
            );
        }
    }

    #[tokio::test]
    async fn test_invalid_base64_is_rejected() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::WriteFile {
                path: "x.bin".to_string(),
                data: "***".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ActionError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_read_missing_file_is_io_error() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::ReadFile {
                path: "missing.txt".to_string(),
            })
            .await;
        assert!(matches!(result, Err(ActionError::Io(_))));
    }

    #[tokio::test]
    async fn test_oversized_typing_delay_is_invalid() {
        let (_dir, desktop) = desktop();
        let result = desktop
            .execute(&ComputerAction::TypeText {
                text: "hello".to_string(),
                delay: Some(u64::MAX / 2),
                sensitive: false,
            })
            .await;
        assert!(matches!(result, Err(ActionError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn test_worker_survives_oversized_typing_delay() {
        let (_dir, desktop) = desktop();
        let queue = Arc::new(ActionDispatchQueue::new());
        let worker = AutomationWorker::new(Arc::clone(&queue), Arc::new(desktop)).spawn();

        let action: ComputerAction = serde_json::from_str(
            r#"{"action":"type_keys","keys":["a","b"],"delay":18446744073709551615}"#,
        )
        .unwrap();
        let (_, typed) = queue.enqueue(action, None, None).unwrap();
        let typed = tokio::time::timeout(Duration::from_secs(2), typed.wait())
            .await
            .unwrap();
        assert!(matches!(typed, Err(DispatchError::ExecutionFailed { .. })));

        let (_, pos) = queue
            .enqueue(ComputerAction::CursorPosition, None, None)
            .unwrap();
        let pos = tokio::time::timeout(Duration::from_secs(2), pos.wait())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pos, json!({"x": 0, "y": 0}));

        queue.shutdown(None);
        assert_eq!(worker.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_huge_screen_size_does_not_wrap() {
        let dir = TempDir::new().unwrap();
        let desktop = HeadlessDesktop::new(dir.path(), u32::MAX, u32::MAX);
        let moved = desktop
            .execute(&ComputerAction::MoveMouse {
                coordinates: Coordinates::new(70_000, -5),
            })
            .await
            .unwrap();
        assert_eq!(moved, json!({"x": 70_000, "y": 0}));
    }
}
