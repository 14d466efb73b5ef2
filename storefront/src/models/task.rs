// storefront/src/models/task.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

/// Length of the daily task program.
pub const PROGRAM_DAYS: i32 = 30;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyTask {
  pub id: Uuid,
  pub job_account_id: Uuid,
  pub day_number: i32,
  pub title: String,
  pub description: String,
  pub estimated_time: Option<String>,
  pub points: Option<i32>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, SqlxType)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  InProgress,
  Completed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct TaskProgress {
  pub id: Uuid,
  pub user_id: Uuid,
  pub purchase_id: Uuid,
  pub task_id: Uuid,
  pub status: TaskStatus,
  pub completed_at: Option<DateTime<Utc>>,
  pub submission_notes: Option<String>,
  pub created_at: DateTime<Utc>,
}

/// A day of the program with the caller's progress on it, if any.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithProgress {
  #[serde(flatten)]
  pub task: DailyTask,
  pub progress: Option<TaskProgress>,
}

/// Joins tasks (ordered by day) with progress rows; days outside 1..=30 are dropped.
pub fn merge_progress(mut tasks: Vec<DailyTask>, progress: Vec<TaskProgress>) -> Vec<TaskWithProgress> {
  tasks.retain(|t| (1..=PROGRAM_DAYS).contains(&t.day_number));
  tasks.sort_by_key(|t| t.day_number);
  tasks
    .into_iter()
    .map(|task| {
      let progress = progress.iter().find(|p| p.task_id == task.id).cloned();
      TaskWithProgress { task, progress }
    })
    .collect()
}
