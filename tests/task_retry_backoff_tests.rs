use agentsms::models::{CreateTask, DieselUlid, NewTask, Priority, Task, TaskStatus};
use chrono::Utc;
use serde_json::json;

fn build_task() -> NewTask {
    NewTask::from_create(CreateTask {
        task_type: "schedule_follow_up_message".into(),
        agent_type: "onboarding".into(),
        user_id: None,
        context: json!({}),
        scheduled_for: None,
        priority: Priority::Medium,
        max_retries: 3,
    })
}

fn task_row(retry_count: i32, max_retries: i32) -> Task {
    let now = Utc::now();
    Task {
        id: DieselUlid::new(),
        task_type: "schedule_follow_up_message".into(),
        agent_type: "onboarding".into(),
        user_id: None,
        context: json!({}),
        scheduled_for: now,
        priority: Priority::Medium.as_str().to_string(),
        status: TaskStatus::Pending.as_str().to_string(),
        retry_count,
        max_retries,
        last_attempted_at: None,
        result: None,
        error_log: None,
        created_at: now,
        completed_at: None,
    }
}

#[test]
fn new_task_starts_pending_with_zero_retries() {
    let task = build_task();
    assert_eq!(task.status, TaskStatus::Pending.as_str());
    assert_eq!(task.max_retries, 3);
}

#[test]
fn next_retry_delay_doubles_each_attempt_starting_at_one_minute() {
    // spec.md §4.3: 60 * 2^retry_count, so retry_count 0/1/2 -> 60/120/240s.
    assert_eq!(task_row(0, 3).next_retry_delay_seconds(), 60);
    assert_eq!(task_row(1, 3).next_retry_delay_seconds(), 120);
    assert_eq!(task_row(2, 3).next_retry_delay_seconds(), 240);
}

#[test]
fn can_retry_is_false_once_max_retries_reached() {
    assert!(task_row(0, 3).can_retry());
    assert!(task_row(2, 3).can_retry());
    assert!(!task_row(3, 3).can_retry());
}
