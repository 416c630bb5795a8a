use chrono::{DateTime, TimeDelta, Utc};
use taskloop::lifecycle::*;
use taskloop::models::{Status, Task};
use taskloop::recurrence::{Frequency, RepetitionRule};

fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

fn daily() -> RepetitionRule {
    RepetitionRule::new(Frequency::Daily).build().unwrap()
}

fn recurring(next_due_at: Option<&str>) -> Task {
    let mut task = Task::new(1, "Standup", at("2026-01-01T00:00:00Z"));
    task.recurrence = Some(daily());
    task.next_due_at = next_due_at.map(at);
    task
}

#[test]
fn test_complete_one_off_task() {
    let now = at("2026-01-01T09:00:00Z");
    let task = Task::new(1, "Report", now);
    let done = complete_task(&task, now);
    assert!(done.is_completed());
    assert_eq!(done.completed_at(), Some(now));
    assert_eq!(done.next_due_at, None);
}

#[test]
fn test_complete_recurring_task_advances() {
    let now = at("2026-01-01T09:00:00Z");
    let task = recurring(Some("2026-01-01T08:00:00Z"));
    let done = complete_task(&task, now);
    assert_eq!(done.status, Status::Open);
    assert_eq!(done.completed_at(), None);
    assert_eq!(done.next_due_at, Some(at("2026-01-02T08:00:00Z")));
    assert_eq!(state_of(&done, now), TaskState::Dormant);
}

#[test]
fn test_complete_recurring_falls_back_to_due_date_then_now() {
    let now = at("2026-01-01T09:00:00Z");

    let mut task = recurring(None);
    task.due_date = Some(at("2026-01-01T07:00:00Z"));
    assert_eq!(complete_task(&task, now).next_due_at, Some(at("2026-01-02T07:00:00Z")));

    let task = recurring(None);
    assert_eq!(complete_task(&task, now).next_due_at, Some(now + TimeDelta::days(1)));
}

#[test]
fn test_complete_exhausted_recurring_task() {
    let now = at("2026-01-01T09:00:00Z");
    let mut task = recurring(Some("2026-01-01T08:00:00Z"));
    task.recurrence = Some(
        RepetitionRule::new(Frequency::Daily)
            .until(at("2026-01-01T23:00:00Z"))
            .build()
            .unwrap(),
    );
    let done = complete_task(&task, now);
    assert!(done.is_completed());
    assert_eq!(done.completed_at(), Some(now));
    assert_eq!(done.next_due_at, None);
    assert!(done.recurrence.is_some());
}

#[test]
fn test_completed_task_stays_completed() {
    let mut task = recurring(Some("2026-01-02T09:00:00Z"));
    task.due_date = Some(at("2026-01-01T11:00:00Z"));
    task.recurrence = Some(
        RepetitionRule::new(Frequency::Daily)
            .until(at("2026-01-02T12:00:00Z"))
            .build()
            .unwrap(),
    );

    let done = complete_task(&task, at("2026-01-02T10:00:00Z"));
    assert_eq!(done.status, Status::Completed { at: Some(at("2026-01-02T10:00:00Z")) });

    let again = complete_task(&done, at("2026-01-02T10:30:00Z"));
    assert_eq!(again, done);

    let report = Task::new(2, "Report", at("2026-01-01T00:00:00Z"));
    let plain = complete_task(&report, at("2026-01-01T09:00:00Z"));
    assert_eq!(complete_task(&plain, at("2026-01-03T09:00:00Z")), plain);
}

#[test]
fn test_restore_after_rule_ran_out_is_one_off() {
    let now = at("2026-01-02T10:00:00Z");
    let mut task = recurring(Some("2026-01-02T09:00:00Z"));
    task.due_date = Some(at("2026-01-01T11:00:00Z"));
    task.recurrence = Some(
        RepetitionRule::new(Frequency::Daily)
            .until(at("2026-01-02T12:00:00Z"))
            .build()
            .unwrap(),
    );
    let done = complete_task(&task, now);

    let restored = restore_task(&done).unwrap();
    assert_eq!(restored.status, Status::Open);
    assert!(restored.recurrence.is_none());
    assert!(is_actionable(&restored, now));

    let redone = complete_task(&restored, now + TimeDelta::minutes(30));
    assert!(redone.is_completed());
    assert_eq!(redone.next_due_at, None);
}

#[test]
fn test_restore() {
    let now = at("2026-01-01T09:00:00Z");
    let done = complete_task(&Task::new(1, "Report", now), now);
    let restored = restore_task(&done).unwrap();
    assert_eq!(restored.status, Status::Open);
    assert_eq!(restored.completed_at(), None);

    assert!(restore_task(&restored).is_none());
}

#[test]
fn test_visibility_gate() {
    let now = at("2026-01-01T09:00:00Z");
    let mut task = recurring(None);

    task.next_due_at = Some(now + TimeDelta::hours(1));
    assert!(!is_actionable(&task, now));
    assert_eq!(state_of(&task, now), TaskState::Dormant);

    task.next_due_at = Some(now - TimeDelta::seconds(1));
    assert!(is_actionable(&task, now));
    assert_eq!(state_of(&task, now), TaskState::Active);
}

#[test]
fn test_one_off_task_ignores_due_date() {
    let now = at("2026-01-01T09:00:00Z");
    let mut task = Task::new(1, "Report", now);
    task.due_date = Some(now + TimeDelta::days(30));
    assert!(is_actionable(&task, now));

    let done = complete_task(&task, now);
    assert_eq!(state_of(&done, now), TaskState::Completed);
}

#[test]
fn test_arm_and_replace_recurrence() {
    let now = at("2026-01-01T09:00:00Z");

    let mut task = recurring(None);
    arm(&mut task, now);
    assert_eq!(task.next_due_at, Some(now));

    let mut plain = Task::new(2, "Report", now);
    arm(&mut plain, now);
    assert_eq!(plain.next_due_at, None);

    let later = now + TimeDelta::days(3);
    replace_recurrence(&mut plain, Some(daily()), later);
    assert_eq!(plain.next_due_at, Some(later));

    let weekly = RepetitionRule::new(Frequency::Weekly).build().unwrap();
    replace_recurrence(&mut plain, Some(weekly.clone()), now + TimeDelta::days(9));
    assert_eq!(plain.next_due_at, Some(later));
    assert_eq!(plain.recurrence, Some(weekly));

    replace_recurrence(&mut plain, None, now);
    assert_eq!(plain.next_due_at, None);
    assert!(plain.recurrence.is_none());
}

#[test]
fn test_partition_due() {
    let now = at("2026-01-01T09:00:00Z");
    let due = recurring(Some("2026-01-01T08:00:00Z"));
    let mut upcoming = recurring(Some("2026-01-02T08:00:00Z"));
    upcoming.id = 2;
    let done = complete_task(&Task::new(3, "Report", now), now);
    let plain = Task::new(4, "Call", now);

    let tasks = vec![due, upcoming, done, plain];
    let (due, upcoming) = partition_due(&tasks, now);
    assert_eq!(due.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 4]);
    assert_eq!(upcoming.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
}

#[test]
fn test_task_record_layout() {
    let legacy = r#"{"id":7,"name":"Old","created_at":"2025-01-01T00:00:00Z","completed":true}"#;
    let task: Task = serde_json::from_str(legacy).unwrap();
    assert_eq!(task.status, Status::Completed { at: None });
    assert_eq!(task.version, 0);

    let now = at("2026-01-01T09:00:00Z");
    let done = complete_task(&Task::new(1, "Report", now), now);
    let json = serde_json::to_value(&done).unwrap();
    assert_eq!(json["completed"], true);
    assert_eq!(json["completed_at"], "2026-01-01T09:00:00Z");

    let advanced = complete_task(&recurring(Some("2026-01-01T08:00:00Z")), now);
    let json = serde_json::to_value(&advanced).unwrap();
    assert_eq!(json["completed"], false);
    assert!(json["completed_at"].is_null());
    assert_eq!(json["recurrence"]["frequency"], "daily");
    let back: Task = serde_json::from_value(json).unwrap();
    assert_eq!(back, advanced);
}
