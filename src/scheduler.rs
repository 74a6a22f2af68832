//! Tracking of scheduled stream posts and tasks.
//!
//! Publication happens on the server. The client only polls the scheduled
//! lists and compares them with what it saw last time: an item that leaves
//! the scheduled list once its time has come (or a task whose status turns
//! to published) has been published and the stream should be refreshed.
//! Items removed before their time were withdrawn and are forgotten.
use crate::classroom::Classroom;
use crate::scms;
use crate::stream::StreamPost;
use crate::task::{PublishStatus, Task};
use chrono::{DateTime, Local, Utc};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// How often a classroom page re-reads the scheduled lists.
pub const POLL_INTERVAL: Duration = Duration::from_secs(60);

// Granularity at which the poll loop notices `stop`.
const STOP_CHECK_STEP: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScheduledKind {
    Post,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleStatus {
    /// Publication time still ahead.
    Upcoming,
    /// Time has passed but the server has not published it yet.
    AwaitingServer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledItem {
    pub kind: ScheduledKind,
    pub id: u64,
    pub title: String,
    pub scheduled_at: DateTime<Utc>,
    pub status: ScheduleStatus,
}

impl ScheduledItem {
    pub fn label(&self) -> String {
        match self.status {
            ScheduleStatus::Upcoming => format!(
                "Scheduled for {}",
                self.scheduled_at.with_timezone(&Local).format("%b %-d, %-I:%M %p")
            ),
            ScheduleStatus::AwaitingServer => "Publishing...".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleEvent {
    Published { kind: ScheduledKind, id: u64 },
}

/// Scheduled items of one classroom as last seen on the server.
///
/// Only items still waiting for publication are kept; an item is dropped
/// as soon as its publication has been reported or it was withdrawn.
#[derive(Debug, Clone, Default)]
pub struct ScheduleBoard {
    items: BTreeMap<(ScheduledKind, u64), ScheduledItem>,
}

fn status_at(scheduled_at: DateTime<Utc>, now: DateTime<Utc>) -> ScheduleStatus {
    if scheduled_at > now {
        ScheduleStatus::Upcoming
    } else {
        ScheduleStatus::AwaitingServer
    }
}

impl ScheduleBoard {
    pub fn new() -> Self {
        ScheduleBoard::default()
    }

    /// Items still waiting for publication, earliest first.
    pub fn pending(&self) -> Vec<&ScheduledItem> {
        let mut pending: Vec<&ScheduledItem> = self.items.values().collect();
        pending.sort_by_key(|item| item.scheduled_at);
        pending
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, kind: ScheduledKind, id: u64) -> Option<&ScheduledItem> {
        self.items.get(&(kind, id))
    }

    /// Compares a fresh listing of one kind with the board.
    ///
    /// `scheduled` holds `(id, title, scheduled_at)` of every item the server
    /// still reports as scheduled; `published` lists ids the server reports
    /// as published. A tracked item that leaves the scheduled list is
    /// reported as published when it is in `published` or its time has
    /// come. One that vanishes before its time was deleted or unscheduled
    /// and is dropped without an event.
    pub fn reconcile(
        &mut self,
        kind: ScheduledKind,
        scheduled: Vec<(u64, String, DateTime<Utc>)>,
        published: &[u64],
        now: DateTime<Utc>,
    ) -> Vec<ScheduleEvent> {
        let mut events = Vec::new();
        let seen: Vec<u64> = scheduled.iter().map(|(id, _, _)| *id).collect();

        self.items.retain(|&(item_kind, id), item| {
            if item_kind != kind || seen.contains(&id) {
                return true;
            }
            if published.contains(&id) || item.scheduled_at <= now {
                info!("scheduled {:?} {} was published", kind, id);
                events.push(ScheduleEvent::Published { kind, id });
            } else {
                debug!("scheduled {:?} {} was withdrawn before {}", kind, id, item.scheduled_at);
            }
            false
        });

        for (id, title, scheduled_at) in scheduled {
            let status = status_at(scheduled_at, now);
            if status == ScheduleStatus::AwaitingServer {
                debug!("scheduled {:?} {} is overdue, waiting for the server", kind, id);
            }
            self.items.insert(
                (kind, id),
                ScheduledItem {
                    kind,
                    id,
                    title,
                    scheduled_at,
                    status,
                },
            );
        }
        events
    }

    /// Posts come from the scheduled listing, so anything in it counts.
    pub fn reconcile_posts(&mut self, posts: &[StreamPost], now: DateTime<Utc>) -> Vec<ScheduleEvent> {
        let scheduled = posts
            .iter()
            .filter_map(|post| {
                let at = post.scheduled_at?;
                let title = post.title.clone().unwrap_or_else(|| post.content.clone());
                Some((post.id, title, at))
            })
            .collect();
        self.reconcile(ScheduledKind::Post, scheduled, &[], now)
    }

    /// Tasks come from the full task list; only those still marked scheduled count.
    pub fn reconcile_tasks(&mut self, tasks: &[Task], now: DateTime<Utc>) -> Vec<ScheduleEvent> {
        let scheduled = tasks
            .iter()
            .filter(|task| task.status == PublishStatus::Scheduled)
            .filter_map(|task| Some((task.id, task.title.clone(), task.scheduled_at?)))
            .collect();
        let published: Vec<u64> = tasks
            .iter()
            .filter(|task| task.status == PublishStatus::Published)
            .map(|task| task.id)
            .collect();
        self.reconcile(ScheduledKind::Task, scheduled, &published, now)
    }

    /// Runs one poll with the given fetchers. On failure the board is left untouched.
    pub fn poll<P, T>(&mut self, fetch_posts: P, fetch_tasks: T, now: DateTime<Utc>) -> Result<Vec<ScheduleEvent>, Box<dyn Error>>
    where
        P: FnOnce() -> Result<Vec<StreamPost>, Box<dyn Error>>,
        T: FnOnce() -> Result<Vec<Task>, Box<dyn Error>>,
    {
        let posts = fetch_posts().map_err(|e| {
            warn!("polling scheduled posts failed: {}", e);
            e
        })?;
        let tasks = fetch_tasks().map_err(|e| {
            warn!("polling scheduled tasks failed: {}", e);
            e
        })?;
        let mut events = self.reconcile_posts(&posts, now);
        events.extend(self.reconcile_tasks(&tasks, now));
        Ok(events)
    }

    /// Polls a classroom. Tasks bypass the classroom cache so status changes are seen.
    pub fn poll_classroom(&mut self, classroom: &Classroom, now: DateTime<Utc>) -> Result<Vec<ScheduleEvent>, Box<dyn Error>> {
        let info = &classroom.info;
        let events = self.poll(
            || classroom.fetch_scheduled(),
            || scms::get_teacher_tasks(&info.credentials, &info.code),
            now,
        )?;
        if !events.is_empty() {
            classroom.clear_cache();
        }
        Ok(events)
    }
}

/// Calls `tick` every `interval` until `stop` is set.
///
/// Ticks never overlap: the next wait starts after `tick` returns. `stop` is
/// checked between short sleeps so the loop ends promptly.
pub fn run_poll_loop<F>(stop: &AtomicBool, interval: Duration, mut tick: F)
where
    F: FnMut(),
{
    while !stop.load(Ordering::SeqCst) {
        tick();
        let started = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            let elapsed = started.elapsed();
            if elapsed >= interval {
                break;
            }
            thread::sleep(STOP_CHECK_STEP.min(interval - elapsed));
        }
    }
    debug!("poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::cell::Cell;

    fn now() -> DateTime<Utc> {
        crate::util::parse_datetime("2025-03-10T08:00:00Z").unwrap()
    }

    fn scheduled_post(id: u64, at: DateTime<Utc>) -> StreamPost {
        StreamPost {
            id,
            content: format!("post {}", id),
            status: PublishStatus::Scheduled,
            scheduled_at: Some(at),
            ..Default::default()
        }
    }

    #[test]
    fn test_posts_leaving_the_list_are_published() {
        let mut board = ScheduleBoard::new();
        let at = now() + ChronoDuration::minutes(1);
        let events = board.reconcile_posts(&[scheduled_post(1, at), scheduled_post(2, at + ChronoDuration::hours(1))], now());
        assert!(events.is_empty());
        assert_eq!(board.pending().len(), 2);

        let a_bit_later = now() + ChronoDuration::minutes(2);
        let remaining = [scheduled_post(2, at + ChronoDuration::hours(1))];
        let events = board.reconcile_posts(&remaining, a_bit_later);
        assert_eq!(events, vec![ScheduleEvent::Published { kind: ScheduledKind::Post, id: 1 }]);
        assert!(board.get(ScheduledKind::Post, 1).is_none());
        assert_eq!(board.len(), 1);

        // Reported only once.
        assert!(board.reconcile_posts(&remaining, a_bit_later).is_empty());
    }

    #[test]
    fn test_withdrawn_items_are_dropped_silently() {
        let mut board = ScheduleBoard::new();
        let far = now() + ChronoDuration::hours(5);
        board.reconcile_posts(&[scheduled_post(9, far)], now());
        let task = Task {
            id: 4,
            title: "Essay".into(),
            status: PublishStatus::Scheduled,
            scheduled_at: Some(far),
            ..Default::default()
        };
        board.reconcile_tasks(&[task], now());
        assert_eq!(board.len(), 2);

        let one_minute_later = now() + ChronoDuration::minutes(1);
        assert!(board.reconcile_posts(&[], one_minute_later).is_empty());
        assert!(board.reconcile_tasks(&[], one_minute_later).is_empty());
        assert!(board.is_empty());
    }

    #[test]
    fn test_overdue_items_wait_for_server() {
        let mut board = ScheduleBoard::new();
        let at = now() - ChronoDuration::minutes(2);
        board.reconcile_posts(&[scheduled_post(7, at)], now());
        let item = board.get(ScheduledKind::Post, 7).unwrap();
        assert_eq!(item.status, ScheduleStatus::AwaitingServer);
        assert_eq!(item.label(), "Publishing...");
    }

    #[test]
    fn test_tasks_published_by_status() {
        let mut board = ScheduleBoard::new();
        let mut task = Task {
            id: 3,
            title: "Quiz".into(),
            status: PublishStatus::Scheduled,
            scheduled_at: Some(now() + ChronoDuration::minutes(30)),
            ..Default::default()
        };
        assert!(board.reconcile_tasks(&[task.clone()], now()).is_empty());
        task.status = PublishStatus::Published;
        let events = board.reconcile_tasks(&[task], now());
        assert_eq!(events, vec![ScheduleEvent::Published { kind: ScheduledKind::Task, id: 3 }]);
        assert!(board.is_empty());
    }

    #[test]
    fn test_failed_poll_keeps_board() {
        let mut board = ScheduleBoard::new();
        let later = now() + ChronoDuration::hours(1);
        board.reconcile_posts(&[scheduled_post(1, later)], now());
        let result = board.poll(|| Err("offline".into()), || Ok(Vec::new()), now());
        assert!(result.is_err());
        assert_eq!(board.get(ScheduledKind::Post, 1).unwrap().status, ScheduleStatus::Upcoming);

        let after_due = later + ChronoDuration::minutes(1);
        let events = board.poll(|| Ok(Vec::new()), || Ok(Vec::new()), after_due).unwrap();
        assert_eq!(events.len(), 1);
        assert!(board.is_empty());
    }

    #[test]
    fn test_poll_loop_stops() {
        let stop = AtomicBool::new(false);
        let ticks = Cell::new(0);
        run_poll_loop(&stop, Duration::from_millis(1), || {
            ticks.set(ticks.get() + 1);
            if ticks.get() == 3 {
                stop.store(true, Ordering::SeqCst);
            }
        });
        assert_eq!(ticks.get(), 3);
    }
}
