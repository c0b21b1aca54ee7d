use chrono::{DateTime, Utc};
use skill_portal::notifications::{DispatchReport, Mailer, NotificationDispatcher};
use skill_portal::store::PortalStore;
use skill_portal::workflows::SkillPortal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Outcome of one maintenance pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TickReport {
    pub(crate) dispatch: DispatchReport,
    pub(crate) closed_assessments: usize,
}

/// Periodic outbox delivery plus the assessment completion sweep.
pub(crate) struct MaintenanceWorker<S, M> {
    portal: Arc<SkillPortal<S>>,
    dispatcher: NotificationDispatcher<S, M>,
    interval: Duration,
}

impl<S, M> MaintenanceWorker<S, M>
where
    S: PortalStore + 'static,
    M: Mailer + 'static,
{
    pub(crate) fn new(
        portal: Arc<SkillPortal<S>>,
        dispatcher: NotificationDispatcher<S, M>,
        interval: Duration,
    ) -> Self {
        Self {
            portal,
            dispatcher,
            interval,
        }
    }

    /// Failures are logged and retried on the next tick.
    pub(crate) fn tick(&self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        match self.dispatcher.dispatch_due(now) {
            Ok(dispatch) => report.dispatch = dispatch,
            Err(err) => error!(error = %err, "outbox dispatch failed"),
        }
        match self.portal.assessments().close_expired(now) {
            Ok(closed) => report.closed_assessments = closed,
            Err(err) => error!(error = %err, "assessment sweep failed"),
        }

        if report.dispatch.processed() > 0 || report.closed_assessments > 0 {
            info!(
                delivered = report.dispatch.delivered,
                skipped = report.dispatch.skipped,
                retried = report.dispatch.retried,
                failed = report.dispatch.failed,
                closed_assessments = report.closed_assessments,
                "maintenance tick"
            );
        } else {
            debug!("maintenance tick idle");
        }
        report
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    pub(crate) async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let worker = Arc::new(self);
        let mut ticker = tokio::time::interval(worker.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(interval_secs = worker.interval.as_secs(), "maintenance worker started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let pass = worker.clone();
                    if let Err(err) = tokio::task::spawn_blocking(move || pass.tick(Utc::now())).await {
                        error!(error = %err, "maintenance tick panicked");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("maintenance worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::RecordingMailer;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use skill_portal::domain::{ExternalIdentity, Role, SkillType, StudentType};
    use skill_portal::notifications::RetryPolicy;
    use skill_portal::store::InMemoryStore;
    use skill_portal::workflows::{
        AssessmentDraft, BudgetReview, BudgetSubmission, OptionDraft, QuestionDraft,
        WorkflowSettings,
    };

    fn identity(handle: &str) -> ExternalIdentity {
        ExternalIdentity {
            google_id: format!("google-{handle}"),
            email: format!("{handle}@bitsathy.ac.in"),
            name: handle.to_string(),
        }
    }

    #[test]
    fn tick_delivers_mail_and_closes_expired_assessments() {
        let now = Utc
            .with_ymd_and_hms(2025, 11, 3, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        let store = Arc::new(InMemoryStore::new());
        let portal = Arc::new(SkillPortal::new(store.clone(), WorkflowSettings::default()));
        let team = portal
            .identity()
            .provision_with_role(identity("team"), Role::SkillTeam, None, now)
            .expect("team");
        let faculty = portal
            .identity()
            .provision_with_role(identity("selvi"), Role::Faculty, None, now)
            .expect("faculty");
        let student = portal
            .identity()
            .provision_with_role(
                identity("hari"),
                Role::Student,
                Some(StudentType::Hosteller),
                now,
            )
            .expect("student");

        let skill = portal
            .budgets()
            .submit_budget(
                &faculty,
                BudgetSubmission {
                    name: "CAD modelling".to_string(),
                    skill_type: SkillType::Night,
                    number_of_venues: 1,
                    number_of_students: 10,
                    amount: 6_000.0,
                    co_faculties: Vec::new(),
                    start_date: now + ChronoDuration::days(4),
                    end_date: now + ChronoDuration::days(30),
                    venue: "Mech Lab".to_string(),
                },
                now,
            )
            .expect("submitted");
        portal
            .budgets()
            .review_budget(&team, &skill.id, BudgetReview::approve(), now)
            .expect("approved");
        portal
            .enrollment()
            .register_student(&student, &skill.id, now)
            .expect("enrolled");

        let assessment = portal
            .assessments()
            .create_assessment(
                &faculty,
                &skill.id,
                AssessmentDraft {
                    title: "Sketching".to_string(),
                    description: None,
                    questions: vec![QuestionDraft {
                        text: "Which view shows the top?".to_string(),
                        options: vec![
                            OptionDraft {
                                text: "Plan".to_string(),
                                is_correct: true,
                            },
                            OptionDraft {
                                text: "Elevation".to_string(),
                                is_correct: false,
                            },
                        ],
                        points: 1,
                    }],
                    duration: 15,
                    passing_score: 1,
                    start_time: now,
                    end_time: now + ChronoDuration::hours(1),
                },
                now,
            )
            .expect("created");
        portal
            .assessments()
            .publish_assessment(&faculty, &assessment.id, now)
            .expect("published");

        let mailer = Arc::new(RecordingMailer::default());
        let dispatcher = NotificationDispatcher::new(store, mailer.clone(), RetryPolicy::default());
        let worker = MaintenanceWorker::new(portal, dispatcher, Duration::from_secs(15));

        let first = worker.tick(now);
        assert_eq!(first.dispatch.delivered, 2);
        assert_eq!(first.closed_assessments, 0);

        let later = worker.tick(now + ChronoDuration::hours(2));
        assert_eq!(later.closed_assessments, 1);
        assert_eq!(later.dispatch.processed(), 0);
        assert_eq!(mailer.messages().len(), 2);
    }

    #[tokio::test]
    async fn run_stops_when_shutdown_is_signalled() {
        let store = Arc::new(InMemoryStore::new());
        let portal = Arc::new(SkillPortal::new(store.clone(), WorkflowSettings::default()));
        let dispatcher = NotificationDispatcher::new(
            store,
            Arc::new(RecordingMailer::default()),
            RetryPolicy::default(),
        );
        let worker = MaintenanceWorker::new(portal, dispatcher, Duration::from_millis(10));

        let (sender, receiver) = watch::channel(false);
        let handle = tokio::spawn(worker.run(receiver));
        sender.send(true).expect("worker listening");
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .expect("worker exits")
            .expect("worker task completes");
    }
}
