//! Integration test for the full campaign flow: create → activate → enroll
//! → run → analytics, through the service facade.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use optireach_channels::CaptureDispatcher;
use optireach_core::config::AppConfig;
use optireach_core::error::CampaignError;
use optireach_core::types::{
    CallerContext, CampaignType, Channel, ConditionOperator, Customer, DripConfig, DripStep,
    EnrollmentMode, MessageStatus, RecipientStatus, SegmentCondition, SegmentConfig, SegmentLogic,
};
use optireach_engine::{EnrollOutcome, InMemoryOrderLedger};
use optireach_management::{CampaignService, CreateCampaignRequest};
use optireach_segmentation::InMemoryCustomerDirectory;

struct TestApp {
    directory: Arc<InMemoryCustomerDirectory>,
    ledger: Arc<InMemoryOrderLedger>,
    dispatcher: Arc<CaptureDispatcher>,
    service: CampaignService,
}

fn test_app() -> TestApp {
    let directory = Arc::new(InMemoryCustomerDirectory::new());
    let ledger = Arc::new(InMemoryOrderLedger::new());
    let dispatcher = Arc::new(CaptureDispatcher::new());
    let service = CampaignService::new(
        &AppConfig::default(),
        directory.clone(),
        ledger.clone(),
        dispatcher.clone(),
    );
    TestApp {
        directory,
        ledger,
        dispatcher,
        service,
    }
}

fn customer(first: &str, last: &str, phone: &str) -> Customer {
    Customer {
        id: Uuid::new_v4(),
        first_name: first.to_string(),
        last_name: last.to_string(),
        email: Some(format!("{}@example.com", first.to_lowercase())),
        phone: Some(phone.to_string()),
        city: Some("Seattle".to_string()),
        state: Some("WA".to_string()),
        age: Some(38),
        last_exam_at: Some(Utc::now() - Duration::days(400)),
        total_orders: 1,
        total_spend: 180.0,
        tags: vec!["glasses".to_string()],
        marketing_opt_out: false,
        created_at: Utc::now(),
    }
}

fn blast_request() -> CreateCampaignRequest {
    CreateCampaignRequest {
        name: "Exam Reminder Blast".to_string(),
        campaign_type: CampaignType::OneTimeBlast,
        segment: None,
        config: DripConfig {
            steps: vec![DripStep {
                step_index: 0,
                delay_days: 0,
                channel: Channel::Sms,
                template_id: None,
                body: Some("Hi {{firstName}}!".to_string()),
            }],
            stop_on_conversion: false,
            cooldown_days: 30,
            enrollment_mode: EnrollmentMode::Manual,
            conversion: Default::default(),
        },
    }
}

#[test]
fn test_one_time_blast_end_to_end() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let jane = customer("Jane", "Doe", "+15550100001");
    app.directory.upsert(jane.clone());

    let campaign = app.service.create_campaign(&admin, blast_request()).unwrap();
    app.service.activate_campaign(&admin, campaign.id).unwrap();
    app.service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap();

    // First run: exactly one message, rendered for Jane.
    let report = app
        .service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap()
        .expect("active campaign should run");
    assert_eq!(report.run.messages_sent, 1);
    assert_eq!(app.dispatcher.count(), 1);
    assert_eq!(app.dispatcher.sent()[0].body, "Hi Jane!");
    assert_eq!(app.dispatcher.sent()[0].to, "+15550100001");

    // next_run_at was advanced on the campaign.
    let reloaded = app.service.get_campaign(&admin, campaign.id).unwrap();
    assert_eq!(reloaded.next_run_at, Some(report.next_run_at));

    // Second run: no further sends; the recipient completes.
    let report = app
        .service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap()
        .unwrap();
    assert_eq!(report.run.messages_sent, 0);
    assert_eq!(report.run.completed, 1);
    assert_eq!(app.dispatcher.count(), 1);

    let analytics = app.service.campaign_analytics(&admin, campaign.id).unwrap();
    assert_eq!(analytics.recipients.total, 1);
    assert_eq!(analytics.recipients.completed, 1);
    assert_eq!(analytics.messages.total, 1);
    assert_eq!(analytics.messages.pending, 1);
    assert_eq!(analytics.recent_runs.len(), 2);
}

#[test]
fn test_trigger_run_is_admin_only() {
    let app = test_app();
    let admin = CallerContext::admin("ada");
    let staff = CallerContext::staff("sam");

    let campaign = app.service.create_campaign(&staff, blast_request()).unwrap();
    app.service.activate_campaign(&staff, campaign.id).unwrap();

    let err = app
        .service
        .trigger_campaign_run(&staff, campaign.id)
        .unwrap_err();
    assert_eq!(err.to_string(), "Admin only");

    // No side effects from the refused call.
    let analytics = app.service.campaign_analytics(&admin, campaign.id).unwrap();
    assert!(analytics.recent_runs.is_empty());
}

#[test]
fn test_paused_campaign_run_is_noop() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let campaign = app.service.create_campaign(&admin, blast_request()).unwrap();
    app.service.activate_campaign(&admin, campaign.id).unwrap();
    app.service.pause_campaign(&admin, campaign.id).unwrap();

    let report = app
        .service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap();
    assert!(report.is_none());
    assert_eq!(app.dispatcher.count(), 0);
}

#[test]
fn test_enrollment_idempotent_and_cooldown() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let jane = customer("Jane", "Doe", "+15550100001");
    app.directory.upsert(jane.clone());

    let campaign = app.service.create_campaign(&admin, blast_request()).unwrap();
    app.service.activate_campaign(&admin, campaign.id).unwrap();

    // Double enrollment keeps a single recipient.
    app.service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap();
    app.service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap();
    let analytics = app.service.campaign_analytics(&admin, campaign.id).unwrap();
    assert_eq!(analytics.recipients.total, 1);

    // Terminate, then try to re-enroll inside the 30-day cooldown.
    let recipient = app
        .service
        .recipients()
        .for_pair(campaign.id, jane.id)
        .unwrap();
    app.service.remove_recipient(&admin, recipient.id).unwrap();

    let err = app
        .service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap_err();
    assert!(matches!(err, CampaignError::Validation(_)));
    assert!(err.to_string().contains("cooldown"));
}

#[test]
fn test_reenrollment_after_cooldown_resets_progress() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let jane = customer("Jane", "Doe", "+15550100001");
    app.directory.upsert(jane.clone());

    let campaign = app.service.create_campaign(&admin, blast_request()).unwrap();
    let campaign = app.service.activate_campaign(&admin, campaign.id).unwrap();

    // Enroll and terminate 40 days ago — past the 30-day cooldown.
    let past = Utc::now() - Duration::days(40);
    let EnrollOutcome::Enrolled(recipient) =
        app.service.recipients().enroll(&campaign, jane.id, past)
    else {
        panic!("expected enrollment");
    };
    app.service.recipients().advance(recipient.id, 0, past).unwrap();
    app.service.recipients().mark_completed(recipient.id, past).unwrap();

    let fresh = app
        .service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap();
    assert_eq!(fresh.id, recipient.id);
    assert_eq!(fresh.status, RecipientStatus::Active);
    assert_eq!(fresh.last_step_index, -1);

    let analytics = app.service.campaign_analytics(&admin, campaign.id).unwrap();
    assert_eq!(analytics.recipients.total, 1);
}

#[test]
fn test_automatic_segment_enrollment_and_opt_out() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let due = customer("Ana", "Alvarez", "+15550100011");
    let recent = Customer {
        last_exam_at: Some(Utc::now() - Duration::days(30)),
        ..customer("Ben", "Baker", "+15550100012")
    };
    let opted_out = Customer {
        marketing_opt_out: true,
        ..customer("Cleo", "Castillo", "+15550100013")
    };
    app.directory.upsert(due.clone());
    app.directory.upsert(recent.clone());
    app.directory.upsert(opted_out.clone());

    let segment = SegmentConfig {
        logic: SegmentLogic::And,
        conditions: vec![SegmentCondition {
            field: "last_exam_days".to_string(),
            operator: ConditionOperator::GreaterThanOrEqual,
            value: json!(365),
        }],
        exclude_marketing_opt_out: true,
    };

    // Preview is read-only: counts Ana only, enrolls no one.
    let preview = app.service.preview_segment(&admin, &segment).unwrap();
    assert_eq!(preview.count, 1);
    assert_eq!(preview.sample[0].first_name, "Ana");

    let mut req = blast_request();
    req.name = "Annual Exam Recall".to_string();
    req.campaign_type = CampaignType::RecurringReminder;
    req.segment = Some(segment);
    req.config.enrollment_mode = EnrollmentMode::Automatic;
    req.config.steps[0].body = Some("{{firstName}}, you're due for an eye exam.".to_string());

    let campaign = app.service.create_campaign(&admin, req).unwrap();
    assert_eq!(
        app.service
            .campaign_analytics(&admin, campaign.id)
            .unwrap()
            .recipients
            .total,
        0
    );

    app.service.activate_campaign(&admin, campaign.id).unwrap();
    let report = app
        .service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap()
        .unwrap();
    assert_eq!(report.run.enrolled, 1);
    assert_eq!(report.run.messages_sent, 1);
    assert_eq!(
        app.dispatcher.sent()[0].body,
        "Ana, you're due for an eye exam."
    );
}

#[test]
fn test_conversion_stops_drip() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let jane = customer("Jane", "Doe", "+15550100001");
    app.directory.upsert(jane.clone());

    let mut req = blast_request();
    req.config.stop_on_conversion = true;
    req.config.steps.push(DripStep {
        step_index: 1,
        delay_days: 7,
        channel: Channel::Sms,
        template_id: None,
        body: Some("Second nudge".to_string()),
    });

    let campaign = app.service.create_campaign(&admin, req).unwrap();
    let campaign = app.service.activate_campaign(&admin, campaign.id).unwrap();

    // Enrolled 8 days ago, step 0 sent then, order placed 2 days ago.
    let day0 = Utc::now() - Duration::days(8);
    let EnrollOutcome::Enrolled(recipient) =
        app.service.recipients().enroll(&campaign, jane.id, day0)
    else {
        panic!("expected enrollment");
    };
    app.service.recipients().advance(recipient.id, 0, day0).unwrap();
    app.ledger
        .record_order(jane.id, 310.0, Utc::now() - Duration::days(2));

    // Step 1 is nominally due, but the conversion wins.
    let report = app
        .service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap()
        .unwrap();
    assert_eq!(report.run.converted, 1);
    assert_eq!(report.run.messages_sent, 0);
    assert_eq!(app.dispatcher.count(), 0);

    let recipient = app
        .service
        .recipients()
        .for_pair(campaign.id, jane.id)
        .unwrap();
    assert_eq!(recipient.status, RecipientStatus::Converted);
}

#[test]
fn test_template_lifecycle_through_service() {
    let app = test_app();
    let staff = CallerContext::staff("sam");
    let admin = CallerContext::admin("ada");

    let template = app
        .service
        .create_message_template(
            &staff,
            optireach_templates::CreateTemplateRequest {
                name: "Recall SMS".to_string(),
                channel: Channel::Sms,
                subject: None,
                body: "{{firstName}}, book your exam at {{campaignName}}.".to_string(),
            },
        )
        .unwrap();

    let jane = customer("Jane", "Doe", "+15550100001");
    app.directory.upsert(jane.clone());

    let mut req = blast_request();
    req.config.steps[0].body = None;
    req.config.steps[0].template_id = Some(template.id);
    let campaign = app.service.create_campaign(&admin, req).unwrap();
    app.service.activate_campaign(&admin, campaign.id).unwrap();
    app.service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap();

    app.service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap()
        .unwrap();
    assert_eq!(
        app.dispatcher.sent()[0].body,
        "Jane, book your exam at Exam Reminder Blast."
    );

    // Update and delete round out the surface.
    app.service
        .update_message_template(
            &staff,
            template.id,
            optireach_templates::UpdateTemplateRequest {
                body: Some("{{firstName}}, see you soon.".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
    app.service
        .delete_message_template(&staff, template.id)
        .unwrap();
    assert!(matches!(
        app.service
            .update_message_template(&staff, template.id, Default::default()),
        Err(CampaignError::NotFound(_))
    ));
}

#[test]
fn test_message_history_survives_removal() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    let jane = customer("Jane", "Doe", "+15550100001");
    app.directory.upsert(jane.clone());

    let campaign = app.service.create_campaign(&admin, blast_request()).unwrap();
    app.service.activate_campaign(&admin, campaign.id).unwrap();
    let recipient = app
        .service
        .enroll_customer(&admin, campaign.id, jane.id)
        .unwrap();

    app.service
        .trigger_campaign_run(&admin, campaign.id)
        .unwrap()
        .unwrap();
    app.service.remove_recipient(&admin, recipient.id).unwrap();

    let messages = app.service.outbox().for_recipient(recipient.id);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Pending);

    let analytics = app.service.campaign_analytics(&admin, campaign.id).unwrap();
    assert_eq!(analytics.recipients.removed, 1);
    assert_eq!(analytics.messages.total, 1);
}

#[test]
fn test_not_found_is_distinct_from_validation() {
    let app = test_app();
    let admin = CallerContext::admin("ada");

    assert!(matches!(
        app.service.campaign_analytics(&admin, Uuid::new_v4()),
        Err(CampaignError::NotFound(_))
    ));
    assert!(matches!(
        app.service.trigger_campaign_run(&admin, Uuid::new_v4()),
        Err(CampaignError::NotFound(_))
    ));

    let mut req = blast_request();
    req.name = String::new();
    assert!(matches!(
        app.service.create_campaign(&admin, req),
        Err(CampaignError::Validation(_))
    ));
}
