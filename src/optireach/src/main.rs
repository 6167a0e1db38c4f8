//! OptiReach — campaign engine for optical-retail practice management.
//!
//! Demo entry point: seeds a practice with customers and a recall campaign,
//! triggers processing runs, and prints the campaign analytics.

use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Parser;
use tracing::info;
use uuid::Uuid;

use optireach_channels::LoggingDispatcher;
use optireach_core::config::AppConfig;
use optireach_core::types::{
    CallerContext, CampaignType, Channel, ConditionOperator, Customer, DripConfig, DripStep,
    EnrollmentMode, SegmentCondition, SegmentConfig, SegmentLogic,
};
use optireach_engine::InMemoryOrderLedger;
use optireach_management::{CampaignService, CreateCampaignRequest};
use optireach_segmentation::InMemoryCustomerDirectory;

#[derive(Parser, Debug)]
#[command(name = "optireach")]
#[command(about = "Campaign engine for optical-retail practice management")]
#[command(version)]
struct Cli {
    /// Number of processing runs to trigger
    #[arg(long, default_value_t = 1)]
    runs: u32,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "optireach=info".into());
    if cli.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("OptiReach starting up");

    let config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    let directory = Arc::new(InMemoryCustomerDirectory::new());
    let ledger = Arc::new(InMemoryOrderLedger::new());
    seed_demo_practice(&directory, &ledger);

    let service = CampaignService::new(
        &config,
        directory,
        ledger,
        Arc::new(LoggingDispatcher),
    );

    let admin = CallerContext::admin("demo-admin");

    let recall_template = service.create_message_template(&admin, recall_template_request())?;

    let campaign = service.create_campaign(
        &admin,
        CreateCampaignRequest {
            name: "Annual Exam Recall".to_string(),
            campaign_type: CampaignType::RecurringReminder,
            segment: Some(SegmentConfig {
                logic: SegmentLogic::And,
                conditions: vec![SegmentCondition {
                    field: "last_exam_days".to_string(),
                    operator: ConditionOperator::GreaterThanOrEqual,
                    value: serde_json::json!(365),
                }],
                exclude_marketing_opt_out: true,
            }),
            config: DripConfig {
                steps: vec![
                    DripStep {
                        step_index: 0,
                        delay_days: 0,
                        channel: Channel::Sms,
                        template_id: Some(recall_template.id),
                        body: None,
                    },
                    DripStep {
                        step_index: 1,
                        delay_days: 7,
                        channel: Channel::Email,
                        template_id: None,
                        body: Some(
                            "Hi {{firstName}}, just a reminder that you're due for \
                             your annual eye exam. Reply to book a slot."
                                .to_string(),
                        ),
                    },
                ],
                stop_on_conversion: true,
                cooldown_days: 90,
                enrollment_mode: EnrollmentMode::Automatic,
                conversion: Default::default(),
            },
        },
    )?;

    let segment = campaign.segment.clone().expect("campaign has a segment");
    let preview = service.preview_segment(&admin, &segment)?;
    info!(count = preview.count, "Segment preview");

    service.activate_campaign(&admin, campaign.id)?;

    for i in 0..cli.runs {
        match service.trigger_campaign_run(&admin, campaign.id)? {
            Some(report) => info!(
                run = i + 1,
                processed = report.run.processed,
                enrolled = report.run.enrolled,
                messages_sent = report.run.messages_sent,
                "Run finished"
            ),
            None => info!(run = i + 1, "Run skipped"),
        }
    }

    let analytics = service.campaign_analytics(&admin, campaign.id)?;
    println!("{}", serde_json::to_string_pretty(&analytics)?);

    Ok(())
}

fn recall_template_request() -> optireach_templates::CreateTemplateRequest {
    optireach_templates::CreateTemplateRequest {
        name: "Recall SMS".to_string(),
        channel: Channel::Sms,
        subject: None,
        body: "{{firstName}}, it's been over a year since your last eye exam. \
               Book today and get 10% off new frames."
            .to_string(),
    }
}

fn seed_demo_practice(directory: &InMemoryCustomerDirectory, ledger: &InMemoryOrderLedger) {
    let now = Utc::now();
    let customers = vec![
        ("Jane", "Doe", Some(400), false),
        ("Marco", "Silva", Some(380), false),
        ("Priya", "Nair", Some(120), false),
        ("Tom", "Akers", None, false),
        ("Lena", "Wolf", Some(500), true),
    ];

    for (i, (first, last, exam_days_ago, opted_out)) in customers.into_iter().enumerate() {
        let id = Uuid::new_v4();
        directory.upsert(Customer {
            id,
            first_name: first.to_string(),
            last_name: last.to_string(),
            email: Some(format!("{}@example.com", first.to_lowercase())),
            phone: Some(format!("+1555010{:04}", i)),
            city: Some("Seattle".to_string()),
            state: Some("WA".to_string()),
            age: Some(30 + i as u32 * 7),
            last_exam_at: exam_days_ago.map(|d| now - Duration::days(d)),
            total_orders: i as u64,
            total_spend: 150.0 * i as f64,
            tags: vec!["glasses".to_string()],
            marketing_opt_out: opted_out,
            created_at: now - Duration::days(600),
        });
        if i > 0 {
            ledger.record_order(id, 150.0 * i as f64, now - Duration::days(200));
        }
    }
    info!("Seeded demo practice with 5 customers");
}
