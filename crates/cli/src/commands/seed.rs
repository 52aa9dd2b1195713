//! Demo data for local development.
//!
//! Creates "Demo Clinic" (`/m/demo-clinic`) on the Pro plan with one branch,
//! two queues and a handful of waiting customers. Running it twice is a no-op.

use queuehub_core::{PlanTier, Slug};
use queuehub_server::db::MerchantRepository;
use queuehub_server::db::queues::{NewQueue, QueueRepository};
use queuehub_server::realtime::RoomHub;
use queuehub_server::services::auth::{AccountStep, BranchStep, BusinessStep, SignupRequest};
use queuehub_server::services::{AuthService, JoinRequest, QueueService};

const DEMO_SLUG: &str = "demo-clinic";
const DEMO_EMAIL: &str = "demo@queuehub.app";
const DEMO_PASSWORD: &str = "queuehub-demo-1";

const CUSTOMERS: [&str; 5] = ["Ana", "Bilal", "Chen", "Dara", "Eve"];

/// Seed the demo merchant.
///
/// # Errors
///
/// Returns an error if any insert fails.
pub async fn demo() -> Result<(), Box<dyn std::error::Error>> {
    let pool = super::connect().await?;

    let slug = Slug::parse(DEMO_SLUG)?;
    if MerchantRepository::new(&pool).slug_exists(&slug).await? {
        tracing::info!(slug = DEMO_SLUG, "Demo merchant already exists, skipping");
        return Ok(());
    }

    let account = AuthService::new(&pool)
        .signup(&SignupRequest {
            account: AccountStep {
                email: DEMO_EMAIL.to_owned(),
                password: DEMO_PASSWORD.to_owned(),
                name: "Demo Owner".to_owned(),
            },
            business: BusinessStep {
                name: "Demo Clinic".to_owned(),
                phone: Some("+1 555 0100".to_owned()),
                slug: Some(DEMO_SLUG.to_owned()),
                plan: PlanTier::Pro,
            },
            branch: BranchStep {
                name: "Main Street".to_owned(),
                address: "1 Main Street".to_owned(),
                city: "Springfield".to_owned(),
            },
        })
        .await?;
    let merchant_id = account.merchant.id;
    tracing::info!(merchant_id = %merchant_id, "Demo merchant created");

    let queues = QueueRepository::new(&pool);
    let reception = queues
        .create(
            merchant_id,
            &NewQueue {
                branch_id: account.branch.id,
                name: "Reception".to_owned(),
                description: "Check-in and general questions".to_owned(),
                avg_service_minutes: 4,
                max_size: None,
            },
        )
        .await?
        .created()
        .ok_or("demo plan has no room for the reception queue")?;
    queues
        .create(
            merchant_id,
            &NewQueue {
                branch_id: account.branch.id,
                name: "Pharmacy".to_owned(),
                description: "Prescription pickup".to_owned(),
                avg_service_minutes: 6,
                max_size: Some(20),
            },
        )
        .await?
        .created()
        .ok_or("demo plan has no room for the pharmacy queue")?;

    let hub = RoomHub::default();
    let service = QueueService::new(&pool, &hub);
    for name in CUSTOMERS {
        service
            .join(
                reception.id,
                &JoinRequest {
                    customer_name: name.to_owned(),
                    customer_phone: None,
                    notes: None,
                },
            )
            .await?;
    }

    tracing::info!(
        email = DEMO_EMAIL,
        password = DEMO_PASSWORD,
        tickets = CUSTOMERS.len(),
        "Demo data seeded"
    );
    Ok(())
}
