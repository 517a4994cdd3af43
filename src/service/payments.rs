//! Payment provider integration over its REST API: checkout and billing
//! portal sessions, webhook signature verification, and the mapping from
//! webhook events onto local subscription and payment rows.

use std::future::Future;

use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use log::{info, warn};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

use crate::{
    config::Config,
    db,
    dto::{CheckoutRequest, PortalRequest},
    errors::ApiError,
    models::{NotificationKind, Payment, PaymentStatus, Plan, Subscription, SubscriptionStatus, Venue},
    service::{auth::UserAuthData, mailer, notification, subscription, venue as venue_service},
    PGPool,
};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Signed events older than this are refused.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    secret_key: String,
}

impl PaymentClient {
    pub fn new(secret_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.to_string(),
        }
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> Result<Value, ApiError> {
        let resp: Value = self
            .http
            .post(format!("{API_BASE}{path}"))
            .basic_auth(&self.secret_key, None::<&str>)
            .form(form)
            .send()
            .await?
            .json()
            .await?;
        if let Some(err) = resp.get("error") {
            warn!("payment provider rejected {}: {}", path, err);
            return Err(ApiError::InternalError);
        }
        Ok(resp)
    }

    pub async fn create_customer(&self, email: &str, venue_id: Uuid) -> Result<String, ApiError> {
        let venue_id = venue_id.to_string();
        let resp = self
            .post_form("/customers", &[("email", email), ("metadata[venue_id]", &venue_id)])
            .await?;
        string_field(&resp, "id")
    }

    pub async fn create_checkout_session(
        &self,
        customer_id: &str,
        price_id: &str,
        venue_id: Uuid,
        plan: Plan,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<String, ApiError> {
        let venue_id = venue_id.to_string();
        let resp = self
            .post_form(
                "/checkout/sessions",
                &[
                    ("customer", customer_id),
                    ("mode", "subscription"),
                    ("line_items[0][price]", price_id),
                    ("line_items[0][quantity]", "1"),
                    ("success_url", success_url),
                    ("cancel_url", cancel_url),
                    ("metadata[venue_id]", &venue_id),
                    ("metadata[plan]", plan.as_str()),
                    ("subscription_data[metadata][venue_id]", &venue_id),
                    ("subscription_data[metadata][plan]", plan.as_str()),
                ],
            )
            .await?;
        string_field(&resp, "url")
    }

    pub async fn create_billing_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, ApiError> {
        let resp = self
            .post_form(
                "/billing_portal/sessions",
                &[("customer", customer_id), ("return_url", return_url)],
            )
            .await?;
        string_field(&resp, "url")
    }
}

fn string_field(resp: &Value, key: &str) -> Result<String, ApiError> {
    resp[key].as_str().map(String::from).ok_or_else(|| {
        warn!("payment provider response without {}: {}", key, resp);
        ApiError::InternalError
    })
}

pub fn price_for_plan(plan: Plan, config: &Config) -> Option<&str> {
    let price = match plan {
        Plan::Free => return None,
        Plan::Paid => config.stripe_paid_price_id.as_str(),
        Plan::Premium => config.stripe_premium_price_id.as_str(),
    };
    Some(price).filter(|p| !p.is_empty())
}

pub fn plan_for_price(price_id: &str, config: &Config) -> Option<Plan> {
    if !config.stripe_premium_price_id.is_empty() && price_id == config.stripe_premium_price_id {
        Some(Plan::Premium)
    } else if !config.stripe_paid_price_id.is_empty() && price_id == config.stripe_paid_price_id {
        Some(Plan::Paid)
    } else {
        None
    }
}

/// Checks a `t=<unix>,v1=<hex hmac>` header against the raw body.
pub fn verify_webhook_signature(payload: &[u8], sig_header: &str, secret: &str, now: i64) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        if let Some(t) = part.trim().strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.trim().strip_prefix("v1=") {
            signatures.push(v);
        }
    }
    if timestamp.is_empty() || signatures.is_empty() {
        return Err("malformed signature header");
    }
    let ts: i64 = timestamp.parse().map_err(|_| "invalid signature timestamp")?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("signature timestamp outside tolerance");
    }

    let body = std::str::from_utf8(payload).map_err(|_| "payload is not utf-8")?;
    let signed_payload = format!("{timestamp}.{body}");
    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else {
            continue;
        };
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "invalid webhook secret")?;
        mac.update(signed_payload.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err("signature mismatch")
}

#[derive(Debug, Clone, PartialEq)]
pub enum WebhookEvent {
    CheckoutCompleted {
        venue_id: Uuid,
        plan: Plan,
        customer_id: Option<String>,
        subscription_id: Option<String>,
    },
    SubscriptionUpdated {
        subscription_id: String,
        /// from subscription metadata, set at checkout
        venue_id: Option<Uuid>,
        status: SubscriptionStatus,
        plan: Option<Plan>,
        price_id: Option<String>,
        period: Option<(DateTime<Utc>, DateTime<Utc>)>,
        cancel_at_period_end: bool,
    },
    SubscriptionDeleted {
        subscription_id: String,
    },
    InvoicePaid(InvoiceData),
    InvoicePaymentFailed(InvoiceData),
    Ignored(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceData {
    pub invoice_id: String,
    pub subscription_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub period: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

fn unix(value: &Value) -> Option<DateTime<Utc>> {
    value.as_i64().and_then(|s| Utc.timestamp_opt(s, 0).single())
}

fn period(start: &Value, end: &Value) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((unix(start)?, unix(end)?))
}

fn required_str<'a>(obj: &'a Value, key: &'static str) -> Result<&'a str, String> {
    obj[key].as_str().ok_or_else(|| format!("missing {key}"))
}

fn parse_invoice(obj: &Value, amount_key: &str) -> Result<InvoiceData, String> {
    let line = &obj["lines"]["data"][0];
    Ok(InvoiceData {
        invoice_id: required_str(obj, "id")?.to_string(),
        subscription_id: required_str(obj, "subscription")?.to_string(),
        amount_cents: obj[amount_key].as_i64().unwrap_or(0),
        currency: obj["currency"].as_str().unwrap_or("usd").to_string(),
        period: period(&line["period"]["start"], &line["period"]["end"]),
    })
}

/// Extracts what the local handlers need from a provider event.
pub fn parse_event(event: &Value) -> Result<WebhookEvent, String> {
    let event_type = required_str(event, "type")?;
    let obj = &event["data"]["object"];
    match event_type {
        "checkout.session.completed" => {
            let metadata = &obj["metadata"];
            let venue_id = metadata["venue_id"]
                .as_str()
                .and_then(|v| Uuid::parse_str(v).ok())
                .ok_or("checkout without venue_id metadata")?;
            let plan = metadata["plan"]
                .as_str()
                .and_then(Plan::parse)
                .ok_or("checkout without a valid plan")?;
            Ok(WebhookEvent::CheckoutCompleted {
                venue_id,
                plan,
                customer_id: obj["customer"].as_str().map(String::from),
                subscription_id: obj["subscription"].as_str().map(String::from),
            })
        }
        "customer.subscription.updated" | "customer.subscription.created" => Ok(WebhookEvent::SubscriptionUpdated {
            subscription_id: required_str(obj, "id")?.to_string(),
            venue_id: obj["metadata"]["venue_id"].as_str().and_then(|v| Uuid::parse_str(v).ok()),
            status: SubscriptionStatus::from_provider(obj["status"].as_str().unwrap_or("")),
            plan: obj["metadata"]["plan"].as_str().and_then(Plan::parse),
            price_id: obj["items"]["data"][0]["price"]["id"].as_str().map(String::from),
            period: period(&obj["current_period_start"], &obj["current_period_end"]),
            cancel_at_period_end: obj["cancel_at_period_end"].as_bool().unwrap_or(false),
        }),
        "customer.subscription.deleted" => Ok(WebhookEvent::SubscriptionDeleted {
            subscription_id: required_str(obj, "id")?.to_string(),
        }),
        "invoice.paid" => Ok(WebhookEvent::InvoicePaid(parse_invoice(obj, "amount_paid")?)),
        "invoice.payment_failed" => Ok(WebhookEvent::InvoicePaymentFailed(parse_invoice(obj, "amount_due")?)),
        other => Ok(WebhookEvent::Ignored(other.to_string())),
    }
}

/// Like [`parse_event`], but a known event type that cannot be used is
/// acknowledged as ignored so the provider stops redelivering it.
pub fn classify(event: &Value) -> WebhookEvent {
    match parse_event(event) {
        Ok(parsed) => parsed,
        Err(reason) => {
            let event_type = event["type"].as_str().unwrap_or("unknown");
            warn!("unusable webhook event {} ({}): {}", event["id"], event_type, reason);
            WebhookEvent::Ignored(format!("{event_type}: {reason}"))
        }
    }
}

/// Runs `apply` only when `mark` claims the event. When `apply` fails the
/// claim is released through `release`, so the provider's retry is applied.
pub async fn apply_once<M, A, R>(mark: M, apply: A, release: R) -> Result<bool, ApiError>
where
    M: Future<Output = Result<bool, ApiError>>,
    A: Future<Output = Result<(), ApiError>>,
    R: Future<Output = Result<u64, ApiError>>,
{
    if !mark.await? {
        return Ok(false);
    }
    if let Err(err) = apply.await {
        if let Err(release_err) = release.await {
            warn!("failed to release webhook event after error: {:?}", release_err);
        }
        return Err(err);
    }
    Ok(true)
}

async fn subscription_for(provider_id: &str, pool: &PGPool) -> Result<Option<Subscription>, ApiError> {
    let sub = db::subscription::get_by_provider_subscription(provider_id, pool).await?;
    if sub.is_none() {
        warn!("no local subscription for provider subscription {}", provider_id);
    }
    Ok(sub)
}

async fn notify_owner(venue_id: Uuid, kind: NotificationKind, title: String, message: String, pool: &PGPool) {
    let venue = match db::venue::get_by_id(venue_id, pool).await {
        Ok(Some(venue)) => venue,
        Ok(None) => return,
        Err(err) => {
            warn!("failed to load venue {} for notification: {:?}", venue_id, err);
            return;
        }
    };
    notification::notify(notification::build(venue.owner_id, kind, title, message, None), pool).await;
}

async fn record_payment(sub: &Subscription, invoice: &InvoiceData, status: PaymentStatus, pool: &PGPool) -> Result<bool, ApiError> {
    let payment = Payment {
        id: Uuid::new_v4(),
        subscription_id: sub.id,
        provider_invoice_id: invoice.invoice_id.clone(),
        amount_cents: invoice.amount_cents,
        currency: invoice.currency.clone(),
        status,
        created_at: Utc::now(),
    };
    Ok(db::payment::record(&payment, pool).await?)
}

/// Applies one parsed event to local state.
pub async fn apply_event(event: WebhookEvent, config: &Config, pool: &PGPool) -> Result<(), ApiError> {
    let free_limit = config.free_monthly_booking_limit;
    match event {
        WebhookEvent::CheckoutCompleted { venue_id, plan, customer_id, subscription_id } => {
            subscription::get_or_create(venue_id, free_limit, pool).await?;
            db::subscription::activate_plan(
                venue_id,
                plan,
                plan.booking_limit(free_limit),
                customer_id.as_deref(),
                subscription_id.as_deref(),
                pool,
            )
            .await?;
            info!("venue {} upgraded to {} via checkout", venue_id, plan.as_str());
            if let Ok(Some(venue)) = db::venue::get_by_id(venue_id, pool).await {
                if let Ok(Some(owner)) = db::user::get_by_id(venue.owner_id, pool).await {
                    mailer::send(&mailer::plan_changed(&owner.email, &venue, plan));
                }
            }
            notify_owner(
                venue_id,
                NotificationKind::SubscriptionChanged,
                "Subscription upgraded".to_string(),
                format!("Your venue is now on the {} plan", plan.as_str()),
                pool,
            )
            .await;
        }
        WebhookEvent::SubscriptionUpdated { subscription_id, venue_id, status, plan, price_id, period, cancel_at_period_end } => {
            let linked = db::subscription::get_by_provider_subscription(&subscription_id, pool).await?;
            let known_venue = match (&linked, venue_id) {
                (None, Some(venue_id)) => db::venue::get_by_id(venue_id, pool).await?.map(|v| v.id),
                _ => None,
            };
            let sub = match (linked, known_venue) {
                (Some(sub), _) => sub,
                // the update can arrive before checkout.session.completed
                (None, Some(venue_id)) => {
                    let sub = subscription::get_or_create(venue_id, free_limit, pool).await?;
                    db::subscription::link_provider_subscription(sub.id, &subscription_id, pool).await?;
                    info!("linked provider subscription {} to venue {}", subscription_id, venue_id);
                    sub
                }
                (None, _) => {
                    warn!("no local subscription for provider subscription {}", subscription_id);
                    return Ok(());
                }
            };
            let plan = plan
                .or_else(|| price_id.as_deref().and_then(|p| plan_for_price(p, config)))
                .unwrap_or(sub.plan);
            db::subscription::update_from_provider(
                sub.id,
                plan,
                plan.booking_limit(free_limit),
                status,
                period,
                cancel_at_period_end,
                pool,
            )
            .await?;
            info!("subscription {} updated: plan={} status={:?}", sub.id, plan.as_str(), status);
        }
        WebhookEvent::SubscriptionDeleted { subscription_id } => {
            let Some(sub) = subscription_for(&subscription_id, pool).await? else {
                return Ok(());
            };
            db::subscription::downgrade_to_free(sub.id, free_limit, pool).await?;
            info!("subscription {} cancelled, venue {} back on free", sub.id, sub.venue_id);
            notify_owner(
                sub.venue_id,
                NotificationKind::SubscriptionChanged,
                "Subscription cancelled".to_string(),
                format!("Your venue is back on the free plan ({free_limit} bookings per month)"),
                pool,
            )
            .await;
        }
        WebhookEvent::InvoicePaid(invoice) => {
            let Some(sub) = subscription_for(&invoice.subscription_id, pool).await? else {
                return Ok(());
            };
            if !record_payment(&sub, &invoice, PaymentStatus::Succeeded, pool).await? {
                return Ok(());
            }
            let (start, end) = invoice.period.unwrap_or_else(|| {
                subscription::next_period(sub.current_period_start, sub.current_period_end, Utc::now())
            });
            db::subscription::reset_usage(sub.id, start, end, pool).await?;
            if sub.status != SubscriptionStatus::Active {
                db::subscription::set_status(sub.id, SubscriptionStatus::Active, pool).await?;
            }
            info!("invoice {} paid, usage reset for subscription {}", invoice.invoice_id, sub.id);
        }
        WebhookEvent::InvoicePaymentFailed(invoice) => {
            let Some(sub) = subscription_for(&invoice.subscription_id, pool).await? else {
                return Ok(());
            };
            if !record_payment(&sub, &invoice, PaymentStatus::Failed, pool).await? {
                return Ok(());
            }
            db::subscription::set_status(sub.id, SubscriptionStatus::PastDue, pool).await?;
            warn!("invoice {} failed for subscription {}", invoice.invoice_id, sub.id);
            notify_owner(
                sub.venue_id,
                NotificationKind::PaymentFailed,
                "Payment failed".to_string(),
                "We could not collect your subscription payment. Please update your billing details.".to_string(),
                pool,
            )
            .await;
        }
        WebhookEvent::Ignored(event_type) => {
            info!("ignoring webhook event {}", event_type);
        }
    }
    Ok(())
}

async fn ensure_customer(
    venue: &Venue,
    sub: &Subscription,
    client: &PaymentClient,
    pool: &PGPool,
) -> Result<String, ApiError> {
    if let Some(customer_id) = &sub.provider_customer_id {
        return Ok(customer_id.clone());
    }
    let owner = db::user::get_by_id(venue.owner_id, pool)
        .await?
        .ok_or(ApiError::NotFound("user"))?;
    let customer_id = client.create_customer(&owner.email, venue.id).await?;
    db::subscription::set_provider_customer(venue.id, &customer_id, pool).await?;
    info!("created payment customer {} for venue {}", customer_id, venue.id);
    Ok(customer_id)
}

/// Returns the hosted checkout page for upgrading a venue to `plan`.
pub async fn start_checkout(
    dto: CheckoutRequest,
    user: &UserAuthData,
    client: &PaymentClient,
    config: &Config,
    pool: &PGPool,
) -> Result<String, ApiError> {
    let venue = venue_service::get_managed(dto.venue_id, user, pool).await?;
    let price_id = match dto.plan {
        Plan::Free => return Err(ApiError::bad_request("the free plan needs no checkout")),
        plan => price_for_plan(plan, config).ok_or_else(|| {
            warn!("no price configured for plan {}", plan.as_str());
            ApiError::bad_request(format!("plan {} is not available", plan.as_str()))
        })?,
    };
    let sub = subscription::get_or_create(venue.id, config.free_monthly_booking_limit, pool).await?;
    let customer_id = ensure_customer(&venue, &sub, client, pool).await?;
    let base = config.app_base_url.trim_end_matches('/');
    client
        .create_checkout_session(
            &customer_id,
            price_id,
            venue.id,
            dto.plan,
            &format!("{base}/venues/{}/subscription?checkout=success", venue.id),
            &format!("{base}/venues/{}/subscription?checkout=cancelled", venue.id),
        )
        .await
}

pub async fn billing_portal(
    dto: PortalRequest,
    user: &UserAuthData,
    client: &PaymentClient,
    config: &Config,
    pool: &PGPool,
) -> Result<String, ApiError> {
    let venue = venue_service::get_managed(dto.venue_id, user, pool).await?;
    let sub = subscription::get_or_create(venue.id, config.free_monthly_booking_limit, pool).await?;
    let customer_id = sub
        .provider_customer_id
        .ok_or_else(|| ApiError::bad_request("venue has no billing account yet"))?;
    let base = config.app_base_url.trim_end_matches('/');
    client
        .create_billing_portal_session(&customer_id, &format!("{base}/venues/{}/subscription", venue.id))
        .await
}

/// Verifies, deduplicates and applies one webhook delivery.
pub async fn handle_webhook(payload: &[u8], sig_header: Option<&str>, config: &Config, pool: &PGPool) -> Result<(), ApiError> {
    let sig_header = sig_header.ok_or_else(|| ApiError::bad_request("missing signature header"))?;
    verify_webhook_signature(payload, sig_header, &config.stripe_webhook_secret, Utc::now().timestamp()).map_err(|reason| {
        warn!("webhook signature rejected: {}", reason);
        ApiError::bad_request("invalid signature")
    })?;
    let event: Value = serde_json::from_slice(payload).map_err(|_| ApiError::bad_request("invalid webhook payload"))?;
    let event_id = event["id"]
        .as_str()
        .ok_or_else(|| ApiError::bad_request("webhook event without id"))?;
    let event_type = event["type"].as_str().unwrap_or_default();
    let parsed = classify(&event);

    let applied = apply_once(
        async { db::webhook_event::mark_processed(event_id, event_type, pool).await.map_err(ApiError::from) },
        apply_event(parsed, config, pool),
        async { db::webhook_event::unmark(event_id, pool).await.map_err(ApiError::from) },
    )
    .await?;
    if !applied {
        info!("webhook event {} already processed", event_id);
    }
    Ok(())
}
