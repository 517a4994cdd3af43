use actix_web::{delete, get, post, put, web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::{
    config::Config,
    dto::{
        AvailabilityQuery, AvailabilityResponse, BookingListQuery, NewTableDto, NewVenueDto, SetOpeningHoursDto,
        UpdateTableDto, UpdateVenueDto, VenueQuery,
    },
    errors::ApiError,
    service::{self, auth::require_user, availability::SlotRequest},
    PGPool,
};

#[get("")]
pub async fn list(query: web::Query<VenueQuery>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let venues = service::venue::list(query.city.as_deref(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(venues))
}

#[post("")]
pub async fn create(
    req: HttpRequest,
    dto: web::Json<NewVenueDto>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let venue = service::venue::create(&user, dto.into_inner(), config.free_monthly_booking_limit, pool_state.get_ref()).await?;
    Ok(HttpResponse::Created().json(venue))
}

#[get("/{id}")]
pub async fn get_by_id(id: web::Path<Uuid>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let details = service::venue::details(id.into_inner(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(details))
}

#[put("/{id}")]
pub async fn update(
    req: HttpRequest,
    id: web::Path<Uuid>,
    dto: web::Json<UpdateVenueDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let venue = service::venue::update(id.into_inner(), dto.into_inner(), &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(venue))
}

#[delete("/{id}")]
pub async fn deactivate(req: HttpRequest, id: web::Path<Uuid>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let venue = service::venue::deactivate(id.into_inner(), &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(venue))
}

#[get("/{id}/opening-hours")]
pub async fn opening_hours(id: web::Path<Uuid>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let hours = service::venue::opening_hours(id.into_inner(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(hours))
}

#[put("/{id}/opening-hours")]
pub async fn set_opening_hours(
    req: HttpRequest,
    id: web::Path<Uuid>,
    dto: web::Json<SetOpeningHoursDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let hours =
        service::venue::set_opening_hours(id.into_inner(), dto.into_inner().intervals, &user, pool_state.get_ref())
            .await?;
    Ok(HttpResponse::Ok().json(hours))
}

#[get("/{id}/tables")]
pub async fn tables(id: web::Path<Uuid>, pool_state: web::Data<PGPool>) -> Result<HttpResponse, ApiError> {
    let tables = service::venue::tables(id.into_inner(), pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(tables))
}

#[post("/{id}/tables")]
pub async fn add_table(
    req: HttpRequest,
    id: web::Path<Uuid>,
    dto: web::Json<NewTableDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let table = service::venue::add_table(id.into_inner(), dto.into_inner(), &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Created().json(table))
}

#[put("/{id}/tables/{table_id}")]
pub async fn update_table(
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
    dto: web::Json<UpdateTableDto>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let (venue_id, table_id) = path.into_inner();
    let table = service::venue::update_table(venue_id, table_id, dto.into_inner(), &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(table))
}

#[delete("/{id}/tables/{table_id}")]
pub async fn deactivate_table(
    req: HttpRequest,
    path: web::Path<(Uuid, Uuid)>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let (venue_id, table_id) = path.into_inner();
    let table = service::venue::deactivate_table(venue_id, table_id, &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(table))
}

/// A refused slot is a normal answer here, not an error.
#[get("/{id}/availability")]
pub async fn availability(
    id: web::Path<Uuid>,
    query: web::Query<AvailabilityQuery>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let request = SlotRequest::from(query.into_inner());
    let verdict = service::booking::check_availability(id.into_inner(), &request, pool_state.get_ref()).await?;
    let body = match verdict {
        Ok(()) => AvailabilityResponse { available: true, reason: None },
        Err(reason) => AvailabilityResponse { available: false, reason: Some(reason.to_string()) },
    };
    Ok(HttpResponse::Ok().json(body))
}

#[get("/{id}/bookings")]
pub async fn bookings(
    req: HttpRequest,
    id: web::Path<Uuid>,
    query: web::Query<BookingListQuery>,
    pool_state: web::Data<PGPool>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let bookings = service::booking::list_for_venue(id.into_inner(), query.date, &user, pool_state.get_ref()).await?;
    Ok(HttpResponse::Ok().json(bookings))
}

#[get("/{id}/analytics")]
pub async fn analytics(
    req: HttpRequest,
    id: web::Path<Uuid>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let analytics =
        service::stats::venue_analytics(id.into_inner(), &user, config.free_monthly_booking_limit, pool_state.get_ref())
            .await?;
    Ok(HttpResponse::Ok().json(analytics))
}

#[get("/{id}/subscription")]
pub async fn subscription(
    req: HttpRequest,
    id: web::Path<Uuid>,
    pool_state: web::Data<PGPool>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    let user = require_user(&req)?;
    let sub =
        service::subscription::for_venue(id.into_inner(), &user, config.free_monthly_booking_limit, pool_state.get_ref())
            .await?;
    Ok(HttpResponse::Ok().json(sub))
}

pub fn init_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list)
        .service(create)
        .service(get_by_id)
        .service(update)
        .service(deactivate)
        .service(opening_hours)
        .service(set_opening_hours)
        .service(tables)
        .service(add_table)
        .service(update_table)
        .service(deactivate_table)
        .service(availability)
        .service(bookings)
        .service(analytics)
        .service(subscription);
}
