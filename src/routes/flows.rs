use crate::core::{FlowError, FlowEvent};
use crate::models::{
    CatalogResponse, Category, ErrorResponse, Gender, HealthResponse, Platform, PricingView,
    SelectionRequest, UploadQuery, UploadedImage,
};
use crate::services::{FlowService, ServiceError};
use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use uuid::Uuid;
use validator::Validate;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub flows: FlowService,
}

/// Configure all flow routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/catalog", web::get().to(catalog))
        .route("/flows", web::post().to(create_flow))
        .route("/flows/{id}", web::get().to(get_flow))
        .route("/flows/{id}", web::delete().to(delete_flow))
        .route("/flows/{id}/selection", web::post().to(update_selection))
        .route("/flows/{id}/advance", web::post().to(advance))
        .route("/flows/{id}/upload", web::put().to(upload))
        .route("/flows/{id}/submit", web::post().to(submit))
        .route("/flows/{id}/cancel", web::post().to(cancel))
        .route("/flows/{id}/matches/{match_id}/select", web::post().to(select_match))
        .route("/flows/{id}/payment/confirm", web::post().to(confirm_payment))
        .route("/flows/{id}/retry", web::post().to(retry))
        .route("/flows/{id}/download", web::get().to(download))
        .route("/flows/{id}/reset", web::post().to(reset));
}

impl ResponseError for ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::FlowNotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Flow(FlowError::NotAnImage(_)) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ServiceError::Flow(FlowError::EmptyUpload)
            | ServiceError::Flow(FlowError::IncompleteSelection)
            | ServiceError::Flow(FlowError::NoFileAttached)
            | ServiceError::Flow(FlowError::UnknownMatch(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Flow(_) => StatusCode::CONFLICT,
            ServiceError::Artifact(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error = match self {
            ServiceError::FlowNotFound(_) => "flow_not_found",
            ServiceError::Flow(FlowError::InvalidTransition { .. }) => "invalid_transition",
            ServiceError::Flow(FlowError::IncompleteSelection) => "incomplete_selection",
            ServiceError::Flow(FlowError::NotAnImage(_)) => "not_an_image",
            ServiceError::Flow(FlowError::EmptyUpload) => "empty_upload",
            ServiceError::Flow(FlowError::NoFileAttached) => "no_file_attached",
            ServiceError::Flow(FlowError::Busy) => "busy",
            ServiceError::Flow(FlowError::UnknownMatch(_)) => "unknown_match",
            ServiceError::Flow(FlowError::MatchAlreadyRegistered(_)) => "already_registered",
            ServiceError::Flow(FlowError::PaymentNotIssued) => "payment_not_issued",
            ServiceError::Flow(FlowError::PaymentExpired(_)) => "payment_expired",
            ServiceError::Flow(FlowError::ResultsNotEmpty) => "results_not_empty",
            ServiceError::Artifact(_) => "artifact_error",
        };
        HttpResponse::build(status).json(ErrorResponse {
            error: error.to_string(),
            message: self.to_string(),
            status_code: status.as_u16(),
        })
    }
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        active_flows: state.flows.active_flows(),
        timestamp: chrono::Utc::now(),
    })
}

/// Selectable options, prices and the similarity floor
async fn catalog(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(CatalogResponse {
        platforms: Platform::ALL.to_vec(),
        categories: Category::ALL.to_vec(),
        genders: Gender::ALL.to_vec(),
        pricing: PricingView::from(state.flows.sessions().pricing()),
        similarity_threshold: state.flows.matcher().threshold(),
    })
}

async fn create_flow(state: web::Data<AppState>) -> impl Responder {
    let view = state.flows.create().await;
    HttpResponse::Created().json(view)
}

async fn get_flow(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.view(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn delete_flow(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    state.flows.remove(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Update selection criteria
///
/// POST /api/v1/flows/{id}/selection
///
/// Request body (any subset):
/// ```json
/// {
///   "platform": "99 Pop|Uber|Abas",
///   "category": "Carro|Moto",
///   "gender": "Masculino|Feminino"
/// }
/// ```
async fn update_selection(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    req: web::Json<SelectionRequest>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    if req.is_empty() {
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "empty_selection".to_string(),
            message: "At least one of platform, category or gender is required".to_string(),
            status_code: 400,
        }));
    }

    let mut view = None;
    if let Some(platform) = req.platform {
        view = Some(state.flows.dispatch(id, FlowEvent::SetPlatform(platform)).await?);
    }
    if let Some(category) = req.category {
        view = Some(state.flows.dispatch(id, FlowEvent::SetCategory(category)).await?);
    }
    if let Some(gender) = req.gender {
        view = Some(state.flows.dispatch(id, FlowEvent::SetGender(gender)).await?);
    }

    match view {
        Some(view) => Ok(HttpResponse::Ok().json(view)),
        None => Ok(HttpResponse::Ok().json(state.flows.view(id).await?)),
    }
}

async fn advance(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.dispatch(path.into_inner(), FlowEvent::Advance).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Attach the photo
///
/// PUT /api/v1/flows/{id}/upload?fileName=face.jpg
///
/// The raw request body is the image; `Content-Type` must be `image/*`.
async fn upload(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    query: web::Query<UploadQuery>,
    body: web::Bytes,
    http_req: HttpRequest,
) -> Result<HttpResponse, ServiceError> {
    if let Err(errors) = query.validate() {
        tracing::info!("Validation failed for upload request: {:?}", errors);
        return Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        }));
    }

    let content_type = http_req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let image = UploadedImage::new(query.into_inner().file_name, content_type, body.to_vec());
    tracing::debug!("Upload of {} bytes ({})", image.size, image.content_type);

    let view = state
        .flows
        .dispatch(path.into_inner(), FlowEvent::AttachFile(image))
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn submit(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.dispatch(path.into_inner(), FlowEvent::Submit).await?;
    Ok(HttpResponse::Accepted().json(view))
}

async fn cancel(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.dispatch(path.into_inner(), FlowEvent::Cancel).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn select_match(
    state: web::Data<AppState>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, ServiceError> {
    let (id, match_id) = path.into_inner();
    let view = state
        .flows
        .dispatch(id, FlowEvent::PickMatch { match_id })
        .await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn confirm_payment(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.confirm_payment(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn retry(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.dispatch(path.into_inner(), FlowEvent::Retry).await?;
    Ok(HttpResponse::Ok().json(view))
}

async fn download(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let id = path.into_inner();
    let artifacts = state.flows.download(id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "flowId": id,
        "files": artifacts,
    })))
}

async fn reset(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ServiceError> {
    let view = state.flows.dispatch(path.into_inner(), FlowEvent::Reset).await?;
    Ok(HttpResponse::Ok().json(view))
}
