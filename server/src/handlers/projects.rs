use actix_web::{
    delete, get, middleware::from_fn, post, put, web, HttpMessage, HttpRequest, HttpResponse,
};

use crate::{
    db::{insert_with_next_id, ProjectFields, Storage, StorageError},
    error::{ApiError, Context, Result},
    middleware::bearer_auth_middleware,
};

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Lenient id parse for route segments: optional leading whitespace and
/// sign, then as many digits as are present (`"12abc"` is 12). Returns
/// `None` when no digits lead the segment.
pub fn parse_route_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let value: i64 = digits[..end].parse().ok()?;

    Some(if negative { -value } else { value })
}

/// Reads the fields of an add or update request.
///
/// A missing or blank body, or one not sent as JSON, is an empty patch.
/// Syntactically broken JSON (or a top-level scalar) answers 400. A body that
/// parses but holds values the string fields cannot take, such as arrays,
/// fails like a rejected write under `failure`.
fn project_fields(
    req: &HttpRequest,
    body: &[u8],
    failure: &'static str,
) -> Result<ProjectFields> {
    let content_type = req.content_type();
    let is_json = content_type.ends_with("/json") || content_type.ends_with("+json");
    if !is_json || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProjectFields::default());
    }

    let value: serde_json::Value = serde_json::from_slice(body).map_err(|err| {
        log::debug!("Rejected request body: {}", err);
        ApiError::Validation("Invalid JSON payload")
    })?;

    match value {
        serde_json::Value::Object(_) => serde_json::from_value(value)
            .map_err(|err| StorageError::Cast(err.to_string()))
            .context(failure),
        serde_json::Value::Array(_) => Err(ApiError::Storage {
            message: failure,
            source: StorageError::Cast("expected an object, found an array".to_string()),
        }),
        _ => Err(ApiError::Validation("Invalid JSON payload")),
    }
}

/// Route segment as a project id; segments without leading digits cannot be
/// cast and fail under `failure`.
fn route_id(raw: &str, failure: &'static str) -> Result<i64> {
    parse_route_id(raw)
        .ok_or_else(|| StorageError::Cast(format!("project id {raw:?} is not a number")))
        .context(failure)
}

#[get("/get", wrap = "from_fn(bearer_auth_middleware)")]
pub async fn list_projects(storage: web::Data<dyn Storage>) -> Result<HttpResponse> {
    let projects = storage
        .find_all_projects()
        .await
        .context("Error fetching projects")?;

    log::debug!("Listed {} projects", projects.len());

    Ok(HttpResponse::Ok().json(projects))
}

#[post("/add", wrap = "from_fn(bearer_auth_middleware)")]
pub async fn add_project(
    req: HttpRequest,
    body: web::Bytes,
    storage: web::Data<dyn Storage>,
) -> Result<HttpResponse> {
    const FAILURE: &str = "Error adding project";

    let fields = project_fields(&req, &body, FAILURE)?;
    let project = insert_with_next_id(storage.get_ref(), fields)
        .await
        .context(FAILURE)?;

    log::info!("Added project {}", project.id);

    Ok(HttpResponse::Created()
        .content_type(TEXT_PLAIN)
        .body("Project Added Successfully!"))
}

#[put("/update/{id}", wrap = "from_fn(bearer_auth_middleware)")]
pub async fn update_project(
    req: HttpRequest,
    path: web::Path<String>,
    body: web::Bytes,
    storage: web::Data<dyn Storage>,
) -> Result<HttpResponse> {
    const FAILURE: &str = "Error updating project";

    let id = route_id(&path, FAILURE)?;
    let fields = project_fields(&req, &body, FAILURE)?;

    // Unmatched ids are still reported as success
    let matched = storage
        .update_project_by_id(id, &fields)
        .await
        .context(FAILURE)?;

    if matched == 0 {
        log::debug!("Update matched no project with id {}", id);
    } else {
        log::info!("Updated project {}", id);
    }

    Ok(HttpResponse::Ok()
        .content_type(TEXT_PLAIN)
        .body("Row Updated Successfully !"))
}

#[delete("/delete/{id}", wrap = "from_fn(bearer_auth_middleware)")]
pub async fn delete_project(
    path: web::Path<String>,
    storage: web::Data<dyn Storage>,
) -> Result<HttpResponse> {
    const FAILURE: &str = "Error deleting project";

    let id = route_id(&path, FAILURE)?;
    let deleted = storage.delete_project_by_id(id).await.context(FAILURE)?;

    if deleted == 0 {
        return Err(ApiError::NotFound("No project found with that id"));
    }

    log::info!("Deleted project {}", id);

    Ok(HttpResponse::Ok()
        .content_type(TEXT_PLAIN)
        .body("Row Deleted Successfully!"))
}
