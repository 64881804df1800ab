//! Organization and client endpoints (writes require PMO)

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::SearchQuery;
use crate::auth::Action;
use crate::db::{
    Client, ClientFields, ClientRepo, Organization, OrganizationFields, OrganizationRepo,
    OrganizationWithCounts,
};
use crate::http::error::ApiError;
use crate::http::extractors::CurrentUser;
use crate::http::patch::{merge, nullable};
use crate::http::server::AppState;
use crate::models::{
    description, optional_text, Code, Email, Name, Paginated, Pagination, PaginationParams,
    ValidationError,
};

const MAX_CONTACT_LEN: usize = 128;
const MAX_PHONE_LEN: usize = 32;
const MAX_NOTES_LEN: usize = 4096;

#[derive(Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateOrganizationRequest {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
}

#[derive(Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub contact_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub notes: Option<Option<String>>,
}

/// Raw client input after PATCH merging, before validation.
struct ClientInput {
    name: String,
    contact_name: Option<String>,
    contact_email: Option<String>,
    phone: Option<String>,
    notes: Option<String>,
}

impl TryFrom<ClientInput> for ClientFields {
    type Error = ValidationError;

    fn try_from(input: ClientInput) -> Result<Self, Self::Error> {
        let contact_email = match input.contact_email.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(email) => Some(Email::new(email)?.as_str().to_owned()),
        };

        Ok(Self {
            name: Name::new(&input.name)?,
            contact_name: optional_text(input.contact_name.as_deref(), "contact_name", MAX_CONTACT_LEN)?,
            contact_email,
            phone: optional_text(input.phone.as_deref(), "phone", MAX_PHONE_LEN)?,
            notes: optional_text(input.notes.as_deref(), "notes", MAX_NOTES_LEN)?,
        })
    }
}

/// GET /organizations
async fn list_organizations(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Query(query): Query<SearchQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<OrganizationWithCounts>>, ApiError> {
    let page = Pagination::from(params);
    let orgs = OrganizationRepo::new(&state.pool)
        .list(query.q.as_deref(), page)
        .await?;
    Ok(Json(orgs))
}

/// POST /organizations
async fn create_organization(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<Organization>), ApiError> {
    current.require(Action::ManageOrganizations)?;

    let fields = OrganizationFields {
        name: Name::new(&req.name)?,
        code: Code::new(&req.code)?,
        description: description(req.description.as_deref())?,
    };
    let org = OrganizationRepo::new(&state.pool).create(fields).await?;

    tracing::info!(org_id = %org.id, code = %org.code, "organization created");
    Ok((StatusCode::CREATED, Json(org)))
}

/// GET /organizations/{id}
async fn get_organization(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Organization>, ApiError> {
    Ok(Json(OrganizationRepo::new(&state.pool).get(id).await?))
}

/// PATCH /organizations/{id}
async fn update_organization(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<Organization>, ApiError> {
    current.require(Action::ManageOrganizations)?;

    let repo = OrganizationRepo::new(&state.pool);
    let org = repo.get(id).await?;

    let fields = OrganizationFields {
        name: Name::new(req.name.as_deref().unwrap_or(&org.name))?,
        code: Code::new(req.code.as_deref().unwrap_or(&org.code))?,
        description: description(merge(req.description, org.description).as_deref())?,
    };
    Ok(Json(repo.update(id, fields).await?))
}

/// DELETE /organizations/{id}
async fn delete_organization(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require(Action::ManageOrganizations)?;
    OrganizationRepo::new(&state.pool).delete(id).await?;

    tracing::info!(org_id = %id, "organization deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /organizations/{id}/clients
async fn list_clients(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(org_id): Path<Uuid>,
    Query(query): Query<SearchQuery>,
    Query(params): Query<PaginationParams>,
) -> Result<Json<Paginated<Client>>, ApiError> {
    OrganizationRepo::new(&state.pool).get(org_id).await?;

    let clients = ClientRepo::new(&state.pool)
        .list_for_organization(org_id, query.q.as_deref(), Pagination::from(params))
        .await?;
    Ok(Json(clients))
}

/// POST /organizations/{id}/clients
async fn create_client(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(org_id): Path<Uuid>,
    Json(req): Json<CreateClientRequest>,
) -> Result<(StatusCode, Json<Client>), ApiError> {
    current.require(Action::ManageOrganizations)?;
    OrganizationRepo::new(&state.pool).get(org_id).await?;

    let fields = ClientFields::try_from(ClientInput {
        name: req.name,
        contact_name: req.contact_name,
        contact_email: req.contact_email,
        phone: req.phone,
        notes: req.notes,
    })?;
    let client = ClientRepo::new(&state.pool).create(org_id, fields).await?;

    tracing::info!(client_id = %client.id, org_id = %org_id, "client created");
    Ok((StatusCode::CREATED, Json(client)))
}

/// GET /clients/{id}
async fn get_client(
    State(state): State<Arc<AppState>>,
    _current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, ApiError> {
    Ok(Json(ClientRepo::new(&state.pool).get(id).await?))
}

/// PATCH /clients/{id}
async fn update_client(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<Client>, ApiError> {
    current.require(Action::ManageOrganizations)?;

    let repo = ClientRepo::new(&state.pool);
    let client = repo.get(id).await?;

    let fields = ClientFields::try_from(ClientInput {
        name: req.name.unwrap_or(client.name),
        contact_name: merge(req.contact_name, client.contact_name),
        contact_email: merge(req.contact_email, client.contact_email),
        phone: merge(req.phone, client.phone),
        notes: merge(req.notes, client.notes),
    })?;
    Ok(Json(repo.update(id, fields).await?))
}

/// DELETE /clients/{id}
///
/// Projects of the client stay, with their client cleared.
async fn delete_client(
    State(state): State<Arc<AppState>>,
    current: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    current.require(Action::ManageOrganizations)?;
    ClientRepo::new(&state.pool).delete(id).await?;

    tracing::info!(client_id = %id, "client deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Organization and client routes
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/organizations",
            get(list_organizations).post(create_organization),
        )
        .route(
            "/organizations/{id}",
            get(get_organization)
                .patch(update_organization)
                .delete(delete_organization),
        )
        .route(
            "/organizations/{id}/clients",
            get(list_clients).post(create_client),
        )
        .route(
            "/clients/{id}",
            get(get_client).patch(update_client).delete(delete_client),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(email: Option<&str>) -> ClientInput {
        ClientInput {
            name: "Globex".into(),
            contact_name: Some("  Hank  ".into()),
            contact_email: email.map(Into::into),
            phone: Some("".into()),
            notes: None,
        }
    }

    #[test]
    fn client_fields_normalize() {
        let fields = ClientFields::try_from(input(Some("Hank@Globex.COM"))).unwrap();
        assert_eq!(fields.contact_email.as_deref(), Some("hank@globex.com"));
        assert_eq!(fields.contact_name.as_deref(), Some("Hank"));
        assert_eq!(fields.phone, None);
    }

    #[test]
    fn client_email_is_validated() {
        assert!(ClientFields::try_from(input(Some("not-an-email"))).is_err());
        assert!(ClientFields::try_from(input(Some("   "))).unwrap().contact_email.is_none());
    }
}
