//! Form payloads posted by the pages, and their conversion into validated inputs.
//!
//! Every field is an `Option<String>` so a missing field becomes a
//! [`ValidationError::MissingField`] naming it, instead of an extractor rejection.
//! Bodies the extractor cannot decode at all go through [`submitted`].

use axum::{Form, extract::rejection::FormRejection};
use serde::Deserialize;
use std::str::FromStr;
use utoipa::ToSchema;

use crate::{
    error::ValidationError,
    models::{ClientInput, ClientSelfUpdate, Role},
};

/// Returns the submitted value, or `MissingField` when absent or blank.
fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Ok(raw),
        _ => Err(ValidationError::MissingField(field)),
    }
}

fn numeric<T: FromStr>(value: &Option<String>, field: &'static str) -> Result<T, ValidationError> {
    required(value, field)?
        .trim()
        .parse()
        .map_err(|_| ValidationError::InvalidNumber(field))
}

/// Like [`numeric`], but `NaN` and the infinities are not amounts.
fn amount(value: &Option<String>, field: &'static str) -> Result<f64, ValidationError> {
    let parsed: f64 = numeric(value, field)?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ValidationError::InvalidNumber(field))
    }
}

/// Unwraps a form extraction. A body that could not be decoded (wrong content type,
/// repeated field) becomes [`ValidationError::UnreadableForm`].
pub fn submitted<T>(form: Result<Form<T>, FormRejection>) -> Result<T, ValidationError> {
    form.map(|Form(inner)| inner).map_err(|rejection| {
        tracing::warn!(status = %rejection.status(), error = %rejection.body_text(), "form body rejected");
        ValidationError::UnreadableForm
    })
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct LoginForm {
    /// Username or email.
    pub username: Option<String>,
    pub password: Option<String>,
}

impl LoginForm {
    /// The identifier (trimmed) and password, or `None` if either is blank.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let identifier = self.username.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let password = self.password.as_deref().filter(|s| !s.is_empty())?;
        Some((identifier, password))
    }
}

/// ClientForm
///
/// The fifteen fields of the agent's create/edit client form.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClientForm {
    pub client_code: Option<String>,
    pub user_id: Option<String>,
    pub rut: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub gender: Option<String>,
    pub insurance_type_id: Option<String>,
    pub annual_income: Option<String>,
    pub monthly_spend: Option<String>,
    pub dependents: Option<String>,
    pub system_classification_id: Option<String>,
    pub agent_classification_id: Option<String>,
}

impl ClientForm {
    /// Checks presence of all fields in form order, then coerces the numeric ones.
    /// Text values are stored exactly as submitted.
    pub fn validate(&self) -> Result<ClientInput, ValidationError> {
        let text = |value: &Option<String>, field| required(value, field).map(str::to_string);

        Ok(ClientInput {
            client_code: text(&self.client_code, "client_code")?,
            user_id: numeric(&self.user_id, "user_id")?,
            rut: text(&self.rut, "rut")?,
            first_name: text(&self.first_name, "first_name")?,
            last_name: text(&self.last_name, "last_name")?,
            address: text(&self.address, "address")?,
            phone: text(&self.phone, "phone")?,
            email: text(&self.email, "email")?,
            gender: text(&self.gender, "gender")?,
            insurance_type_id: numeric(&self.insurance_type_id, "insurance_type_id")?,
            annual_income: amount(&self.annual_income, "annual_income")?,
            monthly_spend: amount(&self.monthly_spend, "monthly_spend")?,
            dependents: numeric(&self.dependents, "dependents")?,
            system_classification_id: numeric(
                &self.system_classification_id,
                "system_classification_id",
            )?,
            agent_classification_id: numeric(
                &self.agent_classification_id,
                "agent_classification_id",
            )?,
        })
    }
}

/// ClientSelfForm
///
/// The client's self-service form. Only these six fields are deserialized; anything
/// else in the body is dropped by serde before validation.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ClientSelfForm {
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub annual_income: Option<String>,
    pub monthly_spend: Option<String>,
    pub dependents: Option<String>,
}

impl ClientSelfForm {
    pub fn validate(&self) -> Result<ClientSelfUpdate, ValidationError> {
        let text = |value: &Option<String>, field| required(value, field).map(|s| s.trim().to_string());

        Ok(ClientSelfUpdate {
            address: text(&self.address, "address")?,
            phone: text(&self.phone, "phone")?,
            email: text(&self.email, "email")?,
            annual_income: amount(&self.annual_income, "annual_income")?,
            monthly_spend: amount(&self.monthly_spend, "monthly_spend")?,
            dependents: numeric(&self.dependents, "dependents")?,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct UserForm {
    pub user_code: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role_id: Option<String>,
}

/// Validated user form; the password is still plaintext here and goes straight to
/// [`crate::auth::register_user`].
#[derive(Clone)]
pub struct ValidUser {
    pub code: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl UserForm {
    pub fn validate(&self) -> Result<ValidUser, ValidationError> {
        let text = |value: &Option<String>, field| required(value, field).map(|s| s.trim().to_string());

        let code = text(&self.user_code, "user_code")?;
        let username = text(&self.username, "username")?;
        let email = text(&self.email, "email")?;
        let password = required(&self.password, "password")?.to_string();
        let role_id: i32 = numeric(&self.role_id, "role_id")?;
        let role = Role::from_id(role_id).ok_or(ValidationError::UnknownRole(role_id))?;

        Ok(ValidUser {
            code,
            username,
            email,
            password,
            role,
        })
    }
}
