#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode, header},
};
use seguros_portal::{
    AppState, auth,
    config::AppConfig,
    create_router,
    error::RepoError,
    models::{
        Agent, Client, ClientInput, ClientSelfUpdate, NewUser, ReferenceItem, Role, User,
        UserCredentials,
    },
    repository::{Repository, RepositoryState},
    session::Page,
};
use cookie::Cookie;
use serde::de::DeserializeOwned;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
};
use tower::ServiceExt;

// --- Fixture data ---

pub const AGENT_USERNAME: &str = "agente1";
pub const AGENT_EMAIL: &str = "agente1@seguros.cl";
pub const AGENT_PASSWORD: &str = "Secreta123!";
pub const AGENT_USER_ID: i32 = 1;

pub const CLIENT_USERNAME: &str = "cliente1";
pub const CLIENT_PASSWORD: &str = "Cliente123!";
pub const CLIENT_USER_ID: i32 = 2;
pub const CLIENT_ID: i32 = 1;

/// Client-role user with no linked `clientes` row.
pub const ORPHAN_USERNAME: &str = "cliente2";
pub const ORPHAN_PASSWORD: &str = "Huerfano123!";
pub const ORPHAN_USER_ID: i32 = 3;

// Argon2 is slow in debug builds; hash each fixture password once per test binary.
pub fn hashed(password: &'static str) -> String {
    static HASHES: OnceLock<Mutex<HashMap<&'static str, String>>> = OnceLock::new();
    let mut cache = HASHES.get_or_init(Default::default).lock().unwrap();
    cache
        .entry(password)
        .or_insert_with(|| auth::hash_password(password).unwrap())
        .clone()
}

#[derive(Clone)]
pub struct StoredUser {
    pub code: Option<String>,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: i32,
}

/// The stored shape of a client row (no joined columns).
pub type StoredClient = ClientInput;

#[derive(Default)]
pub struct Tables {
    pub roles: Vec<ReferenceItem>,
    pub users: Vec<(i32, StoredUser)>,
    pub agents: Vec<Agent>,
    pub clients: Vec<(i32, StoredClient)>,
    pub insurance_types: Vec<ReferenceItem>,
    pub system_classifications: Vec<ReferenceItem>,
    pub agent_classifications: Vec<ReferenceItem>,
    next_user_id: i32,
    next_client_id: i32,
}

fn item(id: i32, name: &str) -> ReferenceItem {
    ReferenceItem {
        id,
        name: name.to_string(),
    }
}

pub fn sample_client(user_id: i32, code: &str) -> ClientInput {
    ClientInput {
        client_code: code.to_string(),
        user_id,
        rut: "12.345.678-9".to_string(),
        first_name: "Ana".to_string(),
        last_name: "Rojas".to_string(),
        address: "Av. Providencia 1234".to_string(),
        phone: "+56 9 8765 4321".to_string(),
        email: "ana.rojas@correo.cl".to_string(),
        gender: "F".to_string(),
        insurance_type_id: 2,
        annual_income: 18_000_000.0,
        monthly_spend: 650_000.0,
        dependents: 1,
        system_classification_id: 1,
        agent_classification_id: 2,
    }
}

// --- In-memory repository ---

/// InMemoryRepo
///
/// `Repository` over plain vectors, mirroring the Postgres schema's constraints that
/// the handlers rely on (unique username/email, at most one client per user, and the
/// reference foreign keys on client rows).
/// Setting `failing` makes every call return a database error.
pub struct InMemoryRepo {
    pub tables: Mutex<Tables>,
    pub failing: AtomicBool,
}

impl InMemoryRepo {
    pub fn empty() -> Self {
        InMemoryRepo {
            tables: Mutex::new(Tables {
                next_user_id: 1,
                next_client_id: 1,
                ..Tables::default()
            }),
            failing: AtomicBool::new(false),
        }
    }

    /// Roles, reference rows, an agent, a client with a linked record and a client
    /// login without one.
    pub fn seeded() -> Self {
        let repo = Self::empty();
        {
            let mut t = repo.tables.lock().unwrap();
            t.roles = vec![item(1, "Agente"), item(2, "Cliente")];
            t.insurance_types = vec![item(1, "Vida"), item(2, "Salud"), item(3, "Automotriz")];
            t.system_classifications = vec![item(1, "Bajo riesgo"), item(2, "Alto riesgo")];
            t.agent_classifications = vec![item(1, "Preferente"), item(2, "Regular")];

            t.users = vec![
                (
                    AGENT_USER_ID,
                    StoredUser {
                        code: Some("AG-001".to_string()),
                        username: AGENT_USERNAME.to_string(),
                        email: AGENT_EMAIL.to_string(),
                        password_hash: hashed(AGENT_PASSWORD),
                        role_id: Role::AGENT_ID,
                    },
                ),
                (
                    CLIENT_USER_ID,
                    StoredUser {
                        code: Some("CL-001".to_string()),
                        username: CLIENT_USERNAME.to_string(),
                        email: "cliente1@correo.cl".to_string(),
                        password_hash: hashed(CLIENT_PASSWORD),
                        role_id: Role::CLIENT_ID,
                    },
                ),
                (
                    ORPHAN_USER_ID,
                    StoredUser {
                        code: None,
                        username: ORPHAN_USERNAME.to_string(),
                        email: "cliente2@correo.cl".to_string(),
                        password_hash: hashed(ORPHAN_PASSWORD),
                        role_id: Role::CLIENT_ID,
                    },
                ),
            ];
            t.next_user_id = 4;
            t.agents = vec![Agent {
                id: 1,
                user_id: AGENT_USER_ID,
            }];
            t.clients = vec![(CLIENT_ID, sample_client(CLIENT_USER_ID, "CLI-001"))];
            t.next_client_id = 2;
        }
        repo
    }

    pub fn stored_client(&self, id: i32) -> Option<StoredClient> {
        let t = self.tables.lock().unwrap();
        t.clients.iter().find(|(cid, _)| *cid == id).map(|(_, c)| c.clone())
    }

    pub fn client_count(&self) -> usize {
        self.tables.lock().unwrap().clients.len()
    }

    pub fn remove_user(&self, id: i32) {
        self.tables.lock().unwrap().users.retain(|(uid, _)| *uid != id);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self, operation: &'static str) -> Result<(), RepoError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(database_error(operation, "connection refused"));
        }
        Ok(())
    }
}

fn database_error(operation: &'static str, message: &str) -> RepoError {
    RepoError::Database {
        operation,
        source: sqlx::Error::Protocol(message.to_string()),
    }
}

fn role_name(t: &Tables, role_id: i32) -> String {
    t.roles
        .iter()
        .find(|r| r.id == role_id)
        .map(|r| r.name.clone())
        .unwrap_or_default()
}

/// Mirrors the foreign keys on `clientes`.
fn dangling_reference(t: &Tables, input: &ClientInput) -> bool {
    let known = |items: &[ReferenceItem], id: i32| items.iter().any(|i| i.id == id);
    !t.users.iter().any(|(uid, _)| *uid == input.user_id)
        || !known(&t.insurance_types, input.insurance_type_id)
        || !known(&t.system_classifications, input.system_classification_id)
        || !known(&t.agent_classifications, input.agent_classification_id)
}

fn name_of(items: &[ReferenceItem], id: i32) -> Option<String> {
    items.iter().find(|i| i.id == id).map(|i| i.name.clone())
}

fn to_user(t: &Tables, id: i32, u: &StoredUser) -> User {
    User {
        id,
        code: u.code.clone(),
        username: u.username.clone(),
        email: u.email.clone(),
        role_id: u.role_id,
        role_name: role_name(t, u.role_id),
    }
}

fn to_client(t: &Tables, id: i32, c: &StoredClient) -> Client {
    Client {
        id,
        user_id: Some(c.user_id),
        client_code: c.client_code.clone(),
        rut: c.rut.clone(),
        first_name: c.first_name.clone(),
        last_name: c.last_name.clone(),
        address: c.address.clone(),
        phone: c.phone.clone(),
        email: c.email.clone(),
        gender: c.gender.clone(),
        insurance_type_id: c.insurance_type_id,
        annual_income: c.annual_income,
        monthly_spend: c.monthly_spend,
        dependents: c.dependents,
        system_classification_id: c.system_classification_id,
        agent_classification_id: c.agent_classification_id,
        insurance_type_name: name_of(&t.insurance_types, c.insurance_type_id),
        system_classification: name_of(&t.system_classifications, c.system_classification_id),
        agent_classification: name_of(&t.agent_classifications, c.agent_classification_id),
        username: t
            .users
            .iter()
            .find(|(uid, _)| *uid == c.user_id)
            .map(|(_, u)| u.username.clone()),
    }
}

fn user_taken_by_other_client(t: &Tables, user_id: i32, except: Option<i32>) -> bool {
    t.clients
        .iter()
        .any(|(cid, c)| c.user_id == user_id && Some(*cid) != except)
}

#[async_trait]
impl Repository for InMemoryRepo {
    async fn find_login_candidates(&self, identifier: &str) -> Result<Vec<UserCredentials>, RepoError> {
        self.check("find_login_candidates")?;
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .filter(|(_, u)| u.username == identifier || u.email == identifier)
            .map(|(id, u)| UserCredentials {
                id: *id,
                username: u.username.clone(),
                email: u.email.clone(),
                password_hash: u.password_hash.clone(),
                role_id: u.role_id,
                role_name: role_name(&t, u.role_id),
            })
            .collect())
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, RepoError> {
        self.check("get_user")?;
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .find(|(uid, _)| *uid == id)
            .map(|(uid, u)| to_user(&t, *uid, u)))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        self.check("list_users")?;
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().map(|(id, u)| to_user(&t, *id, u)).collect())
    }

    async fn create_user(&self, user: NewUser) -> Result<i32, RepoError> {
        self.check("create_user")?;
        let mut t = self.tables.lock().unwrap();
        if t
            .users
            .iter()
            .any(|(_, u)| u.username == user.username || u.email == user.email)
        {
            return Err(database_error("create_user", "duplicate key value"));
        }
        let id = t.next_user_id;
        t.next_user_id += 1;
        t.users.push((
            id,
            StoredUser {
                code: Some(user.code),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                role_id: user.role.id(),
            },
        ));
        if user.role == Role::Agent {
            let agent_id = t.agents.len() as i32 + 1;
            t.agents.push(Agent {
                id: agent_id,
                user_id: id,
            });
        }
        Ok(id)
    }

    async fn get_agent_by_user_id(&self, user_id: i32) -> Result<Option<Agent>, RepoError> {
        self.check("get_agent_by_user_id")?;
        let t = self.tables.lock().unwrap();
        Ok(t.agents.iter().find(|a| a.user_id == user_id).cloned())
    }

    async fn list_clients(&self) -> Result<Vec<Client>, RepoError> {
        self.check("list_clients")?;
        let t = self.tables.lock().unwrap();
        Ok(t.clients.iter().map(|(id, c)| to_client(&t, *id, c)).collect())
    }

    async fn get_client(&self, id: i32) -> Result<Option<Client>, RepoError> {
        self.check("get_client")?;
        let t = self.tables.lock().unwrap();
        Ok(t.clients
            .iter()
            .find(|(cid, _)| *cid == id)
            .map(|(cid, c)| to_client(&t, *cid, c)))
    }

    async fn get_client_by_user(&self, user_id: i32) -> Result<Option<Client>, RepoError> {
        self.check("get_client_by_user")?;
        let t = self.tables.lock().unwrap();
        Ok(t.clients
            .iter()
            .find(|(_, c)| c.user_id == user_id)
            .map(|(cid, c)| to_client(&t, *cid, c)))
    }

    async fn create_client(&self, input: ClientInput) -> Result<i32, RepoError> {
        self.check("create_client")?;
        let mut t = self.tables.lock().unwrap();
        if user_taken_by_other_client(&t, input.user_id, None) {
            return Err(database_error("create_client", "duplicate key value"));
        }
        if dangling_reference(&t, &input) {
            return Err(database_error("create_client", "foreign key violation"));
        }
        let id = t.next_client_id;
        t.next_client_id += 1;
        t.clients.push((id, input));
        Ok(id)
    }

    async fn update_client(&self, id: i32, input: ClientInput) -> Result<bool, RepoError> {
        self.check("update_client")?;
        let mut t = self.tables.lock().unwrap();
        if user_taken_by_other_client(&t, input.user_id, Some(id)) {
            return Err(database_error("update_client", "duplicate key value"));
        }
        let dangling = dangling_reference(&t, &input);
        match t.clients.iter_mut().find(|(cid, _)| *cid == id) {
            Some(_) if dangling => Err(database_error("update_client", "foreign key violation")),
            Some((_, stored)) => {
                *stored = input;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_own_client(&self, user_id: i32, update: ClientSelfUpdate) -> Result<Option<i32>, RepoError> {
        self.check("update_own_client")?;
        let mut t = self.tables.lock().unwrap();
        Ok(t.clients
            .iter_mut()
            .find(|(_, c)| c.user_id == user_id)
            .map(|(cid, c)| {
                c.address = update.address;
                c.phone = update.phone;
                c.email = update.email;
                c.annual_income = update.annual_income;
                c.monthly_spend = update.monthly_spend;
                c.dependents = update.dependents;
                *cid
            }))
    }

    async fn delete_client(&self, id: i32) -> Result<bool, RepoError> {
        self.check("delete_client")?;
        let mut t = self.tables.lock().unwrap();
        let before = t.clients.len();
        t.clients.retain(|(cid, _)| *cid != id);
        Ok(t.clients.len() < before)
    }

    async fn list_roles(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.check("list_roles")?;
        Ok(self.tables.lock().unwrap().roles.clone())
    }

    async fn list_insurance_types(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.check("list_insurance_types")?;
        Ok(self.tables.lock().unwrap().insurance_types.clone())
    }

    async fn list_system_classifications(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.check("list_system_classifications")?;
        Ok(self.tables.lock().unwrap().system_classifications.clone())
    }

    async fn list_agent_classifications(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.check("list_agent_classifications")?;
        Ok(self.tables.lock().unwrap().agent_classifications.clone())
    }
}

// --- Router harness ---

pub fn state(repo: Arc<InMemoryRepo>, config: AppConfig) -> AppState {
    AppState {
        repo: repo as RepositoryState,
        config,
    }
}

pub fn app(repo: Arc<InMemoryRepo>) -> Router {
    create_router(state(repo, AppConfig::default()))
}

/// Minimal cookie jar: applies `Set-Cookie` headers and replays them.
#[derive(Default, Clone)]
pub struct Jar {
    cookies: HashMap<String, Cookie<'static>>,
}

impl Jar {
    pub fn absorb<B>(&mut self, response: &Response<B>) {
        for value in response.headers().get_all(header::SET_COOKIE) {
            let cookie = Cookie::parse(value.to_str().unwrap().to_owned()).unwrap();
            let expired = cookie.max_age().is_some_and(|age| age.is_zero());
            if cookie.value().is_empty() || expired {
                self.cookies.remove(cookie.name());
            } else {
                self.cookies.insert(cookie.name().to_owned(), cookie);
            }
        }
    }

    pub fn has(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    fn header(&self) -> String {
        self.cookies
            .values()
            .map(|cookie| cookie.stripped().to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// A browser-like client: keeps cookies between requests.
pub struct Browser {
    pub app: Router,
    pub jar: Jar,
}

impl Browser {
    pub fn new(app: Router) -> Self {
        Browser {
            app,
            jar: Jar::default(),
        }
    }

    pub async fn send(&mut self, method: &str, uri: &str, form: Option<&str>) -> Response<Body> {
        let body = form.map(|encoded| ("application/x-www-form-urlencoded", encoded));
        self.send_with(method, uri, body).await
    }

    /// Sends `body` with an explicit content type.
    pub async fn send_with(
        &mut self,
        method: &str,
        uri: &str,
        body: Option<(&str, &str)>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if !self.jar.cookies.is_empty() {
            builder = builder.header(header::COOKIE, self.jar.header());
        }
        let body = match body {
            Some((content_type, raw)) => {
                builder = builder.header(header::CONTENT_TYPE, content_type);
                Body::from(raw.to_string())
            }
            None => Body::empty(),
        };
        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        self.jar.absorb(&response);
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send("GET", uri, None).await
    }

    pub async fn post(&mut self, uri: &str, form: &str) -> Response<Body> {
        self.send("POST", uri, Some(form)).await
    }

    /// Logs in and asserts the role redirect happened.
    pub async fn login(&mut self, username: &str, password: &str) {
        let response = self
            .post("/login", &login_body(username, password))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "login as {username} failed");
    }

    /// Follows a redirect response once and returns the rendered page.
    pub async fn follow(&mut self, response: Response<Body>) -> Response<Body> {
        let target = location(&response);
        self.get(&target).await
    }
}

pub fn location<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("response is not a redirect")
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn json<T: DeserializeOwned>(response: Response<Body>) -> T {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn page<T: DeserializeOwned>(response: Response<Body>) -> Page<T> {
    assert_eq!(response.status(), StatusCode::OK);
    json(response).await
}

pub fn messages<T>(page: &Page<T>) -> Vec<String> {
    page.flashes.iter().map(|f| f.message.clone()).collect()
}

/// URL-encoded form body from field/value pairs.
pub fn form_body(pairs: &[(&str, &str)]) -> String {
    serde_urlencoded::to_string(pairs).unwrap()
}

pub fn login_body(username: &str, password: &str) -> String {
    form_body(&[("username", username), ("password", password)])
}

/// URL-encoded body for the agent's client form.
pub fn client_form_body(input: &ClientInput) -> String {
    let fields = [
        ("client_code", input.client_code.clone()),
        ("user_id", input.user_id.to_string()),
        ("rut", input.rut.clone()),
        ("first_name", input.first_name.clone()),
        ("last_name", input.last_name.clone()),
        ("address", input.address.clone()),
        ("phone", input.phone.clone()),
        ("email", input.email.clone()),
        ("gender", input.gender.clone()),
        ("insurance_type_id", input.insurance_type_id.to_string()),
        ("annual_income", input.annual_income.to_string()),
        ("monthly_spend", input.monthly_spend.to_string()),
        ("dependents", input.dependents.to_string()),
        ("system_classification_id", input.system_classification_id.to_string()),
        ("agent_classification_id", input.agent_classification_id.to_string()),
    ];
    let pairs: Vec<(&str, &str)> = fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
    form_body(&pairs)
}
