use crate::{
    database::failure,
    error::RepoError,
    models::{Agent, Client, ClientInput, ClientSelfUpdate, NewUser, ReferenceItem, Role, User, UserCredentials},
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;

/// Repository Trait
///
/// The persistence contract used by the handlers and the auth service. Reads return
/// `Ok(None)` / an empty `Vec` when nothing matched and `Err` only when the statement
/// itself failed; mutations return `Ok(false)` when no row matched.
///
/// `Send + Sync` lets `Arc<dyn Repository>` live inside the axum state.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users & Agents ---
    /// Users whose username OR email equals `identifier` exactly.
    async fn find_login_candidates(&self, identifier: &str) -> Result<Vec<UserCredentials>, RepoError>;
    async fn get_user(&self, id: i32) -> Result<Option<User>, RepoError>;
    async fn list_users(&self) -> Result<Vec<User>, RepoError>;
    /// Inserts the user (and its `agentes` row for agents) in one transaction.
    async fn create_user(&self, user: NewUser) -> Result<i32, RepoError>;
    async fn get_agent_by_user_id(&self, user_id: i32) -> Result<Option<Agent>, RepoError>;

    // --- Clients ---
    async fn list_clients(&self) -> Result<Vec<Client>, RepoError>;
    async fn get_client(&self, id: i32) -> Result<Option<Client>, RepoError>;
    async fn get_client_by_user(&self, user_id: i32) -> Result<Option<Client>, RepoError>;
    async fn create_client(&self, input: ClientInput) -> Result<i32, RepoError>;
    async fn update_client(&self, id: i32, input: ClientInput) -> Result<bool, RepoError>;
    /// Looks up the client linked to `user_id` and applies the restricted update in
    /// one transaction. Returns the client id, or `None` when no client is linked.
    async fn update_own_client(&self, user_id: i32, update: ClientSelfUpdate) -> Result<Option<i32>, RepoError>;
    async fn delete_client(&self, id: i32) -> Result<bool, RepoError>;

    // --- Reference data ---
    async fn list_roles(&self) -> Result<Vec<ReferenceItem>, RepoError>;
    async fn list_insurance_types(&self) -> Result<Vec<ReferenceItem>, RepoError>;
    async fn list_system_classifications(&self) -> Result<Vec<ReferenceItem>, RepoError>;
    async fn list_agent_classifications(&self) -> Result<Vec<ReferenceItem>, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// PostgresRepository
///
/// The `Repository` implementation backed by a Postgres pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const USER_COLUMNS: &str = r#"
    SELECT u.id_usuario AS id, u.codigo_usuario AS code, u.nombre_usuario AS username,
           u.correo_electronico AS email, u.id_rol AS role_id, r.nombre_rol AS role_name
    FROM usuarios u
    JOIN roles r ON u.id_rol = r.id_rol
"#;

// Enriched client view shared by every client read.
const CLIENT_COLUMNS: &str = r#"
    SELECT
        c.id_cliente AS id, c.id_usuario AS user_id, c.codigo_cliente AS client_code,
        c.rut, c.nombre AS first_name, c.apellido AS last_name, c.direccion AS address,
        c.telefono AS phone, c.correo_electronico AS email, c.genero AS gender,
        c.id_tipo_seguro AS insurance_type_id, c.ingresos_anuales AS annual_income,
        c.gasto_mensual AS monthly_spend, c.carga_familiar AS dependents,
        c.id_clasificacion_sistema AS system_classification_id,
        c.id_clasificacion_agente AS agent_classification_id,
        ts.nombre_tipo_seguro AS insurance_type_name,
        cs.nombre AS system_classification,
        ca.nombre AS agent_classification,
        u.nombre_usuario AS username
    FROM clientes c
    LEFT JOIN tipos_seguros ts ON c.id_tipo_seguro = ts.id_tipo_seguro
    LEFT JOIN clasificaciones_sistema cs ON c.id_clasificacion_sistema = cs.id_clasificacion_sistema
    LEFT JOIN clasificaciones_agente ca ON c.id_clasificacion_agente = ca.id_clasificacion_agente
    LEFT JOIN usuarios u ON c.id_usuario = u.id_usuario
"#;

impl PostgresRepository {
    async fn reference_rows(&self, operation: &'static str, sql: &'static str) -> Result<Vec<ReferenceItem>, RepoError> {
        sqlx::query_as::<_, ReferenceItem>(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| failure(operation, sql, (), e))
    }

    async fn client_where(&self, operation: &'static str, filter: &str, key: i32) -> Result<Option<Client>, RepoError> {
        let sql = format!("{CLIENT_COLUMNS} WHERE {filter} = $1");
        sqlx::query_as::<_, Client>(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| failure(operation, &sql, (key,), e))
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    /// find_login_candidates
    ///
    /// Single query over both unique identifiers. Case-sensitive by Postgres `=` semantics.
    async fn find_login_candidates(&self, identifier: &str) -> Result<Vec<UserCredentials>, RepoError> {
        const SQL: &str = r#"
            SELECT u.id_usuario AS id, u.nombre_usuario AS username, u.correo_electronico AS email,
                   u.password_hash, u.id_rol AS role_id, r.nombre_rol AS role_name
            FROM usuarios u
            JOIN roles r ON u.id_rol = r.id_rol
            WHERE u.nombre_usuario = $1 OR u.correo_electronico = $1
        "#;
        sqlx::query_as::<_, UserCredentials>(SQL)
            .bind(identifier)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| failure("find_login_candidates", SQL, (identifier,), e))
    }

    async fn get_user(&self, id: i32) -> Result<Option<User>, RepoError> {
        let sql = format!("{USER_COLUMNS} WHERE u.id_usuario = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| failure("get_user", &sql, (id,), e))
    }

    async fn list_users(&self) -> Result<Vec<User>, RepoError> {
        let sql = format!("{USER_COLUMNS} ORDER BY u.id_usuario");
        sqlx::query_as::<_, User>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| failure("list_users", &sql, (), e))
    }

    /// create_user
    ///
    /// Inserts into `usuarios` and, for agents, `agentes`. Both rows commit together;
    /// an error on either statement drops the transaction, which rolls it back.
    async fn create_user(&self, user: NewUser) -> Result<i32, RepoError> {
        const INSERT_USER: &str = r#"
            INSERT INTO usuarios (codigo_usuario, nombre_usuario, correo_electronico, password_hash, id_rol)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id_usuario
        "#;
        const INSERT_AGENT: &str = "INSERT INTO agentes (id_usuario) VALUES ($1)";

        // The hash is left out of every logged params tuple.
        let params = (&user.code, &user.username, &user.email, user.role.id());

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| failure("create_user", "BEGIN", (), e))?;

        let id: i32 = sqlx::query_scalar(INSERT_USER)
            .bind(&user.code)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.id())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| failure("create_user", INSERT_USER, params, e))?;

        if user.role == Role::Agent {
            sqlx::query(INSERT_AGENT)
                .bind(id)
                .execute(&mut *tx)
                .await
                .map_err(|e| failure("create_user", INSERT_AGENT, (id,), e))?;
        }

        tx.commit()
            .await
            .map_err(|e| failure("create_user", "COMMIT", (), e))?;
        Ok(id)
    }

    async fn get_agent_by_user_id(&self, user_id: i32) -> Result<Option<Agent>, RepoError> {
        const SQL: &str = "SELECT id_agente AS id, id_usuario AS user_id FROM agentes WHERE id_usuario = $1";
        sqlx::query_as::<_, Agent>(SQL)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| failure("get_agent_by_user_id", SQL, (user_id,), e))
    }

    async fn list_clients(&self) -> Result<Vec<Client>, RepoError> {
        let sql = format!("{CLIENT_COLUMNS} ORDER BY c.id_cliente");
        sqlx::query_as::<_, Client>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| failure("list_clients", &sql, (), e))
    }

    async fn get_client(&self, id: i32) -> Result<Option<Client>, RepoError> {
        self.client_where("get_client", "c.id_cliente", id).await
    }

    /// get_client_by_user
    ///
    /// `clientes.id_usuario` is UNIQUE, so at most one row can match.
    async fn get_client_by_user(&self, user_id: i32) -> Result<Option<Client>, RepoError> {
        self.client_where("get_client_by_user", "c.id_usuario", user_id).await
    }

    async fn create_client(&self, input: ClientInput) -> Result<i32, RepoError> {
        const SQL: &str = r#"
            INSERT INTO clientes (
                codigo_cliente, id_usuario, rut, nombre, apellido, direccion,
                telefono, correo_electronico, genero, id_tipo_seguro,
                ingresos_anuales, gasto_mensual, carga_familiar,
                id_clasificacion_sistema, id_clasificacion_agente
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING id_cliente
        "#;
        sqlx::query_scalar::<_, i32>(SQL)
            .bind(&input.client_code)
            .bind(input.user_id)
            .bind(&input.rut)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.address)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(&input.gender)
            .bind(input.insurance_type_id)
            .bind(input.annual_income)
            .bind(input.monthly_spend)
            .bind(input.dependents)
            .bind(input.system_classification_id)
            .bind(input.agent_classification_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| failure("create_client", SQL, &input, e))
    }

    async fn update_client(&self, id: i32, input: ClientInput) -> Result<bool, RepoError> {
        const SQL: &str = r#"
            UPDATE clientes SET
                codigo_cliente = $2, id_usuario = $3, rut = $4, nombre = $5, apellido = $6,
                direccion = $7, telefono = $8, correo_electronico = $9, genero = $10,
                id_tipo_seguro = $11, ingresos_anuales = $12, gasto_mensual = $13,
                carga_familiar = $14, id_clasificacion_sistema = $15,
                id_clasificacion_agente = $16
            WHERE id_cliente = $1
        "#;
        sqlx::query(SQL)
            .bind(id)
            .bind(&input.client_code)
            .bind(input.user_id)
            .bind(&input.rut)
            .bind(&input.first_name)
            .bind(&input.last_name)
            .bind(&input.address)
            .bind(&input.phone)
            .bind(&input.email)
            .bind(&input.gender)
            .bind(input.insurance_type_id)
            .bind(input.annual_income)
            .bind(input.monthly_spend)
            .bind(input.dependents)
            .bind(input.system_classification_id)
            .bind(input.agent_classification_id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| failure("update_client", SQL, (id, &input), e))
    }

    /// update_own_client
    ///
    /// Lookup-then-update under a row lock. Only the six self-service columns appear
    /// in the statement, so no other column can change through this path.
    async fn update_own_client(&self, user_id: i32, update: ClientSelfUpdate) -> Result<Option<i32>, RepoError> {
        const LOOKUP: &str = "SELECT id_cliente FROM clientes WHERE id_usuario = $1 FOR UPDATE";
        const UPDATE: &str = r#"
            UPDATE clientes SET
                direccion = $2, telefono = $3, correo_electronico = $4,
                ingresos_anuales = $5, gasto_mensual = $6, carga_familiar = $7
            WHERE id_cliente = $1
        "#;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| failure("update_own_client", "BEGIN", (), e))?;

        let client_id: Option<i32> = sqlx::query_scalar(LOOKUP)
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| failure("update_own_client", LOOKUP, (user_id,), e))?;

        let Some(client_id) = client_id else {
            return Ok(None);
        };

        sqlx::query(UPDATE)
            .bind(client_id)
            .bind(&update.address)
            .bind(&update.phone)
            .bind(&update.email)
            .bind(update.annual_income)
            .bind(update.monthly_spend)
            .bind(update.dependents)
            .execute(&mut *tx)
            .await
            .map_err(|e| failure("update_own_client", UPDATE, (client_id, &update), e))?;

        tx.commit()
            .await
            .map_err(|e| failure("update_own_client", "COMMIT", (client_id,), e))?;
        Ok(Some(client_id))
    }

    /// delete_client
    ///
    /// Hard delete. The linked `usuarios` row is left in place.
    async fn delete_client(&self, id: i32) -> Result<bool, RepoError> {
        const SQL: &str = "DELETE FROM clientes WHERE id_cliente = $1";
        sqlx::query(SQL)
            .bind(id)
            .execute(&self.pool)
            .await
            .map(|res| res.rows_affected() > 0)
            .map_err(|e| failure("delete_client", SQL, (id,), e))
    }

    async fn list_roles(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.reference_rows(
            "list_roles",
            "SELECT id_rol AS id, nombre_rol AS name FROM roles ORDER BY id_rol",
        )
        .await
    }

    async fn list_insurance_types(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.reference_rows(
            "list_insurance_types",
            "SELECT id_tipo_seguro AS id, nombre_tipo_seguro AS name FROM tipos_seguros ORDER BY id_tipo_seguro",
        )
        .await
    }

    async fn list_system_classifications(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.reference_rows(
            "list_system_classifications",
            "SELECT id_clasificacion_sistema AS id, nombre AS name FROM clasificaciones_sistema ORDER BY id_clasificacion_sistema",
        )
        .await
    }

    async fn list_agent_classifications(&self) -> Result<Vec<ReferenceItem>, RepoError> {
        self.reference_rows(
            "list_agent_classifications",
            "SELECT id_clasificacion_agente AS id, nombre AS name FROM clasificaciones_agente ORDER BY id_clasificacion_agente",
        )
        .await
    }
}
