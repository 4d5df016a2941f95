//! PostgreSQL storage implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, QueryBuilder, Row};
use tracing::{debug, instrument, warn};

use crate::error::{StorageError, StorageResult};
use crate::models::{ActivityCode, Company, Establishment, Partner};
use crate::traits::{capital_bound, criterion, Pagination, ProspectFilter, RegistryStore};

/// Default query timeout in seconds.
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

const COMPANY_COLUMNS: &str = "cnpj_basico, razao_social, natureza_juridica, \
    qualificacao_responsavel, porte_empresa, ente_federativo_responsavel, \
    capital_social::float8 AS capital_social";

const ESTABLISHMENT_COLUMNS: &str = "e.id::bigint AS id, e.cnpj, e.cnpj_basico, e.cnpj_ordem, \
    e.cnpj_dv, e.matriz_filial, e.nome_fantasia, e.situacao_cadastral, \
    e.data_situacao_cadastral, e.motivo_situacao_cadastral, e.nome_cidade_exterior, e.pais, \
    e.data_inicio_atividades, e.cnae_fiscal, e.cnae_fiscal_secundaria, e.tipo_logradouro, \
    e.logradouro, e.numero, e.complemento, e.bairro, e.cep, e.uf, e.municipio, e.ddd1, \
    e.telefone1, e.ddd2, e.telefone2, e.ddd_fax, e.fax, e.correio_eletronico, \
    e.situacao_especial, e.data_situacao_especial";

const PARTNER_COLUMNS: &str = "cnpj, cnpj_basico, identificador_de_socio, nome_socio, \
    cnpj_cpf_socio, qualificacao_socio, data_entrada_sociedade, pais, representante_legal, \
    nome_representante, qualificacao_representante_legal, faixa_etaria";

/// PostgreSQL configuration options.
#[derive(Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    pub min_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Maximum time to wait for a single query before failing with
    /// `StorageError::QueryTimeout`.
    pub query_timeout_secs: u64,
    /// Number of connection attempts made at startup.
    pub connect_attempts: u32,
    /// Delay between connection attempts.
    pub connect_retry_interval: Duration,
}

// Custom Debug implementation to hide credentials in database_url
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("query_timeout_secs", &self.query_timeout_secs)
            .field("connect_attempts", &self.connect_attempts)
            .field("connect_retry_interval", &self.connect_retry_interval)
            .finish()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/prospecta".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_attempts: 5,
            connect_retry_interval: Duration::from_secs(5),
        }
    }
}

/// Reads a nullable text column, mapping NULL to an empty string.
fn text(row: &PgRow, column: &str) -> StorageResult<String> {
    row.try_get::<Option<String>, _>(column)
        .map(Option::unwrap_or_default)
        .map_err(|e| StorageError::RowMapping {
            message: format!("column '{column}': {e}"),
        })
}

fn row_to_company(row: &PgRow) -> StorageResult<Company> {
    let share_capital: Option<f64> = row
        .try_get("capital_social")
        .map_err(|e| StorageError::RowMapping {
            message: format!("column 'capital_social': {e}"),
        })?;
    Ok(Company {
        base_id: text(row, "cnpj_basico")?,
        legal_name: text(row, "razao_social")?,
        legal_nature: text(row, "natureza_juridica")?,
        responsible_qualification: text(row, "qualificacao_responsavel")?,
        size: text(row, "porte_empresa")?,
        responsible_federative_entity: text(row, "ente_federativo_responsavel")?,
        share_capital: share_capital.unwrap_or_default(),
    })
}

fn row_to_establishment(row: &PgRow) -> StorageResult<Establishment> {
    let id: Option<i64> = row.try_get("id").map_err(|e| StorageError::RowMapping {
        message: format!("column 'id': {e}"),
    })?;
    Ok(Establishment {
        id: id.unwrap_or_default(),
        cnpj: text(row, "cnpj")?,
        base_id: text(row, "cnpj_basico")?,
        order: text(row, "cnpj_ordem")?,
        check_digits: text(row, "cnpj_dv")?,
        head_office_flag: text(row, "matriz_filial")?,
        trade_name: text(row, "nome_fantasia")?,
        registration_status: text(row, "situacao_cadastral")?,
        registration_status_date: text(row, "data_situacao_cadastral")?,
        registration_status_reason: text(row, "motivo_situacao_cadastral")?,
        foreign_city: text(row, "nome_cidade_exterior")?,
        country: text(row, "pais")?,
        activity_start: text(row, "data_inicio_atividades")?,
        primary_activity: text(row, "cnae_fiscal")?,
        secondary_activities: text(row, "cnae_fiscal_secundaria")?,
        street_type: text(row, "tipo_logradouro")?,
        street: text(row, "logradouro")?,
        number: text(row, "numero")?,
        complement: text(row, "complemento")?,
        district: text(row, "bairro")?,
        postal_code: text(row, "cep")?,
        state: text(row, "uf")?,
        municipality: text(row, "municipio")?,
        phone1_area: text(row, "ddd1")?,
        phone1: text(row, "telefone1")?,
        phone2_area: text(row, "ddd2")?,
        phone2: text(row, "telefone2")?,
        fax_area: text(row, "ddd_fax")?,
        fax: text(row, "fax")?,
        email: text(row, "correio_eletronico")?,
        special_status: text(row, "situacao_especial")?,
        special_status_date: text(row, "data_situacao_especial")?,
    })
}

fn row_to_partner(row: &PgRow) -> StorageResult<Partner> {
    Ok(Partner {
        cnpj: text(row, "cnpj")?,
        base_id: text(row, "cnpj_basico")?,
        partner_kind: text(row, "identificador_de_socio")?,
        name: text(row, "nome_socio")?,
        document: text(row, "cnpj_cpf_socio")?,
        qualification: text(row, "qualificacao_socio")?,
        joined_on: text(row, "data_entrada_sociedade")?,
        country: text(row, "pais")?,
        legal_representative: text(row, "representante_legal")?,
        representative_name: text(row, "nome_representante")?,
        representative_qualification: text(row, "qualificacao_representante_legal")?,
        age_range: text(row, "faixa_etaria")?,
    })
}

fn row_to_activity_code(row: &PgRow) -> StorageResult<ActivityCode> {
    Ok(ActivityCode {
        code: text(row, "codigo")?,
        description: text(row, "descricao")?,
    })
}

/// Appends `AND <column> <op> <bind>` to the builder.
fn push_predicate<'a>(
    builder: &mut QueryBuilder<'a, Postgres>,
    column: &str,
    op: &str,
    value: String,
) {
    builder.push(format!(" AND {column} {op} "));
    builder.push_bind(value);
}

/// Apply filter conditions to a query builder.
fn apply_prospect_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &ProspectFilter) {
    if let Some(v) = criterion(&filter.cnpj) {
        push_predicate(builder, "e.cnpj", "=", v.to_string());
    }
    if let Some(v) = criterion(&filter.trade_name) {
        push_predicate(builder, "e.nome_fantasia", "ILIKE", format!("%{v}%"));
    }
    if let Some(v) = criterion(&filter.state) {
        push_predicate(builder, "e.uf", "=", v.to_string());
    }
    if let Some(v) = criterion(&filter.registration_status) {
        push_predicate(builder, "e.situacao_cadastral", "=", v.to_string());
    }
    if let Some(v) = criterion(&filter.primary_activity) {
        push_predicate(builder, "e.cnae_fiscal", "=", v.to_string());
    }
    if let Some(v) = criterion(&filter.secondary_activity) {
        push_predicate(builder, "e.cnae_fiscal_secundaria", "LIKE", format!("%{v}%"));
    }
    if let Some(v) = criterion(&filter.legal_name) {
        push_predicate(builder, "emp.razao_social", "ILIKE", format!("%{v}%"));
    }
    if let Some(v) = criterion(&filter.company_size) {
        push_predicate(builder, "emp.porte_empresa", "=", v.to_string());
    }
    if let Some(min) = capital_bound(filter.min_share_capital) {
        builder.push(" AND emp.capital_social >= ");
        builder.push_bind(min);
    }
    if let Some(max) = capital_bound(filter.max_share_capital) {
        builder.push(" AND emp.capital_social <= ");
        builder.push_bind(max);
    }
    if let Some(v) = criterion(&filter.municipality) {
        push_predicate(builder, "e.municipio", "ILIKE", format!("%{v}%"));
    }
    if let Some(v) = criterion(&filter.legal_nature) {
        push_predicate(builder, "emp.natureza_juridica", "=", v.to_string());
    }
    if let Some(v) = criterion(&filter.registration_status_date_min) {
        push_predicate(builder, "e.data_situacao_cadastral", ">=", v.to_string());
    }
    if let Some(v) = criterion(&filter.registration_status_date_max) {
        push_predicate(builder, "e.data_situacao_cadastral", "<=", v.to_string());
    }
    if let Some(v) = criterion(&filter.activity_start_min) {
        push_predicate(builder, "e.data_inicio_atividades", ">=", v.to_string());
    }
    if let Some(v) = criterion(&filter.activity_start_max) {
        push_predicate(builder, "e.data_inicio_atividades", "<=", v.to_string());
    }
}

/// PostgreSQL implementation of RegistryStore.
#[derive(Debug)]
pub struct PostgresRegistryStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PostgresRegistryStore {
    /// Creates a new PostgreSQL registry store from configuration.
    ///
    /// Connection failures are retried `connect_attempts` times before the
    /// last error is returned.
    pub async fn from_config(config: &PostgresConfig) -> StorageResult<Self> {
        let attempts = config.connect_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            let connected = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .min_connections(config.min_connections)
                .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
                .connect(&config.database_url)
                .await;

            match connected {
                Ok(pool) => {
                    debug!(attempt, "Connected to PostgreSQL");
                    return Ok(Self {
                        pool,
                        query_timeout: Duration::from_secs(config.query_timeout_secs),
                    });
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "PostgreSQL connection attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(config.connect_retry_interval).await;
                    }
                }
            }
        }

        Err(StorageError::ConnectionError {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no connection attempt made".to_string()),
        })
    }

    /// Creates a new PostgreSQL registry store from a database URL.
    pub async fn from_url(database_url: &str) -> StorageResult<Self> {
        let config = PostgresConfig {
            database_url: database_url.to_string(),
            ..Default::default()
        };
        Self::from_config(&config).await
    }

    /// Returns the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Runs a query future with the configured timeout.
    async fn execute_with_timeout<T, F>(&self, operation: &str, future: F) -> StorageResult<T>
    where
        F: std::future::Future<Output = StorageResult<T>>,
    {
        match tokio::time::timeout(self.query_timeout, future).await {
            Ok(result) => result,
            Err(_elapsed) => Err(StorageError::QueryTimeout {
                operation: operation.to_string(),
                timeout: self.query_timeout,
            }),
        }
    }

    async fn fetch_rows(
        &self,
        operation: &str,
        mut builder: QueryBuilder<'_, Postgres>,
    ) -> StorageResult<Vec<PgRow>> {
        let pool = &self.pool;
        self.execute_with_timeout(operation, async move {
            builder
                .build()
                .fetch_all(pool)
                .await
                .map_err(|e| StorageError::QueryError {
                    message: format!("{operation} failed: {e}"),
                })
        })
        .await
    }

    /// Creates the registry tables if they do not exist.
    ///
    /// Production databases are populated by the public registry import; this
    /// exists so integration tests can start from an empty database.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> StorageResult<()> {
        debug!("Running database migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS empresas (
                cnpj_basico TEXT PRIMARY KEY,
                razao_social TEXT,
                natureza_juridica TEXT,
                qualificacao_responsavel TEXT,
                porte_empresa TEXT,
                ente_federativo_responsavel TEXT,
                capital_social REAL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS estabelecimento (
                id BIGSERIAL PRIMARY KEY,
                cnpj TEXT, cnpj_basico TEXT, cnpj_ordem TEXT, cnpj_dv TEXT,
                matriz_filial TEXT, nome_fantasia TEXT, situacao_cadastral TEXT,
                data_situacao_cadastral TEXT, motivo_situacao_cadastral TEXT,
                nome_cidade_exterior TEXT, pais TEXT, data_inicio_atividades TEXT,
                cnae_fiscal TEXT, cnae_fiscal_secundaria TEXT, tipo_logradouro TEXT,
                logradouro TEXT, numero TEXT, complemento TEXT, bairro TEXT, cep TEXT,
                uf TEXT, municipio TEXT, ddd1 TEXT, telefone1 TEXT, ddd2 TEXT,
                telefone2 TEXT, ddd_fax TEXT, fax TEXT, correio_eletronico TEXT,
                situacao_especial TEXT, data_situacao_especial TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_estabelecimento_cnpj_basico ON estabelecimento (cnpj_basico)",
            r#"
            CREATE TABLE IF NOT EXISTS socios (
                cnpj TEXT, cnpj_basico TEXT, identificador_de_socio TEXT, nome_socio TEXT,
                cnpj_cpf_socio TEXT, qualificacao_socio TEXT, data_entrada_sociedade TEXT,
                pais TEXT, representante_legal TEXT, nome_representante TEXT,
                qualificacao_representante_legal TEXT, faixa_etaria TEXT
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_socios_cnpj_basico ON socios (cnpj_basico)",
            "CREATE TABLE IF NOT EXISTS cnae (codigo TEXT PRIMARY KEY, descricao TEXT)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::QueryError {
                    message: format!("Failed to run migration: {e}"),
                })?;
        }

        Ok(())
    }
}

#[async_trait]
impl RegistryStore for PostgresRegistryStore {
    #[instrument(skip(self, base_ids), fields(keys = base_ids.len()))]
    async fn fetch_companies(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Company>> {
        if base_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut builder = QueryBuilder::new(format!(
            "SELECT {COMPANY_COLUMNS} FROM empresas WHERE cnpj_basico = ANY("
        ));
        builder.push_bind(base_ids.to_vec());
        builder.push(")");

        let rows = self.fetch_rows("fetch_companies", builder).await?;
        rows.iter()
            .map(|row| row_to_company(row).map(|c| (c.base_id.clone(), c)))
            .collect()
    }

    #[instrument(skip(self, base_ids), fields(keys = base_ids.len()))]
    async fn fetch_partners(
        &self,
        base_ids: &[String],
    ) -> StorageResult<HashMap<String, Vec<Partner>>> {
        if base_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut builder = QueryBuilder::new(format!(
            "SELECT {PARTNER_COLUMNS} FROM socios WHERE cnpj_basico = ANY("
        ));
        builder.push_bind(base_ids.to_vec());
        builder.push(")");

        let rows = self.fetch_rows("fetch_partners", builder).await?;
        let mut grouped: HashMap<String, Vec<Partner>> = HashMap::new();
        for row in &rows {
            let partner = row_to_partner(row)?;
            grouped
                .entry(partner.base_id.clone())
                .or_default()
                .push(partner);
        }
        Ok(grouped)
    }

    #[instrument(skip(self, codes), fields(keys = codes.len()))]
    async fn fetch_activity_codes(
        &self,
        codes: &[String],
    ) -> StorageResult<HashMap<String, ActivityCode>> {
        if codes.is_empty() {
            return Ok(HashMap::new());
        }
        let mut builder = QueryBuilder::new("SELECT codigo, descricao FROM cnae WHERE codigo = ANY(");
        builder.push_bind(codes.to_vec());
        builder.push(")");

        let rows = self.fetch_rows("fetch_activity_codes", builder).await?;
        rows.iter()
            .map(|row| row_to_activity_code(row).map(|a| (a.code.clone(), a)))
            .collect()
    }

    #[instrument(skip(self))]
    async fn list_companies(&self, limit: Option<u32>) -> StorageResult<Vec<Company>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {COMPANY_COLUMNS} FROM empresas ORDER BY cnpj_basico"
        ));
        if let Some(limit) = limit.filter(|l| *l > 0) {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }

        let rows = self.fetch_rows("list_companies", builder).await?;
        rows.iter().map(row_to_company).collect()
    }

    #[instrument(skip(self))]
    async fn get_company(&self, base_id: &str) -> StorageResult<Option<Company>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {COMPANY_COLUMNS} FROM empresas WHERE cnpj_basico = "
        ));
        builder.push_bind(base_id.to_string());

        let rows = self.fetch_rows("get_company", builder).await?;
        rows.first().map(row_to_company).transpose()
    }

    #[instrument(skip(self))]
    async fn get_establishment(&self, id: i64) -> StorageResult<Option<Establishment>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {ESTABLISHMENT_COLUMNS} FROM estabelecimento e WHERE e.id = "
        ));
        builder.push_bind(id);

        let rows = self.fetch_rows("get_establishment", builder).await?;
        rows.first().map(row_to_establishment).transpose()
    }

    #[instrument(skip(self))]
    async fn get_establishment_by_base_id(
        &self,
        base_id: &str,
    ) -> StorageResult<Option<Establishment>> {
        // matriz_filial is '1' for the head office and '2' for branches.
        let mut builder = QueryBuilder::new(format!(
            "SELECT {ESTABLISHMENT_COLUMNS} FROM estabelecimento e WHERE e.cnpj_basico = "
        ));
        builder.push_bind(base_id.to_string());
        builder.push(" ORDER BY e.matriz_filial ASC, e.id ASC LIMIT 1");

        let rows = self.fetch_rows("get_establishment_by_base_id", builder).await?;
        rows.first().map(row_to_establishment).transpose()
    }

    #[instrument(skip(self, filter))]
    async fn find_establishments(
        &self,
        filter: &ProspectFilter,
        pagination: &Pagination,
    ) -> StorageResult<Vec<Establishment>> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {ESTABLISHMENT_COLUMNS} FROM estabelecimento e \
             JOIN empresas emp ON e.cnpj_basico = emp.cnpj_basico WHERE 1=1"
        ));
        apply_prospect_filters(&mut builder, filter);
        builder.push(" ORDER BY e.cnpj ASC");
        if let Some(limit) = pagination.effective_limit() {
            builder.push(" LIMIT ");
            builder.push_bind(i64::from(limit));
        }
        if let Some(offset) = pagination.offset {
            builder.push(" OFFSET ");
            builder.push_bind(i64::from(offset));
        }

        let rows = self.fetch_rows("find_establishments", builder).await?;
        rows.iter().map(row_to_establishment).collect()
    }
}
