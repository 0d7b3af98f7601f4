use sqlx::PgPool;

/// Create tables and indexes if they do not exist yet.
///
/// `method` dedup uses `NULLS NOT DISTINCT` (PostgreSQL 15+) so tax methods,
/// which have no owning client, still collapse on `(type, key)`.
pub async fn init_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    tracing::info!("Initializing PostgreSQL schema...");

    for (name, statement) in STATEMENTS {
        sqlx::query(statement).execute(pool).await.map_err(|e| {
            tracing::error!(object = name, error = %e, "Failed to create schema object");
            e
        })?;
    }

    tracing::info!("PostgreSQL schema initialized successfully");
    Ok(())
}

const STATEMENTS: &[(&str, &str)] = &[
    ("client", CREATE_CLIENT_TABLE),
    ("client_email_idx", CREATE_CLIENT_EMAIL_INDEX),
    ("account", CREATE_ACCOUNT_TABLE),
    ("account_client_idx", CREATE_ACCOUNT_CLIENT_INDEX),
    ("method", CREATE_METHOD_TABLE),
    ("trans", CREATE_TRANS_TABLE),
    ("trans_account_idx", CREATE_TRANS_ACCOUNT_INDEX),
    ("session_token", CREATE_SESSION_TOKEN_TABLE),
    ("session_token_prev_idx", CREATE_SESSION_TOKEN_PREV_INDEX),
    ("client_confirmation", CREATE_CLIENT_CONFIRMATION_TABLE),
    ("client_confirmation_client_idx", CREATE_CLIENT_CONFIRMATION_CLIENT_INDEX),
];

const CREATE_CLIENT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS client (
    id            UUID PRIMARY KEY,
    email         TEXT NOT NULL,
    name          TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    time          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    confirmed     BOOLEAN NOT NULL DEFAULT FALSE
)
"#;

const CREATE_CLIENT_EMAIL_INDEX: &str =
    "CREATE UNIQUE INDEX IF NOT EXISTS client_email_idx ON client (LOWER(email))";

const CREATE_ACCOUNT_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS account (
    id       UUID PRIMARY KEY,
    client   UUID NOT NULL REFERENCES client (id),
    currency TEXT NOT NULL,
    balance  NUMERIC(30, 8) NOT NULL DEFAULT 0,
    revision BIGINT NOT NULL DEFAULT 1
)
"#;

const CREATE_ACCOUNT_CLIENT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS account_client_idx ON account (client)";

const CREATE_METHOD_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS method (
    id       UUID PRIMARY KEY,
    client   UUID NULL REFERENCES client (id),
    type     SMALLINT NOT NULL,
    payload  JSONB NOT NULL,
    currency TEXT NOT NULL,
    key      TEXT NOT NULL,
    CONSTRAINT method_dedup_key UNIQUE NULLS NOT DISTINCT (client, type, key)
)
"#;

const CREATE_TRANS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS trans (
    id            BIGSERIAL PRIMARY KEY,
    method        UUID NOT NULL REFERENCES method (id),
    account       UUID NOT NULL REFERENCES account (id),
    value         NUMERIC(30, 8) NOT NULL,
    time          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    status        SMALLINT NOT NULL,
    status_reason TEXT NULL
)
"#;

const CREATE_TRANS_ACCOUNT_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS trans_account_idx ON trans (account, time)";

const CREATE_SESSION_TOKEN_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS session_token (
    token       UUID PRIMARY KEY,
    client      UUID NOT NULL REFERENCES client (id),
    time        TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    update_time TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    token_prev  UUID NULL,
    meta        JSONB NOT NULL DEFAULT '{}'::jsonb
)
"#;

const CREATE_SESSION_TOKEN_PREV_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS session_token_prev_idx ON session_token (token_prev)";

const CREATE_CLIENT_CONFIRMATION_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS client_confirmation (
    id     UUID PRIMARY KEY,
    time   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    code   INTEGER NOT NULL,
    client UUID NOT NULL REFERENCES client (id)
)
"#;

const CREATE_CLIENT_CONFIRMATION_CLIENT_INDEX: &str = "CREATE INDEX IF NOT EXISTS client_confirmation_client_idx ON client_confirmation (client, time)";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_are_idempotent() {
        for (name, statement) in STATEMENTS {
            assert!(
                statement.contains("IF NOT EXISTS"),
                "{} must be safe to run on every start",
                name
            );
        }
    }

    #[test]
    fn test_money_columns_match_amount_limits() {
        let money = format!(
            "NUMERIC({}, {})",
            crate::validation::MONEY_PRECISION,
            crate::validation::MONEY_SCALE
        );
        assert!(CREATE_ACCOUNT_TABLE.contains(&format!("balance  {}", money)));
        assert!(CREATE_TRANS_TABLE.contains(&format!("value         {}", money)));
    }

    #[test]
    fn test_tables_created_before_references() {
        let position = |name: &str| STATEMENTS.iter().position(|(n, _)| *n == name).unwrap();
        assert!(position("client") < position("account"));
        assert!(position("account") < position("trans"));
        assert!(position("method") < position("trans"));
        assert!(position("client") < position("session_token"));
    }
}
