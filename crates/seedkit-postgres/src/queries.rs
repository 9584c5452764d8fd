use sqlx::PgPool;

/// Quote a Postgres identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

pub fn create_schema_sql(schema: &str) -> String {
    format!("create schema if not exists {}", quote_ident(schema))
}

pub fn create_table_sql(qualified: &str) -> String {
    format!(
        "create table if not exists {qualified} (\
         _seq bigserial primary key, \
         _id text, \
         doc jsonb not null)"
    )
}

pub fn drop_table_sql(qualified: &str) -> String {
    format!("drop table if exists {qualified}")
}

pub fn insert_sql(qualified: &str) -> String {
    format!("insert into {qualified} (_id, doc) values ($1, $2::jsonb) returning doc::text")
}

pub async fn table_exists(pool: &PgPool, schema: &str, table: &str) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        r#"
        select exists (
          select 1
          from information_schema.tables
          where table_schema = $1
            and table_name = $2
        )
        "#,
    )
    .bind(schema)
    .bind(table)
    .fetch_one(pool)
    .await
}

pub async fn execute(pool: &PgPool, sql: &str) -> Result<(), sqlx::Error> {
    sqlx::query(sql).execute(pool).await?;
    Ok(())
}

pub async fn insert_document(
    pool: &PgPool,
    qualified: &str,
    id: Option<String>,
    document: String,
) -> Result<String, sqlx::Error> {
    let sql = insert_sql(qualified);
    sqlx::query_scalar::<_, String>(&sql)
        .bind(id)
        .bind(document)
        .fetch_one(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("users"), "\"users\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(qualified_table("app", "Team"), "\"app\".\"Team\"");
    }

    #[test]
    fn statements_use_quoted_names() {
        let table = qualified_table("public", "teams");
        assert_eq!(drop_table_sql(&table), "drop table if exists \"public\".\"teams\"");
        assert!(
            create_table_sql(&table)
                .starts_with("create table if not exists \"public\".\"teams\" (")
        );
        assert!(insert_sql(&table).contains("returning doc::text"));
        assert_eq!(create_schema_sql("app"), "create schema if not exists \"app\"");
    }
}
