#![allow(dead_code)]

use std::sync::Arc;

use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, FromQueryResult};
use sea_orm_migration::prelude::*;
use searchcrate::filtering::{FieldResolver, Join, MultiMatchSubquery, ResolverResult, SimpleFieldResolver};
use searchcrate::sql::{Params, RawExpr, SelectQuery};
use searchcrate::SearchError;

/// Row of the `test` table.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct TestRow {
    pub id: i32,
    pub test1: Option<String>,
    pub test2: Option<String>,
    pub test3: Option<i64>,
}

/// Route library events to the test output, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();

    let db = Database::connect("sqlite::memory:").await?;

    // Run migrations
    Migrator::up(&db, None).await?;

    Ok(db)
}

/// Two rows:
///
/// | id | test1 | test2 | test3 | data |
/// |---|---|---|---|---|
/// | 1 | `lorem_ipsum 100%` | `''` | NULL | `{"a":{"b":[1,2]}}` |
/// | 2 | `lorem ipsum` | NULL | 2 | NULL |
///
/// Row 1 is tagged `a` and `b`, row 2 is tagged `c`.
pub async fn setup_seeded_db() -> Result<DatabaseConnection, DbErr> {
    let db = setup_test_db().await?;

    db.execute_unprepared(
        r#"INSERT INTO "test" ("id", "test1", "test2", "test3", "data") VALUES
            (1, 'lorem_ipsum 100%', '', NULL, '{"a":{"b":[1,2]}}'),
            (2, 'lorem ipsum', NULL, 2, NULL)"#,
    )
    .await?;
    db.execute_unprepared(
        r#"INSERT INTO "tags" ("id", "test_id", "name") VALUES (1, 1, 'a'), (2, 1, 'b'), (3, 2, 'c')"#,
    )
    .await?;

    Ok(db)
}

pub fn test_resolver() -> SimpleFieldResolver {
    SimpleFieldResolver::new(["id", "test1", "test2", "test3", r"^data\..+$"]).expect("valid allow-list")
}

/// Resolves `tags.name` through the `tags` table, everything else through
/// [`test_resolver`]. Records the join it needs and applies it in
/// `update_query`.
pub struct TagResolver {
    inner: SimpleFieldResolver,
    target_alias: String,
    needs_join: bool,
    pub update_calls: usize,
}

impl Default for TagResolver {
    fn default() -> Self {
        Self::with_target_alias("test")
    }
}

impl TagResolver {
    /// Correlate the tag subquery with `alias` instead of the `test` table.
    pub fn with_target_alias(alias: &str) -> Self {
        Self {
            inner: test_resolver(),
            target_alias: alias.to_string(),
            needs_join: false,
            update_calls: 0,
        }
    }
}

impl FieldResolver for TagResolver {
    fn resolve(&mut self, field: &str) -> Result<ResolverResult, SearchError> {
        if field != "tags.name" {
            // qualify plain columns, the joined table has an `id` too
            let mut result = self.inner.resolve(field)?;
            if let Some(column) = result.identifier.strip_prefix("[[").and_then(|s| s.strip_suffix("]]")) {
                result.identifier = format!("[[test.{column}]]");
            }
            return Ok(result);
        }

        self.needs_join = true;
        let subquery = MultiMatchSubquery {
            target_table_alias: self.target_alias.clone(),
            from_table_name: "test".into(),
            from_table_alias: "__mm_test".into(),
            value_identifier: "[[__mm_tags.name]]".into(),
            joins: vec![Join::new(
                "tags",
                "__mm_tags",
                Some(Arc::new(RawExpr::new("[[__mm_tags.test_id]] = [[__mm_test.id]]"))),
            )],
            params: Params::new(),
        };

        Ok(ResolverResult::new("[[__tags.name]]").multi_match(Arc::new(subquery)))
    }

    fn update_query(&mut self, query: &mut SelectQuery) -> Result<(), SearchError> {
        self.update_calls += 1;
        if self.needs_join && !query.has_join("__tags") {
            query
                .distinct(true)
                .left_join("tags", "__tags", Arc::new(RawExpr::new("[[__tags.test_id]] = [[test.id]]")));
        }
        Ok(())
    }
}

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateTestTable), Box::new(CreateTagsTable)]
    }
}

pub struct CreateTestTable;

#[async_trait::async_trait]
impl MigrationName for CreateTestTable {
    fn name(&self) -> &'static str {
        "m20240101_000001_create_test_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateTestTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(TestTable::Table)
            .if_not_exists()
            .col(ColumnDef::new(TestTable::Id).integer().not_null().primary_key())
            .col(ColumnDef::new(TestTable::Test1).text().null())
            .col(ColumnDef::new(TestTable::Test2).text().null())
            .col(ColumnDef::new(TestTable::Test3).integer().null())
            .col(ColumnDef::new(TestTable::Data).text().null())
            .to_owned();

        manager.create_table(table).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TestTable::Table).to_owned())
            .await?;
        Ok(())
    }
}

pub struct CreateTagsTable;

#[async_trait::async_trait]
impl MigrationName for CreateTagsTable {
    fn name(&self) -> &'static str {
        "m20240101_000002_create_tags_table"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateTagsTable {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let table = Table::create()
            .table(TagsTable::Table)
            .if_not_exists()
            .col(ColumnDef::new(TagsTable::Id).integer().not_null().primary_key())
            .col(ColumnDef::new(TagsTable::TestId).integer().not_null())
            .col(ColumnDef::new(TagsTable::Name).string().not_null())
            .to_owned();

        manager.create_table(table).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TagsTable::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(Debug)]
pub enum TestTable {
    Table,
    Id,
    Test1,
    Test2,
    Test3,
    Data,
}

impl Iden for TestTable {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Table => "test",
                Self::Id => "id",
                Self::Test1 => "test1",
                Self::Test2 => "test2",
                Self::Test3 => "test3",
                Self::Data => "data",
            }
        )
        .unwrap();
    }
}

#[derive(Debug)]
pub enum TagsTable {
    Table,
    Id,
    TestId,
    Name,
}

impl Iden for TagsTable {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        write!(
            s,
            "{}",
            match self {
                Self::Table => "tags",
                Self::Id => "id",
                Self::TestId => "test_id",
                Self::Name => "name",
            }
        )
        .unwrap();
    }
}
