#![allow(dead_code)]

use std::env;
use std::sync::Once;

use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbBackend, DbErr, Statement,
};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub mod employee {
    use recursive_tree_scopes::TreeScopeModelDerive as TreeScopeModel;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, TreeScopeModel)]
    #[sea_orm(table_name = "employees")]
    #[tree_scope(entity_name = "Employee", role(name = "manager", field = "manager_id"))]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub manager_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod person {
    use recursive_tree_scopes::TreeScopeModelDerive as TreeScopeModel;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, TreeScopeModel)]
    #[sea_orm(table_name = "people")]
    #[tree_scope(entity_name = "Person", role(name = "father"), role(name = "mother"))]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub father_id: Option<i32>,
        pub mother_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

/// Same table as [`person`], returning ancestors by primary key.
pub mod lineage {
    use recursive_tree_scopes::TreeScopeModelDerive as TreeScopeModel;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, TreeScopeModel)]
    #[sea_orm(table_name = "people")]
    #[tree_scope(
        entity_name = "Lineage",
        role(name = "father"),
        role(name = "mother"),
        ancestor_order = "storage"
    )]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub father_id: Option<i32>,
        pub mother_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod node {
    use recursive_tree_scopes::TreeScopeModelDerive as TreeScopeModel;
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel, TreeScopeModel)]
    #[sea_orm(table_name = "nodes")]
    #[tree_scope(parent_field = "parent_id", max_depth = 8)]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i32,
        pub name: String,
        pub parent_id: Option<i32>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_target(true)
                .with_test_writer()
                .with_filter(env_filter),
        );
        if tracing::dispatcher::has_been_set() {
            debug!("Tracing subscriber already set");
        } else if let Err(err) = subscriber.try_init() {
            eprintln!("Error: Failed to set up logging: {err}");
        }
        info!(rust_log = ?env::var("RUST_LOG").ok(), "Test Setup complete");
    });
}

pub async fn setup_database() -> Result<DatabaseConnection, DbErr> {
    init_test_setup();

    let url = env::var("TREE_SCOPES_TEST_DATABASE_URL")
        .unwrap_or_else(|_| "sqlite::memory:".to_string());
    let mut options = ConnectOptions::new(url);
    options
        .max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(options).await?;

    for ddl in [
        r#"
        CREATE TABLE employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            manager_id INTEGER REFERENCES employees(id)
        );
        "#,
        r#"
        CREATE TABLE people (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            father_id INTEGER REFERENCES people(id),
            mother_id INTEGER REFERENCES people(id)
        );
        "#,
        r#"
        CREATE TABLE nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            parent_id INTEGER
        );
        "#,
    ] {
        db.execute(Statement::from_string(DbBackend::Sqlite, ddl))
            .await?;
    }

    Ok(db)
}

pub fn staff_names(rows: &[employee::Model]) -> Vec<&str> {
    rows.iter().map(|row| row.name.as_str()).collect()
}

pub fn family_names(rows: &[person::Model]) -> Vec<&str> {
    rows.iter().map(|row| row.name.as_str()).collect()
}

pub struct Staff {
    pub alonso: employee::Model,
    pub alfred: employee::Model,
    pub barry: employee::Model,
    pub bob: employee::Model,
    pub charles: employee::Model,
    pub cameron: employee::Model,
    pub carl: employee::Model,
    pub dave: employee::Model,
    pub daryl: employee::Model,
    pub dick: employee::Model,
    pub edward: employee::Model,
    pub frank: employee::Model,
}

impl Staff {
    pub fn all(&self) -> Vec<&employee::Model> {
        vec![
            &self.alonso,
            &self.alfred,
            &self.barry,
            &self.bob,
            &self.charles,
            &self.cameron,
            &self.carl,
            &self.dave,
            &self.daryl,
            &self.dick,
            &self.edward,
            &self.frank,
        ]
    }
}

async fn hire(
    db: &DatabaseConnection,
    name: &str,
    manager: Option<&employee::Model>,
) -> Result<employee::Model, DbErr> {
    employee::ActiveModel {
        name: Set(name.to_owned()),
        manager_id: Set(manager.map(|manager| manager.id)),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn seed_staff(db: &DatabaseConnection) -> Result<Staff, DbErr> {
    let alonso = hire(db, "Alonso", None).await?;
    let alfred = hire(db, "Alfred", None).await?;
    let barry = hire(db, "Barry", Some(&alfred)).await?;
    let bob = hire(db, "Bob", Some(&alfred)).await?;
    let charles = hire(db, "Charles", Some(&barry)).await?;
    let cameron = hire(db, "Cameron", Some(&barry)).await?;
    let carl = hire(db, "Carl", Some(&barry)).await?;
    let dave = hire(db, "Dave", Some(&carl)).await?;
    let daryl = hire(db, "Daryl", Some(&charles)).await?;
    let dick = hire(db, "Dick", Some(&charles)).await?;
    let edward = hire(db, "Edward", Some(&dick)).await?;
    let frank = hire(db, "Frank", Some(&edward)).await?;

    Ok(Staff {
        alonso,
        alfred,
        barry,
        bob,
        charles,
        cameron,
        carl,
        dave,
        daryl,
        dick,
        edward,
        frank,
    })
}

pub struct Family {
    pub george: person::Model,
    pub hazel: person::Model,
    pub bill: person::Model,
    pub william: person::Model,
    pub sharlyn: person::Model,
    pub tamara: person::Model,
    pub john: person::Model,
    pub mark: person::Model,
    pub buster: person::Model,
}

impl Family {
    pub fn all(&self) -> Vec<&person::Model> {
        vec![
            &self.george,
            &self.hazel,
            &self.bill,
            &self.william,
            &self.sharlyn,
            &self.tamara,
            &self.john,
            &self.mark,
            &self.buster,
        ]
    }
}

async fn birth(
    db: &DatabaseConnection,
    name: &str,
    father: Option<&person::Model>,
    mother: Option<&person::Model>,
) -> Result<person::Model, DbErr> {
    person::ActiveModel {
        name: Set(name.to_owned()),
        father_id: Set(father.map(|father| father.id)),
        mother_id: Set(mother.map(|mother| mother.id)),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn seed_family(db: &DatabaseConnection) -> Result<Family, DbErr> {
    let george = birth(db, "George", None, None).await?;
    let hazel = birth(db, "Hazel", None, None).await?;
    let bill = birth(db, "Bill", Some(&george), Some(&hazel)).await?;
    let william = birth(db, "William", None, None).await?;
    let sharlyn = birth(db, "Sharlyn", None, None).await?;
    let tamara = birth(db, "Tamara", Some(&william), Some(&sharlyn)).await?;
    let john = birth(db, "John", Some(&bill), Some(&tamara)).await?;
    let mark = birth(db, "Mark", Some(&bill), Some(&tamara)).await?;
    let buster = birth(db, "Buster", Some(&john), None).await?;

    Ok(Family {
        george,
        hazel,
        bill,
        william,
        sharlyn,
        tamara,
        john,
        mark,
        buster,
    })
}

pub async fn insert_node(
    db: &DatabaseConnection,
    name: &str,
    parent_id: Option<i32>,
) -> Result<node::Model, DbErr> {
    node::ActiveModel {
        name: Set(name.to_owned()),
        parent_id: Set(parent_id),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Point an existing node at a new parent, bypassing any application checks.
pub async fn repoint(db: &DatabaseConnection, id: i32, parent_id: i32) -> Result<(), DbErr> {
    db.execute(Statement::from_sql_and_values(
        DbBackend::Sqlite,
        "UPDATE nodes SET parent_id = ? WHERE id = ?",
        [parent_id.into(), id.into()],
    ))
    .await?;
    Ok(())
}
