use mongodb::{
    bson::doc,
    options::{ClientOptions, Credential, IndexOptions},
    ClientSession, Client, Collection, Database, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{config::DatabaseConfig, error::StoreResult};

/// Storage handle shared by every entity store operation. Cheap to clone.
#[derive(Clone, Debug)]
pub struct Storage {
    client: Client,
    database: Database,
    transactions: bool,
}

pub async fn connect(config: &DatabaseConfig) -> StoreResult<Storage> {
    let mut options = ClientOptions::parse(&config.url).await?;
    options.app_name = Some("safetysight".to_string());
    if let Some(token) = &config.auth_token {
        options.credential = Some(
            Credential::builder()
                .username(config.username.clone())
                .password(token.clone())
                .build(),
        );
    }

    let storage = Storage::new(
        Client::with_options(options)?,
        &config.name,
        config.transactions,
    );
    storage.ensure_indexes().await?;
    tracing::info!(database = %config.name, "connected to storage");
    Ok(storage)
}

impl Storage {
    pub fn new(client: Client, name: &str, transactions: bool) -> Self {
        let database = client.database(name);
        Self {
            client,
            database,
            transactions,
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync,
    {
        self.database.collection::<T>(name)
    }

    /// Opens a session for a multi-statement mutation. A transaction is
    /// started on it when transactions are enabled.
    pub async fn start_session(&self) -> StoreResult<ClientSession> {
        let mut session = self.client.start_session(None).await?;
        if self.transactions {
            session.start_transaction(None).await?;
        }
        Ok(session)
    }

    /// Commits or aborts the session's transaction depending on `result`.
    pub async fn finish<T>(
        &self,
        session: &mut ClientSession,
        result: StoreResult<T>,
    ) -> StoreResult<T> {
        if !self.transactions {
            return result;
        }
        match result {
            Ok(value) => {
                session.commit_transaction().await?;
                Ok(value)
            }
            Err(error) => {
                if let Err(abort) = session.abort_transaction().await {
                    tracing::warn!("aborting transaction failed: {abort}");
                }
                Err(error)
            }
        }
    }

    async fn ensure_indexes(&self) -> StoreResult<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.database
            .collection::<mongodb::bson::Document>("users")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        let departments = self
            .database
            .collection::<mongodb::bson::Document>("departments");
        departments
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "name": 1 })
                    .options(unique())
                    .build(),
                None,
            )
            .await?;
        departments
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "supervisor_id": 1 })
                    .build(),
                None,
            )
            .await?;
        self.database
            .collection::<mongodb::bson::Document>("hazard_entries")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "department_id": 1 })
                    .build(),
                None,
            )
            .await?;
        self.database
            .collection::<mongodb::bson::Document>("control_measures")
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "hazard_entry_id": 1 })
                    .build(),
                None,
            )
            .await?;
        Ok(())
    }
}
