use mongodb::{
    bson::doc,
    options::{FindOneAndUpdateOptions, ReturnDocument},
};
use serde::{Deserialize, Serialize};

use crate::{
    database::Storage,
    error::{StoreError, StoreResult},
};

/// Sequence document backing the numeric ids of one collection.
#[derive(Debug, Deserialize, Serialize)]
pub struct Counter {
    pub _id: String,
    pub seq: i64,
}

impl Counter {
    pub async fn next(storage: &Storage, collection: &'static str) -> StoreResult<i64> {
        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        storage
            .collection::<Counter>("counters")
            .find_one_and_update(
                doc! { "_id": collection },
                doc! { "$inc": { "seq": 1_i64 } },
                options,
            )
            .await?
            .map(|counter| counter.seq)
            .ok_or(StoreError::IdAllocation(collection))
    }
}
