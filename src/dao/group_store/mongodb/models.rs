use mongodb::bson::{Document, doc};
use serde::{Deserialize, Serialize};

use crate::dao::models::{GroupEntity, PlayerLinkEntity};

/// Group document persisted in the `groups` collection, keyed by chat id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGroupDocument {
    #[serde(rename = "_id")]
    chat_id: i64,
    display_name: Option<String>,
    streak: u32,
    last_tally_day: Option<String>,
    #[serde(default)]
    players: Vec<PlayerLinkEntity>,
}

/// Projection used when only the chat id column is needed.
#[derive(Debug, Deserialize)]
pub struct MongoGroupIdDocument {
    #[serde(rename = "_id")]
    pub chat_id: i64,
}

impl From<GroupEntity> for MongoGroupDocument {
    fn from(value: GroupEntity) -> Self {
        Self {
            chat_id: value.chat_id,
            display_name: value.display_name,
            streak: value.streak,
            last_tally_day: value.last_tally_day,
            players: value.players,
        }
    }
}

impl From<MongoGroupDocument> for GroupEntity {
    fn from(value: MongoGroupDocument) -> Self {
        Self {
            chat_id: value.chat_id,
            display_name: value.display_name,
            streak: value.streak,
            last_tally_day: value.last_tally_day,
            players: value.players,
        }
    }
}

pub fn doc_id(chat_id: i64) -> Document {
    doc! {"_id": chat_id}
}
