//! Domain models and strongly-typed identifiers.
//!
//! Defines the to-do record written by the ingress endpoint, the operation
//! kinds recorded by the change log, and the change notification delivered to
//! subscribers. Includes the database encoding for each type.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

type PgDb = sqlx::Postgres;
type PgRow = sqlx::postgres::PgRow;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Strongly-typed to-do identifier.
///
/// Assigned once, either by the caller or by the ingress handler, and never
/// changed afterwards.
///
/// # Example
///
/// ```
/// use todofeed_core::models::ToDoId;
/// let id = ToDoId::new();
/// println!("Writing item: {}", id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToDoId(pub Uuid);

impl ToDoId {
    /// Creates a new random identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ToDoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ToDoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ToDoId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl sqlx::Type<PgDb> for ToDoId {
    fn type_info() -> PgTypeInfo {
        <Uuid as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for ToDoId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let uuid = <Uuid as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(uuid))
    }
}

impl sqlx::Encode<'_, PgDb> for ToDoId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <Uuid as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// Position of a change in the change log.
///
/// Ids come from a sequence and follow insertion order into the log. With
/// concurrent writers a transaction holding a lower id can commit after one
/// holding a higher id, so a later claim may see an id below one already
/// acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeId(pub i64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl sqlx::Type<PgDb> for ChangeId {
    fn type_info() -> PgTypeInfo {
        <i64 as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for ChangeId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        Ok(Self(<i64 as sqlx::Decode<PgDb>>::decode(value)?))
    }
}

impl sqlx::Encode<'_, PgDb> for ChangeId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <i64 as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// A to-do record.
///
/// `order` and `completed` are nullable and serialize as `null` when unset,
/// so every serialized item carries all five fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ToDoItem {
    /// Unique identifier.
    pub id: ToDoId,

    /// Caller-supplied sort hint.
    #[sqlx(rename = "item_order")]
    pub order: Option<i32>,

    /// Display label.
    pub title: String,

    /// Reference URL.
    pub url: String,

    /// Tri-state completion flag.
    pub completed: Option<bool>,
}

/// A to-do record as accepted on the wire.
///
/// Identical to [`ToDoItem`] except that `id` may be omitted. `title` and
/// `url` have no defaults, so a body without them fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewToDoItem {
    /// Identifier chosen by the caller, if any.
    pub id: Option<ToDoId>,

    /// Caller-supplied sort hint.
    pub order: Option<i32>,

    /// Display label.
    pub title: String,

    /// Reference URL.
    pub url: String,

    /// Tri-state completion flag.
    pub completed: Option<bool>,
}

impl NewToDoItem {
    /// Converts into a full record, generating an identifier when absent.
    pub fn into_item(self) -> ToDoItem {
        ToDoItem {
            id: self.id.unwrap_or_default(),
            order: self.order,
            title: self.title,
            url: self.url,
            completed: self.completed,
        }
    }
}

impl From<ToDoItem> for NewToDoItem {
    fn from(item: ToDoItem) -> Self {
        Self {
            id: Some(item.id),
            order: item.order,
            title: item.title,
            url: item.url,
            completed: item.completed,
        }
    }
}

/// Kind of row change recorded by the change log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// A row was inserted.
    Insert,
    /// An existing row was modified.
    Update,
    /// A row was removed. The snapshot is the row before removal.
    Delete,
}

impl Operation {
    /// Returns the representation stored in the change log.
    pub const fn as_db_str(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Insert => write!(f, "Insert"),
            Self::Update => write!(f, "Update"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(Self::Insert),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            _ => Err(CoreError::InvalidInput(format!("unknown operation kind: {s}"))),
        }
    }
}

impl sqlx::Type<PgDb> for Operation {
    fn type_info() -> PgTypeInfo {
        <&str as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for Operation {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let s = <&str as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(s.parse::<Self>()?)
    }
}

impl sqlx::Encode<'_, PgDb> for Operation {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <&str as sqlx::Encode<PgDb>>::encode_by_ref(&self.as_db_str(), buf)
    }
}

/// A single row change delivered by the change feed.
///
/// Pairs the operation kind with the row snapshot at the time of the change.
/// Subscribers receive these read-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemChange {
    /// Position in the change log.
    pub change_id: ChangeId,

    /// What happened to the row.
    pub operation: Operation,

    /// Row snapshot after the change, or before it for deletes.
    pub item: ToDoItem,

    /// When the database recorded the change.
    pub changed_at: DateTime<Utc>,

    /// How many times this change has been handed out, including this one.
    pub attempt_count: u32,
}

impl ItemChange {
    /// Creates a first-attempt change notification.
    pub fn new(change_id: ChangeId, operation: Operation, item: ToDoItem) -> Self {
        Self { change_id, operation, item, changed_at: Utc::now(), attempt_count: 1 }
    }
}

impl<'r> sqlx::FromRow<'r, PgRow> for ItemChange {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;

        Ok(Self {
            change_id: row.try_get("change_id")?,
            operation: row.try_get("operation")?,
            item: ToDoItem {
                id: row.try_get("item_id")?,
                order: row.try_get("item_order")?,
                title: row.try_get("title")?,
                url: row.try_get("url")?,
                completed: row.try_get("completed")?,
            },
            changed_at: row.try_get("changed_at")?,
            attempt_count: {
                let val: i32 = row.try_get("attempt_count")?;
                val.try_into()
                    .map_err(|_| sqlx::Error::Decode("attempt_count cannot be negative".into()))?
            },
        })
    }
}
